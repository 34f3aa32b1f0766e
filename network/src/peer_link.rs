//! Persistent outbound subscriptions to peer relays.
//!
//! One task per peer URL: connect with the local credential, feed every
//! inbound message to the handler until the connection ends, wait a fixed
//! delay, and start over. There is no retry limit and no backoff growth.
//! Tasks stop only when shutdown is signalled.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn, Instrument};

use crate::message::{Handshake, Message};
use crate::ws_client::{RunExit, WsClient, WsClientConfig};

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Receives what peer links observe.
pub trait PeerHandler: Send + Sync + 'static {
    fn on_message(&self, url: &str, msg: Message);

    fn on_connected(&self, _url: &str) {}

    fn on_disconnected(&self, _url: &str) {}
}

pub struct PeerLinkManager {
    urls: Vec<String>,
    handshake: Handshake,
    config: WsClientConfig,
    retry_delay: Duration,
}

impl PeerLinkManager {
    pub fn new(
        urls: Vec<String>,
        handshake: Handshake,
        config: WsClientConfig,
        retry_delay: Duration,
    ) -> Self {
        Self {
            urls,
            handshake,
            config,
            retry_delay,
        }
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Start one link task per peer.
    pub fn spawn(
        &self,
        handler: Arc<dyn PeerHandler>,
        shutdown: &broadcast::Sender<()>,
    ) -> Vec<JoinHandle<()>> {
        self.urls
            .iter()
            .map(|url| {
                let link = PeerLink {
                    url: url.clone(),
                    handshake: self.handshake.clone(),
                    config: self.config.clone(),
                    retry_delay: self.retry_delay,
                };
                let span = tracing::info_span!("peer_link", url = %url);
                tokio::spawn(
                    link.run(Arc::clone(&handler), shutdown.subscribe())
                        .instrument(span),
                )
            })
            .collect()
    }
}

struct PeerLink {
    url: String,
    handshake: Handshake,
    config: WsClientConfig,
    retry_delay: Duration,
}

impl PeerLink {
    async fn run(self, handler: Arc<dyn PeerHandler>, mut shutdown: broadcast::Receiver<()>) {
        loop {
            let connected = tokio::select! {
                biased;
                _ = shutdown.recv() => return,
                res = WsClient::connect(&self.url, &self.handshake, self.config.clone()) => res,
            };

            match connected {
                Ok(client) => {
                    info!("connected to peer relay");
                    handler.on_connected(&self.url);
                    let url = self.url.as_str();
                    let exit = client
                        .run(|msg| handler.on_message(url, msg), &mut shutdown)
                        .await;
                    handler.on_disconnected(&self.url);
                    match exit {
                        Ok(RunExit::Shutdown) => return,
                        Ok(RunExit::Closed) => info!("peer relay closed the connection"),
                        Err(e) => warn!(error = %e, "peer relay connection lost"),
                    }
                }
                Err(e) => warn!(error = %e, "cannot connect to peer relay"),
            }

            tokio::select! {
                biased;
                _ = shutdown.recv() => return,
                _ = tokio::time::sleep(self.retry_delay) => {}
            }
        }
    }
}
