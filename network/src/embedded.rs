//! In-process broker endpoint.
//!
//! Local components subscribe and publish through the same [`Router`] that
//! serves network subscribers, with the same credential check.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::auth::AuthGate;
use crate::message::Message;
use crate::router::{Router, SubscriberId};
use crate::{NetworkError, Publisher};

pub struct EmbeddedBroker {
    router: Arc<Router>,
    gate: Arc<AuthGate>,
}

impl EmbeddedBroker {
    pub fn new(router: Arc<Router>, gate: Arc<AuthGate>) -> Self {
        Self { router, gate }
    }

    /// Open an authenticated client subscribed to `topics`.
    pub fn connect(
        &self,
        client_id: &str,
        credential: &[u8],
        topics: &[String],
    ) -> Result<EmbeddedClient, NetworkError> {
        if !self.gate.verify(credential) {
            return Err(NetworkError::AuthRejected);
        }
        let sub = self.router.register(client_id, topics);
        info!(client_id, "local relay client connected");
        Ok(EmbeddedClient {
            id: sub.id,
            client_id: client_id.to_string(),
            router: Arc::clone(&self.router),
            rx: tokio::sync::Mutex::new(sub.rx),
        })
    }
}

/// A connected in-process client. Unsubscribes on drop.
pub struct EmbeddedClient {
    id: SubscriberId,
    client_id: String,
    router: Arc<Router>,
    rx: tokio::sync::Mutex<mpsc::Receiver<Message>>,
}

impl EmbeddedClient {
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn send(&self, to: &str, content: Vec<u8>) -> bool {
        self.router
            .submit(self.id, Message::direct(&self.client_id, to, content))
    }

    /// Next message delivered to this client; `None` once unsubscribed.
    pub async fn recv(&self) -> Option<Message> {
        self.rx.lock().await.recv().await
    }

    /// Hand every delivered message to `handler` until the subscription ends.
    pub async fn run<F: FnMut(Message)>(&self, mut handler: F) {
        while let Some(msg) = self.recv().await {
            handler(msg);
        }
        debug!(client_id = %self.client_id, "local relay client drained");
    }
}

impl Publisher for EmbeddedClient {
    fn publish(&self, topic: &str, content: Vec<u8>) -> bool {
        self.router
            .submit(self.id, Message::broadcast(&self.client_id, topic, content))
    }
}

impl Drop for EmbeddedClient {
    fn drop(&mut self) {
        self.router.unregister(self.id);
    }
}
