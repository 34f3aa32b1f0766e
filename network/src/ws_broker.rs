//! Network-facing relay endpoint.
//!
//! Accepts WebSocket connections at `/ws`. The first frame must be a
//! [`Handshake`]; a rejected credential gets a negative reply and the
//! connection is closed before any subscriber state exists.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
    routing::get,
    Router as HttpRouter,
};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::auth::AuthGate;
use crate::message::{decode, encode, Handshake, HandshakeReply, Message};
use crate::router::Router;
use crate::NetworkError;

#[derive(Clone, Debug)]
pub struct WsBrokerConfig {
    /// Largest inbound message accepted from a client.
    pub max_message_size: usize,
    pub write_buffer_size: usize,
    /// Interval between server pings.
    pub ping_wait: Duration,
    /// Longest silence tolerated from a client.
    pub read_wait: Duration,
    /// Bound on a single frame write.
    pub write_wait: Duration,
}

impl Default for WsBrokerConfig {
    fn default() -> Self {
        Self {
            max_message_size: 16 << 20,
            write_buffer_size: 4096,
            ping_wait: Duration::from_secs(30),
            read_wait: Duration::from_secs(60),
            write_wait: Duration::from_secs(10),
        }
    }
}

struct BrokerState {
    router: Arc<Router>,
    gate: Arc<AuthGate>,
    config: WsBrokerConfig,
}

pub struct WsBroker {
    state: Arc<BrokerState>,
}

impl WsBroker {
    pub fn new(router: Arc<Router>, gate: Arc<AuthGate>, config: WsBrokerConfig) -> Self {
        Self {
            state: Arc::new(BrokerState {
                router,
                gate,
                config,
            }),
        }
    }

    /// Bind the listening socket. Failure here is a startup error.
    pub async fn bind(addr: &str) -> Result<TcpListener, NetworkError> {
        TcpListener::bind(addr).await.map_err(|e| NetworkError::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn app(&self) -> HttpRouter {
        HttpRouter::new()
            .route("/ws", get(ws_handler))
            .with_state(Arc::clone(&self.state))
    }

    /// Serve connections until shutdown is signalled.
    pub async fn serve(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), NetworkError> {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "relay listening");
        }
        axum::serve(listener, self.app())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await
            .map_err(|e| NetworkError::Io(e.to_string()))
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<BrokerState>>,
) -> impl IntoResponse {
    ws.max_message_size(state.config.max_message_size)
        .write_buffer_size(state.config.write_buffer_size)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn read_handshake(socket: &mut WebSocket, wait: Duration) -> Result<Handshake, NetworkError> {
    loop {
        let frame = timeout(wait, socket.recv())
            .await
            .map_err(|_| NetworkError::Timeout("handshake"))?;
        match frame {
            Some(Ok(WsMessage::Binary(bytes))) => return decode(&bytes),
            Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => continue,
            Some(Ok(_)) => return Err(NetworkError::Protocol("expected binary handshake".into())),
            Some(Err(e)) => return Err(NetworkError::ConnectionFailed(e.to_string())),
            None => return Err(NetworkError::Closed),
        }
    }
}

async fn send_reply(socket: &mut WebSocket, accepted: bool, wait: Duration) -> bool {
    let Ok(bytes) = encode(&HandshakeReply { accepted }) else {
        return false;
    };
    matches!(
        timeout(wait, socket.send(WsMessage::Binary(bytes))).await,
        Ok(Ok(()))
    )
}

/// Handle a single relay connection.
///
/// 1. Read and verify the handshake.
/// 2. Register with the router and acknowledge.
/// 3. Forward routed messages out, submit inbound frames to the router.
/// 4. Unregister when either direction ends.
async fn handle_socket(mut socket: WebSocket, state: Arc<BrokerState>) {
    let config = &state.config;
    let handshake = match read_handshake(&mut socket, config.read_wait).await {
        Ok(h) => h,
        Err(e) => {
            debug!(error = %e, "dropping relay connection before handshake");
            return;
        }
    };

    if !state.gate.verify(&handshake.credential) {
        warn!(client_id = %handshake.client_id, "relay authentication rejected");
        send_reply(&mut socket, false, config.write_wait).await;
        let _ = socket.send(WsMessage::Close(None)).await;
        return;
    }

    let sub = state.router.register(&handshake.client_id, &handshake.topics);
    if !send_reply(&mut socket, true, config.write_wait).await {
        state.router.unregister(sub.id);
        return;
    }
    info!(client_id = %handshake.client_id, topics = ?handshake.topics, "relay subscriber joined");

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let mut rx = sub.rx;
    let ping_wait = config.ping_wait;
    let write_wait = config.write_wait;

    let writer = tokio::spawn(async move {
        let mut ping = interval(ping_wait);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ping.tick().await;
        loop {
            let frame = tokio::select! {
                msg = rx.recv() => match msg {
                    Some(msg) => match encode(&msg) {
                        Ok(bytes) => WsMessage::Binary(bytes),
                        Err(e) => {
                            warn!(error = %e, "cannot encode routed message");
                            continue;
                        }
                    },
                    None => break,
                },
                _ = ping.tick() => WsMessage::Ping(Vec::new()),
            };
            match timeout(write_wait, ws_sender.send(frame)).await {
                Ok(Ok(())) => {}
                _ => break,
            }
        }
        let _ = ws_sender.close().await;
    });

    loop {
        let frame = match timeout(config.read_wait, ws_receiver.next()).await {
            Ok(Some(Ok(frame))) => frame,
            Ok(Some(Err(e))) => {
                debug!(error = %e, "relay receive error");
                break;
            }
            Ok(None) => break,
            Err(_) => {
                debug!(client_id = %handshake.client_id, "relay subscriber timed out");
                break;
            }
        };
        match frame {
            WsMessage::Binary(bytes) => match decode::<Message>(&bytes) {
                Ok(mut msg) => {
                    msg.sender.clone_from(&handshake.client_id);
                    if !state.router.submit(sub.id, msg) {
                        warn!("router queue full, dropping inbound message");
                    }
                }
                Err(e) => debug!(error = %e, "dropping malformed relay frame"),
            },
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    state.router.unregister(sub.id);
    writer.abort();
    info!(client_id = %handshake.client_id, "relay subscriber left");
}
