//! Outbound relay connection.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time::{interval, sleep_until, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::message::{decode, encode, Handshake, HandshakeReply, Message};
use crate::NetworkError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct WsClientConfig {
    pub ping_wait: Duration,
    pub read_wait: Duration,
    pub write_wait: Duration,
}

impl Default for WsClientConfig {
    fn default() -> Self {
        Self {
            ping_wait: Duration::from_secs(30),
            read_wait: Duration::from_secs(60),
            write_wait: Duration::from_secs(10),
        }
    }
}

/// How a running client stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunExit {
    /// The remote end closed the connection.
    Closed,
    /// Shutdown was signalled.
    Shutdown,
}

/// An authenticated subscription to a remote relay.
pub struct WsClient {
    url: String,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    config: WsClientConfig,
}

impl WsClient {
    /// Connect, present the handshake and wait for the relay to accept it.
    pub async fn connect(
        url: &str,
        handshake: &Handshake,
        config: WsClientConfig,
    ) -> Result<Self, NetworkError> {
        let (mut stream, _) = timeout(CONNECT_TIMEOUT, connect_async(url))
            .await
            .map_err(|_| NetworkError::Timeout("connect"))??;

        let hello = encode(handshake)?;
        timeout(config.write_wait, stream.send(WsMessage::Binary(hello)))
            .await
            .map_err(|_| NetworkError::Timeout("handshake write"))??;

        loop {
            let frame = timeout(config.read_wait, stream.next())
                .await
                .map_err(|_| NetworkError::Timeout("handshake reply"))?;
            match frame {
                Some(Ok(WsMessage::Binary(bytes))) => {
                    let reply: HandshakeReply = decode(&bytes)?;
                    if !reply.accepted {
                        return Err(NetworkError::AuthRejected);
                    }
                    break;
                }
                Some(Ok(WsMessage::Close(_))) | None => return Err(NetworkError::AuthRejected),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            }
        }

        Ok(Self {
            url: url.to_string(),
            stream,
            config,
        })
    }

    /// Pass every inbound message to `handler` until the connection ends or
    /// shutdown is signalled.
    pub async fn run<F: FnMut(Message)>(
        self,
        mut handler: F,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<RunExit, NetworkError> {
        let WsClient {
            url,
            stream,
            config,
        } = self;
        let (mut sink, mut source) = stream.split();
        let mut ping = interval(config.ping_wait);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ping.tick().await;
        let mut deadline = Instant::now() + config.read_wait;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    return Ok(RunExit::Shutdown);
                }
                _ = ping.tick() => {
                    timeout(config.write_wait, sink.send(WsMessage::Ping(Vec::new())))
                        .await
                        .map_err(|_| NetworkError::Timeout("ping write"))??;
                }
                _ = sleep_until(deadline) => {
                    return Err(NetworkError::Timeout("relay frame"));
                }
                frame = source.next() => {
                    deadline = Instant::now() + config.read_wait;
                    match frame {
                        Some(Ok(WsMessage::Binary(bytes))) => match decode::<Message>(&bytes) {
                            Ok(msg) => handler(msg),
                            Err(e) => debug!(%url, error = %e, "dropping malformed relay frame"),
                        },
                        Some(Ok(WsMessage::Close(_))) | None => return Ok(RunExit::Closed),
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                    }
                }
            }
        }
    }
}
