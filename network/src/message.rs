//! Relay frames.
//!
//! Every WebSocket frame is a binary bincode payload. A connection opens
//! with one [`Handshake`] from the client and one [`HandshakeReply`] from
//! the server; after that both directions carry [`Message`]s.

use serde::{Deserialize, Serialize};

use crate::NetworkError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    /// Delivered to every subscriber of the topic named by `destination`.
    Broadcast,
    /// Delivered to the client whose id is `destination`.
    Direct,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    pub sender: String,
    pub destination: String,
    pub content: Vec<u8>,
}

impl Message {
    pub fn broadcast(sender: &str, topic: &str, content: Vec<u8>) -> Self {
        Self {
            kind: MessageKind::Broadcast,
            sender: sender.to_string(),
            destination: topic.to_string(),
            content,
        }
    }

    pub fn direct(sender: &str, to: &str, content: Vec<u8>) -> Self {
        Self {
            kind: MessageKind::Direct,
            sender: sender.to_string(),
            destination: to.to_string(),
            content,
        }
    }

    /// A broadcast on `topic`.
    pub fn is_broadcast_on(&self, topic: &str) -> bool {
        self.kind == MessageKind::Broadcast && self.destination == topic
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    pub client_id: String,
    /// Encoded `SignMessage`.
    pub credential: Vec<u8>,
    pub topics: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeReply {
    pub accepted: bool,
}

pub(crate) fn encode<T: Serialize>(frame: &T) -> Result<Vec<u8>, NetworkError> {
    bincode::serialize(frame).map_err(|e| NetworkError::Protocol(e.to_string()))
}

pub(crate) fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, NetworkError> {
    bincode::deserialize(bytes).map_err(|e| NetworkError::Protocol(e.to_string()))
}
