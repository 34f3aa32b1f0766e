//! Relay credentials.

use serde::{Deserialize, Serialize};

use crate::TypesError;

/// Trusted public key for an account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auth {
    pub account: String,
    /// Hex-encoded Ed25519 public key, network prefix already stripped.
    pub public_key: String,
}

/// A signed challenge presented when subscribing to a relay.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignMessage {
    pub account_name: String,
    pub data: Vec<u8>,
    pub signature: Vec<u8>,
}

impl SignMessage {
    pub fn encode(&self) -> Result<Vec<u8>, TypesError> {
        bincode::serialize(self).map_err(|e| TypesError::Serialization(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TypesError> {
        bincode::deserialize(bytes).map_err(|e| TypesError::Serialization(e.to_string()))
    }
}
