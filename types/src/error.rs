//! Errors raised while converting between record and wire forms.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypesError {
    #[error("node id must be non-zero")]
    ZeroNodeId,

    #[error("invalid extension list: {0}")]
    InvalidExtension(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
