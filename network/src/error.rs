use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("authentication rejected")]
    AuthRejected,

    #[error("malformed frame: {0}")]
    Protocol(String),

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("connection closed")]
    Closed,

    #[error("cannot bind {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("IO error: {0}")]
    Io(String),

    #[error("peer unreachable: {0}")]
    Unreachable(String),

    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for NetworkError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        NetworkError::ConnectionFailed(e.to_string())
    }
}

impl From<reqwest::Error> for NetworkError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            NetworkError::Unreachable(format!("request timed out: {e}"))
        } else if e.is_connect() {
            NetworkError::Unreachable(format!("connection failed: {e}"))
        } else if e.is_decode() {
            NetworkError::InvalidResponse(e.to_string())
        } else {
            NetworkError::RequestFailed(e.to_string())
        }
    }
}
