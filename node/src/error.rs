use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("store error: {0}")]
    Store(#[from] tracker_store::StoreError),

    #[error("storage backend error: {0}")]
    Lmdb(#[from] tracker_store_lmdb::LmdbError),

    #[error("network error: {0}")]
    Network(#[from] tracker_network::NetworkError),

    #[error("crypto error: {0}")]
    Crypto(#[from] tracker_crypto::CryptoError),

    #[error("encoding error: {0}")]
    Types(#[from] tracker_types::TypesError),

    #[error("miner ID cannot be 0")]
    ZeroNodeId,

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP API error: {0}")]
    Rpc(#[from] tracker_rpc::RpcError),

    #[error("shutdown timeout")]
    ShutdownTimeout,
}
