//! Abstract storage traits for the miner tracker.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The rest of the codebase depends only on the traits.
//!
//! Backends must make each single-record operation atomic with respect to
//! concurrent callers: `insert_node` is insert-if-absent, and the update
//! methods are read-modify-write under one lock or transaction.

pub mod auth;
pub mod error;
pub mod node;
pub mod progress;
pub mod query;

pub use auth::AuthStore;
pub use error::StoreError;
pub use node::NodeStore;
pub use progress::ProgressStore;
pub use query::{NodeQuery, SortOrder};

/// Database names inside one storage environment.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StoreNames {
    pub node_db: String,
    pub auth_db: String,
    pub progress_db: String,
}

impl Default for StoreNames {
    fn default() -> Self {
        Self {
            node_db: "Node".to_string(),
            auth_db: "Auth".to_string(),
            progress_db: "TrackProgress".to_string(),
        }
    }
}
