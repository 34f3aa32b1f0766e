//! LMDB storage backend for the miner tracker.
//!
//! Implements the storage traits from `tracker-store` using the `heed` LMDB
//! bindings. The registry, credential and cursor collections are three
//! named databases inside a single environment. Every operation runs in its
//! own transaction; LMDB serializes writers, so insert-if-absent and
//! read-modify-write updates are atomic.

pub mod auth;
pub mod environment;
pub mod error;
pub mod node;
pub mod progress;

pub use auth::LmdbAuthStore;
pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use node::LmdbNodeStore;
pub use progress::LmdbProgressStore;
