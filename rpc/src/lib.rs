//! HTTP API for the miner tracker.
//!
//! Provides endpoints for:
//! - Registry queries with a JSON predicate, sort field and limit
//! - StableStat reset and ratio refresh, for one node or all
//! - The cached readable-nodes snapshot
//! - Prometheus metrics and a health probe
//!
//! The server is generic over [`TrackerApi`], which the node crate
//! implements on top of its stores and caches.

pub mod error;
pub mod handlers;
pub mod server;
pub mod state;

pub use error::RpcError;
pub use server::RpcServer;
pub use state::TrackerApi;
