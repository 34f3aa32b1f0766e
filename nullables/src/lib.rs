//! Nullable infrastructure for deterministic testing.
//!
//! Every external dependency of the tracker (clock, storage, relay, remote
//! supernodes, chain account service) sits behind a trait. This crate
//! provides in-memory implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod clock;
pub mod network;
pub mod remote;
pub mod store;

pub use clock::NullClock;
pub use network::NullPublisher;
pub use remote::{NullChainAccounts, NullLogSource};
pub use store::{NullAuthStore, NullNodeStore, NullProgressStore};
