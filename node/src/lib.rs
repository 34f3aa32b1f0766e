//! Miner tracker service.
//!
//! Keeps a registry of storage nodes eventually consistent across a fleet
//! of trackers:
//! - Merges node snapshots broadcast by peers and republishes the result
//! - Follows each peer's lifecycle log for registrations and removals
//! - Optionally seeds the registry from peers' full miner lists
//! - Refreshes relay credentials from the chain
//! - Maintains the readable-nodes snapshot and StableStat administration
//!   behind the HTTP API

pub mod admin;
pub mod api;
pub mod bootstrap;
pub mod config;
pub mod credentials;
pub mod error;
pub mod merge;
pub mod metrics;
pub mod node;
pub mod readable;
pub mod shutdown;
pub mod sync;
pub mod tracing_spans;
pub mod tracker;

pub use admin::StableStatAdmin;
pub use api::RegistryApi;
pub use bootstrap::{BootstrapConfig, BootstrapSummary, Bootstrapper};
pub use config::TrackerConfig;
pub use credentials::{CredentialRefresher, RefreshSummary};
pub use error::TrackerError;
pub use merge::{MergeEngine, MergeOutcome};
pub use metrics::TrackerMetrics;
pub use node::MinerTracker;
pub use readable::{ReadableNodesCache, ReadableRefresher};
pub use shutdown::ShutdownController;
pub use sync::SyncHandler;
pub use tracker::{LogTracker, LogTrackerConfig, PollOutcome};
