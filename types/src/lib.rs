//! Fundamental types for the miner tracker.
//!
//! This crate defines the records shared across every other crate in the
//! workspace: registry nodes and their liveness statistics, lifecycle log
//! entries, tracking cursors, credentials, wire forms, and timestamps.

pub mod auth;
pub mod error;
pub mod keys;
pub mod miner_log;
pub mod node;
pub mod patch;
pub mod progress;
pub mod readable;
pub mod time;
pub mod wire;

pub use auth::{Auth, SignMessage};
pub use error::TypesError;
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use miner_log::{staleness_cutoff, MinerLog, MinerLogKind, MinerLogPage};
pub use node::{Node, NodeId, StableStat};
pub use patch::{NodePatch, StableStatPatch, StatUpdate};
pub use progress::TrackProgress;
pub use readable::ReadableNode;
pub use time::{Clock, SystemClock, Timestamp};
pub use wire::NodeMsg;
