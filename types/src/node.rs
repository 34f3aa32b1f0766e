//! The canonical registry record for a storage node ("miner").
//!
//! Field names on the serde side follow the document layout shared with the
//! rest of the fleet (`_id`, `profitAcc`, `stableStat`, ...), so a node read
//! from a peer's HTTP API deserializes directly into [`Node`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Registry key. Zero is never a valid id.
pub type NodeId = i32;

/// Seconds of reporting interval that one counted report stands for.
pub const REPORT_INTERVAL_SECS: f64 = 60.0;

/// A storage node as held in the registry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Node {
    #[serde(rename = "_id")]
    pub id: NodeId,
    #[serde(rename = "nodeid")]
    pub node_id: String,
    #[serde(rename = "pubkey")]
    pub pub_key: String,
    pub owner: String,
    #[serde(rename = "profitAcc")]
    pub profit_acc: String,
    #[serde(rename = "poolID")]
    pub pool_id: String,
    #[serde(rename = "poolOwner")]
    pub pool_owner: String,
    pub quota: i64,
    pub addrs: Vec<String>,
    pub cpu: i32,
    pub memory: i32,
    pub bandwidth: i32,
    #[serde(rename = "maxDataSpace")]
    pub max_data_space: i64,
    #[serde(rename = "assignedSpace")]
    pub assigned_space: i64,
    #[serde(rename = "productiveSpace")]
    pub productive_space: i64,
    #[serde(rename = "usedSpace")]
    pub used_space: i64,
    /// Space used on behalf of each peer source, keyed by source identifier.
    pub uspaces: BTreeMap<String, i64>,
    pub weight: f64,
    pub valid: i32,
    pub relay: i32,
    /// 0 = registered, 1 = active.
    pub status: i32,
    pub timestamp: i64,
    pub version: i32,
    pub rebuilding: i32,
    #[serde(rename = "realSpace")]
    pub real_space: i64,
    pub tx: i64,
    pub rx: i64,
    /// Opaque extension documents, read positionally by consumers.
    pub other: Vec<Value>,
    #[serde(rename = "manualWeight")]
    pub manual_weight: i32,
    pub unreadable: bool,
    #[serde(rename = "regtime")]
    pub reg_time: i64,
    #[serde(rename = "stableStat", skip_serializing_if = "Option::is_none")]
    pub stable_stat: Option<StableStat>,
}

impl Node {
    /// Minimal record created when a registration event is seen before any
    /// full snapshot of the node.
    pub fn registration_stub(id: NodeId, status: i32, reg_time: i64) -> Self {
        Self {
            id,
            status,
            reg_time,
            ..Default::default()
        }
    }
}

/// Rolling measure of how consistently a node is reported.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StableStat {
    #[serde(rename = "startTime")]
    pub start_time: i64,
    pub counter: i64,
    pub ratio: f32,
}

impl StableStat {
    pub fn fresh(now: i64) -> Self {
        Self {
            start_time: now,
            counter: 0,
            ratio: 1.0,
        }
    }

    /// `min(1, counter * 60 / (now - start))`, clamped to `[0, 1]`.
    ///
    /// A window that has not opened yet (`now <= start`) reads as 1.
    pub fn ratio_at(counter: i64, start_time: i64, now: i64) -> f32 {
        let elapsed = now.saturating_sub(start_time);
        if elapsed <= 0 {
            return 1.0;
        }
        let ratio = counter as f64 * REPORT_INTERVAL_SECS / elapsed as f64;
        ratio.clamp(0.0, 1.0) as f32
    }

    /// One more report observed at `now`.
    pub fn bumped(&self, now: i64) -> Self {
        let counter = self.counter.saturating_add(1);
        Self {
            start_time: self.start_time,
            counter,
            ratio: Self::ratio_at(counter, self.start_time, now),
        }
    }

    /// Same counters, ratio recomputed for `now`.
    pub fn recomputed(&self, now: i64) -> Self {
        Self {
            ratio: Self::ratio_at(self.counter, self.start_time, now),
            ..*self
        }
    }
}
