//! Partial updates applied to stored nodes.
//!
//! A [`NodePatch`] lists exactly the fields a merge may overwrite. The
//! per-source usage map is merged key by key and the extension list is only
//! replaced when the incoming snapshot carries one. The StableStat change is
//! expressed relative to the stored value so stores can apply it inside the
//! same write as the rest of the patch.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::node::{Node, StableStat};

/// Field-level update built from an incoming snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct NodePatch {
    pub node_id: String,
    pub pub_key: String,
    pub owner: String,
    pub profit_acc: String,
    pub pool_id: String,
    pub pool_owner: String,
    pub quota: i64,
    pub addrs: Vec<String>,
    pub cpu: i32,
    pub memory: i32,
    pub bandwidth: i32,
    pub max_data_space: i64,
    pub assigned_space: i64,
    pub productive_space: i64,
    pub used_space: i64,
    pub weight: f64,
    pub valid: i32,
    pub relay: i32,
    pub status: i32,
    pub timestamp: i64,
    pub version: i32,
    pub rebuilding: i32,
    pub real_space: i64,
    pub tx: i64,
    pub rx: i64,
    pub manual_weight: i32,
    /// Entries written over the stored map one key at a time.
    pub uspaces: BTreeMap<String, i64>,
    /// `None` leaves the stored list untouched.
    pub other: Option<Vec<Value>>,
    pub stable_stat: StatUpdate,
}

/// How a merge changes the stored StableStat.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StatUpdate {
    /// One more report observed at `now`.
    Report { now: i64 },
    /// Leave the stored stat as it is.
    Keep { now: i64 },
}

impl StatUpdate {
    /// The stat to store given the current one. A missing stat starts a
    /// fresh window at `now` first.
    pub fn applied_to(&self, current: Option<StableStat>) -> StableStat {
        match *self {
            StatUpdate::Report { now } => current
                .unwrap_or_else(|| StableStat::fresh(now))
                .bumped(now),
            StatUpdate::Keep { now } => current.unwrap_or_else(|| StableStat::fresh(now)),
        }
    }
}

impl NodePatch {
    pub fn from_snapshot(snapshot: &Node, stable_stat: StatUpdate) -> Self {
        Self {
            node_id: snapshot.node_id.clone(),
            pub_key: snapshot.pub_key.clone(),
            owner: snapshot.owner.clone(),
            profit_acc: snapshot.profit_acc.clone(),
            pool_id: snapshot.pool_id.clone(),
            pool_owner: snapshot.pool_owner.clone(),
            quota: snapshot.quota,
            addrs: snapshot.addrs.clone(),
            cpu: snapshot.cpu,
            memory: snapshot.memory,
            bandwidth: snapshot.bandwidth,
            max_data_space: snapshot.max_data_space,
            assigned_space: snapshot.assigned_space,
            productive_space: snapshot.productive_space,
            used_space: snapshot.used_space,
            weight: snapshot.weight,
            valid: snapshot.valid,
            relay: snapshot.relay,
            status: snapshot.status,
            timestamp: snapshot.timestamp,
            version: snapshot.version,
            rebuilding: snapshot.rebuilding,
            real_space: snapshot.real_space,
            tx: snapshot.tx,
            rx: snapshot.rx,
            manual_weight: snapshot.manual_weight,
            uspaces: snapshot.uspaces.clone(),
            other: if snapshot.other.is_empty() {
                None
            } else {
                Some(snapshot.other.clone())
            },
            stable_stat,
        }
    }

    pub fn apply(&self, node: &mut Node) {
        node.node_id.clone_from(&self.node_id);
        node.pub_key.clone_from(&self.pub_key);
        node.owner.clone_from(&self.owner);
        node.profit_acc.clone_from(&self.profit_acc);
        node.pool_id.clone_from(&self.pool_id);
        node.pool_owner.clone_from(&self.pool_owner);
        node.quota = self.quota;
        node.addrs.clone_from(&self.addrs);
        node.cpu = self.cpu;
        node.memory = self.memory;
        node.bandwidth = self.bandwidth;
        node.max_data_space = self.max_data_space;
        node.assigned_space = self.assigned_space;
        node.productive_space = self.productive_space;
        node.used_space = self.used_space;
        node.weight = self.weight;
        node.valid = self.valid;
        node.relay = self.relay;
        node.status = self.status;
        node.timestamp = self.timestamp;
        node.version = self.version;
        node.rebuilding = self.rebuilding;
        node.real_space = self.real_space;
        node.tx = self.tx;
        node.rx = self.rx;
        node.manual_weight = self.manual_weight;
        for (source, used) in &self.uspaces {
            node.uspaces.insert(source.clone(), *used);
        }
        if let Some(other) = &self.other {
            node.other.clone_from(other);
        }
        node.stable_stat = Some(self.stable_stat.applied_to(node.stable_stat));
    }
}

/// Administrative change to a node's liveness statistics.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StableStatPatch {
    /// Restart the window at `start_time` with a zero counter.
    Reset { start_time: i64 },
    /// Recompute the ratio from the stored counters as of `now`.
    Recompute { now: i64 },
}

impl StableStatPatch {
    /// Returns `false` when the node has nothing to patch.
    pub fn apply(&self, node: &mut Node) -> bool {
        match (*self, node.stable_stat.as_mut()) {
            (StableStatPatch::Reset { start_time }, Some(stat)) => {
                stat.start_time = start_time;
                stat.counter = 0;
                true
            }
            (StableStatPatch::Reset { start_time }, None) => {
                node.stable_stat = Some(StableStat::fresh(start_time));
                true
            }
            (StableStatPatch::Recompute { now }, Some(stat)) => {
                *stat = stat.recomputed(now);
                true
            }
            (StableStatPatch::Recompute { .. }, None) => false,
        }
    }
}
