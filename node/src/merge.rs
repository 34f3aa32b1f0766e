//! Node Merge Engine.
//!
//! The single writer of full node snapshots. A snapshot is first inserted
//! as a new record; a duplicate-key failure means another writer already
//! created the id, and the snapshot is merged into the stored record
//! instead. Every merge counts as one more report of the node in its
//! StableStat, whatever the snapshot's own timestamp, and the merged
//! record is republished on the sync topic. The counter is bumped inside
//! the store's update, so concurrent merges of one id never lose a report.

use std::sync::Arc;

use tracing::{debug, info, warn};
use tracker_network::Publisher;
use tracker_store::{NodeStore, StoreError};
use tracker_types::{Clock, Node, NodeMsg, NodePatch, StableStat, StatUpdate};

use crate::metrics::TrackerMetrics;
use crate::tracing_spans::merge_span;
use crate::TrackerError;

/// What a call to [`MergeEngine::sync_node`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeOutcome {
    /// First sighting of the id; nothing is republished.
    Inserted,
    /// Merged into the stored record. `republished` is false when the
    /// relay refused the message.
    Merged { republished: bool },
}

pub struct MergeEngine {
    store: Arc<dyn NodeStore + Send + Sync>,
    publisher: Arc<dyn Publisher + Send + Sync>,
    clock: Arc<dyn Clock>,
    topic: String,
    metrics: Arc<TrackerMetrics>,
}

impl MergeEngine {
    pub fn new(
        store: Arc<dyn NodeStore + Send + Sync>,
        publisher: Arc<dyn Publisher + Send + Sync>,
        clock: Arc<dyn Clock>,
        topic: &str,
        metrics: Arc<TrackerMetrics>,
    ) -> Self {
        Self {
            store,
            publisher,
            clock,
            topic: topic.to_string(),
            metrics,
        }
    }

    /// Apply one snapshot to the registry.
    pub fn sync_node(&self, incoming: Node) -> Result<MergeOutcome, TrackerError> {
        let _span = merge_span(incoming.id).entered();
        let result = self.apply(incoming);
        if result.is_err() {
            self.metrics.merge_errors.inc();
        }
        result
    }

    fn apply(&self, mut incoming: Node) -> Result<MergeOutcome, TrackerError> {
        if incoming.id == 0 {
            return Err(TrackerError::ZeroNodeId);
        }
        let now = self.clock.now().as_i64();
        incoming.stable_stat = Some(StableStat::fresh(now));

        match self.store.insert_node(&incoming) {
            Ok(()) => {
                self.metrics.nodes_inserted.inc();
                info!("new miner inserted");
                return Ok(MergeOutcome::Inserted);
            }
            Err(StoreError::Duplicate(_)) => {}
            Err(e) => {
                warn!(error = %e, "inserting miner");
                return Err(e.into());
            }
        }

        let patch = NodePatch::from_snapshot(&incoming, StatUpdate::Report { now });
        let merged = self.store.update_node(incoming.id, &patch)?;
        self.metrics.nodes_merged.inc();
        if let Some(stat) = merged.stable_stat {
            debug!(counter = stat.counter, ratio = stat.ratio, "miner merged");
        }

        Ok(MergeOutcome::Merged {
            republished: self.republish(&merged),
        })
    }

    fn republish(&self, merged: &Node) -> bool {
        let bytes = match NodeMsg::try_from(merged).and_then(|msg| msg.encode()) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "encoding merged miner");
                return false;
            }
        };
        if self.publisher.publish(&self.topic, bytes) {
            self.metrics.republished.inc();
            debug!("merged miner republished");
            true
        } else {
            warn!("relay refused republish of merged miner");
            false
        }
    }
}
