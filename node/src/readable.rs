//! Readable-nodes cache.
//!
//! A periodically rebuilt snapshot of the nodes clients may read from:
//! valid, active, with space assigned, reported recently and not flagged
//! unreadable. Readers share the current snapshot; a refresh swaps in a
//! new one wholesale.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};
use tracker_store::{NodeQuery, NodeStore, SortOrder};
use tracker_types::{Clock, ReadableNode};

use crate::metrics::TrackerMetrics;
use crate::TrackerError;

#[derive(Default)]
pub struct ReadableNodesCache {
    snapshot: RwLock<Arc<Vec<ReadableNode>>>,
}

impl ReadableNodesCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> Arc<Vec<ReadableNode>> {
        self.snapshot.read().await.clone()
    }

    pub async fn replace(&self, nodes: Vec<ReadableNode>) {
        *self.snapshot.write().await = Arc::new(nodes);
    }
}

pub struct ReadableRefresher {
    store: Arc<dyn NodeStore + Send + Sync>,
    cache: Arc<ReadableNodesCache>,
    clock: Arc<dyn Clock>,
    metrics: Arc<TrackerMetrics>,
    /// Seconds within which a node must have reported.
    freshness: u64,
    interval: Duration,
}

impl ReadableRefresher {
    pub fn new(
        store: Arc<dyn NodeStore + Send + Sync>,
        cache: Arc<ReadableNodesCache>,
        clock: Arc<dyn Clock>,
        metrics: Arc<TrackerMetrics>,
        freshness: u64,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            clock,
            metrics,
            freshness,
            interval,
        }
    }

    fn selection(&self) -> Result<NodeQuery, TrackerError> {
        let since = self.clock.now().as_i64() - self.freshness as i64;
        let query = NodeQuery::from_json(&json!({
            "valid": 1,
            "status": 1,
            "assignedSpace": {"$gt": 0},
            "quota": {"$gt": 0},
            "timestamp": {"$gt": since},
            "unreadable": false,
        }))?;
        Ok(query)
    }

    /// Rebuild the snapshot now. Returns its size.
    pub async fn refresh_once(&self) -> Result<usize, TrackerError> {
        let nodes = self
            .store
            .filter_nodes(&self.selection()?, None, SortOrder::Ascending, 0)?;
        let readable: Vec<ReadableNode> = nodes.iter().map(ReadableNode::from).collect();
        let count = readable.len();
        self.cache.replace(readable).await;
        self.metrics.readable_nodes.set(count as i64);
        debug!(count, "readable nodes refreshed");
        Ok(count)
    }

    /// Refresh immediately, then every `interval`, until shutdown. A failed
    /// refresh keeps the previous snapshot.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        loop {
            if let Err(e) = self.refresh_once().await {
                warn!(error = %e, "refreshing readable nodes");
            }
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_nullables::{NullClock, NullNodeStore};
    use tracker_types::Node;

    const NOW: u64 = 10_000;

    fn readable_node(id: i32) -> Node {
        Node {
            id,
            node_id: format!("n{id}"),
            valid: 1,
            status: 1,
            assigned_space: 10,
            quota: 5,
            timestamp: NOW as i64 - 10,
            weight: 3.7,
            ..Default::default()
        }
    }

    fn refresher(store: Arc<NullNodeStore>) -> (ReadableRefresher, Arc<ReadableNodesCache>, Arc<TrackerMetrics>) {
        let cache = Arc::new(ReadableNodesCache::new());
        let metrics = Arc::new(TrackerMetrics::new());
        let refresher = ReadableRefresher::new(
            store,
            cache.clone(),
            Arc::new(NullClock::new(NOW)),
            metrics.clone(),
            300,
            Duration::from_secs(300),
        );
        (refresher, cache, metrics)
    }

    #[tokio::test]
    async fn selects_only_readable_nodes() {
        let store = Arc::new(NullNodeStore::new());
        store.insert_node(&readable_node(1)).unwrap();
        let mut stale = readable_node(2);
        stale.timestamp = NOW as i64 - 300;
        let mut flagged = readable_node(3);
        flagged.unreadable = true;
        let mut inactive = readable_node(4);
        inactive.status = 0;
        let mut no_space = readable_node(5);
        no_space.assigned_space = 0;
        let mut no_quota = readable_node(6);
        no_quota.quota = 0;
        let mut invalid = readable_node(7);
        invalid.valid = 0;
        for node in [stale, flagged, inactive, no_space, no_quota, invalid] {
            store.insert_node(&node).unwrap();
        }

        let (refresher, cache, metrics) = refresher(store);
        assert_eq!(refresher.refresh_once().await.unwrap(), 1);
        let snapshot = cache.get().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, "1");
        assert_eq!(snapshot[0].weight, "3");
        assert_eq!(metrics.readable_nodes.get(), 1);
    }

    #[tokio::test]
    async fn refresh_replaces_previous_snapshot() {
        let store = Arc::new(NullNodeStore::new());
        store.insert_node(&readable_node(1)).unwrap();
        let (refresher, cache, _) = refresher(store.clone());
        refresher.refresh_once().await.unwrap();
        let before = cache.get().await;

        store.delete_node(1).unwrap();
        refresher.refresh_once().await.unwrap();
        assert_eq!(before.len(), 1);
        assert!(cache.get().await.is_empty());
    }
}
