//! What the HTTP layer needs from the running tracker.

use std::future::Future;
use std::sync::Arc;

use tracker_store::{NodeQuery, SortOrder};
use tracker_types::{Node, NodeId, ReadableNode};

use crate::RpcError;

pub trait TrackerApi: Send + Sync + 'static {
    /// Registry read contract: matching records, optionally sorted, at most
    /// `limit` (0 = all).
    fn query_nodes(
        &self,
        query: &NodeQuery,
        sort: Option<&str>,
        order: SortOrder,
        limit: usize,
    ) -> Result<Vec<Node>, RpcError>;

    /// The current readable-nodes snapshot.
    fn readable_nodes(&self) -> impl Future<Output = Arc<Vec<ReadableNode>>> + Send;

    /// Restart the liveness window of one node or all nodes. Returns the
    /// number of records changed.
    fn reset_stable_stat(&self, id: Option<NodeId>) -> Result<usize, RpcError>;

    /// Recompute and persist the liveness ratio of one node or all nodes.
    fn refresh_stable_stat(&self, id: Option<NodeId>) -> Result<usize, RpcError>;

    /// Prometheus text exposition.
    fn metrics_text(&self) -> Result<String, RpcError>;
}
