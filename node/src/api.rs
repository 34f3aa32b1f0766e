//! The registry facade behind the HTTP API.

use std::sync::Arc;

use tracker_rpc::{RpcError, TrackerApi};
use tracker_store::{NodeQuery, NodeStore, SortOrder};
use tracker_types::{Node, NodeId, ReadableNode};

use crate::admin::StableStatAdmin;
use crate::metrics::TrackerMetrics;
use crate::readable::ReadableNodesCache;

pub struct RegistryApi {
    store: Arc<dyn NodeStore + Send + Sync>,
    readable: Arc<ReadableNodesCache>,
    admin: StableStatAdmin,
    metrics: Arc<TrackerMetrics>,
}

impl RegistryApi {
    pub fn new(
        store: Arc<dyn NodeStore + Send + Sync>,
        readable: Arc<ReadableNodesCache>,
        admin: StableStatAdmin,
        metrics: Arc<TrackerMetrics>,
    ) -> Self {
        Self {
            store,
            readable,
            admin,
            metrics,
        }
    }
}

impl TrackerApi for RegistryApi {
    fn query_nodes(
        &self,
        query: &NodeQuery,
        sort: Option<&str>,
        order: SortOrder,
        limit: usize,
    ) -> Result<Vec<Node>, RpcError> {
        Ok(self.store.filter_nodes(query, sort, order, limit)?)
    }

    async fn readable_nodes(&self) -> Arc<Vec<ReadableNode>> {
        self.readable.get().await
    }

    fn reset_stable_stat(&self, id: Option<NodeId>) -> Result<usize, RpcError> {
        Ok(self.admin.reset(id)?)
    }

    fn refresh_stable_stat(&self, id: Option<NodeId>) -> Result<usize, RpcError> {
        Ok(self.admin.refresh(id)?)
    }

    fn metrics_text(&self) -> Result<String, RpcError> {
        self.metrics
            .encode()
            .map_err(|e| RpcError::Metrics(e.to_string()))
    }
}
