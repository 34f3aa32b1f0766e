//! Registry storage trait.

use crate::query::{sort_documents, NodeQuery, SortOrder};
use crate::StoreError;
use tracker_types::{Node, NodeId, NodePatch, StableStatPatch};

/// Trait for registry storage operations.
pub trait NodeStore {
    /// Insert a new record. Fails with [`StoreError::Duplicate`] if the id
    /// already exists, leaving the stored record untouched.
    fn insert_node(&self, node: &Node) -> Result<(), StoreError>;

    fn get_node(&self, id: NodeId) -> Result<Node, StoreError>;

    /// Apply `patch` atomically and return the record as stored afterwards.
    fn update_node(&self, id: NodeId, patch: &NodePatch) -> Result<Node, StoreError>;

    fn set_reg_time(&self, id: NodeId, reg_time: i64) -> Result<(), StoreError>;

    /// Returns `false` when the record has no statistics to patch.
    fn apply_stable_stat(&self, id: NodeId, patch: &StableStatPatch) -> Result<bool, StoreError>;

    /// Returns `false` when there was nothing to delete.
    fn delete_node(&self, id: NodeId) -> Result<bool, StoreError>;

    /// All records in ascending id order.
    fn iter_nodes(&self) -> Result<Vec<Node>, StoreError>;

    fn node_count(&self) -> Result<u64, StoreError>;

    /// Records matching `query`, optionally sorted by a field path, at most
    /// `limit` of them (0 means no limit).
    fn filter_nodes(
        &self,
        query: &NodeQuery,
        sort: Option<&str>,
        order: SortOrder,
        limit: usize,
    ) -> Result<Vec<Node>, StoreError> {
        let mut matched = Vec::new();
        for node in self.iter_nodes()? {
            let doc =
                serde_json::to_value(&node).map_err(|e| StoreError::Serialization(e.to_string()))?;
            if query.matches(&doc) {
                matched.push((doc, node));
            }
        }
        if let Some(field) = sort {
            sort_documents(&mut matched, field, order);
        }
        if limit > 0 {
            matched.truncate(limit);
        }
        Ok(matched.into_iter().map(|(_, node)| node).collect())
    }
}
