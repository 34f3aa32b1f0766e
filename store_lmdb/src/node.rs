//! LMDB implementation of NodeStore.
//!
//! Records are stored as JSON documents keyed by an order-preserving
//! encoding of the node id.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, RwTxn};

use tracker_store::{NodeStore, StoreError};
use tracker_types::{Node, NodeId, NodePatch, StableStatPatch};

use crate::LmdbError;

pub struct LmdbNodeStore {
    pub(crate) env: Arc<Env>,
    pub(crate) nodes_db: Database<Bytes, Bytes>,
}

/// Big-endian with the sign bit flipped, so byte order matches numeric order.
fn node_key(id: NodeId) -> [u8; 4] {
    ((id as u32) ^ 0x8000_0000).to_be_bytes()
}

fn encode(node: &Node) -> Result<Vec<u8>, LmdbError> {
    serde_json::to_vec(node).map_err(|e| LmdbError::Serialization(e.to_string()))
}

fn decode(bytes: &[u8]) -> Result<Node, LmdbError> {
    serde_json::from_slice(bytes).map_err(|e| LmdbError::Serialization(e.to_string()))
}

impl LmdbNodeStore {
    fn load(&self, txn: &RwTxn<'_>, id: NodeId) -> Result<Node, LmdbError> {
        let bytes = self
            .nodes_db
            .get(txn, node_key(id).as_slice())?
            .ok_or_else(|| LmdbError::NotFound(format!("node {id}")))?;
        decode(bytes)
    }

    /// Read-modify-write of one record inside a single write transaction.
    fn modify<T>(
        &self,
        id: NodeId,
        f: impl FnOnce(&mut Node) -> T,
    ) -> Result<(Node, T), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let mut node = self.load(&wtxn, id)?;
        let out = f(&mut node);
        let bytes = encode(&node)?;
        self.nodes_db
            .put(&mut wtxn, node_key(id).as_slice(), &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok((node, out))
    }
}

impl NodeStore for LmdbNodeStore {
    fn insert_node(&self, node: &Node) -> Result<(), StoreError> {
        let key = node_key(node.id);
        let bytes = encode(node)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if self
            .nodes_db
            .get(&wtxn, key.as_slice())
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Err(StoreError::Duplicate(format!("node {}", node.id)));
        }
        self.nodes_db
            .put(&mut wtxn, key.as_slice(), &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_node(&self, id: NodeId) -> Result<Node, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let bytes = self
            .nodes_db
            .get(&rtxn, node_key(id).as_slice())
            .map_err(LmdbError::from)?
            .ok_or_else(|| StoreError::NotFound(format!("node {id}")))?;
        Ok(decode(bytes)?)
    }

    fn update_node(&self, id: NodeId, patch: &NodePatch) -> Result<Node, StoreError> {
        let (node, ()) = self.modify(id, |node| patch.apply(node))?;
        Ok(node)
    }

    fn set_reg_time(&self, id: NodeId, reg_time: i64) -> Result<(), StoreError> {
        self.modify(id, |node| node.reg_time = reg_time)?;
        Ok(())
    }

    fn apply_stable_stat(&self, id: NodeId, patch: &StableStatPatch) -> Result<bool, StoreError> {
        let (_, applied) = self.modify(id, |node| patch.apply(node))?;
        Ok(applied)
    }

    fn delete_node(&self, id: NodeId) -> Result<bool, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let deleted = self
            .nodes_db
            .delete(&mut wtxn, node_key(id).as_slice())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(deleted)
    }

    fn iter_nodes(&self) -> Result<Vec<Node>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut nodes = Vec::new();
        for entry in self.nodes_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (_, val) = entry.map_err(LmdbError::from)?;
            nodes.push(decode(val)?);
        }
        Ok(nodes)
    }

    fn node_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.nodes_db.len(&rtxn).map_err(LmdbError::from)?)
    }
}
