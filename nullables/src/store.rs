//! Nullable stores: thread-safe in-memory storage for testing.
//!
//! Each operation holds the map lock for its whole read-modify-write, which
//! gives the same single-record atomicity the LMDB backend provides.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use tracker_store::{AuthStore, NodeStore, ProgressStore, StoreError};
use tracker_types::{Auth, Node, NodeId, NodePatch, StableStatPatch, TrackProgress};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// An in-memory registry.
#[derive(Default)]
pub struct NullNodeStore {
    nodes: Mutex<BTreeMap<NodeId, Node>>,
}

impl NullNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn modify<T>(&self, id: NodeId, f: impl FnOnce(&mut Node) -> T) -> Result<(Node, T), StoreError> {
        let mut nodes = lock(&self.nodes);
        let node = nodes
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("node {id}")))?;
        let out = f(node);
        Ok((node.clone(), out))
    }
}

impl NodeStore for NullNodeStore {
    fn insert_node(&self, node: &Node) -> Result<(), StoreError> {
        let mut nodes = lock(&self.nodes);
        if nodes.contains_key(&node.id) {
            return Err(StoreError::Duplicate(format!("node {}", node.id)));
        }
        nodes.insert(node.id, node.clone());
        Ok(())
    }

    fn get_node(&self, id: NodeId) -> Result<Node, StoreError> {
        lock(&self.nodes)
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("node {id}")))
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
        Ok(lock(&self.nodes).remove(&id).is_some())
    }

    fn iter_nodes(&self) -> Result<Vec<Node>, StoreError> {
        Ok(lock(&self.nodes).values().cloned().collect())
    }

    fn node_count(&self) -> Result<u64, StoreError> {
        Ok(lock(&self.nodes).len() as u64)
    }
}

/// An in-memory credential store.
#[derive(Default)]
pub struct NullAuthStore {
    auths: Mutex<BTreeMap<String, Auth>>,
}

impl NullAuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auth(account: &str, public_key: &str) -> Self {
        let store = Self::new();
        lock(&store.auths).insert(
            account.to_string(),
            Auth {
                account: account.to_string(),
                public_key: public_key.to_string(),
            },
        );
        store
    }
}

impl AuthStore for NullAuthStore {
    fn get_auth(&self, account: &str) -> Result<Auth, StoreError> {
        lock(&self.auths)
            .get(account)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("account {account}")))
    }

    fn put_auth(&self, auth: &Auth) -> Result<(), StoreError> {
        lock(&self.auths).insert(auth.account.clone(), auth.clone());
        Ok(())
    }

    fn iter_auths(&self) -> Result<Vec<Auth>, StoreError> {
        Ok(lock(&self.auths).values().cloned().collect())
    }

    fn update_public_key(&self, account: &str, public_key: &str) -> Result<(), StoreError> {
        let mut auths = lock(&self.auths);
        let auth = auths
            .get_mut(account)
            .ok_or_else(|| StoreError::NotFound(format!("account {account}")))?;
        auth.public_key = public_key.to_string();
        Ok(())
    }
}

/// In-memory tracking cursors.
#[derive(Default)]
pub struct NullProgressStore {
    progress: Mutex<BTreeMap<i32, TrackProgress>>,
}

impl NullProgressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressStore for NullProgressStore {
    fn get_progress(&self, source: i32) -> Result<TrackProgress, StoreError> {
        lock(&self.progress)
            .get(&source)
            .copied()
            .ok_or_else(|| StoreError::NotFound(format!("progress {source}")))
    }

    fn insert_progress(&self, progress: &TrackProgress) -> Result<(), StoreError> {
        let mut map = lock(&self.progress);
        if map.contains_key(&progress.id) {
            return Err(StoreError::Duplicate(format!("progress {}", progress.id)));
        }
        map.insert(progress.id, *progress);
        Ok(())
    }

    fn update_progress(&self, progress: &TrackProgress) -> Result<(), StoreError> {
        let mut map = lock(&self.progress);
        match map.get_mut(&progress.id) {
            Some(stored) => {
                *stored = *progress;
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("progress {}", progress.id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_store::{NodeQuery, SortOrder};

    #[test]
    fn insert_is_insert_if_absent() {
        let store = NullNodeStore::new();
        store.insert_node(&Node::registration_stub(7, 1, 10)).unwrap();
        let err = store
            .insert_node(&Node::registration_stub(7, 0, 20))
            .unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(store.get_node(7).unwrap().status, 1);
    }

    #[test]
    fn delete_hides_node_from_queries() {
        let store = NullNodeStore::new();
        store.insert_node(&Node::registration_stub(1, 1, 0)).unwrap();
        store.insert_node(&Node::registration_stub(2, 1, 0)).unwrap();
        assert!(store.delete_node(1).unwrap());
        assert!(!store.delete_node(1).unwrap());
        let ids: Vec<_> = store
            .filter_nodes(&NodeQuery::all(), None, SortOrder::Ascending, 0)
            .unwrap()
            .iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn progress_cursor_created_once() {
        let store = NullProgressStore::new();
        let first = store.get_or_create_progress(3, 100).unwrap();
        assert_eq!(first.start, 0);
        let mut advanced = first;
        advanced.advance(42, 200);
        store.update_progress(&advanced).unwrap();
        assert_eq!(store.get_or_create_progress(3, 300).unwrap().start, 42);
    }

    #[test]
    fn update_public_key_requires_existing_account() {
        let store = NullAuthStore::with_auth("sn1", "aa");
        store.update_public_key("sn1", "bb").unwrap();
        assert_eq!(store.get_auth("sn1").unwrap().public_key, "bb");
        assert!(store.update_public_key("sn2", "cc").unwrap_err().is_not_found());
    }
}
