//! StableStat administration: restart liveness windows and persist
//! recomputed ratios, for one node or the whole registry.

use std::sync::Arc;

use tracing::info;
use tracker_store::{NodeStore, StoreError};
use tracker_types::{Clock, NodeId, StableStatPatch};

pub struct StableStatAdmin {
    store: Arc<dyn NodeStore + Send + Sync>,
    clock: Arc<dyn Clock>,
}

impl StableStatAdmin {
    pub fn new(store: Arc<dyn NodeStore + Send + Sync>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Start a new window at the current time with a zero counter. Nodes
    /// without a StableStat get a fresh one. Returns the number changed;
    /// an unknown id changes nothing.
    pub fn reset(&self, id: Option<NodeId>) -> Result<usize, StoreError> {
        let patch = StableStatPatch::Reset {
            start_time: self.clock.now().as_i64(),
        };
        let mut updated = 0;
        for id in self.targets(id)? {
            if self.patch(id, &patch)? {
                updated += 1;
            }
        }
        info!(updated, "stable stats reset");
        Ok(updated)
    }

    /// Recompute the ratio of every targeted node that has a StableStat,
    /// from the counters stored at write time.
    pub fn refresh(&self, id: Option<NodeId>) -> Result<usize, StoreError> {
        let patch = StableStatPatch::Recompute {
            now: self.clock.now().as_i64(),
        };
        let mut updated = 0;
        for id in self.targets(id)? {
            if self.patch(id, &patch)? {
                updated += 1;
            }
        }
        info!(updated, "stable stat ratios refreshed");
        Ok(updated)
    }

    fn targets(&self, id: Option<NodeId>) -> Result<Vec<NodeId>, StoreError> {
        match id {
            Some(id) => Ok(vec![id]),
            None => Ok(self.store.iter_nodes()?.iter().map(|n| n.id).collect()),
        }
    }

    /// Nodes deleted in the meantime count as unchanged.
    fn patch(&self, id: NodeId, patch: &StableStatPatch) -> Result<bool, StoreError> {
        match self.store.apply_stable_stat(id, patch) {
            Ok(changed) => Ok(changed),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_nullables::{NullClock, NullNodeStore};
    use tracker_types::{Node, StableStat};

    fn with_stat(id: NodeId, stat: Option<StableStat>) -> Node {
        Node {
            id,
            stable_stat: stat,
            ..Default::default()
        }
    }

    fn setup() -> (StableStatAdmin, Arc<NullNodeStore>, Arc<NullClock>) {
        let store = Arc::new(NullNodeStore::new());
        let clock = Arc::new(NullClock::new(1_000));
        let stat = StableStat {
            start_time: 400,
            counter: 5,
            ratio: 1.0,
        };
        store.insert_node(&with_stat(1, Some(stat))).unwrap();
        store.insert_node(&with_stat(2, None)).unwrap();
        (StableStatAdmin::new(store.clone(), clock.clone()), store, clock)
    }

    #[test]
    fn reset_all_restarts_windows_and_creates_missing() {
        let (admin, store, _) = setup();
        assert_eq!(admin.reset(None).unwrap(), 2);

        let one = store.get_node(1).unwrap().stable_stat.unwrap();
        assert_eq!((one.start_time, one.counter), (1_000, 0));
        assert_eq!(store.get_node(2).unwrap().stable_stat, Some(StableStat::fresh(1_000)));
    }

    #[test]
    fn reset_unknown_id_changes_nothing() {
        let (admin, _, _) = setup();
        assert_eq!(admin.reset(Some(42)).unwrap(), 0);
    }

    #[test]
    fn refresh_recomputes_only_existing_stats() {
        let (admin, store, _) = setup();
        // 5 reports over 600s -> 300/600
        assert_eq!(admin.refresh(None).unwrap(), 1);
        let one = store.get_node(1).unwrap().stable_stat.unwrap();
        assert!((one.ratio - 0.5).abs() < 1e-6);
        assert_eq!(one.counter, 5);
        assert!(store.get_node(2).unwrap().stable_stat.is_none());
    }

    #[test]
    fn refresh_single_node() {
        let (admin, store, clock) = setup();
        clock.advance(900);
        assert_eq!(admin.refresh(Some(1)).unwrap(), 1);
        assert_eq!(admin.refresh(Some(2)).unwrap(), 0);
        assert_eq!(admin.refresh(Some(9)).unwrap(), 0);
        let one = store.get_node(1).unwrap().stable_stat.unwrap();
        assert!((one.ratio - 0.2).abs() < 1e-6);
    }
}
