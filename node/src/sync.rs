//! Inbound snapshot broadcasts.
//!
//! Messages arriving on the sync topic, from peer relays or from this
//! relay's own subscribers, are decoded and handed to the merge engine.
//! Anything else is ignored.

use std::sync::Arc;

use tracing::{debug, info, warn};
use tracker_network::{Message, PeerHandler};
use tracker_types::{Node, NodeMsg};

use crate::merge::{MergeEngine, MergeOutcome};
use crate::metrics::TrackerMetrics;
use crate::TrackerError;

pub struct SyncHandler {
    engine: Arc<MergeEngine>,
    topic: String,
    metrics: Arc<TrackerMetrics>,
}

impl SyncHandler {
    pub fn new(engine: Arc<MergeEngine>, topic: &str, metrics: Arc<TrackerMetrics>) -> Self {
        Self {
            engine,
            topic: topic.to_string(),
            metrics,
        }
    }

    /// Merge one message. `Ok(None)` when it is not a snapshot broadcast.
    pub fn handle(&self, msg: &Message) -> Result<Option<MergeOutcome>, TrackerError> {
        if !msg.is_broadcast_on(&self.topic) {
            return Ok(None);
        }
        let node = Node::try_from(NodeMsg::decode(&msg.content)?)?;
        self.engine.sync_node(node).map(Some)
    }

    fn handle_logged(&self, msg: &Message) {
        match self.handle(msg) {
            Ok(Some(outcome)) => debug!(sender = %msg.sender, ?outcome, "snapshot applied"),
            Ok(None) => {}
            Err(e) => warn!(sender = %msg.sender, error = %e, "dropping snapshot"),
        }
    }
}

impl PeerHandler for SyncHandler {
    fn on_message(&self, _url: &str, msg: Message) {
        self.handle_logged(&msg);
    }

    fn on_connected(&self, url: &str) {
        self.metrics.peer_connects.inc();
        info!(url, "peer relay connected");
    }

    fn on_disconnected(&self, url: &str) {
        self.metrics.peer_disconnects.inc();
        info!(url, "peer relay disconnected");
    }
}

/// Feeds messages from the local relay client into the handler.
pub(crate) fn local_sink(handler: Arc<SyncHandler>) -> impl FnMut(Message) {
    move |msg| handler.handle_logged(&msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_nullables::{NullClock, NullNodeStore, NullPublisher};
    use tracker_store::NodeStore;

    fn handler(store: Arc<NullNodeStore>, publisher: Arc<NullPublisher>) -> SyncHandler {
        let metrics = Arc::new(TrackerMetrics::new());
        let engine = MergeEngine::new(
            store,
            publisher,
            Arc::new(NullClock::new(2_000)),
            "sync",
            metrics.clone(),
        );
        SyncHandler::new(Arc::new(engine), "sync", metrics)
    }

    fn snapshot(id: i32) -> Vec<u8> {
        let node = Node {
            id,
            node_id: "n".into(),
            status: 1,
            ..Default::default()
        };
        NodeMsg::try_from(&node).unwrap().encode().unwrap()
    }

    #[test]
    fn merges_sync_broadcasts() {
        let store = Arc::new(NullNodeStore::new());
        let handler = handler(store.clone(), Arc::new(NullPublisher::new()));
        let outcome = handler
            .handle(&Message::broadcast("peer", "sync", snapshot(4)))
            .unwrap();
        assert_eq!(outcome, Some(MergeOutcome::Inserted));
        assert_eq!(store.get_node(4).unwrap().status, 1);
    }

    #[test]
    fn ignores_other_topics_and_direct_messages() {
        let store = Arc::new(NullNodeStore::new());
        let handler = handler(store.clone(), Arc::new(NullPublisher::new()));
        assert_eq!(handler.handle(&Message::broadcast("peer", "other", snapshot(4))).unwrap(), None);
        assert_eq!(handler.handle(&Message::direct("peer", "me", snapshot(4))).unwrap(), None);
        assert_eq!(store.node_count().unwrap(), 0);
    }

    #[test]
    fn undecodable_content_is_an_error() {
        let handler = handler(Arc::new(NullNodeStore::new()), Arc::new(NullPublisher::new()));
        assert!(handler
            .handle(&Message::broadcast("peer", "sync", vec![0xff, 0x01]))
            .is_err());
    }

    #[test]
    fn peer_events_are_counted() {
        let handler = handler(Arc::new(NullNodeStore::new()), Arc::new(NullPublisher::new()));
        handler.on_connected("ws://a/ws");
        handler.on_disconnected("ws://a/ws");
        assert_eq!(handler.metrics.peer_connects.get(), 1);
        assert_eq!(handler.metrics.peer_disconnects.get(), 1);
    }
}
