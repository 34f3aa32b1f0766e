//! Shared routing core.
//!
//! Publishers submit messages into one bounded inbound queue; [`Router::run`]
//! drains it and fans each message out to the bounded queues of matching
//! subscribers. A full subscriber queue drops the message for that
//! subscriber only.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, trace};

use crate::message::{Message, MessageKind};

pub type SubscriberId = u64;

struct Subscriber {
    client_id: String,
    topics: HashSet<String>,
    tx: mpsc::Sender<Message>,
}

struct Envelope {
    from: SubscriberId,
    msg: Message,
}

/// A registered subscriber's receiving end.
pub struct Subscription {
    pub id: SubscriberId,
    pub rx: mpsc::Receiver<Message>,
}

/// Outcome of routing one message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchResult {
    pub delivered: usize,
    pub dropped: usize,
}

pub struct Router {
    inbound_tx: mpsc::Sender<Envelope>,
    inbound_rx: Mutex<Option<mpsc::Receiver<Envelope>>>,
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
    next_id: AtomicU64,
    subscriber_buffer: usize,
}

impl Router {
    pub fn new(router_buffer: usize, subscriber_buffer: usize) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(router_buffer.max(1));
        Self {
            inbound_tx,
            inbound_rx: Mutex::new(Some(inbound_rx)),
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            subscriber_buffer: subscriber_buffer.max(1),
        }
    }

    pub fn register(&self, client_id: &str, topics: &[String]) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.subscriber_buffer);
        let subscriber = Subscriber {
            client_id: client_id.to_string(),
            topics: topics.iter().cloned().collect(),
            tx,
        };
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, subscriber);
        debug!(client_id, subscriber = id, ?topics, "subscriber registered");
        Subscription { id, rx }
    }

    pub fn unregister(&self, id: SubscriberId) {
        let removed = self
            .subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
        if let Some(sub) = removed {
            debug!(client_id = %sub.client_id, subscriber = id, "subscriber removed");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Queue a message for routing. Returns `false` if the queue is full or
    /// the router has stopped.
    pub fn submit(&self, from: SubscriberId, msg: Message) -> bool {
        self.inbound_tx.try_send(Envelope { from, msg }).is_ok()
    }

    /// Drain the inbound queue until shutdown. Only the first caller runs.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let taken = self
            .inbound_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(mut inbound) = taken else {
            return;
        };
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                envelope = inbound.recv() => match envelope {
                    Some(Envelope { from, msg }) => {
                        let result = self.dispatch(from, &msg);
                        trace!(destination = %msg.destination, ?result, "routed");
                    }
                    None => break,
                },
            }
        }
    }

    /// Deliver `msg` to every matching subscriber other than the sender.
    pub fn dispatch(&self, from: SubscriberId, msg: &Message) -> DispatchResult {
        let subscribers = self.subscribers.read().unwrap_or_else(|e| e.into_inner());
        let mut result = DispatchResult::default();
        for (id, sub) in subscribers.iter() {
            if *id == from {
                continue;
            }
            let wanted = match msg.kind {
                MessageKind::Broadcast => sub.topics.contains(&msg.destination),
                MessageKind::Direct => sub.client_id == msg.destination,
            };
            if !wanted {
                continue;
            }
            match sub.tx.try_send(msg.clone()) {
                Ok(()) => result.delivered += 1,
                Err(_) => result.dropped += 1,
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topics(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn broadcast_reaches_topic_subscribers_except_sender() {
        let router = Router::new(16, 4);
        let a = router.register("a", &topics(&["sync"]));
        let mut b = router.register("b", &topics(&["sync"]));
        let mut c = router.register("c", &topics(&["other"]));

        let result = router.dispatch(a.id, &Message::broadcast("a", "sync", vec![1]));
        assert_eq!(result.delivered, 1);
        assert_eq!(b.rx.try_recv().unwrap().content, vec![1]);
        assert!(c.rx.try_recv().is_err());
    }

    #[test]
    fn direct_message_goes_to_named_client() {
        let router = Router::new(16, 4);
        let mut a = router.register("a", &[]);
        let mut b = router.register("b", &[]);
        router.dispatch(0, &Message::direct("x", "b", vec![2]));
        assert!(a.rx.try_recv().is_err());
        assert_eq!(b.rx.try_recv().unwrap().content, vec![2]);
    }

    #[test]
    fn full_subscriber_queue_drops() {
        let router = Router::new(16, 1);
        let _slow = router.register("slow", &topics(&["sync"]));
        let first = router.dispatch(0, &Message::broadcast("x", "sync", vec![]));
        let second = router.dispatch(0, &Message::broadcast("x", "sync", vec![]));
        assert_eq!(first.delivered, 1);
        assert_eq!(second.dropped, 1);
    }

    #[test]
    fn unregister_stops_delivery() {
        let router = Router::new(16, 4);
        let sub = router.register("a", &topics(&["sync"]));
        router.unregister(sub.id);
        assert_eq!(router.subscriber_count(), 0);
        let result = router.dispatch(0, &Message::broadcast("x", "sync", vec![]));
        assert_eq!(result, DispatchResult::default());
    }

    #[tokio::test]
    async fn run_drains_submitted_messages() {
        let router = std::sync::Arc::new(Router::new(16, 4));
        let mut sub = router.register("b", &topics(&["sync"]));
        let (tx, rx) = broadcast::channel(1);
        let runner = {
            let router = router.clone();
            tokio::spawn(async move { router.run(rx).await })
        };
        assert!(router.submit(0, Message::broadcast("a", "sync", vec![7])));
        let got = sub.rx.recv().await.unwrap();
        assert_eq!(got.content, vec![7]);
        tx.send(()).unwrap();
        runner.await.unwrap();
    }
}
