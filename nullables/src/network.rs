//! Nullable relay client: record publications without sending them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tracker_network::Publisher;

/// A publisher that records every message instead of routing it.
#[derive(Default)]
pub struct NullPublisher {
    published: Mutex<Vec<(String, Vec<u8>)>>,
    reject: AtomicBool,
}

impl NullPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following publish report a full queue.
    pub fn reject_all(&self) {
        self.reject.store(true, Ordering::SeqCst);
    }

    /// Everything accepted so far, as `(topic, content)`.
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn count(&self) -> usize {
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

impl Publisher for NullPublisher {
    fn publish(&self, topic: &str, content: Vec<u8>) -> bool {
        if self.reject.load(Ordering::SeqCst) {
            return false;
        }
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((topic.to_string(), content));
        true
    }
}
