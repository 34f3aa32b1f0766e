//! Durable per-source cursor into a peer's lifecycle log.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackProgress {
    /// Source index.
    pub id: i32,
    /// Next unseen log id.
    pub start: i64,
    /// Unix seconds of the last advance.
    pub timestamp: i64,
}

impl TrackProgress {
    pub fn new(id: i32, now: i64) -> Self {
        Self {
            id,
            start: 0,
            timestamp: now,
        }
    }

    /// Move the cursor to `start`. The cursor never moves backwards.
    pub fn advance(&mut self, start: i64, now: i64) -> bool {
        if start <= self.start {
            return false;
        }
        self.start = start;
        self.timestamp = now;
        true
    }
}
