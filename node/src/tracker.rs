//! Log Tracker.
//!
//! One task per peer sync endpoint. Each round loads the durable cursor for
//! the source, pulls the next page of lifecycle log entries, drops entries
//! too recent to trust, applies the rest in ascending id order and
//! persists the new cursor. A full page loops again immediately; anything
//! else (a short page, an empty page, an error) waits `wait_time` first.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};
use tracker_network::MinerLogSource;
use tracker_store::{NodeStore, ProgressStore, StoreError};
use tracker_types::{staleness_cutoff, Clock, MinerLog, MinerLogPage, Node};

use crate::metrics::TrackerMetrics;
use crate::tracing_spans::log_poll_span;
use crate::TrackerError;

#[derive(Clone, Debug)]
pub struct LogTrackerConfig {
    /// Entries applied per round; values below 1 are treated as 1.
    pub batch_size: usize,
    /// Seconds of recent history left unprocessed.
    pub skip_time: u64,
    pub wait_time: Duration,
}

/// Result of one polling round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollOutcome {
    pub processed: usize,
    /// The peer has more entries past this page.
    pub more: bool,
}

pub struct LogTracker<S: MinerLogSource> {
    source: Arc<S>,
    nodes: Arc<dyn NodeStore + Send + Sync>,
    progress: Arc<dyn ProgressStore + Send + Sync>,
    clock: Arc<dyn Clock>,
    metrics: Arc<TrackerMetrics>,
    config: LogTrackerConfig,
}

impl<S: MinerLogSource> LogTracker<S> {
    pub fn new(
        source: Arc<S>,
        nodes: Arc<dyn NodeStore + Send + Sync>,
        progress: Arc<dyn ProgressStore + Send + Sync>,
        clock: Arc<dyn Clock>,
        metrics: Arc<TrackerMetrics>,
        config: LogTrackerConfig,
    ) -> Self {
        Self {
            source,
            nodes,
            progress,
            clock,
            metrics,
            config,
        }
    }

    /// Start one polling task per URL; the source index is the URL's
    /// position.
    pub fn spawn_all(
        self: &Arc<Self>,
        urls: &[String],
        shutdown: &broadcast::Sender<()>,
    ) -> Vec<JoinHandle<()>> {
        urls.iter()
            .enumerate()
            .map(|(index, url)| {
                let source = index as i32;
                let span = log_poll_span(source, url);
                tokio::spawn(
                    Arc::clone(self)
                        .run(source, url.clone(), shutdown.subscribe())
                        .instrument(span),
                )
            })
            .collect()
    }

    /// Poll `url` until shutdown.
    pub async fn run(self: Arc<Self>, source: i32, url: String, mut shutdown: broadcast::Receiver<()>) {
        info!("starting log tracking");
        loop {
            let more = tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                res = self.poll_once(source, &url) => match res {
                    Ok(outcome) => outcome.more,
                    Err(e) => {
                        self.metrics.log_poll_errors.inc();
                        warn!(error = %e, "log poll failed");
                        false
                    }
                },
            };
            if more {
                continue;
            }
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(self.config.wait_time) => {}
            }
        }
        info!("log tracking stopped");
    }

    /// One round against `url`. On error the cursor is left where it was.
    pub async fn poll_once(&self, source: i32, url: &str) -> Result<PollOutcome, TrackerError> {
        let now = self.clock.now().as_i64();
        let mut cursor = self.progress.get_or_create_progress(source, now)?;

        let requested = self.config.batch_size.max(1) + 1;
        let fetched = self.source.fetch_logs(url, cursor.start, requested).await?;
        let cutoff = staleness_cutoff(self.clock.now().as_i64(), self.config.skip_time as i64);
        let page = MinerLogPage::from_fetched(fetched, requested, cutoff);
        debug!(start = cursor.start, count = page.logs.len(), more = page.more, "fetched miner logs");

        for entry in &page.logs {
            self.apply(entry);
        }
        self.metrics
            .log_entries_processed
            .inc_by(page.logs.len() as u64);

        let next = if page.more {
            Some(page.next)
        } else {
            page.logs.last().map(|last| last.id + 1)
        };
        if let Some(next) = next {
            if cursor.advance(next, self.clock.now().as_i64()) {
                self.progress.update_progress(&cursor)?;
            }
        }

        Ok(PollOutcome {
            processed: page.logs.len(),
            more: page.more,
        })
    }

    fn apply(&self, entry: &MinerLog) {
        let id = entry.miner_id;
        if entry.is_registration() {
            let stub = Node::registration_stub(id, entry.to_status, entry.timestamp);
            match self.nodes.insert_node(&stub) {
                Ok(()) => info!(node_id = id, "new miner has been registered"),
                Err(StoreError::Duplicate(_)) => {
                    if let Err(e) = self.nodes.set_reg_time(id, entry.timestamp) {
                        error!(node_id = id, error = %e, "updating registration time");
                    }
                }
                Err(e) => error!(node_id = id, error = %e, "inserting new miner"),
            }
        } else if entry.is_removal() {
            match self.nodes.delete_node(id) {
                Ok(true) => info!(node_id = id, "miner has been deleted"),
                Ok(false) => debug!(node_id = id, "deleted miner was not registered"),
                Err(e) => error!(node_id = id, error = %e, "deleting miner"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_nullables::{NullClock, NullLogSource, NullNodeStore, NullProgressStore};
    use tracker_types::MinerLogKind;

    const T: u64 = 1_600_000_000;
    const URL: &str = "http://sn0";

    struct Fixture {
        source: Arc<NullLogSource>,
        nodes: Arc<NullNodeStore>,
        progress: Arc<NullProgressStore>,
        clock: Arc<NullClock>,
        tracker: LogTracker<NullLogSource>,
    }

    fn fixture(batch_size: usize) -> Fixture {
        let source = Arc::new(NullLogSource::new());
        let nodes = Arc::new(NullNodeStore::new());
        let progress = Arc::new(NullProgressStore::new());
        let clock = Arc::new(NullClock::new(T + 200));
        let tracker = LogTracker::new(
            source.clone(),
            nodes.clone(),
            progress.clone(),
            clock.clone(),
            Arc::new(TrackerMetrics::new()),
            LogTrackerConfig {
                batch_size,
                skip_time: 180,
                wait_time: Duration::from_millis(10),
            },
        );
        Fixture {
            source,
            nodes,
            progress,
            clock,
            tracker,
        }
    }

    fn log(id: i64, miner: i32, kind: MinerLogKind, from: i32, to: i32) -> MinerLog {
        MinerLog {
            id,
            miner_id: miner,
            from_status: from,
            to_status: to,
            kind,
            timestamp: T as i64,
        }
    }

    fn registration(id: i64, miner: i32) -> MinerLog {
        log(id, miner, MinerLogKind::New, -1, 1)
    }

    #[tokio::test]
    async fn registration_creates_stub_and_advances_cursor() {
        let f = fixture(100);
        f.source.push_logs(URL, [registration(1000, 7)]);

        let outcome = f.tracker.poll_once(0, URL).await.unwrap();
        assert_eq!(outcome, PollOutcome { processed: 1, more: false });

        let node = f.nodes.get_node(7).unwrap();
        assert_eq!(node.status, 1);
        assert_eq!(node.reg_time, T as i64);
        assert_eq!(f.progress.get_progress(0).unwrap().start, 1001);
        assert_eq!(f.source.log_requests(), vec![(URL.to_string(), 0, 101)]);
    }

    #[tokio::test]
    async fn duplicate_registration_only_updates_reg_time() {
        let f = fixture(100);
        let mut existing = Node::registration_stub(7, 0, 1);
        existing.node_id = "keep".into();
        f.nodes.insert_node(&existing).unwrap();
        f.source.push_logs(URL, [registration(1000, 7)]);

        f.tracker.poll_once(0, URL).await.unwrap();
        let node = f.nodes.get_node(7).unwrap();
        assert_eq!(node.reg_time, T as i64);
        assert_eq!(node.status, 0);
        assert_eq!(node.node_id, "keep");
    }

    #[tokio::test]
    async fn removal_deletes_and_other_events_are_ignored() {
        let f = fixture(100);
        f.nodes.insert_node(&Node::registration_stub(3, 1, 0)).unwrap();
        f.nodes.insert_node(&Node::registration_stub(4, 1, 0)).unwrap();
        f.source.push_logs(
            URL,
            [
                log(10, 3, MinerLogKind::Delete, 1, -1),
                log(11, 4, MinerLogKind::Delete, 1, 2),
                log(12, 5, MinerLogKind::New, 0, 1),
                log(13, 9, MinerLogKind::Delete, 1, -1),
            ],
        );

        let outcome = f.tracker.poll_once(0, URL).await.unwrap();
        assert_eq!(outcome.processed, 4);
        assert!(f.nodes.get_node(3).unwrap_err().is_not_found());
        assert!(f.nodes.get_node(4).is_ok());
        assert!(f.nodes.get_node(5).unwrap_err().is_not_found());
        assert_eq!(f.progress.get_progress(0).unwrap().start, 14);
    }

    #[tokio::test]
    async fn zero_batch_size_still_makes_progress() {
        let f = fixture(0);
        f.source.push_logs(URL, [registration(5, 5), registration(6, 6)]);

        let first = f.tracker.poll_once(0, URL).await.unwrap();
        assert_eq!(first, PollOutcome { processed: 1, more: true });
        assert_eq!(f.progress.get_progress(0).unwrap().start, 6);

        let second = f.tracker.poll_once(0, URL).await.unwrap();
        assert_eq!(second, PollOutcome { processed: 1, more: false });
        assert_eq!(f.progress.get_progress(0).unwrap().start, 7);
        assert!(f.nodes.get_node(6).is_ok());
    }

    #[tokio::test]
    async fn full_page_moves_cursor_to_held_back_entry() {
        let f = fixture(2);
        f.source
            .push_logs(URL, (1..=5).map(|i| registration(i, i as i32)));

        let outcome = f.tracker.poll_once(0, URL).await.unwrap();
        assert_eq!(outcome, PollOutcome { processed: 2, more: true });
        assert_eq!(f.progress.get_progress(0).unwrap().start, 3);
        assert!(f.nodes.get_node(3).unwrap_err().is_not_found());

        f.tracker.poll_once(0, URL).await.unwrap();
        let outcome = f.tracker.poll_once(0, URL).await.unwrap();
        assert_eq!(outcome, PollOutcome { processed: 1, more: false });
        assert_eq!(f.nodes.node_count().unwrap(), 5);
        assert_eq!(f.progress.get_progress(0).unwrap().start, 6);
    }

    #[tokio::test]
    async fn recent_entries_wait_for_the_horizon() {
        let f = fixture(100);
        let horizon = (T + 200 - 180) as i64;
        f.source.push_logs(
            URL,
            [
                registration(horizon << 32, 1),
                registration((horizon + 1) << 32, 2),
            ],
        );

        f.tracker.poll_once(0, URL).await.unwrap();
        assert!(f.nodes.get_node(1).is_ok());
        assert!(f.nodes.get_node(2).unwrap_err().is_not_found());
        assert_eq!(f.progress.get_progress(0).unwrap().start, (horizon << 32) + 1);

        f.clock.advance(1);
        f.tracker.poll_once(0, URL).await.unwrap();
        assert!(f.nodes.get_node(2).is_ok());
    }

    #[tokio::test]
    async fn failed_fetch_leaves_cursor_and_empty_page_keeps_it() {
        let f = fixture(100);
        f.source.push_logs(URL, [registration(50, 1)]);
        f.tracker.poll_once(0, URL).await.unwrap();

        f.source.fail_next("peer down");
        assert!(f.tracker.poll_once(0, URL).await.is_err());
        assert_eq!(f.progress.get_progress(0).unwrap().start, 51);

        let outcome = f.tracker.poll_once(0, URL).await.unwrap();
        assert_eq!(outcome.processed, 0);
        assert_eq!(f.progress.get_progress(0).unwrap().start, 51);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let f = fixture(100);
        let tracker = Arc::new(f.tracker);
        let (tx, _) = broadcast::channel(1);
        let handles = tracker.spawn_all(&[URL.to_string()], &tx);
        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(()).unwrap();
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .unwrap()
                .unwrap();
        }
        assert!(!f.source.log_requests().is_empty());
    }
}
