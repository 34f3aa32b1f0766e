//! Bulk miner bootstrap.
//!
//! Pages through a peer's full miner list (this tracker's shard of it) and
//! seeds the registry. Unlike a broadcast merge, a bootstrap pass never
//! counts as a report: existing StableStats are kept as they are and
//! nothing is republished. Stored records newer than the peer's copy are
//! left alone.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};
use tracker_network::MinerLogSource;
use tracker_store::{NodeStore, StoreError};
use tracker_types::{Clock, Node, NodePatch, StableStat, StatUpdate};
use tracker_utils::format_duration;

use crate::tracing_spans::bootstrap_span;
use crate::TrackerError;

#[derive(Clone, Debug)]
pub struct BootstrapConfig {
    pub batch_size: usize,
    /// Number of shards the peers split their miner lists into.
    pub shard_count: usize,
    /// Delay before retrying a failed page.
    pub retry_delay: Duration,
    /// Delay between full passes.
    pub interval: Duration,
}

/// Counts from one pass over a source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BootstrapSummary {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
}

enum Applied {
    Inserted,
    Updated,
    Skipped,
}

pub struct Bootstrapper<S: MinerLogSource> {
    source: Arc<S>,
    store: Arc<dyn NodeStore + Send + Sync>,
    clock: Arc<dyn Clock>,
    config: BootstrapConfig,
}

impl<S: MinerLogSource> Bootstrapper<S> {
    pub fn new(
        source: Arc<S>,
        store: Arc<dyn NodeStore + Send + Sync>,
        clock: Arc<dyn Clock>,
        config: BootstrapConfig,
    ) -> Self {
        Self {
            source,
            store,
            clock,
            config,
        }
    }

    pub fn spawn_all(
        self: &Arc<Self>,
        urls: &[String],
        shutdown: &broadcast::Sender<()>,
    ) -> Vec<JoinHandle<()>> {
        urls.iter()
            .enumerate()
            .map(|(index, url)| {
                let span = bootstrap_span(index, url);
                tokio::spawn(
                    Arc::clone(self)
                        .run(index, url.clone(), shutdown.subscribe())
                        .instrument(span),
                )
            })
            .collect()
    }

    /// Repeat full passes every `interval` until shutdown.
    pub async fn run(self: Arc<Self>, index: usize, url: String, mut shutdown: broadcast::Receiver<()>) {
        loop {
            let Some(summary) = self.pass(index, &url, &mut shutdown).await else {
                break;
            };
            info!(
                inserted = summary.inserted,
                updated = summary.updated,
                skipped = summary.skipped,
                next_in = %format_duration(self.config.interval.as_secs()),
                "bootstrap pass finished"
            );
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }
        debug!("bootstrap stopped");
    }

    /// One full pass. Failed pages are retried after `retry_delay`.
    /// Returns `None` when interrupted by shutdown.
    async fn pass(
        &self,
        index: usize,
        url: &str,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Option<BootstrapSummary> {
        let mut summary = BootstrapSummary::default();
        let mut from = 0;
        loop {
            let page = tokio::select! {
                biased;
                _ = shutdown.recv() => return None,
                res = self.fetch_page(index, url, from) => res,
            };
            match page {
                Ok(nodes) if nodes.is_empty() => return Some(summary),
                Ok(nodes) => {
                    from = nodes.iter().map(|n| n.id as i64).max().unwrap_or(from) + 1;
                    for node in nodes {
                        match self.apply(node) {
                            Applied::Inserted => summary.inserted += 1,
                            Applied::Updated => summary.updated += 1,
                            Applied::Skipped => summary.skipped += 1,
                        }
                    }
                }
                Err(e) => {
                    warn!(from, error = %e, "fetching miners, retrying");
                    tokio::select! {
                        biased;
                        _ = shutdown.recv() => return None,
                        _ = tokio::time::sleep(self.config.retry_delay) => {}
                    }
                }
            }
        }
    }

    async fn fetch_page(&self, index: usize, url: &str, from: i64) -> Result<Vec<Node>, TrackerError> {
        let nodes = self
            .source
            .fetch_miners(
                url,
                from,
                self.config.batch_size,
                self.config.shard_count,
                index,
            )
            .await?;
        Ok(nodes)
    }

    /// Run a single pass without a shutdown signal.
    pub async fn bootstrap_once(&self, index: usize, url: &str) -> BootstrapSummary {
        let (_tx, mut rx) = broadcast::channel(1);
        self.pass(index, url, &mut rx).await.unwrap_or_default()
    }

    fn apply(&self, mut incoming: Node) -> Applied {
        let id = incoming.id;
        if id == 0 {
            return Applied::Skipped;
        }
        let now = self.clock.now().as_i64();
        incoming.stable_stat = Some(StableStat::fresh(now));
        match self.store.insert_node(&incoming) {
            Ok(()) => return Applied::Inserted,
            Err(StoreError::Duplicate(_)) => {}
            Err(e) => {
                warn!(node_id = id, error = %e, "inserting miner");
                return Applied::Skipped;
            }
        }

        let existing = match self.store.get_node(id) {
            Ok(node) => node,
            Err(e) => {
                warn!(node_id = id, error = %e, "reading miner");
                return Applied::Skipped;
            }
        };
        if existing.timestamp > incoming.timestamp {
            return Applied::Skipped;
        }
        let patch = NodePatch::from_snapshot(&incoming, StatUpdate::Keep { now });
        match self.store.update_node(id, &patch) {
            Ok(_) => Applied::Updated,
            Err(e) => {
                warn!(node_id = id, error = %e, "updating miner");
                Applied::Skipped
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_nullables::{NullClock, NullLogSource, NullNodeStore};

    const URL: &str = "http://sn3";

    fn bootstrapper(source: Arc<NullLogSource>, store: Arc<NullNodeStore>) -> Bootstrapper<NullLogSource> {
        Bootstrapper::new(
            source,
            store,
            Arc::new(NullClock::new(5_000)),
            BootstrapConfig {
                batch_size: 2,
                shard_count: 4,
                retry_delay: Duration::from_millis(5),
                interval: Duration::from_secs(3600),
            },
        )
    }

    fn node(id: i32, timestamp: i64) -> Node {
        Node {
            id,
            node_id: format!("n{id}"),
            timestamp,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn pages_until_empty_and_inserts_with_fresh_stat() {
        let source = Arc::new(NullLogSource::new());
        let store = Arc::new(NullNodeStore::new());
        source.push_miners(URL, [node(1, 10), node(2, 10), node(5, 10)]);

        let summary = bootstrapper(source, store.clone()).bootstrap_once(0, URL).await;
        assert_eq!(summary.inserted, 3);
        let stored = store.get_node(5).unwrap();
        assert_eq!(stored.stable_stat, Some(StableStat::fresh(5_000)));
    }

    #[tokio::test]
    async fn keeps_newer_records_and_stored_stat() {
        let source = Arc::new(NullLogSource::new());
        let store = Arc::new(NullNodeStore::new());
        let stat = StableStat {
            start_time: 100,
            counter: 9,
            ratio: 0.25,
        };
        let mut newer = node(1, 50);
        newer.stable_stat = Some(stat);
        let mut older = node(2, 5);
        older.stable_stat = Some(stat);
        store.insert_node(&newer).unwrap();
        store.insert_node(&older).unwrap();
        source.push_miners(URL, [node(1, 20), node(2, 20)]);

        let summary = bootstrapper(source, store.clone()).bootstrap_once(0, URL).await;
        assert_eq!(summary, BootstrapSummary { inserted: 0, updated: 1, skipped: 1 });
        assert_eq!(store.get_node(1).unwrap().timestamp, 50);
        let updated = store.get_node(2).unwrap();
        assert_eq!(updated.timestamp, 20);
        assert_eq!(updated.stable_stat, Some(stat));
    }

    #[tokio::test]
    async fn failed_page_is_retried() {
        let source = Arc::new(NullLogSource::new());
        let store = Arc::new(NullNodeStore::new());
        source.push_miners(URL, [node(1, 10)]);
        source.fail_next("timeout");

        let summary = bootstrapper(source, store.clone()).bootstrap_once(0, URL).await;
        assert_eq!(summary.inserted, 1);
    }
}
