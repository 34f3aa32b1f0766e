//! Integration tests over a real LMDB environment: lifecycle log tracking,
//! snapshot merging, administration and queries working on the same
//! registry.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracker_node::{
    LogTracker, LogTrackerConfig, MergeEngine, MergeOutcome, StableStatAdmin, TrackerMetrics,
};
use tracker_nullables::{NullClock, NullLogSource, NullPublisher};
use tracker_store::{NodeQuery, NodeStore, ProgressStore, SortOrder, StoreNames};
use tracker_store_lmdb::LmdbEnvironment;
use tracker_types::{MinerLog, MinerLogKind, Node, NodeMsg, StableStat};

const T: u64 = 1_600_000_000;
const SOURCE: &str = "http://sn0";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn temp_env() -> (tempfile::TempDir, LmdbEnvironment) {
    let dir = tempfile::tempdir().expect("temp dir");
    let env = LmdbEnvironment::open(dir.path(), &StoreNames::default(), 64 * 1024 * 1024)
        .expect("open env");
    (dir, env)
}

struct Harness {
    _dir: tempfile::TempDir,
    env: LmdbEnvironment,
    clock: Arc<NullClock>,
    source: Arc<NullLogSource>,
    publisher: Arc<NullPublisher>,
    engine: MergeEngine,
    tracker: LogTracker<NullLogSource>,
}

fn harness() -> Harness {
    let (dir, env) = temp_env();
    let clock = Arc::new(NullClock::new(T + 200));
    let source = Arc::new(NullLogSource::new());
    let publisher = Arc::new(NullPublisher::new());
    let metrics = Arc::new(TrackerMetrics::new());
    let engine = MergeEngine::new(
        Arc::new(env.node_store()),
        publisher.clone(),
        clock.clone(),
        "sync",
        metrics.clone(),
    );
    let tracker = LogTracker::new(
        source.clone(),
        Arc::new(env.node_store()),
        Arc::new(env.progress_store()),
        clock.clone(),
        metrics,
        LogTrackerConfig {
            batch_size: 100,
            skip_time: 180,
            wait_time: Duration::from_secs(10),
        },
    );
    Harness {
        _dir: dir,
        env,
        clock,
        source,
        publisher,
        engine,
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

fn snapshot(id: i32, status: i32) -> Node {
    Node {
        id,
        node_id: format!("node-{id}"),
        status,
        valid: 1,
        timestamp: T as i64,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn registration_then_broadcast_counts_one_report_and_republishes() {
    let h = harness();
    h.source
        .push_logs(SOURCE, [log(1000, 7, MinerLogKind::New, -1, 1)]);

    h.tracker.poll_once(0, SOURCE).await.unwrap();
    let nodes = h.env.node_store();
    let stub = nodes.get_node(7).unwrap();
    assert_eq!(stub.status, 1);
    assert_eq!(stub.reg_time, T as i64);
    assert_eq!(h.env.progress_store().get_progress(0).unwrap().start, 1001);

    h.clock.advance(60);
    let outcome = h.engine.sync_node(snapshot(7, 0)).unwrap();
    assert_eq!(outcome, MergeOutcome::Merged { republished: true });

    let merged = nodes.get_node(7).unwrap();
    assert_eq!(merged.status, 0);
    assert_eq!(merged.reg_time, T as i64);
    let stat = merged.stable_stat.unwrap();
    assert_eq!(stat.counter, 1);

    let published = h.publisher.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, "sync");
    let republished = NodeMsg::decode(&published[0].1).unwrap();
    assert_eq!(republished.id, 7);
    assert_eq!(republished.status, 0);
}

#[test]
fn concurrent_snapshots_of_one_id_yield_a_single_record() {
    let h = harness();
    let engine = Arc::new(h.engine);
    let threads: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || engine.sync_node(snapshot(11, 1)).unwrap())
        })
        .collect();
    let outcomes: Vec<MergeOutcome> = threads.into_iter().map(|t| t.join().unwrap()).collect();

    let inserted = outcomes
        .iter()
        .filter(|o| **o == MergeOutcome::Inserted)
        .count();
    assert_eq!(inserted, 1);
    let nodes = h.env.node_store();
    assert_eq!(nodes.node_count().unwrap(), 1);
    assert_eq!(nodes.get_node(11).unwrap().stable_stat.unwrap().counter, 7);
}

#[tokio::test]
async fn removal_log_drops_node_from_queries() {
    let h = harness();
    h.engine.sync_node(snapshot(3, 1)).unwrap();
    h.engine.sync_node(snapshot(4, 1)).unwrap();
    let nodes = h.env.node_store();
    let active = NodeQuery::from_json(&json!({"status": 1})).unwrap();
    assert_eq!(
        nodes
            .filter_nodes(&active, Some("_id"), SortOrder::Ascending, 0)
            .unwrap()
            .len(),
        2
    );

    h.source
        .push_logs(SOURCE, [log(50, 3, MinerLogKind::Delete, 1, -1)]);
    h.tracker.poll_once(0, SOURCE).await.unwrap();

    let remaining = nodes
        .filter_nodes(&active, Some("_id"), SortOrder::Ascending, 0)
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, 4);
}

#[test]
fn admin_reset_then_refresh_over_lmdb() {
    let h = harness();
    h.engine.sync_node(snapshot(1, 1)).unwrap();
    h.engine.sync_node(snapshot(2, 1)).unwrap();
    let admin = StableStatAdmin::new(Arc::new(h.env.node_store()), h.clock.clone());

    assert_eq!(admin.reset(None).unwrap(), 2);
    h.clock.advance(120);
    h.engine.sync_node(snapshot(1, 1)).unwrap();
    h.clock.advance(120);
    assert_eq!(admin.refresh(Some(1)).unwrap(), 1);

    let nodes = h.env.node_store();
    let stat = nodes.get_node(1).unwrap().stable_stat.unwrap();
    assert_eq!(stat.counter, 1);
    assert!((stat.ratio - 0.25).abs() < 1e-6);
    let untouched = nodes.get_node(2).unwrap().stable_stat.unwrap();
    assert_eq!(untouched.counter, 0);
}

#[test]
fn refresh_interleaved_with_merges_keeps_ratio_consistent() {
    let h = harness();
    h.engine.sync_node(snapshot(11, 1)).unwrap();
    h.clock.advance(6_000);
    let engine = Arc::new(h.engine);
    let admin = Arc::new(StableStatAdmin::new(Arc::new(h.env.node_store()), h.clock.clone()));

    let mut threads: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                for _ in 0..20 {
                    engine.sync_node(snapshot(11, 1)).unwrap();
                }
            })
        })
        .collect();
    let refresher = Arc::clone(&admin);
    threads.push(std::thread::spawn(move || {
        for _ in 0..40 {
            refresher.refresh(Some(11)).unwrap();
        }
    }));
    for t in threads {
        t.join().unwrap();
    }

    let stat = h.env.node_store().get_node(11).unwrap().stable_stat.unwrap();
    assert_eq!(stat.counter, 80);
    let expected = StableStat::ratio_at(stat.counter, stat.start_time, (T + 200 + 6_000) as i64);
    assert!((stat.ratio - expected).abs() < 1e-6);
    // 80 reports over 6000s
    assert!((stat.ratio - 0.8).abs() < 1e-6);
}

#[tokio::test]
async fn cursor_survives_reopening_the_environment() {
    let dir = tempfile::tempdir().unwrap();
    let names = StoreNames::default();
    {
        let env = LmdbEnvironment::open(dir.path(), &names, 64 * 1024 * 1024).unwrap();
        let source = Arc::new(NullLogSource::new());
        source.push_logs(SOURCE, [log(77, 5, MinerLogKind::New, -1, 0)]);
        let tracker = LogTracker::new(
            source,
            Arc::new(env.node_store()),
            Arc::new(env.progress_store()),
            Arc::new(NullClock::new(T + 200)),
            Arc::new(TrackerMetrics::new()),
            LogTrackerConfig {
                batch_size: 10,
                skip_time: 180,
                wait_time: Duration::from_secs(10),
            },
        );
        tracker.poll_once(0, SOURCE).await.unwrap();
    }

    let env = LmdbEnvironment::open(dir.path(), &names, 64 * 1024 * 1024).unwrap();
    assert_eq!(env.progress_store().get_progress(0).unwrap().start, 78);
    assert_eq!(env.node_store().get_node(5).unwrap().status, 0);
}
