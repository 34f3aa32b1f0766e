//! Prometheus metrics for the miner tracker.
//!
//! Counters cover both ingestion paths into the registry (broadcast merges
//! and log tracking), relay peer links, and credential refreshes. The
//! [`TrackerMetrics`] struct owns a dedicated [`Registry`] that the HTTP
//! `/metrics` endpoint encodes into the Prometheus text exposition format.

use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, IntCounter,
    IntGauge, Opts, Registry, TextEncoder,
};

/// Central collection of all tracker-level Prometheus metrics.
pub struct TrackerMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Snapshots that created a new registry record.
    pub nodes_inserted: IntCounter,
    /// Snapshots merged into an existing record.
    pub nodes_merged: IntCounter,
    pub merge_errors: IntCounter,
    /// Merged records republished on the sync topic.
    pub republished: IntCounter,
    /// Lifecycle log entries applied to the registry.
    pub log_entries_processed: IntCounter,
    pub log_poll_errors: IntCounter,
    pub peer_connects: IntCounter,
    pub peer_disconnects: IntCounter,
    /// Credential records whose key changed on refresh.
    pub auth_updates: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Size of the current readable-nodes snapshot.
    pub readable_nodes: IntGauge,
}

impl TrackerMetrics {
    /// Create a fresh set of metrics, all registered under a new
    /// [`Registry`].
    pub fn new() -> Self {
        let registry = Registry::new();

        let counter = |name: &str, help: &str| {
            register_int_counter_with_registry!(Opts::new(name, help), registry)
                .expect("failed to register tracker counter")
        };

        let nodes_inserted = counter(
            "tracker_nodes_inserted_total",
            "Node snapshots inserted as new registry records",
        );
        let nodes_merged = counter(
            "tracker_nodes_merged_total",
            "Node snapshots merged into existing records",
        );
        let merge_errors = counter(
            "tracker_merge_errors_total",
            "Node snapshots that failed to merge",
        );
        let republished = counter(
            "tracker_republished_total",
            "Merged records republished on the sync topic",
        );
        let log_entries_processed = counter(
            "tracker_log_entries_processed_total",
            "Lifecycle log entries applied to the registry",
        );
        let log_poll_errors = counter(
            "tracker_log_poll_errors_total",
            "Failed log polls against peer sync endpoints",
        );
        let peer_connects = counter(
            "tracker_peer_connects_total",
            "Successful connections to peer relays",
        );
        let peer_disconnects = counter(
            "tracker_peer_disconnects_total",
            "Lost connections to peer relays",
        );
        let auth_updates = counter(
            "tracker_auth_updates_total",
            "Credential keys replaced by the refresher",
        );

        let readable_nodes = register_int_gauge_with_registry!(
            Opts::new(
                "tracker_readable_nodes",
                "Nodes in the current readable-nodes snapshot"
            ),
            registry
        )
        .expect("failed to register readable_nodes gauge");

        Self {
            registry,
            nodes_inserted,
            nodes_merged,
            merge_errors,
            republished,
            log_entries_processed,
            log_poll_errors,
            peer_connects,
            peer_disconnects,
            auth_updates,
            readable_nodes,
        }
    }

    /// Encode every metric in the text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for TrackerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_registered_metrics() {
        let metrics = TrackerMetrics::new();
        metrics.nodes_inserted.inc();
        metrics.readable_nodes.set(4);
        let text = metrics.encode().unwrap();
        assert!(text.contains("tracker_nodes_inserted_total 1"));
        assert!(text.contains("tracker_readable_nodes 4"));
        assert!(text.contains("tracker_auth_updates_total 0"));
    }

    #[test]
    fn instances_do_not_share_a_registry() {
        let a = TrackerMetrics::new();
        let b = TrackerMetrics::new();
        a.merge_errors.inc();
        assert_eq!(b.merge_errors.get(), 0);
    }
}
