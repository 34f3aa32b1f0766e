//! Pre-built [`tracing::Span`] constructors for tracker activities.
//!
//! Consistent span names and field sets make it easy to filter and
//! correlate log lines per node, per source, or per peer.

use tracing::{info_span, Span};
use tracker_types::NodeId;

/// Span covering one merge of a node snapshot into the registry.
pub fn merge_span(node_id: NodeId) -> Span {
    info_span!("merge", node_id)
}

/// Span covering the polling task of one log source.
pub fn log_poll_span(source: i32, url: &str) -> Span {
    info_span!("log_poll", source, url = %url)
}

/// Span covering one full-snapshot bootstrap pass against a source.
pub fn bootstrap_span(source: usize, url: &str) -> Span {
    info_span!("bootstrap", source, url = %url)
}

/// Span covering one credential refresh cycle.
pub fn auth_refresh_span() -> Span {
    info_span!("auth_refresh")
}
