//! RPC request handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;
use tracker_store::{NodeQuery, SortOrder};
use tracker_types::{Node, NodeId, ReadableNode};

use crate::{RpcError, TrackerApi};

// ── Query ────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct QueryParams {
    pub sort: Option<String>,
    /// Ascending unless `false`.
    pub asc: Option<bool>,
    /// 0 or absent means no limit.
    pub limit: Option<usize>,
}

pub async fn query_nodes<A: TrackerApi>(
    State(api): State<Arc<A>>,
    Query(params): Query<QueryParams>,
    body: Bytes,
) -> Result<Json<Vec<Node>>, RpcError> {
    let query = if body.iter().all(u8::is_ascii_whitespace) {
        NodeQuery::all()
    } else {
        let value: serde_json::Value = serde_json::from_slice(&body)
            .map_err(|e| RpcError::InvalidRequest(format!("query body: {e}")))?;
        NodeQuery::from_json(&value)?
    };
    let order = if params.asc.unwrap_or(true) {
        SortOrder::Ascending
    } else {
        SortOrder::Descending
    };
    let sort = params.sort.as_deref().filter(|s| !s.is_empty());
    debug!(?sort, ?order, limit = params.limit, "executing registry query");
    let nodes = api.query_nodes(&query, sort, order, params.limit.unwrap_or(0))?;
    Ok(Json(nodes))
}

// ── StableStat admin ─────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct TargetParams {
    pub id: Option<NodeId>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdatedResponse {
    pub updated: usize,
}

pub async fn reset_stable_stat<A: TrackerApi>(
    State(api): State<Arc<A>>,
    Query(params): Query<TargetParams>,
) -> Result<Json<UpdatedResponse>, RpcError> {
    let updated = api.reset_stable_stat(params.id)?;
    Ok(Json(UpdatedResponse { updated }))
}

pub async fn refresh_stable_stat<A: TrackerApi>(
    State(api): State<Arc<A>>,
    Query(params): Query<TargetParams>,
) -> Result<Json<UpdatedResponse>, RpcError> {
    let updated = api.refresh_stable_stat(params.id)?;
    Ok(Json(UpdatedResponse { updated }))
}

// ── Readable nodes ───────────────────────────────────────────────────────

pub async fn readable_nodes<A: TrackerApi>(State(api): State<Arc<A>>) -> Json<Vec<ReadableNode>> {
    let snapshot = api.readable_nodes().await;
    Json(snapshot.as_ref().clone())
}

// ── Telemetry ────────────────────────────────────────────────────────────

pub async fn metrics<A: TrackerApi>(
    State(api): State<Arc<A>>,
) -> Result<impl IntoResponse, RpcError> {
    let text = api.metrics_text()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        text,
    ))
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
