//! HTTP client for the sync endpoints every supernode exposes.
//!
//! `GET {url}/sync/getMinerLogs?start&count` returns lifecycle log entries in
//! ascending id order. `GET {url}/sync/getMiners?start&count&sncount&snindex`
//! returns full node records for one shard. Responses may be gzip encoded.

use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::debug;
use tracker_types::{MinerLog, Node};

use crate::NetworkError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A remote supernode's sync endpoints.
pub trait MinerLogSource: Send + Sync + 'static {
    /// Up to `count` log entries with id `>= start`.
    fn fetch_logs(
        &self,
        url: &str,
        start: i64,
        count: usize,
    ) -> impl Future<Output = Result<Vec<MinerLog>, NetworkError>> + Send;

    /// Up to `count` node records with id `>= start` from shard
    /// `sn_index` of `sn_count`.
    fn fetch_miners(
        &self,
        url: &str,
        start: i64,
        count: usize,
        sn_count: usize,
        sn_index: usize,
    ) -> impl Future<Output = Result<Vec<Node>, NetworkError>> + Send;
}

#[derive(Clone)]
pub struct HttpSyncClient {
    http_client: reqwest::Client,
}

impl HttpSyncClient {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .gzip(true)
            .build()
            .unwrap_or_default();
        Self { http_client }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, NetworkError> {
        debug!(%url, "fetching");
        let response = self.http_client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(NetworkError::RequestFailed(format!(
                "HTTP status {} from {url}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| NetworkError::InvalidResponse(format!("{url}: {e}")))
    }
}

impl Default for HttpSyncClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MinerLogSource for HttpSyncClient {
    async fn fetch_logs(
        &self,
        url: &str,
        start: i64,
        count: usize,
    ) -> Result<Vec<MinerLog>, NetworkError> {
        let full = format!(
            "{}/sync/getMinerLogs?start={start}&count={count}",
            url.trim_end_matches('/')
        );
        self.get_json(&full).await
    }

    async fn fetch_miners(
        &self,
        url: &str,
        start: i64,
        count: usize,
        sn_count: usize,
        sn_index: usize,
    ) -> Result<Vec<Node>, NetworkError> {
        let full = format!(
            "{}/sync/getMiners?start={start}&count={count}&sncount={sn_count}&snindex={sn_index}",
            url.trim_end_matches('/')
        );
        self.get_json(&full).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use std::collections::HashMap;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });
        format!("http://{addr}")
    }

    async fn logs(Query(q): Query<HashMap<String, i64>>) -> Json<serde_json::Value> {
        let start = q["start"];
        let count = q["count"];
        let entries: Vec<_> = (start..start + count)
            .map(|id| {
                serde_json::json!({
                    "_id": id, "minerID": id as i32, "fromStatus": -1,
                    "toStatus": 1, "type": "new", "timestamp": 100
                })
            })
            .collect();
        Json(serde_json::Value::Array(entries))
    }

    #[tokio::test]
    async fn fetches_requested_log_range() {
        let url = serve(Router::new().route("/sync/getMinerLogs", get(logs))).await;
        let client = HttpSyncClient::new();
        let fetched = client.fetch_logs(&url, 10, 3).await.unwrap();
        assert_eq!(fetched.iter().map(|l| l.id).collect::<Vec<_>>(), vec![10, 11, 12]);
        assert!(fetched[0].is_registration());
    }

    #[tokio::test]
    async fn passes_shard_parameters() {
        let app = Router::new().route(
            "/sync/getMiners",
            get(|Query(q): Query<HashMap<String, i64>>| async move {
                Json(serde_json::json!([{ "_id": q["snindex"] + 1, "status": q["sncount"] }]))
            }),
        );
        let url = serve(app).await;
        let miners = HttpSyncClient::new()
            .fetch_miners(&url, 0, 100, 4, 2)
            .await
            .unwrap();
        assert_eq!(miners.len(), 1);
        assert_eq!(miners[0].id, 3);
        assert_eq!(miners[0].status, 4);
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let app = Router::new().route(
            "/sync/getMinerLogs",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "busy") }),
        );
        let url = serve(app).await;
        let err = HttpSyncClient::new().fetch_logs(&url, 0, 1).await.unwrap_err();
        assert!(matches!(err, NetworkError::RequestFailed(_)));
    }

    #[tokio::test]
    async fn unreachable_peer_is_an_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        assert!(HttpSyncClient::new().fetch_logs(&url, 0, 1).await.is_err());
    }
}
