//! Axum-based RPC server.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::info;

use crate::handlers;
use crate::{RpcError, TrackerApi};

pub struct RpcServer<A: TrackerApi> {
    api: Arc<A>,
}

impl<A: TrackerApi> RpcServer<A> {
    pub fn with_state(api: Arc<A>) -> Self {
        Self { api }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/query", post(handlers::query_nodes::<A>))
            .route("/stablestat/reset", post(handlers::reset_stable_stat::<A>))
            .route("/stablestat/refresh", post(handlers::refresh_stable_stat::<A>))
            .route("/readable_nodes", get(handlers::readable_nodes::<A>))
            .route("/metrics", get(handlers::metrics::<A>))
            .route("/health", get(handlers::health))
            .layer(RequestDecompressionLayer::new())
            .layer(CompressionLayer::new())
            .layer(CorsLayer::permissive())
            .with_state(Arc::clone(&self.api))
    }

    pub async fn bind(addr: &str) -> Result<TcpListener, RpcError> {
        TcpListener::bind(addr)
            .await
            .map_err(|e| RpcError::Server(format!("cannot bind {addr}: {e}")))
    }

    /// Serve until shutdown is signalled.
    pub async fn serve(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), RpcError> {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "HTTP API listening");
        }
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await
            .map_err(|e| RpcError::Server(e.to_string()))
    }
}
