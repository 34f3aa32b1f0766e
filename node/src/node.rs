//! The miner tracker service: owns storage and wires every component to
//! it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info, warn, Instrument};
use tracker_crypto::sign_challenge;
use tracker_network::{
    AuthGate, EmbeddedBroker, EosAccountClient, Handshake, HttpSyncClient, PeerHandler,
    PeerLinkManager, Router, WsBroker,
};
use tracker_rpc::RpcServer;
use tracker_store::{AuthStore, NodeStore, ProgressStore};
use tracker_store_lmdb::LmdbEnvironment;
use tracker_types::{Clock, PrivateKey, SystemClock};

use crate::admin::StableStatAdmin;
use crate::api::RegistryApi;
use crate::bootstrap::{BootstrapConfig, Bootstrapper};
use crate::config::TrackerConfig;
use crate::credentials::CredentialRefresher;
use crate::merge::MergeEngine;
use crate::metrics::TrackerMetrics;
use crate::readable::{ReadableNodesCache, ReadableRefresher};
use crate::shutdown::ShutdownController;
use crate::sync::{local_sink, SyncHandler};
use crate::tracing_spans::auth_refresh_span;
use crate::tracker::{LogTracker, LogTrackerConfig};
use crate::TrackerError;

/// Timeout for waiting on background tasks during shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

pub struct MinerTracker {
    config: TrackerConfig,
    nodes: Arc<dyn NodeStore + Send + Sync>,
    auths: Arc<dyn AuthStore + Send + Sync>,
    progress: Arc<dyn ProgressStore + Send + Sync>,
    clock: Arc<dyn Clock>,
    metrics: Arc<TrackerMetrics>,
    readable: Arc<ReadableNodesCache>,
    shutdown: ShutdownController,
    /// Handles for spawned background tasks (joined during shutdown).
    task_handles: Vec<JoinHandle<()>>,
    relay_addr: Option<SocketAddr>,
    http_addr: Option<SocketAddr>,
}

impl MinerTracker {
    /// Open the LMDB environment at `config.data_dir`. Nothing runs until
    /// [`start`](Self::start) or [`launch`](Self::launch).
    pub fn new(config: TrackerConfig) -> Result<Self, TrackerError> {
        config.validate()?;
        let env = LmdbEnvironment::open(&config.data_dir, &config.store.names(), config.store.map_size)?;
        Ok(Self {
            nodes: Arc::new(env.node_store()),
            auths: Arc::new(env.auth_store()),
            progress: Arc::new(env.progress_store()),
            clock: Arc::new(SystemClock),
            metrics: Arc::new(TrackerMetrics::new()),
            readable: Arc::new(ReadableNodesCache::new()),
            shutdown: ShutdownController::new(),
            task_handles: Vec::new(),
            relay_addr: None,
            http_addr: None,
            config,
        })
    }

    pub fn nodes(&self) -> &Arc<dyn NodeStore + Send + Sync> {
        &self.nodes
    }

    pub fn auths(&self) -> &Arc<dyn AuthStore + Send + Sync> {
        &self.auths
    }

    pub fn metrics(&self) -> &Arc<TrackerMetrics> {
        &self.metrics
    }

    /// Bound address of the relay, once launched.
    pub fn relay_addr(&self) -> Option<SocketAddr> {
        self.relay_addr
    }

    /// Bound address of the HTTP API, once launched.
    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.http_addr
    }

    /// Launch every component, then wait for SIGINT/SIGTERM.
    pub async fn start(&mut self) -> Result<(), TrackerError> {
        self.launch().await?;
        self.shutdown.wait_for_signal().await;
        Ok(())
    }

    /// Launch every component and return.
    ///
    /// Fails when the relay or the HTTP API cannot bind, or when the local
    /// relay client is refused (its account must be provisioned).
    pub async fn launch(&mut self) -> Result<(), TrackerError> {
        info!(
            data_dir = %self.config.data_dir.display(),
            relay = %self.config.mq.server.bind_addr,
            http = %self.config.http_bind_addr,
            "miner tracker starting"
        );
        let server_cfg = self.config.mq.server.clone();
        let client_cfg = self.config.mq.client.clone();
        let stat_cfg = self.config.miner_stat.clone();
        let misc = self.config.misc.clone();

        // ── Credentials ───────────────────────────────────────────────────
        let refresher = Arc::new(CredentialRefresher::new(
            Arc::new(EosAccountClient::new(&self.config.eos_url)),
            Arc::clone(&self.auths),
            Arc::clone(&self.metrics),
            Duration::from_secs(misc.refresh_auth_interval),
        ));
        match refresher.refresh_once().instrument(auth_refresh_span()).await {
            Ok(summary) => info!(
                checked = summary.checked,
                updated = summary.updated,
                failed = summary.failed,
                "account keys refreshed"
            ),
            Err(e) => warn!(error = %e, "initial credential refresh failed"),
        }
        self.task_handles
            .push(tokio::spawn(refresher.run(self.shutdown.subscribe())));

        let private_key = PrivateKey::from_hex(&client_cfg.private_key)?;
        let credential = sign_challenge(&client_cfg.account, &private_key)?;

        // ── Relay ─────────────────────────────────────────────────────────
        let router = Arc::new(Router::new(
            server_cfg.router_buffer_size,
            server_cfg.subscriber_buffer_size,
        ));
        let gate = Arc::new(AuthGate::new(Arc::clone(&self.auths)));

        let listener = WsBroker::bind(&server_cfg.bind_addr).await?;
        self.relay_addr = listener.local_addr().ok();
        let ws_broker = WsBroker::new(Arc::clone(&router), Arc::clone(&gate), server_cfg.broker_config());
        let rx = self.shutdown.subscribe();
        self.task_handles.push(tokio::spawn(async move {
            if let Err(e) = ws_broker.serve(listener, rx).await {
                error!(error = %e, "relay server error");
            }
        }));

        let rx = self.shutdown.subscribe();
        let run_router = Arc::clone(&router);
        self.task_handles
            .push(tokio::spawn(async move { run_router.run(rx).await }));

        let embedded = EmbeddedBroker::new(Arc::clone(&router), gate);
        let local = Arc::new(embedded.connect(
            &client_cfg.client_id,
            &credential,
            std::slice::from_ref(&server_cfg.miner_sync_topic),
        )?);

        // ── Merging ───────────────────────────────────────────────────────
        let engine = Arc::new(MergeEngine::new(
            Arc::clone(&self.nodes),
            local.clone(),
            Arc::clone(&self.clock),
            &server_cfg.miner_sync_topic,
            Arc::clone(&self.metrics),
        ));

        let local_handler = Arc::new(SyncHandler::new(
            Arc::clone(&engine),
            &server_cfg.miner_sync_topic,
            Arc::clone(&self.metrics),
        ));
        let mut rx = self.shutdown.subscribe();
        self.task_handles.push(tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = rx.recv() => {}
                _ = local.run(local_sink(local_handler)) => {}
            }
        }));

        let peer_handler: Arc<dyn PeerHandler> = Arc::new(SyncHandler::new(
            Arc::clone(&engine),
            &client_cfg.miner_sync_topic,
            Arc::clone(&self.metrics),
        ));
        let links = PeerLinkManager::new(
            client_cfg.all_sn_urls.clone(),
            Handshake {
                client_id: client_cfg.client_id.clone(),
                credential,
                topics: vec![client_cfg.miner_sync_topic.clone()],
            },
            client_cfg.link_config(),
            Duration::from_secs(client_cfg.retry_delay),
        );
        self.task_handles
            .extend(links.spawn(peer_handler, self.shutdown.sender()));

        // ── Log tracking and bootstrap ────────────────────────────────────
        let sync_client = Arc::new(HttpSyncClient::new());
        let tracker = Arc::new(LogTracker::new(
            Arc::clone(&sync_client),
            Arc::clone(&self.nodes),
            Arc::clone(&self.progress),
            Arc::clone(&self.clock),
            Arc::clone(&self.metrics),
            LogTrackerConfig {
                batch_size: stat_cfg.batch_size,
                skip_time: stat_cfg.skip_time,
                wait_time: Duration::from_secs(stat_cfg.wait_time),
            },
        ));
        self.task_handles
            .extend(tracker.spawn_all(&stat_cfg.all_sync_urls, self.shutdown.sender()));

        if stat_cfg.enable_bootstrap {
            let bootstrapper = Arc::new(Bootstrapper::new(
                sync_client,
                Arc::clone(&self.nodes),
                Arc::clone(&self.clock),
                BootstrapConfig {
                    batch_size: stat_cfg.batch_size,
                    shard_count: stat_cfg.shard_count(),
                    retry_delay: Duration::from_secs(stat_cfg.wait_time),
                    interval: Duration::from_secs(stat_cfg.bootstrap_interval),
                },
            ));
            self.task_handles
                .extend(bootstrapper.spawn_all(&stat_cfg.all_sync_urls, self.shutdown.sender()));
        }

        // ── Readable nodes and HTTP API ───────────────────────────────────
        let readable = Arc::new(ReadableRefresher::new(
            Arc::clone(&self.nodes),
            Arc::clone(&self.readable),
            Arc::clone(&self.clock),
            Arc::clone(&self.metrics),
            misc.readable_freshness,
            Duration::from_secs(misc.readable_refresh_interval),
        ));
        self.task_handles
            .push(tokio::spawn(readable.run(self.shutdown.subscribe())));

        let api = Arc::new(RegistryApi::new(
            Arc::clone(&self.nodes),
            Arc::clone(&self.readable),
            StableStatAdmin::new(Arc::clone(&self.nodes), Arc::clone(&self.clock)),
            Arc::clone(&self.metrics),
        ));
        let listener = RpcServer::<RegistryApi>::bind(&self.config.http_bind_addr).await?;
        self.http_addr = listener.local_addr().ok();
        let server = RpcServer::with_state(api);
        let rx = self.shutdown.subscribe();
        self.task_handles.push(tokio::spawn(async move {
            if let Err(e) = server.serve(listener, rx).await {
                error!(error = %e, "HTTP API error");
            }
        }));

        info!(
            peers = client_cfg.all_sn_urls.len(),
            sync_sources = stat_cfg.all_sync_urls.len(),
            "miner tracker started"
        );
        Ok(())
    }

    /// Signal every worker and wait for them to finish.
    pub async fn stop(&mut self) -> Result<(), TrackerError> {
        info!("miner tracker stopping");
        self.shutdown.shutdown();

        let handles: Vec<JoinHandle<()>> = self.task_handles.drain(..).collect();
        let wait_all = async {
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!(error = %e, "tracker task ended abnormally");
                }
            }
        };
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, wait_all).await.is_err() {
            warn!(timeout = ?SHUTDOWN_TIMEOUT, "some tasks are still running");
            return Err(TrackerError::ShutdownTimeout);
        }

        info!("miner tracker stopped");
        Ok(())
    }
}
