//! Credential Refresher.
//!
//! Keeps the relay's trusted account keys in line with the chain. Each
//! cycle walks every Auth record, resolves the account's current active
//! key, strips its network prefix and stores it when it changed. Accounts
//! that cannot be resolved, or whose chain key is not a hex Ed25519 key,
//! keep their stored key until the next cycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{info, warn, Instrument};
use tracker_crypto::{normalize_public_key, parse_public_key};
use tracker_network::ChainAccounts;
use tracker_store::AuthStore;

use crate::metrics::TrackerMetrics;
use crate::tracing_spans::auth_refresh_span;
use crate::TrackerError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub checked: usize,
    pub updated: usize,
    pub failed: usize,
}

pub struct CredentialRefresher<C: ChainAccounts> {
    chain: Arc<C>,
    auths: Arc<dyn AuthStore + Send + Sync>,
    metrics: Arc<TrackerMetrics>,
    interval: Duration,
}

impl<C: ChainAccounts> CredentialRefresher<C> {
    pub fn new(
        chain: Arc<C>,
        auths: Arc<dyn AuthStore + Send + Sync>,
        metrics: Arc<TrackerMetrics>,
        interval: Duration,
    ) -> Self {
        Self {
            chain,
            auths,
            metrics,
            interval,
        }
    }

    /// One pass over every stored account. Fails only when the account
    /// list itself cannot be read.
    pub async fn refresh_once(&self) -> Result<RefreshSummary, TrackerError> {
        let mut summary = RefreshSummary::default();
        for auth in self.auths.iter_auths()? {
            summary.checked += 1;
            let key = match self.chain.active_key(&auth.account).await {
                Ok(key) => key,
                Err(e) => {
                    warn!(account = %auth.account, error = %e, "resolving account key");
                    summary.failed += 1;
                    continue;
                }
            };
            let key = normalize_public_key(&key);
            if key == auth.public_key {
                continue;
            }
            if let Err(e) = parse_public_key(key) {
                warn!(account = %auth.account, error = %e, "chain key unusable, keeping stored key");
                summary.failed += 1;
                continue;
            }
            match self.auths.update_public_key(&auth.account, key) {
                Ok(()) => {
                    self.metrics.auth_updates.inc();
                    info!(account = %auth.account, "account key updated");
                    summary.updated += 1;
                }
                Err(e) => {
                    warn!(account = %auth.account, error = %e, "storing account key");
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }

    /// Refresh every `interval` until shutdown. The first refresh happens
    /// one interval after the call; startup runs [`refresh_once`] itself.
    ///
    /// [`refresh_once`]: Self::refresh_once
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
            let refreshed = tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                res = self.refresh_once().instrument(auth_refresh_span()) => res,
            };
            if let Err(e) = refreshed {
                warn!(error = %e, "credential refresh failed");
            }
        }
    }
}
