//! Nullable remote services: scripted supernode sync endpoints and chain
//! account lookups.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use tracker_network::{ChainAccounts, MinerLogSource, NetworkError};
use tracker_types::{MinerLog, Node};

/// A peer whose log is held in memory.
///
/// `fetch_logs` serves entries from the per-URL log the way a real
/// supernode does: ascending ids starting at `start`, at most `count`.
/// Queued failures are returned first, one per call.
#[derive(Default)]
pub struct NullLogSource {
    logs: Mutex<HashMap<String, Vec<MinerLog>>>,
    miners: Mutex<HashMap<String, Vec<Node>>>,
    failures: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<(String, i64, usize)>>,
}

impl NullLogSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_logs(&self, url: &str, entries: impl IntoIterator<Item = MinerLog>) {
        let mut logs = self.logs.lock().unwrap_or_else(|e| e.into_inner());
        let list = logs.entry(url.to_string()).or_default();
        list.extend(entries);
        list.sort_by_key(|l| l.id);
    }

    pub fn push_miners(&self, url: &str, nodes: impl IntoIterator<Item = Node>) {
        let mut miners = self.miners.lock().unwrap_or_else(|e| e.into_inner());
        let list = miners.entry(url.to_string()).or_default();
        list.extend(nodes);
        list.sort_by_key(|n| n.id);
    }

    /// The next call fails with `reason`.
    pub fn fail_next(&self, reason: &str) {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reason.to_string());
    }

    /// Every `fetch_logs` call so far as `(url, start, count)`.
    pub fn log_requests(&self) -> Vec<(String, i64, usize)> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn take_failure(&self) -> Option<NetworkError> {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .map(NetworkError::Unreachable)
    }
}

impl MinerLogSource for NullLogSource {
    async fn fetch_logs(
        &self,
        url: &str,
        start: i64,
        count: usize,
    ) -> Result<Vec<MinerLog>, NetworkError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((url.to_string(), start, count));
        if let Some(e) = self.take_failure() {
            return Err(e);
        }
        let logs = self.logs.lock().unwrap_or_else(|e| e.into_inner());
        Ok(logs
            .get(url)
            .map(|list| {
                list.iter()
                    .filter(|l| l.id >= start)
                    .take(count)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_miners(
        &self,
        url: &str,
        start: i64,
        count: usize,
        _sn_count: usize,
        _sn_index: usize,
    ) -> Result<Vec<Node>, NetworkError> {
        if let Some(e) = self.take_failure() {
            return Err(e);
        }
        let miners = self.miners.lock().unwrap_or_else(|e| e.into_inner());
        Ok(miners
            .get(url)
            .map(|list| {
                list.iter()
                    .filter(|n| i64::from(n.id) >= start)
                    .take(count)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// A chain account service backed by a map. Unknown accounts fail.
#[derive(Default)]
pub struct NullChainAccounts {
    keys: Mutex<HashMap<String, String>>,
}

impl NullChainAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key(&self, account: &str, key: &str) {
        self.keys
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(account.to_string(), key.to_string());
    }
}

impl ChainAccounts for NullChainAccounts {
    async fn active_key(&self, account: &str) -> Result<String, NetworkError> {
        self.keys
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(account)
            .cloned()
            .ok_or_else(|| NetworkError::RequestFailed(format!("unknown account {account}")))
    }
}
