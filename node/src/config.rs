//! Tracker configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use tracker_network::{WsBrokerConfig, WsClientConfig};
use tracker_store::StoreNames;
use tracker_utils::LogFormat;

use crate::TrackerError;

/// Configuration for a tracker instance.
///
/// Can be loaded from a TOML file via [`TrackerConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Every field has a default.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Address of the HTTP API.
    #[serde(default = "default_http_bind_addr")]
    pub http_bind_addr: String,

    /// Chain node used to resolve account keys.
    #[serde(default = "default_eos_url")]
    pub eos_url: String,

    /// Directory of the LMDB environment.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub mq: MqConfig,

    #[serde(default)]
    pub miner_stat: MinerStatConfig,

    #[serde(default)]
    pub logger: LoggerConfig,

    #[serde(default)]
    pub misc: MiscConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// LMDB map size in bytes.
    #[serde(default = "default_map_size")]
    pub map_size: usize,
    #[serde(default = "default_node_db")]
    pub node_db: String,
    #[serde(default = "default_auth_db")]
    pub auth_db: String,
    #[serde(default = "default_progress_db")]
    pub progress_db: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MqConfig {
    #[serde(default)]
    pub server: MqServerConfig,
    #[serde(default)]
    pub client: MqClientConfig,
}

/// The relay this instance serves. Durations are in seconds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MqServerConfig {
    #[serde(default = "default_mq_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_router_buffer")]
    pub router_buffer_size: usize,
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer_size: usize,
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    #[serde(default = "default_socket_buffer")]
    pub write_buffer_size: usize,
    #[serde(default = "default_ping_wait")]
    pub ping_wait: u64,
    #[serde(default = "default_read_wait")]
    pub read_wait: u64,
    #[serde(default = "default_write_wait")]
    pub write_wait: u64,
    #[serde(default = "default_sync_topic")]
    pub miner_sync_topic: String,
}

/// Subscriptions to peer relays and the local credential.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MqClientConfig {
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer_size: usize,
    #[serde(default = "default_ping_wait")]
    pub ping_wait: u64,
    #[serde(default = "default_read_wait")]
    pub read_wait: u64,
    #[serde(default = "default_write_wait")]
    pub write_wait: u64,
    #[serde(default = "default_sync_topic")]
    pub miner_sync_topic: String,
    /// WebSocket URLs of peer relays, e.g. `ws://sn1:8787/ws`.
    #[serde(default)]
    pub all_sn_urls: Vec<String>,
    /// Account whose key signs this instance's credential.
    #[serde(default)]
    pub account: String,
    /// Hex-encoded Ed25519 seed of `account`.
    #[serde(default)]
    pub private_key: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Seconds between reconnect attempts.
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,
}

/// Log tracking and bootstrap against peer sync endpoints.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MinerStatConfig {
    /// HTTP base URLs; the position in this list is the source index.
    #[serde(default)]
    pub all_sync_urls: Vec<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Seconds between polls.
    #[serde(default = "default_wait_time")]
    pub wait_time: u64,
    /// Seconds of log history too recent to process.
    #[serde(default = "default_skip_time")]
    pub skip_time: u64,
    #[serde(default)]
    pub enable_bootstrap: bool,
    #[serde(default = "default_bootstrap_interval")]
    pub bootstrap_interval: u64,
    /// Shard count for bootstrap; 0 uses the number of sync URLs.
    #[serde(default)]
    pub bootstrap_sn_count: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggerConfig {
    #[serde(default)]
    pub format: LogFormat,
    /// Level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MiscConfig {
    /// Seconds between credential refresh cycles.
    #[serde(default = "default_refresh_auth_interval")]
    pub refresh_auth_interval: u64,
    /// Seconds between readable-nodes rebuilds.
    #[serde(default = "default_readable_refresh_interval")]
    pub readable_refresh_interval: u64,
    /// A node must have reported within this many seconds to be readable.
    #[serde(default = "default_readable_freshness")]
    pub readable_freshness: u64,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_http_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_eos_url() -> String {
    "http://127.0.0.1:8888".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./tracker_data")
}

fn default_map_size() -> usize {
    1 << 30
}

fn default_node_db() -> String {
    StoreNames::default().node_db
}

fn default_auth_db() -> String {
    StoreNames::default().auth_db
}

fn default_progress_db() -> String {
    StoreNames::default().progress_db
}

fn default_mq_bind_addr() -> String {
    "0.0.0.0:8787".to_string()
}

fn default_router_buffer() -> usize {
    8192
}

fn default_subscriber_buffer() -> usize {
    1024
}

fn default_socket_buffer() -> usize {
    4096
}

fn default_max_message_size() -> usize {
    16 << 20
}

fn default_ping_wait() -> u64 {
    30
}

fn default_read_wait() -> u64 {
    60
}

fn default_write_wait() -> u64 {
    10
}

fn default_sync_topic() -> String {
    "sync".to_string()
}

fn default_client_id() -> String {
    "yottaminertracker".to_string()
}

fn default_retry_delay() -> u64 {
    3
}

fn default_batch_size() -> usize {
    100
}

fn default_wait_time() -> u64 {
    10
}

fn default_skip_time() -> u64 {
    180
}

fn default_bootstrap_interval() -> u64 {
    3600
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_refresh_auth_interval() -> u64 {
    600
}

fn default_readable_refresh_interval() -> u64 {
    300
}

fn default_readable_freshness() -> u64 {
    300
}

// ── Impl ───────────────────────────────────────────────────────────────

impl TrackerConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, TrackerError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| TrackerError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, TrackerError> {
        let config: Self = toml::from_str(s).map_err(|e| TrackerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the workers cannot make progress with.
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.miner_stat.batch_size == 0 {
            return Err(TrackerError::Config("miner_stat.batch_size must be at least 1".into()));
        }
        Ok(())
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, TrackerError> {
        toml::to_string_pretty(self).map_err(|e| TrackerError::Config(e.to_string()))
    }
}

impl StoreConfig {
    pub fn names(&self) -> StoreNames {
        StoreNames {
            node_db: self.node_db.clone(),
            auth_db: self.auth_db.clone(),
            progress_db: self.progress_db.clone(),
        }
    }
}

impl MqServerConfig {
    pub fn broker_config(&self) -> WsBrokerConfig {
        WsBrokerConfig {
            max_message_size: self.max_message_size,
            write_buffer_size: self.write_buffer_size,
            ping_wait: Duration::from_secs(self.ping_wait),
            read_wait: Duration::from_secs(self.read_wait),
            write_wait: Duration::from_secs(self.write_wait),
        }
    }
}

impl MqClientConfig {
    pub fn link_config(&self) -> WsClientConfig {
        WsClientConfig {
            ping_wait: Duration::from_secs(self.ping_wait),
            read_wait: Duration::from_secs(self.read_wait),
            write_wait: Duration::from_secs(self.write_wait),
        }
    }
}

impl MinerStatConfig {
    /// Shard count used for bootstrap requests.
    pub fn shard_count(&self) -> usize {
        if self.bootstrap_sn_count == 0 {
            self.all_sync_urls.len()
        } else {
            self.bootstrap_sn_count
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            http_bind_addr: default_http_bind_addr(),
            eos_url: default_eos_url(),
            data_dir: default_data_dir(),
            store: StoreConfig::default(),
            mq: MqConfig::default(),
            miner_stat: MinerStatConfig::default(),
            logger: LoggerConfig::default(),
            misc: MiscConfig::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            map_size: default_map_size(),
            node_db: default_node_db(),
            auth_db: default_auth_db(),
            progress_db: default_progress_db(),
        }
    }
}

impl Default for MqServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_mq_bind_addr(),
            router_buffer_size: default_router_buffer(),
            subscriber_buffer_size: default_subscriber_buffer(),
            max_message_size: default_max_message_size(),
            write_buffer_size: default_socket_buffer(),
            ping_wait: default_ping_wait(),
            read_wait: default_read_wait(),
            write_wait: default_write_wait(),
            miner_sync_topic: default_sync_topic(),
        }
    }
}

impl Default for MqClientConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer_size: default_subscriber_buffer(),
            ping_wait: default_ping_wait(),
            read_wait: default_read_wait(),
            write_wait: default_write_wait(),
            miner_sync_topic: default_sync_topic(),
            all_sn_urls: Vec::new(),
            account: String::new(),
            private_key: String::new(),
            client_id: default_client_id(),
            retry_delay: default_retry_delay(),
        }
    }
}

impl Default for MinerStatConfig {
    fn default() -> Self {
        Self {
            all_sync_urls: Vec::new(),
            batch_size: default_batch_size(),
            wait_time: default_wait_time(),
            skip_time: default_skip_time(),
            enable_bootstrap: false,
            bootstrap_interval: default_bootstrap_interval(),
            bootstrap_sn_count: 0,
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Human,
            level: default_log_level(),
        }
    }
}

impl Default for MiscConfig {
    fn default() -> Self {
        Self {
            refresh_auth_interval: default_refresh_auth_interval(),
            readable_refresh_interval: default_readable_refresh_interval(),
            readable_freshness: default_readable_freshness(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = TrackerConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        let parsed = TrackerConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed.mq.server.bind_addr, config.mq.server.bind_addr);
        assert_eq!(parsed.miner_stat.skip_time, config.miner_stat.skip_time);
        assert_eq!(parsed.store.names(), StoreNames::default());
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = TrackerConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.http_bind_addr, "0.0.0.0:8080");
        assert_eq!(config.mq.server.miner_sync_topic, "sync");
        assert_eq!(config.mq.client.client_id, "yottaminertracker");
        assert_eq!(config.mq.client.retry_delay, 3);
        assert_eq!(config.miner_stat.batch_size, 100);
        assert_eq!(config.misc.refresh_auth_interval, 600);
        assert_eq!(config.logger.format, LogFormat::Human);
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            eos_url = "http://chain:8888"

            [store]
            node_db = "Miners"

            [mq.client]
            all_sn_urls = ["ws://sn0:8787/ws", "ws://sn1:8787/ws"]
            account = "tracker1"

            [miner_stat]
            all_sync_urls = ["http://sn0:8082", "http://sn1:8082", "http://sn2:8082"]
            skip_time = 60

            [logger]
            format = "json"
        "#;
        let config = TrackerConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.eos_url, "http://chain:8888");
        assert_eq!(config.store.names().node_db, "Miners");
        assert_eq!(config.store.names().auth_db, "Auth");
        assert_eq!(config.mq.client.all_sn_urls.len(), 2);
        assert_eq!(config.mq.client.ping_wait, 30); // default
        assert_eq!(config.miner_stat.skip_time, 60);
        assert_eq!(config.miner_stat.shard_count(), 3);
        assert_eq!(config.logger.format, LogFormat::Json);
    }

    #[test]
    fn durations_convert_to_transport_configs() {
        let config = TrackerConfig::default();
        let broker = config.mq.server.broker_config();
        assert_eq!(broker.read_wait, Duration::from_secs(60));
        assert_eq!(broker.max_message_size, 16 << 20);
        assert_eq!(broker.write_buffer_size, 4096);
        assert_eq!(config.mq.client.link_config().write_wait, Duration::from_secs(10));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let result = TrackerConfig::from_toml_str("[miner_stat]\nbatch_size = 0\n");
        assert!(matches!(result, Err(TrackerError::Config(_))));
        let mut config = TrackerConfig::default();
        config.miner_stat.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = TrackerConfig::from_toml_file("/nonexistent/tracker.toml");
        assert!(matches!(result, Err(TrackerError::Config(_))));
    }
}
