//! Miner tracker daemon: runs the tracker service and provisions relay
//! credentials.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracker_crypto::normalize_public_key;
use tracker_node::{MinerTracker, TrackerConfig};
use tracker_store::AuthStore;
use tracker_store_lmdb::LmdbEnvironment;
use tracker_types::{Auth, PublicKey};
use tracker_utils::{init_logging, LogFormat};

#[derive(Parser)]
#[command(name = "miner-tracker", about = "Storage miner registry tracker")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "TRACKER_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for the LMDB environment.
    #[arg(long, env = "TRACKER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Address of the HTTP API.
    #[arg(long, env = "TRACKER_HTTP_ADDR")]
    http_bind_addr: Option<String>,

    /// Address of the relay's WebSocket endpoint.
    #[arg(long, env = "TRACKER_RELAY_ADDR")]
    relay_bind_addr: Option<String>,

    /// Chain node used to resolve account keys.
    #[arg(long, env = "TRACKER_EOS_URL")]
    eos_url: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "TRACKER_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "TRACKER_LOG_FORMAT")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the tracker until SIGINT/SIGTERM.
    Run,
    /// Manage relay credentials. Run only while the tracker is stopped.
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },
    /// Print the effective configuration as TOML.
    Config,
}

#[derive(clap::Subcommand)]
enum AuthAction {
    /// Store or replace the trusted key of an account.
    Put {
        #[arg(long)]
        account: String,
        /// Hex Ed25519 public key, optionally with a network prefix.
        #[arg(long)]
        public_key: String,
    },
    /// List stored accounts and keys.
    List,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<TrackerConfig> {
        let mut config = match &self.config {
            Some(path) => TrackerConfig::from_toml_file(&path.to_string_lossy())
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => TrackerConfig::default(),
        };
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(addr) = &self.http_bind_addr {
            config.http_bind_addr = addr.clone();
        }
        if let Some(addr) = &self.relay_bind_addr {
            config.mq.server.bind_addr = addr.clone();
        }
        if let Some(url) = &self.eos_url {
            config.eos_url = url.clone();
        }
        if let Some(level) = &self.log_level {
            config.logger.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.logger.format = LogFormat::parse(format);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;
    init_logging(config.logger.format, &config.logger.level)
        .map_err(|e| anyhow::anyhow!("installing log subscriber: {e}"))?;

    match cli.command {
        Command::Run => {
            let mut tracker = MinerTracker::new(config).context("opening tracker storage")?;
            tracker.start().await?;

            tracing::info!("shutdown signal received, stopping tracker");
            tracker.stop().await?;
            tracing::info!("miner tracker exited cleanly");
        }
        Command::Auth { action } => {
            let env = LmdbEnvironment::open(
                &config.data_dir,
                &config.store.names(),
                config.store.map_size,
            )
            .context("opening tracker storage")?;
            let auths = env.auth_store();
            match action {
                AuthAction::Put {
                    account,
                    public_key,
                } => {
                    let public_key = normalize_public_key(&public_key).to_string();
                    PublicKey::from_hex(&public_key).context("invalid public key")?;
                    auths.put_auth(&Auth {
                        account: account.clone(),
                        public_key,
                    })?;
                    tracing::info!(%account, "account key stored");
                }
                AuthAction::List => {
                    for auth in auths.iter_auths()? {
                        println!("{}\t{}", auth.account, auth.public_key);
                    }
                }
            }
        }
        Command::Config => {
            print!("{}", config.to_toml_string()?);
        }
    }

    Ok(())
}
