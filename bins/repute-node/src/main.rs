//! Repute service daemon.
//!
//! Opens the RocksDB process store, seeds default configs, and runs the
//! decay sweep and recovery driver until Ctrl+C.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use repute_core::store::ProcessStore;
use repute_core::traits::ReputationSystem;
use repute_node_lib::{
    init_logging, DetachedReputation, HttpReputationClient, LifecycleService, RocksStore, ServiceConfig,
    SweepScheduler,
};
use tracing::{error, info, warn};

/// Repute daemon: reputation decay and recovery lifecycle.
#[derive(Parser, Debug)]
#[command(
    name = "repute-node",
    version,
    about = "Reputation decay and recovery service backed by RocksDB"
)]
struct Args {
    /// TOML config file; `REPUTE__*` environment variables apply on top
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data directory for the process store
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Seconds between two decay sweeps
    #[arg(long)]
    sweep_interval: Option<u64>,

    /// Base URL of the authoritative reputation store
    #[arg(long)]
    reputation_endpoint: Option<String>,

    /// Do not advance recoveries from the scheduler
    #[arg(long)]
    no_recovery_driver: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format ("text" or "json")
    #[arg(long)]
    log_format: Option<String>,
}

impl Args {
    /// Layer command-line overrides onto the loaded config.
    fn apply(self, mut config: ServiceConfig) -> ServiceConfig {
        if let Some(dir) = self.data_dir {
            config.data_dir = dir;
        }
        if let Some(secs) = self.sweep_interval {
            config.sweep_interval_secs = secs;
        }
        if self.reputation_endpoint.is_some() {
            config.reputation_endpoint = self.reputation_endpoint;
        }
        if self.no_recovery_driver {
            config.recovery_driver_enabled = false;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        config
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let loaded = match ServiceConfig::load(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load config: {e}");
            process::exit(1);
        }
    };
    let config = args.apply(loaded);
    if let Err(e) = config.validate() {
        eprintln!("invalid config: {e}");
        process::exit(1);
    }

    if let Err(e) = init_logging(&config.log_level, &config.log_format) {
        eprintln!("failed to initialize logging: {e}");
    }

    info!("Repute node v{}", env!("CARGO_PKG_VERSION"));
    info!(instance_id = %config.instance_id, "starting");
    info!("data_dir: {:?}", config.data_dir);
    info!("sweep_interval_secs: {}", config.sweep_interval_secs);
    info!("recovery_driver_enabled: {}", config.recovery_driver_enabled);

    if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
        error!("failed to create data_dir: {}", e);
        process::exit(1);
    }

    let store = match RocksStore::open(config.db_path()) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("failed to open process store: {}", e);
            process::exit(1);
        }
    };
    match store.seed_default_configs() {
        Ok(0) => {}
        Ok(n) => info!(seeded = n, "wrote default configs"),
        Err(e) => {
            error!("failed to seed default configs: {}", e);
            process::exit(1);
        }
    }

    let reputation: Arc<dyn ReputationSystem> = match &config.reputation_endpoint {
        Some(endpoint) => match HttpReputationClient::new(endpoint, config.push_timeout()) {
            Ok(client) => {
                info!("reputation_endpoint: {}", endpoint);
                Arc::new(client)
            }
            Err(e) => {
                error!("invalid reputation endpoint: {}", e);
                process::exit(1);
            }
        },
        None => {
            warn!("no reputation endpoint configured; running detached");
            Arc::new(DetachedReputation::new())
        }
    };

    let service = Arc::new(LifecycleService::new(store.clone(), reputation, config.clone()));
    let scheduler = SweepScheduler::new(service.clone(), &config).start();

    info!("Repute node running (Ctrl+C to stop)");

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl+C, shutting down..."),
        Err(e) => error!("failed to listen for Ctrl+C: {}", e),
    }

    scheduler.stop().await;
    info!("scheduler stopped");

    if let Err(e) = store.flush() {
        error!("failed to flush process store: {}", e);
    }
    match service.get_system_health(Utc::now()) {
        Ok(health) => info!(
            total_requests = health.total_requests,
            failed_ops = health.failed_ops,
            health_score = health.health_score,
            "final health"
        ),
        Err(e) => warn!("failed to read final health: {}", e),
    }
    info!("Repute node shutdown complete");
}

