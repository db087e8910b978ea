//! repute-cli: operator interface to a Repute process store.
//!
//! Opens the store directly, so the daemon must not be running against the
//! same data directory. Every command prints JSON to stdout.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use repute_core::store::ProcessStore;
use repute_core::traits::ReputationSystem;
use repute_core::types::{DecayConfig, RecoveryConfig, RecoveryMethod};
use repute_node_lib::{
    init_logging, DetachedReputation, HttpReputationClient, LifecycleService, RocksStore, ServiceConfig,
};
use serde::Serialize;

/// Repute command-line interface.
#[derive(Parser)]
#[command(name = "repute-cli")]
#[command(version, about = "Inspect and drive reputation decay and recovery")]
struct Cli {
    /// TOML config file; `REPUTE__*` environment variables apply on top.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory of the process store.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Base URL of the authoritative reputation store.
    #[arg(long, global = true)]
    reputation_endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one decay sweep now.
    Sweep,
    /// Record faction-relevant activity for a character.
    Activity(PairArgs),
    /// Recovery attempt subcommands.
    Recovery {
        #[command(subcommand)]
        action: RecoveryAction,
    },
    /// Show service health.
    Health,
    /// Read or change decay and recovery configs.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// List the event log of a character.
    Events(CharacterArgs),
}

#[derive(Subcommand)]
enum RecoveryAction {
    /// Open a recovery attempt.
    Start(StartArgs),
    /// Advance the active recoveries of a character.
    Process(CharacterArgs),
    /// List the recoveries of a character.
    List(CharacterArgs),
    /// Pause an active recovery.
    Pause(IdArgs),
    /// Resume a paused recovery.
    Resume(IdArgs),
    /// Cancel a pending or active recovery.
    Cancel(IdArgs),
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show or change the decay config of a faction.
    Decay {
        /// Faction id, or `*` for the fallback config.
        faction: String,
        #[command(flatten)]
        update: DecayUpdate,
    },
    /// Show or change the config of a recovery method.
    Recovery {
        method: RecoveryMethod,
        #[command(flatten)]
        update: RecoveryUpdate,
    },
}

#[derive(Args)]
struct PairArgs {
    character: String,
    faction: String,
}

#[derive(Args)]
struct CharacterArgs {
    character: String,
}

#[derive(Args)]
struct IdArgs {
    recovery_id: String,
}

#[derive(Args)]
struct StartArgs {
    character: String,
    faction: String,

    /// time_based, action_based, payment_based, quest_based, or hybrid.
    #[arg(short, long, default_value = "time_based")]
    method: RecoveryMethod,

    /// Standing to reach; must exceed the current one.
    #[arg(short, long, allow_hyphen_values = true)]
    target: f64,
}

#[derive(Args)]
struct DecayUpdate {
    #[arg(long)]
    base_rate: Option<f64>,
    #[arg(long)]
    threshold_secs: Option<i64>,
    #[arg(long, allow_hyphen_values = true)]
    min_reputation: Option<f64>,
    #[arg(long)]
    max_rate: Option<f64>,
}

impl DecayUpdate {
    fn is_empty(&self) -> bool {
        self.base_rate.is_none()
            && self.threshold_secs.is_none()
            && self.min_reputation.is_none()
            && self.max_rate.is_none()
    }

    fn apply(&self, mut config: DecayConfig) -> DecayConfig {
        if let Some(v) = self.base_rate {
            config.base_decay_rate = v;
        }
        if let Some(v) = self.threshold_secs {
            config.time_threshold_secs = v;
        }
        if let Some(v) = self.min_reputation {
            config.min_reputation = v;
        }
        if let Some(v) = self.max_rate {
            config.max_decay_rate = v;
        }
        config
    }
}

#[derive(Args)]
struct RecoveryUpdate {
    #[arg(long)]
    time_multiplier: Option<f64>,
    #[arg(long)]
    cost_multiplier: Option<f64>,
    #[arg(long)]
    min_duration_secs: Option<i64>,
    #[arg(long)]
    max_duration_secs: Option<i64>,
    #[arg(long)]
    currency: Option<String>,
}

impl RecoveryUpdate {
    fn is_empty(&self) -> bool {
        self.time_multiplier.is_none()
            && self.cost_multiplier.is_none()
            && self.min_duration_secs.is_none()
            && self.max_duration_secs.is_none()
            && self.currency.is_none()
    }

    fn apply(&self, mut config: RecoveryConfig) -> RecoveryConfig {
        if let Some(v) = self.time_multiplier {
            config.time_multiplier = v;
        }
        if let Some(v) = self.cost_multiplier {
            config.cost_multiplier = v;
        }
        if let Some(v) = self.min_duration_secs {
            config.min_duration_secs = v;
        }
        if let Some(v) = self.max_duration_secs {
            config.max_duration_secs = v;
        }
        if let Some(v) = &self.currency {
            config.currency_type = v.clone();
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ServiceConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if cli.reputation_endpoint.is_some() {
        config.reputation_endpoint = cli.reputation_endpoint;
    }
    // Quiet by default so the JSON output stays readable; RUST_LOG overrides.
    let _ = init_logging("warn", &config.log_format);

    let service = open_service(config)?;
    let now = Utc::now();

    match cli.command {
        Commands::Sweep => print_json(&service.process_reputation_decay(now).await?),
        Commands::Activity(args) => print_json(
            &service
                .record_faction_activity(&args.character, &args.faction, now)
                .await?,
        ),
        Commands::Recovery { action } => recovery(&service, action).await,
        Commands::Health => print_json(&service.get_system_health(now)?),
        Commands::Config { action } => config_command(&service, action),
        Commands::Events(args) => print_json(&service.events_for_character(&args.character)?),
    }
}

fn open_service(config: ServiceConfig) -> Result<LifecycleService> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create directory: {}", config.data_dir.display()))?;
    let store = RocksStore::open(config.db_path())
        .with_context(|| format!("Failed to open process store at {}", config.db_path().display()))?;
    store.seed_default_configs().context("Failed to seed default configs")?;

    let reputation: Arc<dyn ReputationSystem> = match &config.reputation_endpoint {
        Some(endpoint) => Arc::new(
            HttpReputationClient::new(endpoint, config.push_timeout()).context("Invalid reputation endpoint")?,
        ),
        None => Arc::new(DetachedReputation::new()),
    };
    Ok(LifecycleService::new(Arc::new(store), reputation, config))
}

async fn recovery(service: &LifecycleService, action: RecoveryAction) -> Result<()> {
    let now = Utc::now();
    match action {
        RecoveryAction::Start(args) => {
            let record = service
                .start_reputation_recovery(&args.character, &args.faction, args.method, args.target, now)
                .await
                .with_context(|| format!("Failed to start recovery for {}/{}", args.character, args.faction))?;
            print_json(&record)
        }
        RecoveryAction::Process(args) => print_json(
            &service
                .process_reputation_recovery(&args.character, now)
                .await?,
        ),
        RecoveryAction::List(args) => print_json(&service.list_recoveries(&args.character)?),
        RecoveryAction::Pause(args) => print_json(&service.pause_recovery(&args.recovery_id, now).await?),
        RecoveryAction::Resume(args) => print_json(&service.resume_recovery(&args.recovery_id, now).await?),
        RecoveryAction::Cancel(args) => print_json(&service.cancel_recovery(&args.recovery_id, now).await?),
    }
}

fn config_command(service: &LifecycleService, action: ConfigAction) -> Result<()> {
    let store = service.store();
    match action {
        ConfigAction::Decay { faction, update } => {
            if update.is_empty() {
                return match store.decay_config(&faction)? {
                    Some(cfg) => print_json(&cfg),
                    None => bail!("No decay config applies to faction {faction}"),
                };
            }
            let base = store
                .decay_config_exact(&faction)?
                .unwrap_or_else(|| DecayConfig::for_faction(faction.clone()));
            let updated = update.apply(base);
            service.set_decay_config(&updated)?;
            print_json(&updated)
        }
        ConfigAction::Recovery { method, update } => {
            let current = store
                .recovery_config(method)?
                .unwrap_or_else(|| RecoveryConfig::defaults_for(method));
            if update.is_empty() {
                return print_json(&current);
            }
            let updated = update.apply(current);
            service.set_recovery_config(&updated)?;
            print_json(&updated)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("Failed to encode output")?);
    Ok(())
}
