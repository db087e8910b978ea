//! Service configuration for the Repute daemon and CLI.
//!
//! [`ServiceConfig`] is layered with the `config` crate: built-in defaults,
//! then an optional TOML file, then `REPUTE__*` environment variables
//! (e.g. `REPUTE__SWEEP_INTERVAL_SECS=30`). Command-line flags are applied on
//! top by the binaries.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use repute_core::constants::{
    CLAIM_LEASE_SECS, DECAY_BATCH_SIZE, DECAY_CADENCE_SECS, PUSH_TIMEOUT_MS, RECOVERY_BATCH_SIZE,
    SWEEP_BUDGET_MS, SWEEP_INTERVAL_SECS,
};
use repute_core::error::ConfigurationError;

/// Environment variable prefix; keys follow a double underscore.
pub const ENV_PREFIX: &str = "REPUTE";

/// Configuration for one service instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Root directory for all persistent data.
    pub data_dir: PathBuf,
    pub sweep_interval_secs: u64,
    /// Records claimed per decay sweep.
    pub decay_batch_size: usize,
    /// Gap between two decay applications of one record.
    pub decay_cadence_secs: i64,
    /// How long a sweep holds its claim on a record.
    pub claim_lease_secs: i64,
    /// Wall-clock budget for one sweep; unprocessed claims are released.
    pub sweep_budget_ms: u64,
    /// Bound on every call to the authoritative reputation store.
    pub push_timeout_ms: u64,
    pub recovery_driver_enabled: bool,
    /// Characters advanced per scheduler tick.
    pub recovery_batch_size: usize,
    /// Base URL of the authoritative reputation store. `None` runs detached.
    pub reputation_endpoint: Option<String>,
    /// Tag written into logs and event metadata.
    pub instance_id: String,
    /// Log level filter string (e.g. "info", "repute_node_lib=debug").
    pub log_level: String,
    /// "text" or "json".
    pub log_format: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("repute");

        Self {
            data_dir,
            sweep_interval_secs: SWEEP_INTERVAL_SECS,
            decay_batch_size: DECAY_BATCH_SIZE,
            decay_cadence_secs: DECAY_CADENCE_SECS,
            claim_lease_secs: CLAIM_LEASE_SECS,
            sweep_budget_ms: SWEEP_BUDGET_MS,
            push_timeout_ms: PUSH_TIMEOUT_MS,
            recovery_driver_enabled: true,
            recovery_batch_size: RECOVERY_BATCH_SIZE,
            reputation_endpoint: None,
            instance_id: uuid::Uuid::new_v4().to_string(),
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Load defaults, then `path` (if given), then the environment.
    ///
    /// # Errors
    ///
    /// - [`ConfigurationError::Invalid`] if the file is unreadable, a value
    ///   has the wrong type, or the result fails [`validate`](Self::validate)
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        );

        let cfg: Self = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ConfigurationError::Invalid(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.sweep_interval_secs == 0 {
            return Err(ConfigurationError::Invalid("sweep_interval_secs must be > 0".into()));
        }
        if self.decay_batch_size == 0 {
            return Err(ConfigurationError::Invalid("decay_batch_size must be > 0".into()));
        }
        if self.decay_cadence_secs <= 0 {
            return Err(ConfigurationError::Invalid("decay_cadence_secs must be > 0".into()));
        }
        if self.claim_lease_secs <= 0 {
            return Err(ConfigurationError::Invalid("claim_lease_secs must be > 0".into()));
        }
        if self.recovery_batch_size == 0 {
            return Err(ConfigurationError::Invalid("recovery_batch_size must be > 0".into()));
        }
        if self.push_timeout_ms >= self.sweep_budget_ms {
            return Err(ConfigurationError::Invalid(format!(
                "push_timeout_ms ({}) must be below sweep_budget_ms ({})",
                self.push_timeout_ms, self.sweep_budget_ms
            )));
        }
        if !matches!(self.log_format.as_str(), "text" | "json") {
            return Err(ConfigurationError::Invalid(format!(
                "log_format must be \"text\" or \"json\", got {:?}",
                self.log_format
            )));
        }
        Ok(())
    }

    /// Path to the RocksDB process store.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("processdata")
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn decay_cadence(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.decay_cadence_secs)
    }

    pub fn claim_lease(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.claim_lease_secs)
    }

    pub fn sweep_budget(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.sweep_budget_ms)
    }

    pub fn push_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.push_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_constants() {
        let cfg = ServiceConfig::default();
        assert_eq!(cfg.sweep_interval_secs, 60);
        assert_eq!(cfg.decay_batch_size, 100);
        assert_eq!(cfg.decay_cadence_secs, 3600);
        assert_eq!(cfg.sweep_budget_ms, 5_000);
        assert!(cfg.push_timeout_ms < cfg.sweep_budget_ms);
        assert!(cfg.recovery_driver_enabled);
        assert!(cfg.reputation_endpoint.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn default_data_dir_ends_with_repute() {
        let cfg = ServiceConfig::default();
        assert!(cfg.data_dir.ends_with("repute"), "{:?}", cfg.data_dir);
    }

    #[test]
    fn instance_ids_are_unique() {
        assert_ne!(ServiceConfig::default().instance_id, ServiceConfig::default().instance_id);
    }

    #[test]
    fn db_path_appends_processdata() {
        let cfg = ServiceConfig {
            data_dir: PathBuf::from("/tmp/repute-test"),
            ..ServiceConfig::default()
        };
        assert_eq!(cfg.db_path(), PathBuf::from("/tmp/repute-test/processdata"));
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "sweep_interval_secs = 15\nreputation_endpoint = \"http://rep.local\"\nlog_format = \"json\""
        )
        .unwrap();

        let cfg = ServiceConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.sweep_interval_secs, 15);
        assert_eq!(cfg.reputation_endpoint.as_deref(), Some("http://rep.local"));
        assert_eq!(cfg.log_format, "json");
        // Untouched keys keep their defaults.
        assert_eq!(cfg.decay_batch_size, 100);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = ServiceConfig::load(Some(Path::new("/nonexistent/repute.toml"))).unwrap_err();
        assert!(matches!(err, ConfigurationError::Invalid(_)));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "sweep_interval_secs = 0").unwrap();
        assert!(ServiceConfig::load(Some(file.path())).is_err());

        let cfg = ServiceConfig {
            log_format: "yaml".into(),
            ..ServiceConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn push_timeout_must_fit_in_sweep_budget() {
        let cfg = ServiceConfig {
            push_timeout_ms: 2_000,
            sweep_budget_ms: 500,
            ..ServiceConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigurationError::Invalid(msg)) if msg.contains("push_timeout_ms")));

        let equal = ServiceConfig {
            push_timeout_ms: 500,
            sweep_budget_ms: 500,
            ..ServiceConfig::default()
        };
        assert!(equal.validate().is_err());

        let zero_batch = ServiceConfig {
            recovery_batch_size: 0,
            ..ServiceConfig::default()
        };
        assert!(zero_batch.validate().is_err());
    }

    #[test]
    fn duration_helpers() {
        let cfg = ServiceConfig::default();
        assert_eq!(cfg.sweep_interval(), std::time::Duration::from_secs(60));
        assert_eq!(cfg.decay_cadence(), chrono::Duration::hours(1));
        assert_eq!(cfg.push_timeout(), std::time::Duration::from_millis(2000));
    }
}
