//! Trait interfaces for the Repute engine.
//!
//! These traits define the contracts between crates:
//! - [`DecayCalculator`]: inactivity decay math (repute-decay implements)
//! - [`RecoveryCalculator`]: recovery curves and estimation (repute-recovery implements)
//! - [`ReputationSystem`]: the authoritative reputation store owned by another
//!   service (repute-node implements over HTTP)
//!
//! Persistence lives in [`crate::store::ProcessStore`].

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::error::{ConfigurationError, ExternalPushError, ValidationError};
use crate::types::{DecayConfig, RecoveryConfig, RecoveryCost, ReputationDecay, ReputationRecovery};

/// Pure computation of inactivity decay.
///
/// Implementations hold no state; every input arrives as an argument so a
/// single instance can serve all factions.
pub trait DecayCalculator: Send + Sync {
    /// Signed change to apply to `current_value`. Always `<= 0`.
    ///
    /// # Errors
    ///
    /// - [`ConfigurationError::Invalid`] if `config` is absent or malformed
    fn calculate_decay(
        &self,
        current_value: f64,
        last_activity: DateTime<Utc>,
        now: DateTime<Utc>,
        config: Option<&DecayConfig>,
    ) -> Result<f64, ConfigurationError>;

    /// Whether `record` is due at `now`.
    ///
    /// Default implementation: active and strictly past its next decay time.
    /// Sweeps claim with the inclusive rule in `ReputationDecay::is_claimable`.
    fn should_process_decay(&self, record: &ReputationDecay, now: DateTime<Utc>) -> bool {
        record.is_active && record.next_decay_time < now
    }

    /// Apply `delta` in place and schedule the next application.
    ///
    /// Deactivates the record once it sits at `min_reputation`.
    fn update_decay_process(
        &self,
        record: &mut ReputationDecay,
        delta: f64,
        now: DateTime<Utc>,
        min_reputation: f64,
    );
}

/// Pure computation of recovery progress, value, duration, and cost.
pub trait RecoveryCalculator: Send + Sync {
    /// Fraction of the window elapsed at `now`, in `[0, 1]`.
    ///
    /// Inactive records return their stored progress unchanged.
    fn calculate_recovery_progress(&self, record: &ReputationRecovery, now: DateTime<Utc>) -> f64;

    /// Standing reached at `progress` along the record's method curve.
    fn calculate_recovery_value(&self, record: &ReputationRecovery, progress: f64) -> f64;

    /// Length of the recovery window for moving from `start` to `target`.
    fn estimate_recovery_duration(&self, start: f64, target: f64, config: &RecoveryConfig) -> Duration;

    /// Price of moving from `start` to `target`.
    fn calculate_recovery_cost(&self, start: f64, target: f64, config: &RecoveryConfig) -> RecoveryCost;

    /// Reject malformed requests before anything is persisted.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::TargetNotAboveStart`] if `target <= start`
    /// - [`ValidationError::MethodMismatch`] if `config` is for another method
    /// - [`ValidationError::DurationOutOfRange`] if the window escapes the config bounds
    fn validate_recovery_request(
        &self,
        record: &ReputationRecovery,
        config: &RecoveryConfig,
    ) -> Result<(), ValidationError>;
}

/// The authoritative reputation store owned by another service.
///
/// Pushes are best-effort from the engine's point of view: callers log
/// failures and keep their local state.
#[async_trait]
pub trait ReputationSystem: Send + Sync {
    /// Current standing of `character_id` with `faction_id`.
    async fn current_value(&self, character_id: &str, faction_id: &str) -> Result<f64, ExternalPushError>;

    /// Overwrite the standing of `character_id` with `faction_id`.
    async fn push_value(
        &self,
        character_id: &str,
        faction_id: &str,
        new_value: f64,
    ) -> Result<(), ExternalPushError>;
}
