//! Decay engine implementing the [`DecayCalculator`] trait.
//!
//! Turns time since the last faction-relevant activity into a bounded,
//! non-positive change of standing:
//!
//! ```text
//! days      = elapsed_hours / 24
//! base      = |v| * base_rate% * days
//! total     = base * nonlinear(v) * activity(days)
//! total     = min(total, |v| * max_rate%, v - min_reputation)
//! delta     = -total
//! ```
//!
//! Inactivity shorter than the configured threshold yields exactly zero.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use repute_core::constants::DECAY_CADENCE_SECS;
use repute_core::error::ConfigurationError;
use repute_core::traits::DecayCalculator;
use repute_core::types::{DecayConfig, ReputationDecay};

use crate::factors::{activity_factor, nonlinear_factor};

const SECS_PER_DAY: f64 = 86_400.0;

/// The production decay calculator.
///
/// Holds only the cadence used to schedule the next application; all other
/// inputs arrive per call.
#[derive(Debug, Clone)]
pub struct DecayEngine {
    cadence: Duration,
}

impl Default for DecayEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DecayEngine {
    /// Engine with the standard one-hour cadence.
    pub fn new() -> Self {
        Self {
            cadence: Duration::seconds(DECAY_CADENCE_SECS),
        }
    }

    /// Engine scheduling records `cadence` apart.
    pub fn with_cadence(cadence: Duration) -> Self {
        Self { cadence }
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }
}

impl DecayCalculator for DecayEngine {
    fn calculate_decay(
        &self,
        current_value: f64,
        last_activity: DateTime<Utc>,
        now: DateTime<Utc>,
        config: Option<&DecayConfig>,
    ) -> Result<f64, ConfigurationError> {
        let config = config
            .ok_or_else(|| ConfigurationError::Invalid("decay config is required".into()))?;
        config.validate()?;
        if !current_value.is_finite() {
            return Err(ConfigurationError::Invalid(format!(
                "current value must be finite, got {current_value}"
            )));
        }

        let elapsed = now - last_activity;
        if elapsed < config.time_threshold() {
            return Ok(0.0);
        }

        let days = elapsed.num_seconds() as f64 / SECS_PER_DAY;
        let magnitude = current_value.abs();
        let base = magnitude * (config.base_decay_rate / 100.0) * days;
        let dampened = base * nonlinear_factor(current_value) * activity_factor(days);

        let cap = magnitude * (config.max_decay_rate / 100.0);
        let headroom = (current_value - config.min_reputation).max(0.0);
        let total = dampened.min(cap).min(headroom);

        // Avoid handing back -0.0.
        if total > 0.0 { Ok(-total) } else { Ok(0.0) }
    }

    fn update_decay_process(
        &self,
        record: &mut ReputationDecay,
        delta: f64,
        now: DateTime<Utc>,
        min_reputation: f64,
    ) {
        record.current_value = (record.current_value + delta).max(min_reputation);
        record.last_decay_time = now;
        record.next_decay_time = now + self.cadence;
        record.updated_at = now;

        if record.current_value <= min_reputation {
            record.is_active = false;
            debug!(
                decay_id = %record.id,
                character_id = %record.character_id,
                faction_id = %record.faction_id,
                "decay track reached the floor; deactivated"
            );
        }
    }
}
