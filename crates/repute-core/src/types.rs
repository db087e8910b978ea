//! Data model: decay tracks, recovery attempts, the event log, and configs.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{
    DECAY_CADENCE_SECS, DEFAULT_ACTIVITY_BOOST, DEFAULT_BASE_DECAY_RATE,
    DEFAULT_BASE_RECOVERY_RATE, DEFAULT_COST_MULTIPLIER, DEFAULT_CURRENCY,
    DEFAULT_MAX_DECAY_RATE, DEFAULT_MAX_DURATION_SECS, DEFAULT_MIN_DURATION_SECS,
    DEFAULT_MIN_REPUTATION, DEFAULT_TIME_MULTIPLIER, DEFAULT_TIME_THRESHOLD_SECS,
    WILDCARD_FACTION,
};
use crate::error::{ConfigurationError, ValidationError};

/// Open key/value bag attached to recoveries and events.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Generate a fresh record identifier.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// ------------------------------------------------------------------
// Enums
// ------------------------------------------------------------------

/// How a recovery converts elapsed time into standing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryMethod {
    TimeBased,
    PaymentBased,
    QuestBased,
    ActionBased,
    Hybrid,
}

impl RecoveryMethod {
    pub const ALL: [RecoveryMethod; 5] = [
        Self::TimeBased,
        Self::PaymentBased,
        Self::QuestBased,
        Self::ActionBased,
        Self::Hybrid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TimeBased => "time_based",
            Self::PaymentBased => "payment_based",
            Self::QuestBased => "quest_based",
            Self::ActionBased => "action_based",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for RecoveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecoveryMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ValidationError::EmptyMethod);
        }
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownMethod(s.to_string()))
    }
}

/// Lifecycle state of a recovery attempt.
///
/// ```text
/// pending --> active <--> paused
/// active  --> completed | failed
/// pending | active --> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStatus {
    Pending,
    Active,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl RecoveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// No transition leaves a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn can_transition_to(&self, to: RecoveryStatus) -> bool {
        use RecoveryStatus::*;
        matches!(
            (self, to),
            (Pending, Active)
                | (Pending, Cancelled)
                | (Active, Paused)
                | (Paused, Active)
                | (Active, Completed)
                | (Active, Failed)
                | (Active, Cancelled)
        )
    }
}

impl fmt::Display for RecoveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecoveryStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(ValidationError::UnknownStatus(other.to_string())),
        }
    }
}

/// Kind of mutation recorded in the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReputationEventType {
    Decay,
    RecoveryStarted,
    Recovery,
    RecoveryCompleted,
    RecoveryPaused,
    RecoveryResumed,
    RecoveryCancelled,
    RecoveryFailed,
}

impl ReputationEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decay => "decay",
            Self::RecoveryStarted => "recovery_started",
            Self::Recovery => "recovery",
            Self::RecoveryCompleted => "recovery_completed",
            Self::RecoveryPaused => "recovery_paused",
            Self::RecoveryResumed => "recovery_resumed",
            Self::RecoveryCancelled => "recovery_cancelled",
            Self::RecoveryFailed => "recovery_failed",
        }
    }
}

impl fmt::Display for ReputationEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ------------------------------------------------------------------
// Decay
// ------------------------------------------------------------------

/// Decay track for one (character, faction) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationDecay {
    pub id: String,
    pub character_id: String,
    pub faction_id: String,
    pub current_value: f64,
    /// Percent per day, as configured when the track was created.
    pub decay_rate: f64,
    pub last_decay_time: DateTime<Utc>,
    pub next_decay_time: DateTime<Utc>,
    /// Last faction-relevant activity by the character.
    pub last_activity: DateTime<Utc>,
    pub is_active: bool,
    /// Sweep claim; a record is not re-claimed before this instant.
    #[serde(default)]
    pub processing_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReputationDecay {
    /// New active track, first due one cadence after `now`.
    pub fn new(
        character_id: impl Into<String>,
        faction_id: impl Into<String>,
        current_value: f64,
        decay_rate: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_id(),
            character_id: character_id.into(),
            faction_id: faction_id.into(),
            current_value,
            decay_rate,
            last_decay_time: now,
            next_decay_time: now + Duration::seconds(DECAY_CADENCE_SECS),
            last_activity: now,
            is_active: true,
            processing_until: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a sweep at `now` may claim this record.
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.next_decay_time <= now
            && self.processing_until.is_none_or(|until| until <= now)
    }
}

/// Per-faction decay tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecayConfig {
    /// Faction this config applies to, or `*` for the fallback.
    pub faction_id: String,
    /// Percent of standing lost per day of inactivity.
    pub base_decay_rate: f64,
    pub time_threshold_secs: i64,
    pub min_reputation: f64,
    /// Cap per application, percent of standing.
    pub max_decay_rate: f64,
    pub activity_boost: f64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            faction_id: WILDCARD_FACTION.to_string(),
            base_decay_rate: DEFAULT_BASE_DECAY_RATE,
            time_threshold_secs: DEFAULT_TIME_THRESHOLD_SECS,
            min_reputation: DEFAULT_MIN_REPUTATION,
            max_decay_rate: DEFAULT_MAX_DECAY_RATE,
            activity_boost: DEFAULT_ACTIVITY_BOOST,
        }
    }
}

impl DecayConfig {
    pub fn for_faction(faction_id: impl Into<String>) -> Self {
        Self {
            faction_id: faction_id.into(),
            ..Self::default()
        }
    }

    pub fn time_threshold(&self) -> Duration {
        Duration::seconds(self.time_threshold_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !self.base_decay_rate.is_finite() || self.base_decay_rate < 0.0 {
            return Err(ConfigurationError::Invalid(format!(
                "base_decay_rate must be a non-negative number, got {}",
                self.base_decay_rate
            )));
        }
        if !self.max_decay_rate.is_finite() || self.max_decay_rate < 0.0 {
            return Err(ConfigurationError::Invalid(format!(
                "max_decay_rate must be a non-negative number, got {}",
                self.max_decay_rate
            )));
        }
        if !self.min_reputation.is_finite() {
            return Err(ConfigurationError::Invalid("min_reputation must be finite".into()));
        }
        if self.time_threshold_secs < 0 {
            return Err(ConfigurationError::Invalid("time_threshold_secs must be >= 0".into()));
        }
        Ok(())
    }
}

// ------------------------------------------------------------------
// Recovery
// ------------------------------------------------------------------

/// Price of a recovery attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryCost {
    pub currency_type: String,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
}

/// One recovery attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationRecovery {
    pub id: String,
    pub character_id: String,
    pub faction_id: String,
    pub method: RecoveryMethod,
    pub status: RecoveryStatus,
    pub start_value: f64,
    pub target_value: f64,
    pub current_value: f64,
    /// Fraction of the window elapsed, in `[0, 1]`.
    pub progress: f64,
    pub start_time: DateTime<Utc>,
    pub estimated_end: DateTime<Utc>,
    /// Set exactly when the status is terminal.
    pub actual_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub paused_at: Option<DateTime<Utc>>,
    pub cost: RecoveryCost,
    #[serde(default)]
    pub metadata: Metadata,
    /// Bumped by the store on every successful update.
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReputationRecovery {
    /// Pending attempt spanning `[now, now + duration]`.
    #[allow(clippy::too_many_arguments)]
    pub fn pending(
        character_id: impl Into<String>,
        faction_id: impl Into<String>,
        method: RecoveryMethod,
        start_value: f64,
        target_value: f64,
        duration: Duration,
        cost: RecoveryCost,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_id(),
            character_id: character_id.into(),
            faction_id: faction_id.into(),
            method,
            status: RecoveryStatus::Pending,
            start_value,
            target_value,
            current_value: start_value,
            progress: 0.0,
            start_time: now,
            estimated_end: now + duration,
            actual_end: None,
            paused_at: None,
            cost,
            metadata: Metadata::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Standing still to be recovered over the whole window.
    pub fn delta(&self) -> f64 {
        self.target_value - self.start_value
    }

    pub fn window(&self) -> Duration {
        self.estimated_end - self.start_time
    }

    /// Move to `to`, stamping `actual_end` on terminal states.
    pub fn transition(&mut self, to: RecoveryStatus, now: DateTime<Utc>) -> Result<(), ValidationError> {
        if !self.status.can_transition_to(to) {
            return Err(ValidationError::IllegalTransition { from: self.status, to });
        }
        self.status = to;
        self.actual_end = if to.is_terminal() { Some(now) } else { None };
        self.updated_at = now;
        Ok(())
    }
}

/// Per-method recovery tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    pub method: RecoveryMethod,
    pub base_recovery_rate: f64,
    pub time_multiplier: f64,
    pub cost_multiplier: f64,
    pub min_duration_secs: i64,
    pub max_duration_secs: i64,
    pub currency_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_item: Option<String>,
}

impl RecoveryConfig {
    pub fn defaults_for(method: RecoveryMethod) -> Self {
        Self {
            method,
            base_recovery_rate: DEFAULT_BASE_RECOVERY_RATE,
            time_multiplier: DEFAULT_TIME_MULTIPLIER,
            cost_multiplier: DEFAULT_COST_MULTIPLIER,
            min_duration_secs: DEFAULT_MIN_DURATION_SECS,
            max_duration_secs: DEFAULT_MAX_DURATION_SECS,
            currency_type: DEFAULT_CURRENCY.to_string(),
            required_item: None,
        }
    }

    pub fn min_duration(&self) -> Duration {
        Duration::seconds(self.min_duration_secs)
    }

    pub fn max_duration(&self) -> Duration {
        Duration::seconds(self.max_duration_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.min_duration_secs <= 0 || self.max_duration_secs < self.min_duration_secs {
            return Err(ConfigurationError::Invalid(format!(
                "duration bounds [{}s, {}s] are not a valid window",
                self.min_duration_secs, self.max_duration_secs
            )));
        }
        if !self.time_multiplier.is_finite() || self.time_multiplier < 0.0 {
            return Err(ConfigurationError::Invalid("time_multiplier must be >= 0".into()));
        }
        if !self.cost_multiplier.is_finite() || self.cost_multiplier < 0.0 {
            return Err(ConfigurationError::Invalid("cost_multiplier must be >= 0".into()));
        }
        Ok(())
    }
}

// ------------------------------------------------------------------
// Events and health
// ------------------------------------------------------------------

/// Append-only audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationEvent {
    pub id: String,
    pub character_id: String,
    pub faction_id: String,
    pub event_type: ReputationEventType,
    pub old_value: f64,
    pub new_value: f64,
    pub delta: f64,
    pub reason: String,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl ReputationEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        character_id: &str,
        faction_id: &str,
        event_type: ReputationEventType,
        old_value: f64,
        new_value: f64,
        reason: impl Into<String>,
        source: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_id(),
            character_id: character_id.to_string(),
            faction_id: faction_id.to_string(),
            event_type,
            old_value,
            new_value,
            delta: new_value - old_value,
            reason: reason.into(),
            source: source.into(),
            timestamp,
            metadata: Metadata::new(),
        }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Aggregate view returned by the health operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    pub active_decay_processes: u64,
    pub active_recovery_processes: u64,
    pub total_requests: u64,
    pub successful_ops: u64,
    pub failed_ops: u64,
    pub average_response_time_ms: f64,
    /// Failed operations over total, in `[0, 1]`.
    pub error_rate: f64,
    /// `100 * (1 - error_rate)`.
    pub health_score: f64,
    pub last_health_check: DateTime<Utc>,
}
