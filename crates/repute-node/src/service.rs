//! The lifecycle service: decay sweeps, recovery attempts, and health.
//!
//! [`LifecycleService`] wires a [`ProcessStore`], the two calculators, and the
//! authoritative [`ReputationSystem`] together. Local records are the source
//! of truth for cadence and progress; pushes to the authoritative store are
//! bounded by a timeout and only ever logged on failure. Pushes run as tasks
//! beside the batch they belong to, so a slow or unreachable store never eats
//! into the sweep budget; the batch waits for them only once it is done.
//!
//! Concurrency:
//! - decay records are handed out by [`ProcessStore::claim_due_decays`], so
//!   two sweeps (in one process or many) never apply the same record at once;
//! - everything touching one character runs under that character's lock from
//!   [`CharacterLocks`], and recovery writes are version-checked on top.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use repute_core::error::{ConfigurationError, ExternalPushError, ReputeError, ValidationError};
use repute_core::store::ProcessStore;
use repute_core::traits::{DecayCalculator, RecoveryCalculator, ReputationSystem};
use repute_core::types::{
    DecayConfig, RecoveryConfig, RecoveryMethod, RecoveryStatus, ReputationDecay, ReputationEvent,
    ReputationEventType, ReputationRecovery, SystemHealth,
};
use repute_decay::DecayEngine;
use repute_recovery::RecoveryEngine;

use crate::config::ServiceConfig;
use crate::locks::CharacterLocks;
use crate::metrics::{MetricsSnapshot, ServiceMetrics};

const DECAY_SOURCE: &str = "decay_worker";
const RECOVERY_SOURCE: &str = "recovery_process";
const ADMIN_SOURCE: &str = "admin";

/// Outcome of one decay sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Records handed to this sweep.
    pub claimed: usize,
    /// Records whose decay was applied.
    pub processed: usize,
    /// Records with nothing to apply yet.
    pub skipped: usize,
    /// Records that hit an error; their claim runs out on its own.
    pub failed: usize,
    /// Records released unprocessed because the sweep ran out of time.
    pub deferred: usize,
}

/// Outcome of advancing one character's recoveries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    pub examined: usize,
    pub progressed: usize,
    pub completed: usize,
    /// Records moved to `failed` because their state was unusable.
    pub failed: usize,
    pub unchanged: usize,
    /// Records that could not be written.
    pub errors: usize,
}

impl RecoveryReport {
    pub fn merge(&mut self, other: RecoveryReport) {
        self.examined += other.examined;
        self.progressed += other.progressed;
        self.completed += other.completed;
        self.failed += other.failed;
        self.unchanged += other.unchanged;
        self.errors += other.errors;
    }
}

enum DecayOutcome {
    Applied,
    Skipped,
}

enum RecoveryOutcome {
    Progressed,
    Completed,
    Failed,
    Unchanged,
}

/// Decay and recovery lifecycle over a shared process store.
pub struct LifecycleService {
    store: Arc<dyn ProcessStore>,
    decay: Arc<dyn DecayCalculator>,
    recovery: Arc<dyn RecoveryCalculator>,
    reputation: Arc<dyn ReputationSystem>,
    config: ServiceConfig,
    locks: CharacterLocks,
    metrics: ServiceMetrics,
}

impl LifecycleService {
    /// Service using the standard decay and recovery engines.
    pub fn new(
        store: Arc<dyn ProcessStore>,
        reputation: Arc<dyn ReputationSystem>,
        config: ServiceConfig,
    ) -> Self {
        let decay = Arc::new(DecayEngine::with_cadence(config.decay_cadence()));
        Self::with_calculators(store, decay, Arc::new(RecoveryEngine::new()), reputation, config)
    }

    pub fn with_calculators(
        store: Arc<dyn ProcessStore>,
        decay: Arc<dyn DecayCalculator>,
        recovery: Arc<dyn RecoveryCalculator>,
        reputation: Arc<dyn ReputationSystem>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            store,
            decay,
            recovery,
            reputation,
            config,
            locks: CharacterLocks::new(),
            metrics: ServiceMetrics::new(),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ProcessStore> {
        &self.store
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Drop per-character lock entries nobody holds.
    pub fn prune_locks(&self) {
        self.locks.prune();
    }

    // ------------------------------------------------------------------
    // Decay
    // ------------------------------------------------------------------

    /// Claim a batch of due decay tracks and apply each one independently.
    ///
    /// A failing record is logged and counted; it never stops the batch. If
    /// the sweep budget runs out, the remaining claims are released for the
    /// next sweep.
    pub async fn process_reputation_decay(&self, now: DateTime<Utc>) -> Result<SweepReport, ReputeError> {
        self.observe(self.sweep(now)).await
    }

    async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, ReputeError> {
        let started = Instant::now();
        let budget = self.config.sweep_budget();
        let lease_until = now + self.config.claim_lease();
        let claimed = self
            .store
            .claim_due_decays(now, lease_until, self.config.decay_batch_size)?;

        let mut report = SweepReport {
            claimed: claimed.len(),
            ..SweepReport::default()
        };

        let mut pushes = JoinSet::new();
        let mut pending = claimed.into_iter();
        while let Some(record) = pending.next() {
            if started.elapsed() >= budget {
                let rest: Vec<ReputationDecay> = std::iter::once(record).chain(pending.by_ref()).collect();
                report.deferred = rest.len();
                for r in &rest {
                    if let Err(e) = self.store.release_decay_claim(&r.id) {
                        warn!(decay_id = %r.id, error = %e, "failed to release decay claim");
                    }
                }
                warn!(deferred = report.deferred, "sweep budget exhausted; releasing remaining claims");
                break;
            }

            let id = record.id.clone();
            match self.apply_decay(record, now, &mut pushes).await {
                Ok(DecayOutcome::Applied) => report.processed += 1,
                Ok(DecayOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(decay_id = %id, error = %e, "failed to process decay record");
                }
            }
        }
        drain_pushes(&mut pushes).await;

        if report.claimed > 0 {
            info!(
                instance_id = %self.config.instance_id,
                claimed = report.claimed,
                processed = report.processed,
                skipped = report.skipped,
                failed = report.failed,
                deferred = report.deferred,
                "decay sweep finished"
            );
        }
        Ok(report)
    }

    async fn apply_decay(
        &self,
        claimed: ReputationDecay,
        now: DateTime<Utc>,
        pushes: &mut JoinSet<()>,
    ) -> Result<DecayOutcome, ReputeError> {
        let _guard = self.locks.lock(&claimed.character_id).await;

        // Reload under the lock so a concurrent activity refresh is not lost.
        let mut record = self
            .store
            .get_decay(&claimed.id)?
            .unwrap_or(claimed);
        let config = self.decay_config(&record.faction_id)?;
        let delta = self
            .decay
            .calculate_decay(record.current_value, record.last_activity, now, Some(&config))?;

        if delta >= 0.0 {
            debug!(
                character_id = %record.character_id,
                faction_id = %record.faction_id,
                "nothing to decay yet"
            );
            return Ok(DecayOutcome::Skipped);
        }

        let old_value = record.current_value;
        self.decay
            .update_decay_process(&mut record, delta, now, config.min_reputation);
        self.store.update_decay(&record)?;
        self.spawn_push(pushes, &record.character_id, &record.faction_id, record.current_value);

        let event = ReputationEvent::new(
            &record.character_id,
            &record.faction_id,
            ReputationEventType::Decay,
            old_value,
            record.current_value,
            "Natural reputation decay due to inactivity",
            DECAY_SOURCE,
            now,
        )
        .with_meta("decay_rate", config.base_decay_rate)
        .with_meta("time_since_last", (now - record.last_activity).num_seconds())
        .with_meta("instance_id", self.config.instance_id.as_str());
        self.log_event(&event);

        debug!(
            character_id = %record.character_id,
            faction_id = %record.faction_id,
            delta = record.current_value - old_value,
            "decay applied"
        );
        Ok(DecayOutcome::Applied)
    }

    /// Note faction-relevant activity, creating the decay track if needed.
    ///
    /// A new track starts at the authoritative store's current value.
    pub async fn record_faction_activity(
        &self,
        character_id: &str,
        faction_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ReputationDecay, ReputeError> {
        self.observe(self.touch_activity(character_id, faction_id, now)).await
    }

    async fn touch_activity(
        &self,
        character_id: &str,
        faction_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ReputationDecay, ReputeError> {
        let _guard = self.locks.lock(character_id).await;
        match self.store.find_decay(character_id, faction_id)? {
            Some(mut track) => {
                track.last_activity = now;
                track.updated_at = now;
                self.store.update_decay(&track)?;
                debug!(character_id, faction_id, "activity recorded");
                Ok(track)
            }
            None => {
                let config = self.decay_config(faction_id)?;
                let value = self.fetch_current_value(character_id, faction_id).await?;
                let mut track = ReputationDecay::new(character_id, faction_id, value, config.base_decay_rate, now);
                track.next_decay_time = now + self.config.decay_cadence();
                self.store.insert_decay(&track)?;
                info!(character_id, faction_id, value, "decay track created");
                Ok(track)
            }
        }
    }

    // ------------------------------------------------------------------
    // Recovery
    // ------------------------------------------------------------------

    /// Open a recovery attempt for `character_id` with `faction_id`.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::RecoveryInProgress`] if a non-terminal attempt exists for the pair
    /// - [`ValidationError::TargetNotAboveStart`] and friends for malformed requests
    /// - [`ConfigurationError::MissingRecoveryConfig`] if `method` has no config
    /// - [`ExternalPushError`] if the current standing cannot be read
    pub async fn start_reputation_recovery(
        &self,
        character_id: &str,
        faction_id: &str,
        method: RecoveryMethod,
        target_value: f64,
        now: DateTime<Utc>,
    ) -> Result<ReputationRecovery, ReputeError> {
        self.observe(self.start_recovery(character_id, faction_id, method, target_value, now))
            .await
    }

    async fn start_recovery(
        &self,
        character_id: &str,
        faction_id: &str,
        method: RecoveryMethod,
        target_value: f64,
        now: DateTime<Utc>,
    ) -> Result<ReputationRecovery, ReputeError> {
        if !target_value.is_finite() {
            return Err(ValidationError::NonFinite("target_value").into());
        }
        let _guard = self.locks.lock(character_id).await;

        if let Some(existing) = self
            .store
            .recoveries_for_character(character_id)?
            .into_iter()
            .find(|r| r.faction_id == faction_id && !r.status.is_terminal())
        {
            return Err(ValidationError::RecoveryInProgress(existing.id).into());
        }

        let config = self.recovery_config(method)?;
        let start_value = self.fetch_current_value(character_id, faction_id).await?;
        let duration = self
            .recovery
            .estimate_recovery_duration(start_value, target_value, &config);
        let cost = self
            .recovery
            .calculate_recovery_cost(start_value, target_value, &config);

        let mut record = ReputationRecovery::pending(
            character_id,
            faction_id,
            method,
            start_value,
            target_value,
            duration,
            cost,
            now,
        );
        self.recovery.validate_recovery_request(&record, &config)?;

        self.store.insert_recovery(&record)?;
        record.transition(RecoveryStatus::Active, now)?;
        self.store.update_recovery(&mut record)?;

        let event = ReputationEvent::new(
            character_id,
            faction_id,
            ReputationEventType::RecoveryStarted,
            start_value,
            start_value,
            "Reputation recovery started",
            RECOVERY_SOURCE,
            now,
        )
        .with_meta("recovery_id", record.id.as_str())
        .with_meta("method", method.as_str())
        .with_meta("target_value", target_value)
        .with_meta("estimated_end", record.estimated_end.to_rfc3339())
        .with_meta("cost", record.cost.amount);
        self.log_event(&event);

        info!(
            character_id,
            faction_id,
            process_id = %record.id,
            method = %method,
            start_value,
            target_value,
            "recovery started"
        );
        Ok(record)
    }

    /// Advance every active recovery of `character_id` to `now`.
    ///
    /// Completed, failed, and cancelled attempts are never touched again.
    pub async fn process_reputation_recovery(
        &self,
        character_id: &str,
        now: DateTime<Utc>,
    ) -> Result<RecoveryReport, ReputeError> {
        self.observe(self.advance_character(character_id, now)).await
    }

    async fn advance_character(&self, character_id: &str, now: DateTime<Utc>) -> Result<RecoveryReport, ReputeError> {
        let _guard = self.locks.lock(character_id).await;
        let active = self.store.active_recoveries(character_id)?;
        let mut report = RecoveryReport {
            examined: active.len(),
            ..RecoveryReport::default()
        };

        let mut pushes = JoinSet::new();
        for record in active {
            let id = record.id.clone();
            match self.advance_recovery(record, now, &mut pushes).await {
                Ok(RecoveryOutcome::Progressed) => report.progressed += 1,
                Ok(RecoveryOutcome::Completed) => report.completed += 1,
                Ok(RecoveryOutcome::Failed) => report.failed += 1,
                Ok(RecoveryOutcome::Unchanged) => report.unchanged += 1,
                Err(e) => {
                    report.errors += 1;
                    error!(character_id, process_id = %id, error = %e, "failed to process recovery");
                }
            }
        }
        drain_pushes(&mut pushes).await;
        Ok(report)
    }

    async fn advance_recovery(
        &self,
        mut record: ReputationRecovery,
        now: DateTime<Utc>,
        pushes: &mut JoinSet<()>,
    ) -> Result<RecoveryOutcome, ReputeError> {
        if let Some(reason) = unusable_reason(&record) {
            let value = record.current_value;
            record.transition(RecoveryStatus::Failed, now)?;
            record
                .metadata
                .insert("failure_reason".into(), reason.clone().into());
            self.store.update_recovery(&mut record)?;
            let event = ReputationEvent::new(
                &record.character_id,
                &record.faction_id,
                ReputationEventType::RecoveryFailed,
                value,
                value,
                format!("Reputation recovery failed: {reason}"),
                RECOVERY_SOURCE,
                now,
            )
            .with_meta("recovery_id", record.id.as_str());
            self.log_event(&event);
            warn!(process_id = %record.id, reason = %reason, "recovery failed");
            return Ok(RecoveryOutcome::Failed);
        }

        let old_value = record.current_value;
        let progress = self.recovery.calculate_recovery_progress(&record, now);

        if progress >= 1.0 {
            record.current_value = record.target_value;
            record.progress = 1.0;
            record.transition(RecoveryStatus::Completed, now)?;
            self.store.update_recovery(&mut record)?;
            self.spawn_push(pushes, &record.character_id, &record.faction_id, record.current_value);
            self.sync_decay_track(&record, now);

            let event = ReputationEvent::new(
                &record.character_id,
                &record.faction_id,
                ReputationEventType::RecoveryCompleted,
                old_value,
                record.current_value,
                "Reputation recovery completed successfully",
                RECOVERY_SOURCE,
                now,
            )
            .with_meta("recovery_id", record.id.as_str())
            .with_meta("method", record.method.as_str())
            .with_meta("duration", (now - record.start_time).num_seconds())
            .with_meta("actual_end", now.to_rfc3339())
            .with_meta("estimated_end", record.estimated_end.to_rfc3339());
            self.log_event(&event);

            info!(
                character_id = %record.character_id,
                faction_id = %record.faction_id,
                process_id = %record.id,
                "recovery completed"
            );
            return Ok(RecoveryOutcome::Completed);
        }

        let value = self.recovery.calculate_recovery_value(&record, progress);
        if progress <= record.progress && value == old_value {
            return Ok(RecoveryOutcome::Unchanged);
        }

        record.current_value = value;
        record.progress = progress;
        record.updated_at = now;
        self.store.update_recovery(&mut record)?;

        if value != old_value {
            self.spawn_push(pushes, &record.character_id, &record.faction_id, value);
            self.sync_decay_track(&record, now);
            let event = ReputationEvent::new(
                &record.character_id,
                &record.faction_id,
                ReputationEventType::Recovery,
                old_value,
                value,
                "Reputation recovery progress",
                RECOVERY_SOURCE,
                now,
            )
            .with_meta("recovery_id", record.id.as_str())
            .with_meta("method", record.method.as_str())
            .with_meta("progress", progress);
            self.log_event(&event);
        }
        Ok(RecoveryOutcome::Progressed)
    }

    /// Freeze an active recovery.
    pub async fn pause_recovery(&self, recovery_id: &str, now: DateTime<Utc>) -> Result<ReputationRecovery, ReputeError> {
        self.observe(self.admin_transition(recovery_id, RecoveryStatus::Paused, now))
            .await
    }

    /// Continue a paused recovery; its window moves forward by the time spent paused.
    pub async fn resume_recovery(&self, recovery_id: &str, now: DateTime<Utc>) -> Result<ReputationRecovery, ReputeError> {
        self.observe(self.admin_transition(recovery_id, RecoveryStatus::Active, now))
            .await
    }

    /// Abandon a pending or active recovery.
    pub async fn cancel_recovery(&self, recovery_id: &str, now: DateTime<Utc>) -> Result<ReputationRecovery, ReputeError> {
        self.observe(self.admin_transition(recovery_id, RecoveryStatus::Cancelled, now))
            .await
    }

    async fn admin_transition(
        &self,
        recovery_id: &str,
        to: RecoveryStatus,
        now: DateTime<Utc>,
    ) -> Result<ReputationRecovery, ReputeError> {
        let character_id = self
            .store
            .get_recovery(recovery_id)?
            .ok_or_else(|| ValidationError::RecoveryNotFound(recovery_id.to_string()))?
            .character_id;
        let _guard = self.locks.lock(&character_id).await;

        let mut record = self
            .store
            .get_recovery(recovery_id)?
            .ok_or_else(|| ValidationError::RecoveryNotFound(recovery_id.to_string()))?;
        let from = record.status;
        record.transition(to, now)?;

        let event_type = match to {
            RecoveryStatus::Paused => {
                record.paused_at = Some(now);
                ReputationEventType::RecoveryPaused
            }
            RecoveryStatus::Active => {
                if let Some(paused_at) = record.paused_at.take() {
                    let shift = now - paused_at;
                    record.start_time += shift;
                    record.estimated_end += shift;
                }
                ReputationEventType::RecoveryResumed
            }
            _ => ReputationEventType::RecoveryCancelled,
        };
        self.store.update_recovery(&mut record)?;

        let event = ReputationEvent::new(
            &record.character_id,
            &record.faction_id,
            event_type,
            record.current_value,
            record.current_value,
            format!("Reputation recovery {from} -> {to}"),
            ADMIN_SOURCE,
            now,
        )
        .with_meta("recovery_id", record.id.as_str())
        .with_meta("progress", record.progress);
        self.log_event(&event);

        info!(process_id = %record.id, from = %from, to = %to, "recovery status changed");
        Ok(record)
    }

    /// Active recovery attempts of `character_id`.
    pub async fn get_active_recovery_processes(&self, character_id: &str) -> Result<Vec<ReputationRecovery>, ReputeError> {
        self.observe(async { self.store.active_recoveries(character_id).map_err(ReputeError::from) })
            .await
    }

    /// Every recovery attempt of `character_id`, oldest first.
    pub fn list_recoveries(&self, character_id: &str) -> Result<Vec<ReputationRecovery>, ReputeError> {
        Ok(self.store.recoveries_for_character(character_id)?)
    }

    // ------------------------------------------------------------------
    // Health and configuration
    // ------------------------------------------------------------------

    pub fn get_system_health(&self, now: DateTime<Utc>) -> Result<SystemHealth, ReputeError> {
        let snap = self.metrics.snapshot();
        Ok(SystemHealth {
            active_decay_processes: self.store.count_active_decays()?,
            active_recovery_processes: self.store.count_active_recoveries()?,
            total_requests: snap.total_requests,
            successful_ops: snap.successful_ops,
            failed_ops: snap.failed_ops,
            average_response_time_ms: snap.average_response_time_ms,
            error_rate: snap.error_rate(),
            health_score: snap.health_score(),
            last_health_check: now,
        })
    }

    pub fn set_decay_config(&self, config: &DecayConfig) -> Result<(), ReputeError> {
        config.validate()?;
        self.store.put_decay_config(config)?;
        info!(faction_id = %config.faction_id, "decay config updated");
        Ok(())
    }

    pub fn set_recovery_config(&self, config: &RecoveryConfig) -> Result<(), ReputeError> {
        config.validate()?;
        self.store.put_recovery_config(config)?;
        info!(method = %config.method, "recovery config updated");
        Ok(())
    }

    pub fn events_for_character(&self, character_id: &str) -> Result<Vec<ReputationEvent>, ReputeError> {
        Ok(self.store.events_for_character(character_id)?)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    async fn observe<T, F>(&self, op: F) -> Result<T, ReputeError>
    where
        F: Future<Output = Result<T, ReputeError>>,
    {
        let started = Instant::now();
        let result = op.await;
        self.metrics.record(result.is_ok(), started.elapsed());
        result
    }

    fn decay_config(&self, faction_id: &str) -> Result<DecayConfig, ReputeError> {
        self.store
            .decay_config(faction_id)?
            .ok_or_else(|| ConfigurationError::MissingDecayConfig(faction_id.to_string()).into())
    }

    fn recovery_config(&self, method: RecoveryMethod) -> Result<RecoveryConfig, ReputeError> {
        let config = self
            .store
            .recovery_config(method)?
            .ok_or(ConfigurationError::MissingRecoveryConfig(method))?;
        config.validate()?;
        Ok(config)
    }

    async fn fetch_current_value(&self, character_id: &str, faction_id: &str) -> Result<f64, ReputeError> {
        let timeout = self.config.push_timeout();
        match tokio::time::timeout(timeout, self.reputation.current_value(character_id, faction_id)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ExternalPushError::Timeout(self.config.push_timeout_ms).into()),
        }
    }

    /// Queue a best-effort push onto `pushes`.
    fn spawn_push(&self, pushes: &mut JoinSet<()>, character_id: &str, faction_id: &str, value: f64) {
        pushes.spawn(push_bounded(
            Arc::clone(&self.reputation),
            character_id.to_string(),
            faction_id.to_string(),
            value,
            self.config.push_timeout_ms,
        ));
    }

    fn log_event(&self, event: &ReputationEvent) {
        if let Err(e) = self.store.append_event(event) {
            error!(
                character_id = %event.character_id,
                event_type = %event.event_type,
                error = %e,
                "failed to append reputation event"
            );
        }
    }

    /// Keep the decay track's standing in line with recovery gains.
    fn sync_decay_track(&self, record: &ReputationRecovery, now: DateTime<Utc>) {
        let result = self
            .store
            .find_decay(&record.character_id, &record.faction_id)
            .and_then(|track| match track {
                Some(mut track) if track.processing_until.is_none_or(|u| u <= now) => {
                    track.current_value = record.current_value;
                    track.is_active = true;
                    track.updated_at = now;
                    self.store.update_decay(&track)
                }
                _ => Ok(()),
            });
        if let Err(e) = result {
            warn!(process_id = %record.id, error = %e, "failed to sync decay track");
        }
    }
}

/// Push `value` within `timeout_ms`; failures are logged and swallowed.
async fn push_bounded(
    reputation: Arc<dyn ReputationSystem>,
    character_id: String,
    faction_id: String,
    value: f64,
    timeout_ms: u64,
) {
    let call = reputation.push_value(&character_id, &faction_id, value);
    let result = match tokio::time::timeout(Duration::from_millis(timeout_ms), call).await {
        Ok(result) => result,
        Err(_) => Err(ExternalPushError::Timeout(timeout_ms)),
    };
    if let Err(e) = result {
        warn!(%character_id, %faction_id, value, error = %e, "failed to push reputation value");
    }
}

async fn drain_pushes(pushes: &mut JoinSet<()>) {
    while let Some(joined) = pushes.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "push task ended abnormally");
        }
    }
}

/// Why a stored recovery cannot be advanced, if it cannot.
fn unusable_reason(record: &ReputationRecovery) -> Option<String> {
    if !record.start_value.is_finite() || !record.target_value.is_finite() {
        return Some("non-finite start or target".into());
    }
    if record.target_value <= record.start_value {
        return Some(format!(
            "target {} does not exceed start {}",
            record.target_value, record.start_value
        ));
    }
    None
}
