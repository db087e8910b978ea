//! Periodic driver for decay sweeps and recovery progress.
//!
//! One tick runs a decay sweep, then advances the active recoveries of a
//! bounded batch of characters, then prunes idle lock entries. The first
//! tick runs immediately on start.
//!
//! The recovery batch walks characters in id order from where the previous
//! tick stopped and wraps around at the end, so every character with an
//! active recovery is reached within `ceil(n / recovery_batch_size)` ticks.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use repute_core::error::PersistenceError;

use crate::config::ServiceConfig;
use crate::service::{LifecycleService, RecoveryReport, SweepReport};

/// What one scheduler tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub sweep: SweepReport,
    pub characters: usize,
    pub recovery: RecoveryReport,
}

pub struct SweepScheduler {
    service: Arc<LifecycleService>,
    interval: Duration,
    recovery_enabled: bool,
    recovery_batch: usize,
    /// Last character advanced by the previous tick.
    cursor: Mutex<Option<String>>,
}

/// Handle to a running scheduler.
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal shutdown and wait for the in-flight tick to finish.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "scheduler task ended abnormally");
        }
    }
}

impl SweepScheduler {
    pub fn new(service: Arc<LifecycleService>, config: &ServiceConfig) -> Self {
        Self {
            service,
            interval: config.sweep_interval(),
            recovery_enabled: config.recovery_driver_enabled,
            recovery_batch: config.recovery_batch_size,
            cursor: Mutex::new(None),
        }
    }

    /// Next batch of characters with active recoveries, resuming after the
    /// cursor and wrapping to the start when the tail runs short.
    fn next_recovery_batch(&self) -> Result<Vec<String>, PersistenceError> {
        let store = self.service.store();
        let mut cursor = self.cursor.lock();
        let mut batch = store.characters_with_active_recoveries(cursor.as_deref(), self.recovery_batch)?;
        if batch.len() < self.recovery_batch && cursor.is_some() {
            let head = store.characters_with_active_recoveries(None, self.recovery_batch - batch.len())?;
            for character_id in head {
                if !batch.contains(&character_id) {
                    batch.push(character_id);
                }
            }
        }
        *cursor = batch.last().cloned();
        Ok(batch)
    }

    /// Run one tick as of `now`. Errors are logged, never returned.
    pub async fn run_at(&self, now: DateTime<Utc>) -> CycleReport {
        let mut report = CycleReport::default();

        match self.service.process_reputation_decay(now).await {
            Ok(sweep) => report.sweep = sweep,
            Err(e) => error!(error = %e, "decay sweep failed"),
        }

        if self.recovery_enabled {
            match self.next_recovery_batch() {
                Ok(characters) => {
                    report.characters = characters.len();
                    for character_id in characters {
                        match self.service.process_reputation_recovery(&character_id, now).await {
                            Ok(r) => report.recovery.merge(r),
                            Err(e) => warn!(%character_id, error = %e, "recovery pass failed"),
                        }
                    }
                }
                Err(e) => error!(error = %e, "failed to list characters with active recoveries"),
            }
        }

        self.service.prune_locks();
        report
    }

    /// Spawn the periodic loop.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            info!(
                interval_secs = self.interval.as_secs(),
                recovery_enabled = self.recovery_enabled,
                "starting sweep scheduler"
            );

            // Run immediately on startup
            self.run_at(Utc::now()).await;

            let mut timer = tokio::time::interval(self.interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            timer.tick().await;

            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        self.run_at(Utc::now()).await;
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            info!("sweep scheduler shutting down");
                            break;
                        }
                    }
                }
            }
        });

        SchedulerHandle { shutdown_tx, task }
    }
}
