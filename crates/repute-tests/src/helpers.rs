//! Shared fixtures for scenario and property tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use repute_core::error::ExternalPushError;
use repute_core::store::{MemoryStore, ProcessStore};
use repute_core::traits::ReputationSystem;
use repute_core::types::ReputationDecay;
use repute_node_lib::{LifecycleService, ServiceConfig};

/// Fixed reference instant.
pub fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

/// Authoritative reputation store with switchable failures.
///
/// Reads answer the last pushed value (0 for unknown pairs). Every push is
/// recorded, including rejected ones.
#[derive(Default)]
pub struct ScriptedReputation {
    values: Mutex<HashMap<(String, String), f64>>,
    pushes: Mutex<Vec<(String, String, f64)>>,
    fail_pushes: AtomicBool,
    fail_reads: AtomicBool,
}

impl ScriptedReputation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, character_id: &str, faction_id: &str, value: f64) {
        self.values
            .lock()
            .insert((character_id.to_string(), faction_id.to_string()), value);
    }

    pub fn fail_pushes(&self, fail: bool) {
        self.fail_pushes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn pushes(&self) -> Vec<(String, String, f64)> {
        self.pushes.lock().clone()
    }

    pub fn value(&self, character_id: &str, faction_id: &str) -> Option<f64> {
        self.values
            .lock()
            .get(&(character_id.to_string(), faction_id.to_string()))
            .copied()
    }
}

#[async_trait]
impl ReputationSystem for ScriptedReputation {
    async fn current_value(&self, character_id: &str, faction_id: &str) -> Result<f64, ExternalPushError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(ExternalPushError::Transport("scripted read failure".into()));
        }
        Ok(self.value(character_id, faction_id).unwrap_or(0.0))
    }

    async fn push_value(
        &self,
        character_id: &str,
        faction_id: &str,
        new_value: f64,
    ) -> Result<(), ExternalPushError> {
        self.pushes
            .lock()
            .push((character_id.to_string(), faction_id.to_string(), new_value));
        if self.fail_pushes.load(Ordering::SeqCst) {
            return Err(ExternalPushError::Rejected {
                status: 503,
                body: "scripted push failure".into(),
            });
        }
        self.set(character_id, faction_id, new_value);
        Ok(())
    }
}

/// In-memory store with default configs, plus a service over it.
pub fn memory_service(
    config: ServiceConfig,
) -> (Arc<MemoryStore>, Arc<ScriptedReputation>, Arc<LifecycleService>) {
    let store = Arc::new(MemoryStore::new());
    store.seed_default_configs().unwrap();
    let reputation = Arc::new(ScriptedReputation::new());
    let service = Arc::new(LifecycleService::new(store.clone(), reputation.clone(), config));
    (store, reputation, service)
}

/// Insert a track due at [`t0`] whose last activity was `idle` ago.
pub fn idle_track(
    store: &dyn ProcessStore,
    character_id: &str,
    faction_id: &str,
    value: f64,
    idle: Duration,
) -> ReputationDecay {
    let mut d = ReputationDecay::new(character_id, faction_id, value, 1.0, t0());
    d.last_activity = t0() - idle;
    d.next_decay_time = t0();
    store.insert_decay(&d).unwrap();
    d
}
