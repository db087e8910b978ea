//! Persistence interface for decay tracks, recoveries, events, and configs.
//!
//! [`ProcessStore`] is shared between the sweep, the recovery driver, and
//! request handlers, so every method takes `&self` and implementations
//! provide their own interior locking. Two guarantees matter to callers:
//!
//! - [`claim_due_decays`](ProcessStore::claim_due_decays) selects and stamps
//!   records atomically, so concurrent sweeps never receive the same record
//!   while its lease is live.
//! - [`update_recovery`](ProcessStore::update_recovery) is an optimistic
//!   compare-and-swap on `version`.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::constants::WILDCARD_FACTION;
use crate::error::PersistenceError;
use crate::types::{
    DecayConfig, RecoveryConfig, RecoveryMethod, RecoveryStatus, ReputationDecay, ReputationEvent,
    ReputationRecovery,
};

/// Storage for everything the lifecycle service reads and writes.
pub trait ProcessStore: Send + Sync {
    // --- Decay tracks ---

    /// Insert a new track.
    ///
    /// # Errors
    ///
    /// - [`PersistenceError::Duplicate`] if the (character, faction) pair already has one
    fn insert_decay(&self, record: &ReputationDecay) -> Result<(), PersistenceError>;

    fn get_decay(&self, id: &str) -> Result<Option<ReputationDecay>, PersistenceError>;

    fn find_decay(
        &self,
        character_id: &str,
        faction_id: &str,
    ) -> Result<Option<ReputationDecay>, PersistenceError>;

    /// Claim up to `limit` active records due at `now`, oldest-due first.
    ///
    /// Records already claimed with a lease ending after `now` are skipped.
    /// Returned records carry `processing_until = lease_until`.
    fn claim_due_decays(
        &self,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ReputationDecay>, PersistenceError>;

    /// Overwrite a track and clear its claim.
    fn update_decay(&self, record: &ReputationDecay) -> Result<(), PersistenceError>;

    /// Drop the claim on a track without touching anything else.
    fn release_decay_claim(&self, id: &str) -> Result<(), PersistenceError>;

    fn count_active_decays(&self) -> Result<u64, PersistenceError>;

    // --- Recoveries ---

    fn insert_recovery(&self, record: &ReputationRecovery) -> Result<(), PersistenceError>;

    fn get_recovery(&self, id: &str) -> Result<Option<ReputationRecovery>, PersistenceError>;

    /// Write `record` if the stored version still equals `record.version`,
    /// then bump `record.version`.
    ///
    /// # Errors
    ///
    /// - [`PersistenceError::VersionConflict`] if another writer got there first
    /// - [`PersistenceError::NotFound`] if the record was never inserted
    fn update_recovery(&self, record: &mut ReputationRecovery) -> Result<(), PersistenceError>;

    /// Recoveries of `character_id` currently in `active`.
    fn active_recoveries(&self, character_id: &str) -> Result<Vec<ReputationRecovery>, PersistenceError> {
        Ok(self
            .recoveries_for_character(character_id)?
            .into_iter()
            .filter(|r| r.status == RecoveryStatus::Active)
            .collect())
    }

    /// Every recovery of `character_id`, oldest first.
    fn recoveries_for_character(&self, character_id: &str) -> Result<Vec<ReputationRecovery>, PersistenceError>;

    /// Distinct characters with at least one active recovery, in id order,
    /// starting strictly after `after` when given.
    fn characters_with_active_recoveries(
        &self,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<String>, PersistenceError>;

    fn count_active_recoveries(&self) -> Result<u64, PersistenceError>;

    // --- Event log ---

    fn append_event(&self, event: &ReputationEvent) -> Result<(), PersistenceError>;

    /// Events of `character_id` in timestamp order.
    fn events_for_character(&self, character_id: &str) -> Result<Vec<ReputationEvent>, PersistenceError>;

    // --- Configuration ---

    /// Config stored under exactly `faction_id`.
    fn decay_config_exact(&self, faction_id: &str) -> Result<Option<DecayConfig>, PersistenceError>;

    /// Config for `faction_id`, falling back to the wildcard entry.
    fn decay_config(&self, faction_id: &str) -> Result<Option<DecayConfig>, PersistenceError> {
        match self.decay_config_exact(faction_id)? {
            Some(cfg) => Ok(Some(cfg)),
            None => self.decay_config_exact(WILDCARD_FACTION),
        }
    }

    fn put_decay_config(&self, config: &DecayConfig) -> Result<(), PersistenceError>;

    fn recovery_config(&self, method: RecoveryMethod) -> Result<Option<RecoveryConfig>, PersistenceError>;

    fn put_recovery_config(&self, config: &RecoveryConfig) -> Result<(), PersistenceError>;

    /// Store default configs wherever none exist. Returns how many were written.
    fn seed_default_configs(&self) -> Result<usize, PersistenceError> {
        let mut seeded = 0;
        if self.decay_config_exact(WILDCARD_FACTION)?.is_none() {
            self.put_decay_config(&DecayConfig::default())?;
            seeded += 1;
        }
        for method in RecoveryMethod::ALL {
            if self.recovery_config(method)?.is_none() {
                self.put_recovery_config(&RecoveryConfig::defaults_for(method))?;
                seeded += 1;
            }
        }
        Ok(seeded)
    }
}

#[derive(Default)]
struct MemoryInner {
    decays: HashMap<String, ReputationDecay>,
    recoveries: HashMap<String, ReputationRecovery>,
    events: Vec<ReputationEvent>,
    decay_configs: HashMap<String, DecayConfig>,
    recovery_configs: HashMap<RecoveryMethod, RecoveryConfig>,
    poisoned: HashSet<String>,
}

impl MemoryInner {
    fn check_poison(&self, id: &str) -> Result<(), PersistenceError> {
        if self.poisoned.contains(id) {
            return Err(PersistenceError::Backend(format!("write to {id} rejected")));
        }
        Ok(())
    }
}

/// In-memory process store for tests and dry runs.
///
/// Everything lives in `HashMap`s behind one `RwLock`; nothing survives a
/// restart.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later write to the record `id` fail with a backend error.
    pub fn poison(&self, id: &str) {
        self.inner.write().poisoned.insert(id.to_string());
    }

    pub fn event_count(&self) -> usize {
        self.inner.read().events.len()
    }
}

impl ProcessStore for MemoryStore {
    fn insert_decay(&self, record: &ReputationDecay) -> Result<(), PersistenceError> {
        let mut inner = self.inner.write();
        let clash = inner.decays.values().any(|d| {
            d.id == record.id
                || (d.character_id == record.character_id && d.faction_id == record.faction_id)
        });
        if clash {
            return Err(PersistenceError::Duplicate(format!(
                "decay {}/{}",
                record.character_id, record.faction_id
            )));
        }
        inner.decays.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn get_decay(&self, id: &str) -> Result<Option<ReputationDecay>, PersistenceError> {
        Ok(self.inner.read().decays.get(id).cloned())
    }

    fn find_decay(
        &self,
        character_id: &str,
        faction_id: &str,
    ) -> Result<Option<ReputationDecay>, PersistenceError> {
        Ok(self
            .inner
            .read()
            .decays
            .values()
            .find(|d| d.character_id == character_id && d.faction_id == faction_id)
            .cloned())
    }

    fn claim_due_decays(
        &self,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ReputationDecay>, PersistenceError> {
        let mut inner = self.inner.write();
        let mut due: Vec<(DateTime<Utc>, String)> = inner
            .decays
            .values()
            .filter(|d| d.is_claimable(now))
            .map(|d| (d.next_decay_time, d.id.clone()))
            .collect();
        due.sort();
        due.truncate(limit);

        let mut claimed = Vec::with_capacity(due.len());
        for (_, id) in due {
            if let Some(record) = inner.decays.get_mut(&id) {
                record.processing_until = Some(lease_until);
                claimed.push(record.clone());
            }
        }
        Ok(claimed)
    }

    fn update_decay(&self, record: &ReputationDecay) -> Result<(), PersistenceError> {
        let mut inner = self.inner.write();
        inner.check_poison(&record.id)?;
        let slot = inner
            .decays
            .get_mut(&record.id)
            .ok_or_else(|| PersistenceError::NotFound(record.id.clone()))?;
        *slot = ReputationDecay {
            processing_until: None,
            ..record.clone()
        };
        Ok(())
    }

    fn release_decay_claim(&self, id: &str) -> Result<(), PersistenceError> {
        let mut inner = self.inner.write();
        let slot = inner
            .decays
            .get_mut(id)
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))?;
        slot.processing_until = None;
        Ok(())
    }

    fn count_active_decays(&self) -> Result<u64, PersistenceError> {
        Ok(self.inner.read().decays.values().filter(|d| d.is_active).count() as u64)
    }

    fn insert_recovery(&self, record: &ReputationRecovery) -> Result<(), PersistenceError> {
        let mut inner = self.inner.write();
        inner.check_poison(&record.id)?;
        if inner.recoveries.contains_key(&record.id) {
            return Err(PersistenceError::Duplicate(record.id.clone()));
        }
        inner.recoveries.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn get_recovery(&self, id: &str) -> Result<Option<ReputationRecovery>, PersistenceError> {
        Ok(self.inner.read().recoveries.get(id).cloned())
    }

    fn update_recovery(&self, record: &mut ReputationRecovery) -> Result<(), PersistenceError> {
        let mut inner = self.inner.write();
        inner.check_poison(&record.id)?;
        let slot = inner
            .recoveries
            .get_mut(&record.id)
            .ok_or_else(|| PersistenceError::NotFound(record.id.clone()))?;
        if slot.version != record.version {
            return Err(PersistenceError::VersionConflict {
                id: record.id.clone(),
                expected: record.version,
                found: slot.version,
            });
        }
        record.version += 1;
        *slot = record.clone();
        Ok(())
    }

    fn recoveries_for_character(&self, character_id: &str) -> Result<Vec<ReputationRecovery>, PersistenceError> {
        let mut found: Vec<ReputationRecovery> = self
            .inner
            .read()
            .recoveries
            .values()
            .filter(|r| r.character_id == character_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(found)
    }

    fn characters_with_active_recoveries(
        &self,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<String>, PersistenceError> {
        let inner = self.inner.read();
        let mut chars: Vec<String> = inner
            .recoveries
            .values()
            .filter(|r| r.status == RecoveryStatus::Active)
            .filter(|r| after.is_none_or(|a| r.character_id.as_str() > a))
            .map(|r| r.character_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        chars.sort();
        chars.truncate(limit);
        Ok(chars)
    }

    fn count_active_recoveries(&self) -> Result<u64, PersistenceError> {
        Ok(self
            .inner
            .read()
            .recoveries
            .values()
            .filter(|r| r.status == RecoveryStatus::Active)
            .count() as u64)
    }

    fn append_event(&self, event: &ReputationEvent) -> Result<(), PersistenceError> {
        self.inner.write().events.push(event.clone());
        Ok(())
    }

    fn events_for_character(&self, character_id: &str) -> Result<Vec<ReputationEvent>, PersistenceError> {
        let mut found: Vec<ReputationEvent> = self
            .inner
            .read()
            .events
            .iter()
            .filter(|e| e.character_id == character_id)
            .cloned()
            .collect();
        found.sort_by_key(|e| e.timestamp);
        Ok(found)
    }

    fn decay_config_exact(&self, faction_id: &str) -> Result<Option<DecayConfig>, PersistenceError> {
        Ok(self.inner.read().decay_configs.get(faction_id).cloned())
    }

    fn put_decay_config(&self, config: &DecayConfig) -> Result<(), PersistenceError> {
        self.inner
            .write()
            .decay_configs
            .insert(config.faction_id.clone(), config.clone());
        Ok(())
    }

    fn recovery_config(&self, method: RecoveryMethod) -> Result<Option<RecoveryConfig>, PersistenceError> {
        Ok(self.inner.read().recovery_configs.get(&method).cloned())
    }

    fn put_recovery_config(&self, config: &RecoveryConfig) -> Result<(), PersistenceError> {
        self.inner
            .write()
            .recovery_configs
            .insert(config.method, config.clone());
        Ok(())
    }
}
