//! RocksDB-backed process store.
//!
//! Implements [`ProcessStore`] using column families for decay tracks,
//! recoveries, the event log, configs, and the secondary indexes that make
//! sweeps and per-character lookups prefix scans instead of full scans.
//! Values are JSON. Multi-key mutations go through one [`WriteBatch`] and
//! read-modify-write sequences are serialised by a process-local mutex.
//!
//! Key layout:
//!
//! ```text
//! decays              id                                  -> ReputationDecay
//! decay_pairs         character 0x00 faction              -> id
//! decay_due           next_decay_time_be id               -> ()   (active only)
//! recoveries          id                                  -> ReputationRecovery
//! recovery_index      character 0x00 id                   -> ()
//! active_recoveries   character 0x00 id                   -> ()   (status = active)
//! events              character 0x00 timestamp_be id      -> ReputationEvent
//! decay_configs       faction                             -> DecayConfig
//! recovery_configs    method                              -> RecoveryConfig
//! meta                key                                 -> value
//! ```

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;

use repute_core::error::PersistenceError;
use repute_core::store::ProcessStore;
use repute_core::types::{
    DecayConfig, RecoveryConfig, RecoveryMethod, RecoveryStatus, ReputationDecay, ReputationEvent,
    ReputationRecovery,
};

// --- Column family names ---

const CF_DECAYS: &str = "decays";
const CF_DECAY_PAIRS: &str = "decay_pairs";
const CF_DECAY_DUE: &str = "decay_due";
const CF_RECOVERIES: &str = "recoveries";
const CF_RECOVERY_INDEX: &str = "recovery_index";
const CF_ACTIVE_RECOVERIES: &str = "active_recoveries";
const CF_EVENTS: &str = "events";
const CF_DECAY_CONFIGS: &str = "decay_configs";
const CF_RECOVERY_CONFIGS: &str = "recovery_configs";
const CF_META: &str = "meta";

const ALL_CFS: &[&str] = &[
    CF_DECAYS,
    CF_DECAY_PAIRS,
    CF_DECAY_DUE,
    CF_RECOVERIES,
    CF_RECOVERY_INDEX,
    CF_ACTIVE_RECOVERIES,
    CF_EVENTS,
    CF_DECAY_CONFIGS,
    CF_RECOVERY_CONFIGS,
    CF_META,
];

// --- Metadata keys ---

const META_SCHEMA_VERSION: &[u8] = b"schema_version";
const SCHEMA_VERSION: u32 = 1;

/// RocksDB-backed [`ProcessStore`].
pub struct RocksStore {
    db: DB,
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a store at `path`.
    ///
    /// Creates missing column families and stamps the schema version on a
    /// fresh database.
    ///
    /// # Errors
    ///
    /// - [`PersistenceError::Backend`] if RocksDB cannot open the path or the
    ///   stored schema version is not one this build understands
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&db_opts, path.as_ref(), cf_descriptors).map_err(backend)?;
        let store = Self {
            db,
            write_lock: Mutex::new(()),
        };
        store.check_schema()?;
        Ok(store)
    }

    /// Flush all in-memory buffers to disk.
    pub fn flush(&self) -> Result<(), PersistenceError> {
        self.db.flush().map_err(backend)
    }

    fn check_schema(&self) -> Result<(), PersistenceError> {
        let cf = self.cf_handle(CF_META)?;
        let expected = SCHEMA_VERSION.to_be_bytes();
        match self.db.get_cf(cf, META_SCHEMA_VERSION).map_err(backend)? {
            None => self.db.put_cf(cf, META_SCHEMA_VERSION, expected).map_err(backend),
            Some(found) if found.as_slice() == expected.as_slice() => Ok(()),
            Some(found) => Err(PersistenceError::Backend(format!(
                "unsupported schema version {found:?}, expected {SCHEMA_VERSION}"
            ))),
        }
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily, PersistenceError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| PersistenceError::Backend(format!("missing column family: {name}")))
    }

    fn get_json<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>, PersistenceError> {
        let cf = self.cf_handle(cf_name)?;
        match self.db.get_cf(cf, key).map_err(backend)? {
            Some(bytes) => Ok(Some(from_json(&bytes)?)),
            None => Ok(None),
        }
    }

    fn contains(&self, cf_name: &str, key: &[u8]) -> Result<bool, PersistenceError> {
        let cf = self.cf_handle(cf_name)?;
        Ok(self.db.get_pinned_cf(cf, key).map_err(backend)?.is_some())
    }

    /// All entries of `cf_name` whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>, PersistenceError> {
        let cf = self.cf_handle(cf_name)?;
        let mut out = Vec::new();
        for item in self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, value) = item.map_err(backend)?;
            if !key.starts_with(prefix) {
                break;
            }
            out.push((key, value));
        }
        Ok(out)
    }

    fn count_keys(&self, cf_name: &str) -> Result<u64, PersistenceError> {
        let cf = self.cf_handle(cf_name)?;
        let mut n = 0u64;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            item.map_err(backend)?;
            n += 1;
        }
        Ok(n)
    }

    /// Stage `new` plus its due-index entry, replacing `old`'s entry.
    fn stage_decay(
        &self,
        batch: &mut WriteBatch,
        old: Option<&ReputationDecay>,
        new: &ReputationDecay,
    ) -> Result<(), PersistenceError> {
        let decays = self.cf_handle(CF_DECAYS)?;
        let due = self.cf_handle(CF_DECAY_DUE)?;
        if let Some(old) = old.filter(|o| o.is_active) {
            batch.delete_cf(due, due_key(old.next_decay_time, &old.id));
        }
        if new.is_active {
            batch.put_cf(due, due_key(new.next_decay_time, &new.id), b"");
        }
        batch.put_cf(decays, new.id.as_bytes(), to_json(new)?);
        Ok(())
    }

    /// Stage `new` plus its active-index entry.
    fn stage_recovery(
        &self,
        batch: &mut WriteBatch,
        was_active: bool,
        new: &ReputationRecovery,
    ) -> Result<(), PersistenceError> {
        let recoveries = self.cf_handle(CF_RECOVERIES)?;
        let active = self.cf_handle(CF_ACTIVE_RECOVERIES)?;
        let index_key = character_key(&new.character_id, new.id.as_bytes());
        let is_active = new.status == RecoveryStatus::Active;
        if was_active && !is_active {
            batch.delete_cf(active, &index_key);
        } else if is_active {
            batch.put_cf(active, &index_key, b"");
        }
        batch.put_cf(recoveries, new.id.as_bytes(), to_json(new)?);
        Ok(())
    }
}

impl ProcessStore for RocksStore {
    fn insert_decay(&self, record: &ReputationDecay) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock();
        let pair = character_key(&record.character_id, record.faction_id.as_bytes());
        if self.contains(CF_DECAY_PAIRS, &pair)? || self.contains(CF_DECAYS, record.id.as_bytes())? {
            return Err(PersistenceError::Duplicate(format!(
                "decay {}/{}",
                record.character_id, record.faction_id
            )));
        }
        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf_handle(CF_DECAY_PAIRS)?, &pair, record.id.as_bytes());
        self.stage_decay(&mut batch, None, record)?;
        self.db.write(batch).map_err(backend)
    }

    fn get_decay(&self, id: &str) -> Result<Option<ReputationDecay>, PersistenceError> {
        self.get_json(CF_DECAYS, id.as_bytes())
    }

    fn find_decay(
        &self,
        character_id: &str,
        faction_id: &str,
    ) -> Result<Option<ReputationDecay>, PersistenceError> {
        let cf = self.cf_handle(CF_DECAY_PAIRS)?;
        let pair = character_key(character_id, faction_id.as_bytes());
        match self.db.get_cf(cf, pair).map_err(backend)? {
            Some(id) => self.get_json(CF_DECAYS, &id),
            None => Ok(None),
        }
    }

    fn claim_due_decays(
        &self,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ReputationDecay>, PersistenceError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let _guard = self.write_lock.lock();
        let due = self.cf_handle(CF_DECAY_DUE)?;
        let decays = self.cf_handle(CF_DECAYS)?;
        let now_bytes = ts_bytes(now);

        let mut claimed = Vec::new();
        let mut batch = WriteBatch::default();
        for item in self.db.iterator_cf(due, IteratorMode::Start) {
            let (key, _) = item.map_err(backend)?;
            if key.len() < 8 || key[..8] > now_bytes[..] {
                break;
            }
            let Some(mut record) = self.get_json::<ReputationDecay>(CF_DECAYS, &key[8..])? else {
                continue;
            };
            if !record.is_claimable(now) {
                continue;
            }
            record.processing_until = Some(lease_until);
            batch.put_cf(decays, record.id.as_bytes(), to_json(&record)?);
            claimed.push(record);
            if claimed.len() >= limit {
                break;
            }
        }
        self.db.write(batch).map_err(backend)?;
        Ok(claimed)
    }

    fn update_decay(&self, record: &ReputationDecay) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock();
        let old: ReputationDecay = self
            .get_json(CF_DECAYS, record.id.as_bytes())?
            .ok_or_else(|| PersistenceError::NotFound(record.id.clone()))?;
        let new = ReputationDecay {
            processing_until: None,
            ..record.clone()
        };
        let mut batch = WriteBatch::default();
        self.stage_decay(&mut batch, Some(&old), &new)?;
        self.db.write(batch).map_err(backend)
    }

    fn release_decay_claim(&self, id: &str) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock();
        let mut record: ReputationDecay = self
            .get_json(CF_DECAYS, id.as_bytes())?
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))?;
        record.processing_until = None;
        let cf = self.cf_handle(CF_DECAYS)?;
        self.db
            .put_cf(cf, id.as_bytes(), to_json(&record)?)
            .map_err(backend)
    }

    fn count_active_decays(&self) -> Result<u64, PersistenceError> {
        self.count_keys(CF_DECAY_DUE)
    }

    fn insert_recovery(&self, record: &ReputationRecovery) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock();
        if self.contains(CF_RECOVERIES, record.id.as_bytes())? {
            return Err(PersistenceError::Duplicate(record.id.clone()));
        }
        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.cf_handle(CF_RECOVERY_INDEX)?,
            character_key(&record.character_id, record.id.as_bytes()),
            b"",
        );
        self.stage_recovery(&mut batch, false, record)?;
        self.db.write(batch).map_err(backend)
    }

    fn get_recovery(&self, id: &str) -> Result<Option<ReputationRecovery>, PersistenceError> {
        self.get_json(CF_RECOVERIES, id.as_bytes())
    }

    fn update_recovery(&self, record: &mut ReputationRecovery) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock();
        let stored: ReputationRecovery = self
            .get_json(CF_RECOVERIES, record.id.as_bytes())?
            .ok_or_else(|| PersistenceError::NotFound(record.id.clone()))?;
        if stored.version != record.version {
            return Err(PersistenceError::VersionConflict {
                id: record.id.clone(),
                expected: record.version,
                found: stored.version,
            });
        }
        record.version += 1;
        let mut batch = WriteBatch::default();
        if let Err(e) = self.stage_recovery(&mut batch, stored.status == RecoveryStatus::Active, record) {
            record.version -= 1;
            return Err(e);
        }
        self.db.write(batch).map_err(|e| {
            record.version -= 1;
            backend(e)
        })
    }

    fn recoveries_for_character(&self, character_id: &str) -> Result<Vec<ReputationRecovery>, PersistenceError> {
        let prefix = character_key(character_id, &[]);
        let mut found = Vec::new();
        for (key, _) in self.scan_prefix(CF_RECOVERY_INDEX, &prefix)? {
            if let Some(r) = self.get_json::<ReputationRecovery>(CF_RECOVERIES, &key[prefix.len()..])? {
                found.push(r);
            }
        }
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(found)
    }

    fn characters_with_active_recoveries(
        &self,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<String>, PersistenceError> {
        let cf = self.cf_handle(CF_ACTIVE_RECOVERIES)?;
        // Every key of `after` is `after 0x00 ..`, so `after 0x01` sorts past all of them.
        let seek = after.map(|a| {
            let mut key = a.as_bytes().to_vec();
            key.push(1);
            key
        });
        let mode = match &seek {
            Some(key) => IteratorMode::From(key.as_slice(), Direction::Forward),
            None => IteratorMode::Start,
        };
        let mut chars: Vec<String> = Vec::new();
        for item in self.db.iterator_cf(cf, mode) {
            if chars.len() >= limit {
                break;
            }
            let (key, _) = item.map_err(backend)?;
            let end = key.iter().position(|b| *b == 0).unwrap_or(key.len());
            let character = std::str::from_utf8(&key[..end])
                .map_err(|e| PersistenceError::Serialization(e.to_string()))?;
            // Keys are sorted, so repeats of one character are adjacent.
            if chars.last().map(String::as_str) != Some(character) {
                chars.push(character.to_string());
            }
        }
        Ok(chars)
    }

    fn count_active_recoveries(&self) -> Result<u64, PersistenceError> {
        self.count_keys(CF_ACTIVE_RECOVERIES)
    }

    fn append_event(&self, event: &ReputationEvent) -> Result<(), PersistenceError> {
        let cf = self.cf_handle(CF_EVENTS)?;
        let mut suffix = ts_bytes(event.timestamp).to_vec();
        suffix.extend_from_slice(event.id.as_bytes());
        self.db
            .put_cf(cf, character_key(&event.character_id, &suffix), to_json(event)?)
            .map_err(backend)
    }

    fn events_for_character(&self, character_id: &str) -> Result<Vec<ReputationEvent>, PersistenceError> {
        self.scan_prefix(CF_EVENTS, &character_key(character_id, &[]))?
            .iter()
            .map(|(_, value)| from_json(value))
            .collect()
    }

    fn decay_config_exact(&self, faction_id: &str) -> Result<Option<DecayConfig>, PersistenceError> {
        self.get_json(CF_DECAY_CONFIGS, faction_id.as_bytes())
    }

    fn put_decay_config(&self, config: &DecayConfig) -> Result<(), PersistenceError> {
        let cf = self.cf_handle(CF_DECAY_CONFIGS)?;
        self.db
            .put_cf(cf, config.faction_id.as_bytes(), to_json(config)?)
            .map_err(backend)
    }

    fn recovery_config(&self, method: RecoveryMethod) -> Result<Option<RecoveryConfig>, PersistenceError> {
        self.get_json(CF_RECOVERY_CONFIGS, method.as_str().as_bytes())
    }

    fn put_recovery_config(&self, config: &RecoveryConfig) -> Result<(), PersistenceError> {
        let cf = self.cf_handle(CF_RECOVERY_CONFIGS)?;
        self.db
            .put_cf(cf, config.method.as_str().as_bytes(), to_json(config)?)
            .map_err(backend)
    }
}

// --- Encoding helpers ---

fn backend(e: rocksdb::Error) -> PersistenceError {
    PersistenceError::Backend(e.to_string())
}

fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>, PersistenceError> {
    serde_json::to_vec(value).map_err(|e| PersistenceError::Serialization(e.to_string()))
}

fn from_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, PersistenceError> {
    serde_json::from_slice(bytes).map_err(|e| PersistenceError::Serialization(e.to_string()))
}

/// Microsecond timestamp, sign bit flipped, big-endian: byte order == time order.
fn ts_bytes(t: DateTime<Utc>) -> [u8; 8] {
    ((t.timestamp_micros() as u64) ^ (1 << 63)).to_be_bytes()
}

fn due_key(next: DateTime<Utc>, id: &str) -> Vec<u8> {
    let mut key = ts_bytes(next).to_vec();
    key.extend_from_slice(id.as_bytes());
    key
}

/// `character 0x00 suffix`.
fn character_key(character_id: &str, suffix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(character_id.len() + 1 + suffix.len());
    key.extend_from_slice(character_id.as_bytes());
    key.push(0);
    key.extend_from_slice(suffix);
    key
}
