//! Per-character serialization.
//!
//! Operations on different characters never contend; two operations on the
//! same character run one after the other. Lock entries are created on
//! demand and pruned once nobody holds them.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct CharacterLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl CharacterLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `character_id`.
    pub async fn lock(&self, character_id: &str) -> OwnedMutexGuard<()> {
        // Clone the Arc out so no map shard is held across the await.
        let mutex = self
            .locks
            .entry(character_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }

    /// Drop entries that nobody is holding or waiting on.
    pub fn prune(&self) {
        self.locks.retain(|_, m| Arc::strong_count(m) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
