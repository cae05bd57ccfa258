//! Concurrency-safe registry of active session records.
//!
//! Every operation is a single short critical section over the map; no I/O
//! and no awaits ever happen under the lock. The store is shared across all
//! sessions' relay tasks and the request handlers.

use crate::{
    error::VoiceError,
    session::record::{SessionRecord, SessionSnapshot, SessionStatus},
};
use std::{
    collections::HashMap,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

#[derive(Default)]
pub struct SessionStore {
    inner: RwLock<HashMap<String, Arc<SessionRecord>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<SessionRecord>>> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<SessionRecord>>> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Inserts a new record. Atomic with respect to concurrent creates and
    /// lookups on the same id.
    pub fn create(&self, record: Arc<SessionRecord>) -> Result<(), VoiceError> {
        let mut map = self.write();
        if map.contains_key(&record.session_id) {
            return Err(VoiceError::DuplicateSession(record.session_id.clone()));
        }
        map.insert(record.session_id.clone(), record);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Arc<SessionRecord>, VoiceError> {
        self.read()
            .get(id)
            .cloned()
            .ok_or_else(|| VoiceError::SessionNotFound(id.to_string()))
    }

    /// Replaces the stored record, used when publishing status transitions.
    pub fn update(&self, record: Arc<SessionRecord>) -> Result<(), VoiceError> {
        let mut map = self.write();
        if !map.contains_key(&record.session_id) {
            return Err(VoiceError::SessionNotFound(record.session_id.clone()));
        }
        map.insert(record.session_id.clone(), record);
        Ok(())
    }

    /// Idempotent removal; deleting an absent id is not an error.
    pub fn delete(&self, id: &str) {
        self.write().remove(id);
    }

    /// Point-in-time snapshot of all `Active` records. Diagnostics and the
    /// expiry sweep only; the relay hot path never calls this.
    pub fn list_active(&self) -> Vec<SessionSnapshot> {
        self.read()
            .values()
            .filter(|record| record.status() == SessionStatus::Active)
            .map(|record| record.snapshot())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
