// In-memory record store
//
// Holds all account mappings in a shared Vec behind a RwLock.
// Writes here are NOT checked; run them through the checker first.

use super::{KeyFilter, RecordStore, StoredRecord};
use crate::error::StoreError;
use crate::key::{CompositeKey, RecordId};
use chrono::Utc;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    records: Arc<RwLock<Vec<StoredRecord>>>,
}

impl InMemoryStore {
    /// Create new empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<StoredRecord>>, StoreError> {
        self.records
            .read()
            .map_err(|_| StoreError::Unavailable("record lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<StoredRecord>>, StoreError> {
        self.records
            .write()
            .map_err(|_| StoreError::Unavailable("record lock poisoned".to_string()))
    }

    /// Insert a new record, returning its identity
    pub fn insert(&self, key: CompositeKey) -> Result<RecordId, StoreError> {
        let record = StoredRecord::new(key);
        let id = record.id;
        self.write()?.push(record);
        Ok(id)
    }

    /// Replace the key of an existing record. Returns false if `id` is unknown.
    pub fn update(&self, id: &RecordId, key: CompositeKey) -> Result<bool, StoreError> {
        let mut records = self.write()?;
        match records.iter_mut().find(|r| &r.id == id) {
            Some(record) => {
                record.key = key.normalized();
                record.modified_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn remove(&self, id: &RecordId) -> Result<bool, StoreError> {
        let mut records = self.write()?;
        let before = records.len();
        records.retain(|r| &r.id != id);
        Ok(records.len() != before)
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.read()?.is_empty())
    }

    pub fn all(&self) -> Result<Vec<StoredRecord>, StoreError> {
        Ok(self.read()?.clone())
    }
}

impl RecordStore for InMemoryStore {
    fn query_one(&self, filter: &KeyFilter) -> Result<Option<StoredRecord>, StoreError> {
        Ok(self.read()?.iter().find(|r| filter.matches(r)).cloned())
    }

    fn get_by_id(&self, id: &RecordId) -> Result<Option<CompositeKey>, StoreError> {
        Ok(self
            .read()?
            .iter()
            .find(|r| &r.id == id)
            .map(|r| r.key.clone()))
    }
}
