// Record Stores - the narrow interface the checker reads through
//
// Two lookups only:
// - query_one: exact-match existence check over the composite key
// - get_by_id: current stored key for field completion

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use crate::error::StoreError;
use crate::key::{CompositeKey, EntityRef, RecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// CONDITION
// ============================================================================

/// One clause of a key filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition<T> {
    Equals(T),
    IsNull,
}

impl<T: PartialEq> Condition<T> {
    /// `Equals` for a present value, `IsNull` for an absent one
    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(v) => Condition::Equals(v),
            None => Condition::IsNull,
        }
    }

    pub fn matches(&self, value: Option<&T>) -> bool {
        match (self, value) {
            (Condition::Equals(expected), Some(actual)) => expected == actual,
            (Condition::IsNull, None) => true,
            _ => false,
        }
    }
}

// ============================================================================
// KEY FILTER
// ============================================================================

/// Exact-match filter over the four key fields, optionally excluding one identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFilter {
    pub source_property: Condition<EntityRef>,
    pub source_system: Condition<EntityRef>,
    pub source_legal_entity: Condition<EntityRef>,
    pub source_account_number: Condition<String>,
    pub exclude: Option<RecordId>,
}

impl KeyFilter {
    pub fn for_key(key: &CompositeKey) -> Self {
        let key = key.normalized();
        KeyFilter {
            source_property: Condition::from_option(key.source_property),
            source_system: Condition::from_option(key.source_system),
            source_legal_entity: Condition::from_option(key.source_legal_entity),
            source_account_number: Condition::from_option(key.source_account_number),
            exclude: None,
        }
    }

    pub fn excluding(mut self, id: RecordId) -> Self {
        self.exclude = Some(id);
        self
    }

    /// In-process evaluation, for stores that scan
    pub fn matches(&self, record: &StoredRecord) -> bool {
        if self.exclude == Some(record.id) {
            return false;
        }

        let key = record.key.normalized();
        self.source_property.matches(key.source_property.as_ref())
            && self.source_system.matches(key.source_system.as_ref())
            && self.source_legal_entity.matches(key.source_legal_entity.as_ref())
            && self
                .source_account_number
                .matches(key.source_account_number.as_ref())
    }
}

// ============================================================================
// STORED RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RecordId,
    pub key: CompositeKey,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl StoredRecord {
    /// New record with a fresh identity
    pub fn new(key: CompositeKey) -> Self {
        Self::with_id(RecordId::new(), key)
    }

    pub fn with_id(id: RecordId, key: CompositeKey) -> Self {
        let now = Utc::now();
        StoredRecord {
            id,
            key: key.normalized(),
            created_at: now,
            modified_at: now,
        }
    }
}

// ============================================================================
// RECORD STORE
// ============================================================================

/// Read-only view of the backing store used by the checker
pub trait RecordStore {
    /// At most one record matching `filter`
    fn query_one(&self, filter: &KeyFilter) -> Result<Option<StoredRecord>, StoreError>;

    /// Current key of the record with identity `id`
    fn get_by_id(&self, id: &RecordId) -> Result<Option<CompositeKey>, StoreError>;
}

impl<S: RecordStore + ?Sized> RecordStore for &S {
    fn query_one(&self, filter: &KeyFilter) -> Result<Option<StoredRecord>, StoreError> {
        (**self).query_one(filter)
    }

    fn get_by_id(&self, id: &RecordId) -> Result<Option<CompositeKey>, StoreError> {
        (**self).get_by_id(id)
    }
}

impl<S: RecordStore + ?Sized> RecordStore for std::sync::Arc<S> {
    fn query_one(&self, filter: &KeyFilter) -> Result<Option<StoredRecord>, StoreError> {
        (**self).query_one(filter)
    }

    fn get_by_id(&self, id: &RecordId) -> Result<Option<CompositeKey>, StoreError> {
        (**self).get_by_id(id)
    }
}
