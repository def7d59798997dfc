// 🛡️ Uniqueness Checker - Reject account mappings whose composite key already exists
//
// Per call:
// 1. Field completion (update only): absent key fields come from the stored record
// 2. Lookup: exact-match query, one row at most
// 3. Self-exclusion (update only): the record never conflicts with itself
//
// Read-only. A pre-check, not a substitute for a store-level constraint.

use crate::error::{GuardError, DUPLICATE_RECORD_MESSAGE};
use crate::key::{CompositeKey, KeyField, RecordId};
use crate::store::{KeyFilter, RecordStore};
use serde::{Deserialize, Serialize};

// ============================================================================
// OPERATION & CANDIDATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Create,
    Update(RecordId),
}

impl Operation {
    /// Identity being updated, if any
    pub fn identity(&self) -> Option<RecordId> {
        match self {
            Operation::Create => None,
            Operation::Update(id) => Some(*id),
        }
    }
}

/// A record under validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub operation: Operation,
    pub key: CompositeKey,
}

impl CandidateRecord {
    pub fn create(key: CompositeKey) -> Self {
        CandidateRecord {
            operation: Operation::Create,
            key,
        }
    }

    /// `key` may be partial: absent fields are taken from the stored record
    pub fn update(id: RecordId, key: CompositeKey) -> Self {
        CandidateRecord {
            operation: Operation::Update(id),
            key,
        }
    }

    pub fn identity(&self) -> Option<RecordId> {
        self.operation.identity()
    }
}

// ============================================================================
// UNIQUENESS CHECKER
// ============================================================================

pub struct UniquenessChecker<S> {
    store: S,
    message: String,
}

impl<S: RecordStore> UniquenessChecker<S> {
    pub fn new(store: S) -> Self {
        UniquenessChecker {
            store,
            message: DUPLICATE_RECORD_MESSAGE.to_string(),
        }
    }

    /// Override the message carried by `DuplicateRecord`
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Key to compare: the candidate's own on create, merged with the
    /// stored record on update when any field is absent.
    pub fn complete_key(&self, candidate: &CandidateRecord) -> Result<CompositeKey, GuardError> {
        let mut key = candidate.key.normalized();

        let id = match candidate.operation {
            Operation::Create => return Ok(key),
            Operation::Update(id) => id,
        };

        if key.is_complete() {
            return Ok(key);
        }

        let stored = self
            .store
            .get_by_id(&id)?
            .ok_or(GuardError::RecordNotFound(id))?;

        let filled = key.complete_from(&stored);
        if !filled.is_empty() {
            tracing::debug!(
                %id,
                filled = ?filled.iter().map(KeyField::as_str).collect::<Vec<_>>(),
                "completed key fields from stored record"
            );
        }

        Ok(key)
    }

    /// Identity of the first stored record with the same key, other than the candidate itself
    pub fn find_conflict(
        &self,
        candidate: &CandidateRecord,
    ) -> Result<Option<RecordId>, GuardError> {
        let key = self.complete_key(candidate)?;
        log_key(&key);

        let mut filter = KeyFilter::for_key(&key);
        if let Some(id) = candidate.identity() {
            filter = filter.excluding(id);
        }

        let found = self.store.query_one(&filter)?;
        Ok(found.map(|record| record.id))
    }

    /// Fails with `DuplicateRecord` when a conflicting record exists
    pub fn enforce_uniqueness(&self, candidate: &CandidateRecord) -> Result<(), GuardError> {
        match self.find_conflict(candidate)? {
            Some(existing) => {
                tracing::warn!(%existing, "{}", self.message);
                Err(GuardError::DuplicateRecord {
                    existing,
                    message: self.message.clone(),
                })
            }
            None => {
                tracing::debug!("no duplicate records found");
                Ok(())
            }
        }
    }
}

fn log_key(key: &CompositeKey) {
    tracing::debug!(
        source_property = %key.display_field(KeyField::SourceProperty),
        source_system = %key.display_field(KeyField::SourceSystem),
        source_legal_entity = %key.display_field(KeyField::SourceLegalEntity),
        source_account_number = %key.display_field(KeyField::SourceAccountNumber),
        "checking composite key"
    );
}

// ============================================================================
// TESTS
// ============================================================================
