// Mapping Guard - entry point for host events
// Event -> candidate -> uniqueness check, with the outcome traced.

use crate::checker::{CandidateRecord, UniquenessChecker};
use crate::config::GuardConfig;
use crate::error::{EventError, GuardError};
use crate::event::RecordEvent;
use crate::store::RecordStore;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// Event targets another entity; nothing was checked
    Skipped,
    /// No conflicting record exists
    Accepted,
}

#[derive(Debug, thiserror::Error)]
pub enum HandleError {
    #[error(transparent)]
    Event(#[from] EventError),

    #[error(transparent)]
    Guard(#[from] GuardError),
}

pub struct MappingGuard<S> {
    checker: UniquenessChecker<S>,
    config: GuardConfig,
}

impl<S: RecordStore> MappingGuard<S> {
    pub fn new(store: S, config: GuardConfig) -> Self {
        let checker = UniquenessChecker::new(store).with_message(&config.duplicate_message);
        MappingGuard { checker, config }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn checker(&self) -> &UniquenessChecker<S> {
        &self.checker
    }

    /// Validate one host event
    pub fn handle(&self, event: &RecordEvent) -> Result<Verdict, HandleError> {
        let candidate = match event.to_candidate(&self.config)? {
            Some(candidate) => candidate,
            None => {
                tracing::debug!(entity = %event.entity, "event for another entity, skipping");
                return Ok(Verdict::Skipped);
            }
        };

        self.check(&candidate)?;
        Ok(Verdict::Accepted)
    }

    /// Validate an already-typed candidate
    pub fn check(&self, candidate: &CandidateRecord) -> Result<(), GuardError> {
        if let Some(id) = candidate.identity() {
            tracing::debug!(%id, "validating update");
        }

        let result = self.checker.enforce_uniqueness(candidate);
        if result.is_ok() {
            tracing::info!(entity = %self.config.entity, "no duplicate records found");
        }
        result
    }
}
