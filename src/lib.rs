// Account Mapping Guard - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod key;
pub mod error;
pub mod config;
pub mod store;
pub mod checker;
pub mod event;
pub mod guard;
pub mod import;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use key::{CompositeKey, EntityRef, KeyField, RecordId};
pub use error::{EventError, GuardError, StoreError, DUPLICATE_RECORD_MESSAGE};
pub use config::GuardConfig;
pub use store::{
    Condition, InMemoryStore, KeyFilter, RecordStore, SqliteStore, StoredRecord,
};
pub use checker::{CandidateRecord, Operation, UniquenessChecker};
pub use event::{MessageKind, RecordEvent};
pub use guard::{HandleError, MappingGuard, Verdict};
pub use import::{import_mappings, load_csv, ImportSummary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the tracing subscriber used by the binaries (`RUST_LOG`, default `info`)
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
