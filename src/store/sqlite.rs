// SQLite record store
// Account mappings table in WAL mode, one row per mapping

use super::{Condition, KeyFilter, RecordStore, StoredRecord};
use crate::checker::{CandidateRecord, UniquenessChecker};
use crate::config::GuardConfig;
use crate::error::{GuardError, StoreError};
use crate::key::{CompositeKey, RecordId};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;

const SELECT_COLUMNS: &str = "id, source_property, source_system, source_legal_entity,
                              source_account_number, created_at, modified_at";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a database file and make sure the schema exists
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    pub fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        setup_database(&conn)?;
        Ok(SqliteStore { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Insert without checking for duplicates
    pub fn insert(&self, record: &StoredRecord) -> Result<(), StoreError> {
        let key = record.key.normalized();
        self.conn.execute(
            "INSERT INTO account_mappings (
                id, source_property, source_system, source_legal_entity,
                source_account_number, created_at, modified_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id.to_string(),
                key.source_property.map(|r| r.to_string()),
                key.source_system.map(|r| r.to_string()),
                key.source_legal_entity.map(|r| r.to_string()),
                key.source_account_number,
                record.created_at.to_rfc3339(),
                record.modified_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Replace the key of an existing row. Returns false if `id` is unknown.
    pub fn update(&self, id: &RecordId, key: &CompositeKey) -> Result<bool, StoreError> {
        let key = key.normalized();
        let changed = self.conn.execute(
            "UPDATE account_mappings
             SET source_property = ?1,
                 source_system = ?2,
                 source_legal_entity = ?3,
                 source_account_number = ?4,
                 modified_at = ?5
             WHERE id = ?6",
            params![
                key.source_property.map(|r| r.to_string()),
                key.source_system.map(|r| r.to_string()),
                key.source_legal_entity.map(|r| r.to_string()),
                key.source_account_number,
                Utc::now().to_rfc3339(),
                id.to_string(),
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn delete(&self, id: &RecordId) -> Result<bool, StoreError> {
        let changed = self
            .conn
            .execute("DELETE FROM account_mappings WHERE id = ?1", [id.to_string()])?;
        Ok(changed > 0)
    }

    pub fn get(&self, id: &RecordId) -> Result<Option<StoredRecord>, StoreError> {
        let sql = format!("SELECT {} FROM account_mappings WHERE id = ?1", SELECT_COLUMNS);
        let record = self
            .conn
            .query_row(&sql, [id.to_string()], row_to_record)
            .optional()?;
        Ok(record)
    }

    pub fn all(&self) -> Result<Vec<StoredRecord>, StoreError> {
        let sql = format!(
            "SELECT {} FROM account_mappings ORDER BY created_at, id",
            SELECT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map([], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn count(&self) -> Result<i64, StoreError> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM account_mappings", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Insert a new mapping after checking it is not a duplicate
    pub fn create_checked(
        &self,
        config: &GuardConfig,
        key: CompositeKey,
    ) -> Result<RecordId, GuardError> {
        let tx = self.conn.unchecked_transaction().map_err(StoreError::from)?;

        let checker = UniquenessChecker::new(self).with_message(&config.duplicate_message);
        checker.enforce_uniqueness(&CandidateRecord::create(key.clone()))?;

        let record = StoredRecord::new(key);
        self.insert(&record)?;
        tx.commit().map_err(StoreError::from)?;

        tracing::info!(id = %record.id, "account mapping created");
        Ok(record.id)
    }

    /// Apply a partial key change after checking the merged key is not a duplicate.
    /// Absent fields in `changes` keep their stored values.
    pub fn update_checked(
        &self,
        config: &GuardConfig,
        id: RecordId,
        changes: CompositeKey,
    ) -> Result<CompositeKey, GuardError> {
        let tx = self.conn.unchecked_transaction().map_err(StoreError::from)?;

        let checker = UniquenessChecker::new(self).with_message(&config.duplicate_message);
        let candidate = CandidateRecord::update(id, changes);
        let merged = checker.complete_key(&candidate)?;
        checker.enforce_uniqueness(&CandidateRecord::update(id, merged.clone()))?;

        if !self.update(&id, &merged)? {
            return Err(GuardError::RecordNotFound(id));
        }
        tx.commit().map_err(StoreError::from)?;

        tracing::info!(%id, "account mapping updated");
        Ok(merged)
    }
}

impl RecordStore for SqliteStore {
    fn query_one(&self, filter: &KeyFilter) -> Result<Option<StoredRecord>, StoreError> {
        let mut clauses = Vec::new();
        let mut values: Vec<String> = Vec::new();

        push_clause(
            &mut clauses,
            &mut values,
            "source_property",
            filter.source_property.clone().map_value(|r| r.to_string()),
        );
        push_clause(
            &mut clauses,
            &mut values,
            "source_system",
            filter.source_system.clone().map_value(|r| r.to_string()),
        );
        push_clause(
            &mut clauses,
            &mut values,
            "source_legal_entity",
            filter.source_legal_entity.clone().map_value(|r| r.to_string()),
        );
        push_clause(
            &mut clauses,
            &mut values,
            "source_account_number",
            filter.source_account_number.clone(),
        );

        if let Some(exclude) = filter.exclude {
            values.push(exclude.to_string());
            clauses.push(format!("id <> ?{}", values.len()));
        }

        let sql = format!(
            "SELECT {} FROM account_mappings WHERE {} LIMIT 1",
            SELECT_COLUMNS,
            clauses.join(" AND ")
        );

        let record = self
            .conn
            .query_row(&sql, params_from_iter(values.iter()), row_to_record)
            .optional()?;
        Ok(record)
    }

    fn get_by_id(&self, id: &RecordId) -> Result<Option<CompositeKey>, StoreError> {
        Ok(self.get(id)?.map(|r| r.key))
    }
}

impl<T> Condition<T> {
    fn map_value<U>(self, f: impl FnOnce(T) -> U) -> Condition<U> {
        match self {
            Condition::Equals(v) => Condition::Equals(f(v)),
            Condition::IsNull => Condition::IsNull,
        }
    }
}

fn push_clause(
    clauses: &mut Vec<String>,
    values: &mut Vec<String>,
    column: &str,
    condition: Condition<String>,
) {
    match condition {
        Condition::Equals(v) => {
            values.push(v);
            clauses.push(format!("{} = ?{}", column, values.len()));
        }
        Condition::IsNull => clauses.push(format!("{} IS NULL", column)),
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<StoredRecord> {
    let id: String = row.get(0)?;
    let property: Option<String> = row.get(1)?;
    let system: Option<String> = row.get(2)?;
    let legal_entity: Option<String> = row.get(3)?;
    let account_number: Option<String> = row.get(4)?;
    let created_at: String = row.get(5)?;
    let modified_at: String = row.get(6)?;

    Ok(StoredRecord {
        id: parse_column(0, &id)?,
        key: CompositeKey::new(
            parse_optional_column(1, property)?,
            parse_optional_column(2, system)?,
            parse_optional_column(3, legal_entity)?,
            account_number.as_deref(),
        ),
        created_at: parse_timestamp(5, &created_at)?,
        modified_at: parse_timestamp(6, &modified_at)?,
    })
}

fn parse_column<T>(idx: usize, raw: &str) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = uuid::Error>,
{
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_optional_column<T>(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<T>>
where
    T: std::str::FromStr<Err = uuid::Error>,
{
    raw.map(|s| parse_column(idx, &s)).transpose()
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub fn setup_database(conn: &Connection) -> Result<(), StoreError> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS account_mappings (
            id TEXT PRIMARY KEY NOT NULL,
            source_property TEXT,
            source_system TEXT,
            source_legal_entity TEXT,
            source_account_number TEXT,
            created_at TEXT NOT NULL,
            modified_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_account_mappings_key ON account_mappings(
            source_property, source_system, source_legal_entity, source_account_number
        )",
        [],
    )?;

    Ok(())
}
