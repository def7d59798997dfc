// 📥 CSV Import - Bulk-load account mappings through the guard
// Each row is checked before insert; duplicates are counted, not inserted.

use crate::config::GuardConfig;
use crate::error::GuardError;
use crate::key::{CompositeKey, EntityRef};
use crate::store::SqliteStore;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct MappingRow {
    #[serde(rename = "Source_Property")]
    source_property: String,

    #[serde(rename = "Source_System")]
    source_system: String,

    #[serde(rename = "Source_Legal_Entity")]
    source_legal_entity: String,

    #[serde(rename = "Source_Account_Number")]
    source_account_number: String,
}

impl MappingRow {
    fn into_key(self, line: usize) -> Result<CompositeKey> {
        let reference = |raw: &str, column: &str| -> Result<Option<EntityRef>> {
            if raw.trim().is_empty() {
                return Ok(None);
            }
            raw.parse()
                .map(Some)
                .with_context(|| format!("Line {}: invalid {} '{}'", line, column, raw))
        };

        Ok(CompositeKey::new(
            reference(&self.source_property, "Source_Property")?,
            reference(&self.source_system, "Source_System")?,
            reference(&self.source_legal_entity, "Source_Legal_Entity")?,
            Some(&self.source_account_number),
        ))
    }
}

/// Read composite keys from a CSV file
///
/// Header: `Source_Property,Source_System,Source_Legal_Entity,Source_Account_Number`.
/// Every column is required; empty cells are absent fields.
pub fn load_csv(csv_path: &Path) -> Result<Vec<CompositeKey>> {
    let mut rdr = csv::Reader::from_path(csv_path).context("Failed to open CSV file")?;

    let mut keys = Vec::new();

    for (index, result) in rdr.deserialize().enumerate() {
        // Header is line 1
        let line = index + 2;
        let row: MappingRow =
            result.with_context(|| format!("Line {}: failed to deserialize mapping", line))?;
        keys.push(row.into_key(line)?);
    }

    Ok(keys)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub duplicates: usize,
}

/// Insert keys one by one, rejecting duplicates of stored rows and of earlier rows
pub fn import_mappings(
    store: &SqliteStore,
    config: &GuardConfig,
    keys: &[CompositeKey],
) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for key in keys {
        match store.create_checked(config, key.clone()) {
            Ok(_) => summary.inserted += 1,
            Err(GuardError::DuplicateRecord { .. }) => summary.duplicates += 1,
            Err(e) => return Err(anyhow::Error::new(e).context("Import aborted")),
        }
    }

    tracing::info!(
        inserted = summary.inserted,
        duplicates = summary.duplicates,
        "import finished"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "Source_Property,Source_System,Source_Legal_Entity,Source_Account_Number";

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_csv_empty_cells_are_absent() {
        let p = EntityRef::new();
        let file = write_csv(&format!("{HEADER}\n{p},,,123\n,,,\n"));

        let keys = load_csv(file.path()).unwrap();

        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0], CompositeKey::new(Some(p), None, None, Some("123")));
        assert_eq!(keys[1], CompositeKey::default());
    }

    #[test]
    fn test_load_csv_invalid_reference() {
        let file = write_csv(&format!("{HEADER}\nbogus,,,1\n"));

        let err = load_csv(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("Line 2"));
    }

    #[test]
    fn test_load_csv_wrong_headers_rejected() {
        let p = EntityRef::new();
        let file = write_csv(&format!(
            "property,system,legal_entity,account_number\n{},,,123\n{},,,456\n",
            p, p
        ));

        let err = load_csv(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("Line 2"));
    }

    #[test]
    fn test_load_csv_missing_column_rejected() {
        let file = write_csv("Source_Property,Source_System,Source_Account_Number\n,,123\n");

        let err = load_csv(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("Source_Legal_Entity"));
    }

    #[test]
    fn test_load_csv_account_number_trimmed() {
        let file = write_csv(&format!("{HEADER}\n,,, 123 \n"));

        let keys = load_csv(file.path()).unwrap();
        assert_eq!(keys[0], CompositeKey::new(None, None, None, Some("123")));
    }

    #[test]
    fn test_import_twice_inserts_once() {
        let store = SqliteStore::open_in_memory().unwrap();
        let config = GuardConfig::default();
        let p = EntityRef::new();
        let keys = vec![
            CompositeKey::new(Some(p), None, None, Some("1")),
            CompositeKey::new(Some(p), None, None, Some("2")),
            CompositeKey::new(Some(p), None, None, Some("1")),
        ];

        let first = import_mappings(&store, &config, &keys).unwrap();
        let second = import_mappings(&store, &config, &keys).unwrap();

        assert_eq!(first, ImportSummary { inserted: 2, duplicates: 1 });
        assert_eq!(second, ImportSummary { inserted: 0, duplicates: 3 });
        assert_eq!(store.count().unwrap(), 2);
    }
}
