// ⚙️ Guard Configuration
// Which entity the guard watches, how its key attributes are named,
// and the message shown when a duplicate is rejected.

use crate::error::DUPLICATE_RECORD_MESSAGE;
use crate::key::KeyField;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable the binaries read for a config file path
pub const CONFIG_ENV_VAR: &str = "GUARD_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Logical name of the entity the guard applies to
    pub entity: String,

    /// Attribute carrying the record identity in host events
    pub id_attribute: String,

    pub source_property_attribute: String,
    pub source_system_attribute: String,
    pub source_legal_entity_attribute: String,
    pub source_account_number_attribute: String,

    /// Shown verbatim to the caller on rejection
    pub duplicate_message: String,
}

impl Default for GuardConfig {
    fn default() -> Self {
        GuardConfig {
            entity: "trax_accountmapping".to_string(),
            id_attribute: "trax_accountmappingid".to_string(),
            source_property_attribute: "trax_sourceproperty".to_string(),
            source_system_attribute: "trax_sourcesystem".to_string(),
            source_legal_entity_attribute: "trax_sourcelegalentity".to_string(),
            source_account_number_attribute: "trax_orignalname".to_string(),
            duplicate_message: DUPLICATE_RECORD_MESSAGE.to_string(),
        }
    }
}

impl GuardConfig {
    /// Load from a JSON file; missing fields keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: GuardConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Load from `GUARD_CONFIG` if set, defaults otherwise
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    /// Host attribute name for a key field
    pub fn attribute_for(&self, field: KeyField) -> &str {
        match field {
            KeyField::SourceProperty => &self.source_property_attribute,
            KeyField::SourceSystem => &self.source_system_attribute,
            KeyField::SourceLegalEntity => &self.source_legal_entity_attribute,
            KeyField::SourceAccountNumber => &self.source_account_number_attribute,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = GuardConfig::default();
        assert_eq!(config.entity, "trax_accountmapping");
        assert_eq!(
            config.attribute_for(KeyField::SourceAccountNumber),
            "trax_orignalname"
        );
        assert_eq!(config.duplicate_message, DUPLICATE_RECORD_MESSAGE);
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"entity": "acme_mapping", "duplicate_message": "Already mapped."}}"#)
            .unwrap();

        let config = GuardConfig::load(file.path()).unwrap();

        assert_eq!(config.entity, "acme_mapping");
        assert_eq!(config.duplicate_message, "Already mapped.");
        assert_eq!(config.source_system_attribute, "trax_sourcesystem");
    }

    #[test]
    fn test_load_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = GuardConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
