// 🔑 Composite Key - The business identity of an account mapping
// Four fields, each independently nullable. Equality is field-level:
// an absent field matches only another absent field (never a wildcard).

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// IDENTIFIERS
// ============================================================================

/// Identity of a stored record (never changes, even when key fields do)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Generate a fresh identity
    pub fn new() -> Self {
        RecordId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for RecordId {
    fn from(id: Uuid) -> Self {
        RecordId(id)
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(RecordId)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference to another entity (property, system, legal entity)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityRef(Uuid);

impl EntityRef {
    pub fn new() -> Self {
        EntityRef(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EntityRef {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for EntityRef {
    fn from(id: Uuid) -> Self {
        EntityRef(id)
    }
}

impl FromStr for EntityRef {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(EntityRef)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// KEY FIELD
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyField {
    SourceProperty,
    SourceSystem,
    SourceLegalEntity,
    SourceAccountNumber,
}

impl KeyField {
    pub const ALL: [KeyField; 4] = [
        KeyField::SourceProperty,
        KeyField::SourceSystem,
        KeyField::SourceLegalEntity,
        KeyField::SourceAccountNumber,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyField::SourceProperty => "source_property",
            KeyField::SourceSystem => "source_system",
            KeyField::SourceLegalEntity => "source_legal_entity",
            KeyField::SourceAccountNumber => "source_account_number",
        }
    }
}

impl fmt::Display for KeyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// COMPOSITE KEY
// ============================================================================

/// Business identity of an account mapping
///
/// Two records are duplicates iff all four fields are equal. The account
/// number is trimmed, and an empty or blank value counts as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompositeKey {
    #[serde(default)]
    pub source_property: Option<EntityRef>,

    #[serde(default)]
    pub source_system: Option<EntityRef>,

    #[serde(default)]
    pub source_legal_entity: Option<EntityRef>,

    #[serde(default, deserialize_with = "deserialize_account_number")]
    pub source_account_number: Option<String>,
}

fn deserialize_account_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(normalize_account_number(raw))
}

fn normalize_account_number(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl CompositeKey {
    pub fn new(
        source_property: Option<EntityRef>,
        source_system: Option<EntityRef>,
        source_legal_entity: Option<EntityRef>,
        source_account_number: Option<&str>,
    ) -> Self {
        CompositeKey {
            source_property,
            source_system,
            source_legal_entity,
            source_account_number: normalize_account_number(
                source_account_number.map(str::to_string),
            ),
        }
    }

    /// Same key with the account number trimmed and a blank one folded into "absent"
    pub fn normalized(&self) -> CompositeKey {
        let mut key = self.clone();
        key.source_account_number = normalize_account_number(key.source_account_number);
        key
    }

    pub fn is_present(&self, field: KeyField) -> bool {
        match field {
            KeyField::SourceProperty => self.source_property.is_some(),
            KeyField::SourceSystem => self.source_system.is_some(),
            KeyField::SourceLegalEntity => self.source_legal_entity.is_some(),
            KeyField::SourceAccountNumber => self
                .source_account_number
                .as_deref()
                .is_some_and(|s| !s.trim().is_empty()),
        }
    }

    /// Fields that are absent on this key
    pub fn missing_fields(&self) -> Vec<KeyField> {
        KeyField::ALL
            .iter()
            .copied()
            .filter(|f| !self.is_present(*f))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        KeyField::ALL.iter().all(|f| self.is_present(*f))
    }

    /// Fill absent fields from `stored`; fields already present always win.
    /// Returns the fields that were filled.
    pub fn complete_from(&mut self, stored: &CompositeKey) -> Vec<KeyField> {
        let mut filled = Vec::new();

        if self.source_property.is_none() && stored.source_property.is_some() {
            self.source_property = stored.source_property;
            filled.push(KeyField::SourceProperty);
        }
        if self.source_system.is_none() && stored.source_system.is_some() {
            self.source_system = stored.source_system;
            filled.push(KeyField::SourceSystem);
        }
        if self.source_legal_entity.is_none() && stored.source_legal_entity.is_some() {
            self.source_legal_entity = stored.source_legal_entity;
            filled.push(KeyField::SourceLegalEntity);
        }
        if !self.is_present(KeyField::SourceAccountNumber)
            && stored.is_present(KeyField::SourceAccountNumber)
        {
            self.source_account_number =
                normalize_account_number(stored.source_account_number.clone());
            filled.push(KeyField::SourceAccountNumber);
        }

        filled
    }

    /// Field-level equality: absent matches only absent
    pub fn matches(&self, other: &CompositeKey) -> bool {
        self.normalized() == other.normalized()
    }

    /// Render a field for logs ("null" when absent)
    pub fn display_field(&self, field: KeyField) -> String {
        let value = match field {
            KeyField::SourceProperty => self.source_property.map(|r| r.to_string()),
            KeyField::SourceSystem => self.source_system.map(|r| r.to_string()),
            KeyField::SourceLegalEntity => self.source_legal_entity.map(|r| r.to_string()),
            KeyField::SourceAccountNumber => self.source_account_number.clone(),
        };
        value.unwrap_or_else(|| "null".to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================
