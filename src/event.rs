// 📨 Host Events - Create/Update notifications for a record
//
// A host hands over a message name, the entity's logical name and a loose
// attribute bag. Only events for the configured entity become candidates.

use crate::checker::CandidateRecord;
use crate::config::GuardConfig;
use crate::error::EventError;
use crate::key::{CompositeKey, EntityRef, KeyField, RecordId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    Create,
    Update,
}

impl MessageKind {
    /// Case-insensitive; anything but Create/Update is unsupported
    pub fn parse(message: &str) -> Result<Self, EventError> {
        let message = message.trim();
        if message.eq_ignore_ascii_case("create") {
            Ok(MessageKind::Create)
        } else if message.eq_ignore_ascii_case("update") {
            Ok(MessageKind::Update)
        } else {
            Err(EventError::UnsupportedMessage(message.to_string()))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEvent {
    /// Host message name, e.g. "Create" or "Update"
    pub message: String,

    /// Logical name of the target entity
    pub entity: String,

    /// Record identity (required on update)
    #[serde(default)]
    pub id: Option<RecordId>,

    /// Attributes carried by the in-flight change
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
}

impl RecordEvent {
    pub fn new(message: &str, entity: &str) -> Self {
        RecordEvent {
            message: message.to_string(),
            entity: entity.to_string(),
            id: None,
            attributes: HashMap::new(),
        }
    }

    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_attribute(mut self, name: &str, value: Value) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }

    /// `Ok(None)` when the event targets another entity
    pub fn to_candidate(
        &self,
        config: &GuardConfig,
    ) -> Result<Option<CandidateRecord>, EventError> {
        if self.entity != config.entity {
            return Ok(None);
        }

        let kind = MessageKind::parse(&self.message)?;
        let key = self.extract_key(config)?;

        let candidate = match kind {
            MessageKind::Create => CandidateRecord::create(key),
            MessageKind::Update => {
                let id = match self.id {
                    Some(id) => id,
                    None => self.identity_attribute(config)?,
                };
                CandidateRecord::update(id, key)
            }
        };

        Ok(Some(candidate))
    }

    fn identity_attribute(&self, config: &GuardConfig) -> Result<RecordId, EventError> {
        match self.attributes.get(&config.id_attribute) {
            None | Some(Value::Null) => Err(EventError::MissingIdentity),
            Some(value) => parse_uuid_value(&config.id_attribute, value)?
                .map(RecordId::from)
                .ok_or(EventError::MissingIdentity),
        }
    }

    fn extract_key(&self, config: &GuardConfig) -> Result<CompositeKey, EventError> {
        let reference = |field: KeyField| -> Result<Option<EntityRef>, EventError> {
            let name = config.attribute_for(field);
            match self.attributes.get(name) {
                Some(value) => Ok(parse_uuid_value(name, value)?.map(EntityRef::from)),
                None => Ok(None),
            }
        };

        let account_name = config.attribute_for(KeyField::SourceAccountNumber);
        let account = match self.attributes.get(account_name) {
            Some(value) => scalar_to_string(account_name, value)?,
            None => None,
        };

        Ok(CompositeKey::new(
            reference(KeyField::SourceProperty)?,
            reference(KeyField::SourceSystem)?,
            reference(KeyField::SourceLegalEntity)?,
            account.as_deref(),
        ))
    }
}

/// Accepts `null`, a UUID string, or a reference object `{"id": "<uuid>", ...}`
fn parse_uuid_value(attribute: &str, value: &Value) -> Result<Option<uuid::Uuid>, EventError> {
    let invalid = |reason: String| EventError::InvalidAttribute {
        attribute: attribute.to_string(),
        reason,
    };

    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => uuid::Uuid::parse_str(s.trim())
            .map(Some)
            .map_err(|e| invalid(e.to_string())),
        Value::Object(map) => match map.get("id") {
            Some(inner @ Value::String(_)) => parse_uuid_value(attribute, inner),
            Some(Value::Null) | None => Ok(None),
            Some(other) => Err(invalid(format!("expected string id, got {}", other))),
        },
        other => Err(invalid(format!("expected reference, got {}", other))),
    }
}

fn scalar_to_string(attribute: &str, value: &Value) -> Result<Option<String>, EventError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(EventError::InvalidAttribute {
            attribute: attribute.to_string(),
            reason: format!("expected text, got {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::Operation;
    use serde_json::json;

    #[test]
    fn test_message_kind_case_insensitive() {
        assert_eq!(MessageKind::parse("Create").unwrap(), MessageKind::Create);
        assert_eq!(MessageKind::parse("UPDATE").unwrap(), MessageKind::Update);
        assert!(matches!(
            MessageKind::parse("Delete"),
            Err(EventError::UnsupportedMessage(m)) if m == "Delete"
        ));
    }

    #[test]
    fn test_other_entity_is_skipped() {
        let config = GuardConfig::default();
        let event = RecordEvent::new("Create", "account");
        assert_eq!(event.to_candidate(&config).unwrap(), None);
    }

    #[test]
    fn test_create_extracts_all_fields() {
        let config = GuardConfig::default();
        let p = EntityRef::new();
        let s = EntityRef::new();
        let l = EntityRef::new();

        let event = RecordEvent::new("create", &config.entity)
            .with_attribute(&config.source_property_attribute, json!(p.to_string()))
            .with_attribute(
                &config.source_system_attribute,
                json!({"id": s.to_string(), "logical_name": "trax_system"}),
            )
            .with_attribute(&config.source_legal_entity_attribute, json!(l.to_string()))
            .with_attribute(&config.source_account_number_attribute, json!(123));

        let candidate = event.to_candidate(&config).unwrap().unwrap();

        assert_eq!(candidate.operation, Operation::Create);
        assert_eq!(
            candidate.key,
            CompositeKey::new(Some(p), Some(s), Some(l), Some("123"))
        );
    }

    #[test]
    fn test_update_partial_attributes() {
        let config = GuardConfig::default();
        let id = RecordId::new();

        let event = RecordEvent::new("Update", &config.entity)
            .with_id(id)
            .with_attribute(&config.source_account_number_attribute, json!("456"))
            .with_attribute(&config.source_system_attribute, Value::Null);

        let candidate = event.to_candidate(&config).unwrap().unwrap();

        assert_eq!(candidate.operation, Operation::Update(id));
        assert_eq!(candidate.key, CompositeKey::new(None, None, None, Some("456")));
    }

    #[test]
    fn test_account_number_padding_ignored() {
        let config = GuardConfig::default();

        let padded = RecordEvent::new("Create", &config.entity)
            .with_attribute(&config.source_account_number_attribute, json!("  123 "));
        let blank = RecordEvent::new("Create", &config.entity)
            .with_attribute(&config.source_account_number_attribute, json!("   "));

        let key = padded.to_candidate(&config).unwrap().unwrap().key;
        assert_eq!(key.source_account_number.as_deref(), Some("123"));
        let key = blank.to_candidate(&config).unwrap().unwrap().key;
        assert!(key.source_account_number.is_none());
    }

    #[test]
    fn test_update_identity_from_attribute() {
        let config = GuardConfig::default();
        let id = RecordId::new();

        let event = RecordEvent::new("Update", &config.entity)
            .with_attribute(&config.id_attribute, json!(id.to_string()));

        let candidate = event.to_candidate(&config).unwrap().unwrap();
        assert_eq!(candidate.identity(), Some(id));
    }

    #[test]
    fn test_update_without_identity() {
        let config = GuardConfig::default();
        let event = RecordEvent::new("Update", &config.entity);

        assert!(matches!(
            event.to_candidate(&config),
            Err(EventError::MissingIdentity)
        ));
    }

    #[test]
    fn test_invalid_reference() {
        let config = GuardConfig::default();
        let event = RecordEvent::new("Create", &config.entity)
            .with_attribute(&config.source_property_attribute, json!("not-a-uuid"));

        match event.to_candidate(&config) {
            Err(EventError::InvalidAttribute { attribute, .. }) => {
                assert_eq!(attribute, config.source_property_attribute);
            }
            other => panic!("expected invalid attribute, got {other:?}"),
        }
    }

    #[test]
    fn test_deserialize_event() {
        let id = RecordId::new();
        let raw = format!(
            r#"{{"message": "Update", "entity": "trax_accountmapping", "id": "{}",
                "attributes": {{"trax_orignalname": ""}}}}"#,
            id
        );

        let event: RecordEvent = serde_json::from_str(&raw).unwrap();
        let candidate = event.to_candidate(&GuardConfig::default()).unwrap().unwrap();

        assert_eq!(candidate.identity(), Some(id));
        assert!(candidate.key.source_account_number.is_none());
    }
}
