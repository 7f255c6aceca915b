use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::models::audit::AuditEntry;
use crate::normalize::{
    field, object, opt_value, timestamp_value, FieldSpec, Fields, NormalizeError, Record, Row,
};

const FIELDS: &[FieldSpec] = &[
    field("id", &[]),
    field("entity_type", &["entityType"]),
    field("entity_id", &["entityId"]),
    field("action", &[]),
    field("old_value", &["oldValue", "before"]),
    field("new_value", &["newValue", "after"]),
    field("note", &[]),
    field("timestamp", &["createdAt", "at"]),
];

impl Record for AuditEntry {
    const ENTITY: &'static str = "audit";
    const TABLE: &'static str = "audit_log";
    const COLLECTION: &'static str = "audit-log";
    const ID_PREFIX: &'static str = "aud";
    const FIELDS: &'static [FieldSpec] = FIELDS;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_raw(raw: &Row) -> Result<Self, NormalizeError> {
        let f = Fields::new(raw, FIELDS);
        Ok(AuditEntry {
            id: f.id(Self::ENTITY)?,
            entity_type: f.text("entity_type"),
            entity_id: f.text("entity_id"),
            action: f.text("action"),
            old_value: f.value("old_value").cloned().unwrap_or(Value::Null),
            new_value: f.value("new_value").cloned().unwrap_or(Value::Null),
            note: f.opt_text("note"),
            timestamp: f.timestamp("timestamp"),
        })
    }

    fn to_row(&self) -> Row {
        object(json!({
            "id": self.id,
            "entity_type": self.entity_type,
            "entity_id": self.entity_id,
            "action": self.action,
            "old_value": self.old_value,
            "new_value": self.new_value,
            "note": opt_value(&self.note),
            "timestamp": timestamp_value(self.timestamp),
        }))
    }

    fn to_legacy(&self) -> Row {
        object(json!({
            "id": self.id,
            "entityType": self.entity_type,
            "entityId": self.entity_id,
            "action": self.action,
            "oldValue": self.old_value,
            "newValue": self.new_value,
            "note": opt_value(&self.note),
            "timestamp": timestamp_value(self.timestamp),
        }))
    }

    /// Audit entries are immutable; the timestamp is set once at creation.
    fn set_updated_at(&mut self, _at: DateTime<Utc>) {}

    fn set_created_at(&mut self, at: DateTime<Utc>) {
        self.timestamp = Some(at);
    }
}
