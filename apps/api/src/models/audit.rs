use chrono::{DateTime, Utc};
use serde_json::Value;

/// Immutable before/after record of one mutation. No `updated_at`: entries
/// are never edited.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    pub old_value: Value,
    pub new_value: Value,
    pub note: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}
