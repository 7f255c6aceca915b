use chrono::{DateTime, Utc};
use serde_json::json;

use crate::models::satellite::{
    ActivityEntry, AdTemplate, ApprovalItem, ApprovalStatus, LaunchChecklistItem,
    LifecycleMessage, MessageStatus, TargetKind,
};
use crate::models::Platform;
use crate::normalize::{
    date_value, field, object, opt_value, timestamp_value, FieldSpec, Fields, NormalizeError,
    Record, Row,
};

fn require(value: &str, name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("missing required field: {name}"))
    } else {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ApprovalItem
// ---------------------------------------------------------------------------

const APPROVAL_FIELDS: &[FieldSpec] = &[
    field("id", &[]),
    field("title", &["name"]),
    field("target_kind", &["targetKind", "kind"]),
    field("target_id", &["targetId"]),
    field("status", &[]),
    field("reviewer", &["reviewedBy"]),
    field("note", &["comment", "notes"]),
    field("updated_at", &["updatedAt"]),
];

impl Record for ApprovalItem {
    const ENTITY: &'static str = "approval";
    const TABLE: &'static str = "approvals";
    const COLLECTION: &'static str = "approvals";
    const ID_PREFIX: &'static str = "apr";
    const FIELDS: &'static [FieldSpec] = APPROVAL_FIELDS;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_raw(raw: &Row) -> Result<Self, NormalizeError> {
        let f = Fields::new(raw, APPROVAL_FIELDS);
        Ok(ApprovalItem {
            id: f.id(Self::ENTITY)?,
            title: f.text("title"),
            target_kind: f
                .opt_text("target_kind")
                .and_then(|k| TargetKind::parse(&k))
                .unwrap_or_default(),
            target_id: f.opt_text("target_id"),
            status: f
                .opt_text("status")
                .and_then(|s| ApprovalStatus::parse(&s))
                .unwrap_or_default(),
            reviewer: f.opt_text("reviewer"),
            note: f.opt_text("note"),
            updated_at: f.timestamp("updated_at"),
        })
    }

    fn to_row(&self) -> Row {
        object(json!({
            "id": self.id,
            "title": self.title,
            "target_kind": self.target_kind.as_str(),
            "target_id": opt_value(&self.target_id),
            "status": self.status.as_str(),
            "reviewer": opt_value(&self.reviewer),
            "note": opt_value(&self.note),
            "updated_at": timestamp_value(self.updated_at),
        }))
    }

    fn to_legacy(&self) -> Row {
        object(json!({
            "id": self.id,
            "title": self.title,
            "targetKind": self.target_kind.as_str(),
            "targetId": opt_value(&self.target_id),
            "status": self.status.as_str(),
            "reviewer": opt_value(&self.reviewer),
            "note": opt_value(&self.note),
            "updatedAt": timestamp_value(self.updated_at),
        }))
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = Some(at);
    }

    fn validate_new(&self) -> Result<(), String> {
        require(&self.title, "title")?;
        if self.target_kind == TargetKind::Ad && self.target_id.is_none() {
            return Err("approvals targeting an ad need a target_id".to_string());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// LaunchChecklistItem
// ---------------------------------------------------------------------------

const CHECKLIST_FIELDS: &[FieldSpec] = &[
    field("id", &[]),
    field("label", &["title", "text"]),
    field("category", &["section"]),
    field("done", &["completed", "checked"]),
    field("owner", &["assignee"]),
    field("due_date", &["dueDate"]),
    field("updated_at", &["updatedAt"]),
];

impl Record for LaunchChecklistItem {
    const ENTITY: &'static str = "checklist_item";
    const TABLE: &'static str = "launch_checklist";
    const COLLECTION: &'static str = "launch-checklist";
    const ID_PREFIX: &'static str = "chk";
    const FIELDS: &'static [FieldSpec] = CHECKLIST_FIELDS;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_raw(raw: &Row) -> Result<Self, NormalizeError> {
        let f = Fields::new(raw, CHECKLIST_FIELDS);
        Ok(LaunchChecklistItem {
            id: f.id(Self::ENTITY)?,
            label: f.text("label"),
            category: f.text("category"),
            done: f.flag("done"),
            owner: f.opt_text("owner"),
            due_date: f.date("due_date"),
            updated_at: f.timestamp("updated_at"),
        })
    }

    fn to_row(&self) -> Row {
        object(json!({
            "id": self.id,
            "label": self.label,
            "category": self.category,
            "done": self.done,
            "owner": opt_value(&self.owner),
            "due_date": date_value(self.due_date),
            "updated_at": timestamp_value(self.updated_at),
        }))
    }

    fn to_legacy(&self) -> Row {
        object(json!({
            "id": self.id,
            "label": self.label,
            "category": self.category,
            "done": self.done,
            "owner": opt_value(&self.owner),
            "dueDate": date_value(self.due_date),
            "updatedAt": timestamp_value(self.updated_at),
        }))
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = Some(at);
    }

    fn validate_new(&self) -> Result<(), String> {
        require(&self.label, "label")
    }
}

// ---------------------------------------------------------------------------
// LifecycleMessage
// ---------------------------------------------------------------------------

const MESSAGE_FIELDS: &[FieldSpec] = &[
    field("id", &[]),
    field("name", &[]),
    field("channel", &[]),
    field("trigger_event", &["triggerEvent", "trigger"]),
    field("subject", &[]),
    field("body", &["content"]),
    field("status", &[]),
    field("updated_at", &["updatedAt"]),
];

impl Record for LifecycleMessage {
    const ENTITY: &'static str = "lifecycle_message";
    const TABLE: &'static str = "lifecycle_messages";
    const COLLECTION: &'static str = "lifecycle-messages";
    const ID_PREFIX: &'static str = "msg";
    const FIELDS: &'static [FieldSpec] = MESSAGE_FIELDS;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_raw(raw: &Row) -> Result<Self, NormalizeError> {
        let f = Fields::new(raw, MESSAGE_FIELDS);
        Ok(LifecycleMessage {
            id: f.id(Self::ENTITY)?,
            name: f.text("name"),
            channel: f.opt_text("channel").unwrap_or_else(|| "email".to_string()),
            trigger_event: f.text("trigger_event"),
            subject: f.opt_text("subject"),
            body: f.text("body"),
            status: f
                .opt_text("status")
                .and_then(|s| MessageStatus::parse(&s))
                .unwrap_or_default(),
            updated_at: f.timestamp("updated_at"),
        })
    }

    fn to_row(&self) -> Row {
        object(json!({
            "id": self.id,
            "name": self.name,
            "channel": self.channel,
            "trigger_event": self.trigger_event,
            "subject": opt_value(&self.subject),
            "body": self.body,
            "status": self.status.as_str(),
            "updated_at": timestamp_value(self.updated_at),
        }))
    }

    fn to_legacy(&self) -> Row {
        object(json!({
            "id": self.id,
            "name": self.name,
            "channel": self.channel,
            "triggerEvent": self.trigger_event,
            "subject": opt_value(&self.subject),
            "body": self.body,
            "status": self.status.as_str(),
            "updatedAt": timestamp_value(self.updated_at),
        }))
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = Some(at);
    }

    fn validate_new(&self) -> Result<(), String> {
        require(&self.name, "name")?;
        require(&self.body, "body")
    }
}

// ---------------------------------------------------------------------------
// AdTemplate
// ---------------------------------------------------------------------------

const TEMPLATE_FIELDS: &[FieldSpec] = &[
    field("id", &[]),
    field("name", &[]),
    field("platform", &[]),
    field("format", &[]),
    field("headline", &[]),
    field("primary_text", &["primaryText"]),
    field("cta", &["callToAction"]),
    field("updated_at", &["updatedAt"]),
];

impl Record for AdTemplate {
    const ENTITY: &'static str = "template";
    const TABLE: &'static str = "ad_templates";
    const COLLECTION: &'static str = "templates";
    const ID_PREFIX: &'static str = "tpl";
    const FIELDS: &'static [FieldSpec] = TEMPLATE_FIELDS;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_raw(raw: &Row) -> Result<Self, NormalizeError> {
        let f = Fields::new(raw, TEMPLATE_FIELDS);
        Ok(AdTemplate {
            id: f.id(Self::ENTITY)?,
            name: f.text("name"),
            platform: f.opt_text("platform").and_then(|p| Platform::parse(&p)),
            format: f.text("format"),
            headline: f.opt_text("headline"),
            primary_text: f.text("primary_text"),
            cta: f.text("cta"),
            updated_at: f.timestamp("updated_at"),
        })
    }

    fn to_row(&self) -> Row {
        object(json!({
            "id": self.id,
            "name": self.name,
            "platform": self.platform.map(Platform::as_str),
            "format": self.format,
            "headline": opt_value(&self.headline),
            "primary_text": self.primary_text,
            "cta": self.cta,
            "updated_at": timestamp_value(self.updated_at),
        }))
    }

    fn to_legacy(&self) -> Row {
        object(json!({
            "id": self.id,
            "name": self.name,
            "platform": self.platform.map(Platform::as_str),
            "format": self.format,
            "headline": opt_value(&self.headline),
            "primaryText": self.primary_text,
            "cta": self.cta,
            "updatedAt": timestamp_value(self.updated_at),
        }))
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = Some(at);
    }

    fn validate_new(&self) -> Result<(), String> {
        require(&self.name, "name")
    }
}

// ---------------------------------------------------------------------------
// ActivityEntry
// ---------------------------------------------------------------------------

const ACTIVITY_FIELDS: &[FieldSpec] = &[
    field("id", &[]),
    field("actor", &["user", "by"]),
    field("action", &["type"]),
    field("detail", &["message", "description"]),
    field("updated_at", &["updatedAt", "timestamp", "createdAt"]),
];

impl Record for ActivityEntry {
    const ENTITY: &'static str = "activity";
    const TABLE: &'static str = "activity_log";
    const COLLECTION: &'static str = "activity-log";
    const ID_PREFIX: &'static str = "act";
    const FIELDS: &'static [FieldSpec] = ACTIVITY_FIELDS;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_raw(raw: &Row) -> Result<Self, NormalizeError> {
        let f = Fields::new(raw, ACTIVITY_FIELDS);
        Ok(ActivityEntry {
            id: f.id(Self::ENTITY)?,
            actor: f.opt_text("actor").unwrap_or_else(|| "operator".to_string()),
            action: f.text("action"),
            detail: f.text("detail"),
            updated_at: f.timestamp("updated_at"),
        })
    }

    fn to_row(&self) -> Row {
        object(json!({
            "id": self.id,
            "actor": self.actor,
            "action": self.action,
            "detail": self.detail,
            "updated_at": timestamp_value(self.updated_at),
        }))
    }

    fn to_legacy(&self) -> Row {
        object(json!({
            "id": self.id,
            "actor": self.actor,
            "action": self.action,
            "detail": self.detail,
            "updatedAt": timestamp_value(self.updated_at),
        }))
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = Some(at);
    }

    fn validate_new(&self) -> Result<(), String> {
        require(&self.action, "action")
    }
}
