use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::models::ad::{Ad, AdStatus, StatusChange, Utm, WorkflowStage, VARIANT_SLOTS};
use crate::models::Platform;
use crate::normalize::{
    field, object, opt_value, parse_timestamp, timestamp_value, FieldSpec, Fields, NormalizeError, Record,
    Row,
};
use crate::workflow::state_machine::derive_stage;

const FIELDS: &[FieldSpec] = &[
    field("id", &[]),
    field("platform", &[]),
    field("campaign_group", &["campaignGroup"]),
    field("format", &[]),
    field("headline", &[]),
    field("primary_text", &["primaryText"]),
    field("cta", &["callToAction"]),
    field("landing_path", &["landingPath", "landingPage"]),
    field("utm_source", &["utmSource", "utm.source"]),
    field("utm_medium", &["utmMedium", "utm.medium"]),
    field("utm_campaign", &["utmCampaign", "utm.campaign"]),
    field("utm_content", &["utmContent", "utm.content"]),
    field("utm_term", &["utmTerm", "utm.term"]),
    field("status", &[]),
    field("workflow_stage", &["workflowStage", "stage"]),
    field("status_history", &["statusHistory"]),
    field("image_url", &["imageUrl"]),
    field("image_variant_1", &["imageVariant1", "imageVariants.0"]),
    field("image_variant_2", &["imageVariant2", "imageVariants.1"]),
    field("image_variant_3", &["imageVariant3", "imageVariants.2"]),
    field("selected_variant", &["selectedVariant"]),
    field("created_at", &["createdAt"]),
    field("updated_at", &["updatedAt"]),
];

const VARIANT_COLUMNS: [&str; VARIANT_SLOTS] =
    ["image_variant_1", "image_variant_2", "image_variant_3"];

impl Record for Ad {
    const ENTITY: &'static str = "ad";
    const TABLE: &'static str = "ads";
    const COLLECTION: &'static str = "ads";
    const ID_PREFIX: &'static str = "ad";
    const FIELDS: &'static [FieldSpec] = FIELDS;
    const DRIFT_COLUMNS: &'static [&'static str] = &["workflow_stage"];

    fn id(&self) -> &str {
        &self.id
    }

    fn from_raw(raw: &Row) -> Result<Self, NormalizeError> {
        let f = Fields::new(raw, FIELDS);
        let id = f.id(Self::ENTITY)?;
        let status = f
            .opt_text("status")
            .and_then(|s| AdStatus::parse(&s))
            .unwrap_or_default();
        let workflow_stage = f
            .opt_text("workflow_stage")
            .and_then(|s| WorkflowStage::parse(&s))
            .unwrap_or_else(|| derive_stage(status));
        let selected_variant: Option<u8> = f
            .count("selected_variant")
            .try_into()
            .ok()
            .filter(|slot| (1..=VARIANT_SLOTS as u8).contains(slot));

        Ok(Ad {
            id,
            platform: f.opt_text("platform").and_then(|p| Platform::parse(&p)),
            campaign_group: f.text("campaign_group"),
            format: f.text("format"),
            headline: f.opt_text("headline"),
            primary_text: f.text("primary_text"),
            cta: f.text("cta"),
            landing_path: f.text("landing_path"),
            utm: Utm {
                source: f.text("utm_source"),
                medium: f.text("utm_medium"),
                campaign: f.text("utm_campaign"),
                content: f.text("utm_content"),
                term: f.text("utm_term"),
            },
            status,
            workflow_stage,
            status_history: parse_history(f.value("status_history")),
            image_url: f.opt_text("image_url"),
            image_variants: VARIANT_COLUMNS.map(|col| f.opt_text(col)),
            selected_variant,
            created_at: f.timestamp("created_at"),
            updated_at: f.timestamp("updated_at"),
        })
    }

    fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("id".into(), json!(self.id));
        row.insert("platform".into(), platform_value(self.platform));
        row.insert("campaign_group".into(), json!(self.campaign_group));
        row.insert("format".into(), json!(self.format));
        row.insert("headline".into(), opt_value(&self.headline));
        row.insert("primary_text".into(), json!(self.primary_text));
        row.insert("cta".into(), json!(self.cta));
        row.insert("landing_path".into(), json!(self.landing_path));
        row.insert("utm_source".into(), json!(self.utm.source));
        row.insert("utm_medium".into(), json!(self.utm.medium));
        row.insert("utm_campaign".into(), json!(self.utm.campaign));
        row.insert("utm_content".into(), json!(self.utm.content));
        row.insert("utm_term".into(), json!(self.utm.term));
        row.insert("status".into(), json!(self.status.as_str()));
        row.insert("workflow_stage".into(), json!(self.workflow_stage.as_str()));
        row.insert("status_history".into(), history_value(&self.status_history));
        row.insert("image_url".into(), opt_value(&self.image_url));
        for (col, variant) in VARIANT_COLUMNS.iter().zip(&self.image_variants) {
            row.insert((*col).into(), opt_value(variant));
        }
        row.insert("selected_variant".into(), json!(self.selected_variant));
        row.insert("created_at".into(), timestamp_value(self.created_at));
        row.insert("updated_at".into(), timestamp_value(self.updated_at));
        row
    }

    fn to_legacy(&self) -> Row {
        let variants: Vec<Value> = self.image_variants.iter().map(opt_value).collect();
        object(json!({
            "id": self.id,
            "platform": platform_value(self.platform),
            "campaignGroup": self.campaign_group,
            "format": self.format,
            "headline": opt_value(&self.headline),
            "primaryText": self.primary_text,
            "cta": self.cta,
            "landingPath": self.landing_path,
            "utm": {
                "source": self.utm.source,
                "medium": self.utm.medium,
                "campaign": self.utm.campaign,
                "content": self.utm.content,
                "term": self.utm.term,
            },
            "status": self.status.as_str(),
            "workflowStage": self.workflow_stage.as_str(),
            "statusHistory": history_value(&self.status_history),
            "imageUrl": opt_value(&self.image_url),
            "imageVariants": variants,
            "selectedVariant": self.selected_variant,
            "createdAt": timestamp_value(self.created_at),
            "updatedAt": timestamp_value(self.updated_at),
        }))
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = Some(at);
    }

    fn set_created_at(&mut self, at: DateTime<Utc>) {
        self.created_at = Some(at);
    }

    fn validate_new(&self) -> Result<(), String> {
        let mut missing = Vec::new();
        if self.platform.is_none() {
            missing.push("platform");
        }
        if self.primary_text.trim().is_empty() {
            missing.push("primary_text");
        }
        if self.cta.trim().is_empty() {
            missing.push("cta");
        }
        if self.landing_path.trim().is_empty() {
            missing.push("landing_path");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!("missing required fields: {}", missing.join(", ")))
        }
    }

    fn to_dual(&self) -> Value {
        let mut out = self.to_legacy();
        out.extend(self.to_row());
        let display = self.display_image().map(str::to_string);
        out.insert("display_image_url".into(), opt_value(&display));
        out.insert("displayImageUrl".into(), opt_value(&display));
        Value::Object(out)
    }
}

fn platform_value(platform: Option<Platform>) -> Value {
    platform
        .map(|p| Value::String(p.as_str().to_string()))
        .unwrap_or(Value::Null)
}

fn history_value(history: &[StatusChange]) -> Value {
    serde_json::to_value(history).unwrap_or_else(|_| Value::Array(Vec::new()))
}

/// Entries without a recognizable status or timestamp are dropped; order is
/// preserved as stored.
fn parse_history(value: Option<&Value>) -> Vec<StatusChange> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let obj = item.as_object()?;
            let status = obj.get("status")?.as_str().and_then(AdStatus::parse)?;
            let at = ["at", "timestamp", "changedAt", "changed_at"]
                .iter()
                .find_map(|k| obj.get(*k).and_then(parse_timestamp))?;
            let note = obj
                .get("note")
                .and_then(Value::as_str)
                .filter(|n| !n.trim().is_empty())
                .map(str::to_string);
            Some(StatusChange { status, at, note })
        })
        .collect()
}
