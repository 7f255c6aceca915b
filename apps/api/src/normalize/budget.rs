use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use crate::models::campaign::{Budget, ChannelBudget, SINGLETON_ID};
use crate::models::Platform;
use crate::normalize::{
    field, object, timestamp_value, FieldSpec, Fields, NormalizeError, Record, Row,
};

const FIELDS: &[FieldSpec] = &[
    field("id", &[]),
    field("total_budget", &["totalBudget", "total"]),
    field(
        "linkedin_allocated",
        &["linkedinAllocated", "channels.linkedin.allocated", "linkedin.allocated"],
    ),
    field(
        "linkedin_spent",
        &["linkedinSpent", "channels.linkedin.spent", "linkedin.spent"],
    ),
    field(
        "youtube_allocated",
        &["youtubeAllocated", "channels.youtube.allocated", "youtube.allocated"],
    ),
    field(
        "youtube_spent",
        &["youtubeSpent", "channels.youtube.spent", "youtube.spent"],
    ),
    field(
        "facebook_allocated",
        &["facebookAllocated", "channels.facebook.allocated", "facebook.allocated"],
    ),
    field(
        "facebook_spent",
        &["facebookSpent", "channels.facebook.spent", "facebook.spent"],
    ),
    field(
        "instagram_allocated",
        &["instagramAllocated", "channels.instagram.allocated", "instagram.allocated"],
    ),
    field(
        "instagram_spent",
        &["instagramSpent", "channels.instagram.spent", "instagram.spent"],
    ),
    field("updated_at", &["updatedAt"]),
];

impl Record for Budget {
    const ENTITY: &'static str = "budget";
    const TABLE: &'static str = "budget";
    const COLLECTION: &'static str = "budget";
    const ID_PREFIX: &'static str = "budget";
    const FIELDS: &'static [FieldSpec] = FIELDS;
    const SINGLETON: bool = true;

    fn id(&self) -> &str {
        SINGLETON_ID
    }

    fn from_raw(raw: &Row) -> Result<Self, NormalizeError> {
        let f = Fields::new(raw, FIELDS);
        let channels = Platform::ALL
            .into_iter()
            .map(|p| {
                let budget = ChannelBudget {
                    allocated: f.number(&format!("{}_allocated", p.as_str())),
                    spent: f.number(&format!("{}_spent", p.as_str())),
                };
                (p, budget)
            })
            .collect();
        Ok(Budget {
            total: f.number("total_budget"),
            channels,
            updated_at: f.timestamp("updated_at"),
        })
    }

    fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("id".into(), json!(SINGLETON_ID));
        row.insert("total_budget".into(), json!(self.total));
        for p in Platform::ALL {
            let c = self.channel(p);
            row.insert(format!("{}_allocated", p.as_str()), json!(c.allocated));
            row.insert(format!("{}_spent", p.as_str()), json!(c.spent));
        }
        row.insert("updated_at".into(), timestamp_value(self.updated_at));
        row
    }

    fn to_legacy(&self) -> Row {
        let channels: Map<String, Value> = Platform::ALL
            .into_iter()
            .map(|p| {
                let c = self.channel(p);
                (
                    p.as_str().to_string(),
                    json!({"allocated": c.allocated, "spent": c.spent}),
                )
            })
            .collect();
        object(json!({
            "id": SINGLETON_ID,
            "total": self.total,
            "channels": channels,
            "updatedAt": timestamp_value(self.updated_at),
        }))
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = Some(at);
    }
}
