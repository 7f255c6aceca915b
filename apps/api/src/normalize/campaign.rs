use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use crate::models::campaign::{CampaignStatus, LaunchStatus, RunStatus, SINGLETON_ID};
use crate::models::Platform;
use crate::normalize::{
    field, object, timestamp_value, FieldSpec, Fields, NormalizeError, Record, Row,
};

const FIELDS: &[FieldSpec] = &[
    field("id", &[]),
    field("status", &["campaignStatus"]),
    field("started_at", &["startedAt", "startDate", "launchedAt"]),
    field("linkedin_status", &["linkedinStatus", "channels.linkedin"]),
    field("youtube_status", &["youtubeStatus", "channels.youtube"]),
    field("facebook_status", &["facebookStatus", "channels.facebook"]),
    field("instagram_status", &["instagramStatus", "channels.instagram"]),
    field("updated_at", &["updatedAt"]),
];

impl Record for CampaignStatus {
    const ENTITY: &'static str = "campaign_status";
    const TABLE: &'static str = "campaign_status";
    const COLLECTION: &'static str = "campaign-status";
    const ID_PREFIX: &'static str = "campaign";
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
                let status = f
                    .opt_text(&format!("{}_status", p.as_str()))
                    .and_then(|s| RunStatus::parse(&s))
                    .unwrap_or_default();
                (p, status)
            })
            .collect();
        Ok(CampaignStatus {
            status: f
                .opt_text("status")
                .and_then(|s| LaunchStatus::parse(&s))
                .unwrap_or_default(),
            started_at: f.timestamp("started_at"),
            channels,
            updated_at: f.timestamp("updated_at"),
        })
    }

    fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("id".into(), json!(SINGLETON_ID));
        row.insert("status".into(), json!(self.status.as_str()));
        row.insert("started_at".into(), timestamp_value(self.started_at));
        for (p, status) in &self.channels {
            row.insert(format!("{}_status", p.as_str()), json!(status.as_str()));
        }
        row.insert("updated_at".into(), timestamp_value(self.updated_at));
        row
    }

    fn to_legacy(&self) -> Row {
        let channels: Map<String, Value> = self
            .channels
            .iter()
            .map(|(p, status)| (p.as_str().to_string(), json!(status.as_str())))
            .collect();
        object(json!({
            "id": SINGLETON_ID,
            "status": self.status.as_str(),
            "startedAt": timestamp_value(self.started_at),
            "channels": channels,
            "updatedAt": timestamp_value(self.updated_at),
        }))
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = Some(at);
    }
}
