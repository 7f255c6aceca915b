use chrono::{DateTime, Utc};
use serde_json::json;

use crate::models::metrics::{ChannelCounters, WeeklyMetric};
use crate::models::Platform;
use crate::normalize::{
    date_value, field, object, timestamp_value, FieldSpec, Fields, NormalizeError, Record, Row,
};

const FIELDS: &[FieldSpec] = &[
    field("id", &[]),
    field("week_start", &["weekStart", "week"]),
    field("channel", &["platform"]),
    field("spend", &[]),
    field("impressions", &[]),
    field("clicks", &[]),
    field("signups", &[]),
    field("activations", &[]),
    field("paid_conversions", &["paidConversions", "paid"]),
    field("updated_at", &["updatedAt"]),
];

/// Counter columns, in row naming.
pub const COUNTER_COLUMNS: &[&str] = &[
    "spend",
    "impressions",
    "clicks",
    "signups",
    "activations",
    "paid_conversions",
];

impl Record for WeeklyMetric {
    const ENTITY: &'static str = "weekly_metric";
    const TABLE: &'static str = "weekly_metrics";
    const COLLECTION: &'static str = "metrics";
    const ID_PREFIX: &'static str = "wm";
    const FIELDS: &'static [FieldSpec] = FIELDS;

    fn id(&self) -> &str {
        &self.id
    }

    /// Identity is (week_start, channel); any stored `id` is ignored and
    /// recomputed from them.
    fn from_raw(raw: &Row) -> Result<Self, NormalizeError> {
        let f = Fields::new(raw, FIELDS);
        let missing = NormalizeError::MissingIdentity {
            entity: Self::ENTITY,
        };
        let week_start = f.date("week_start").ok_or(missing.clone())?;
        let channel = f
            .opt_text("channel")
            .and_then(|c| Platform::parse(&c))
            .ok_or(missing)?;
        let spend = f.number("spend");
        Ok(WeeklyMetric {
            id: WeeklyMetric::key(week_start, channel),
            week_start,
            channel,
            counters: ChannelCounters {
                spend: if spend.is_finite() { spend.max(0.0) } else { 0.0 },
                impressions: f.count("impressions"),
                clicks: f.count("clicks"),
                signups: f.count("signups"),
                activations: f.count("activations"),
                paid: f.count("paid_conversions"),
            },
            updated_at: f.timestamp("updated_at"),
        })
    }

    fn to_row(&self) -> Row {
        let c = &self.counters;
        object(json!({
            "id": self.id,
            "week_start": date_value(Some(self.week_start)),
            "channel": self.channel.as_str(),
            "spend": c.spend,
            "impressions": c.impressions,
            "clicks": c.clicks,
            "signups": c.signups,
            "activations": c.activations,
            "paid_conversions": c.paid,
            "updated_at": timestamp_value(self.updated_at),
        }))
    }

    fn to_legacy(&self) -> Row {
        let c = &self.counters;
        object(json!({
            "id": self.id,
            "weekStart": date_value(Some(self.week_start)),
            "channel": self.channel.as_str(),
            "spend": c.spend,
            "impressions": c.impressions,
            "clicks": c.clicks,
            "signups": c.signups,
            "activations": c.activations,
            "paidConversions": c.paid,
            "updatedAt": timestamp_value(self.updated_at),
        }))
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = Some(at);
    }
}
