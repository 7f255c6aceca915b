use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ad::AdStatus;
use crate::models::Platform;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(ApprovalStatus::Pending),
            "approved" => Some(ApprovalStatus::Approved),
            "rejected" => Some(ApprovalStatus::Rejected),
            _ => None,
        }
    }

    pub fn as_ad_status(self) -> AdStatus {
        match self {
            ApprovalStatus::Pending => AdStatus::Pending,
            ApprovalStatus::Approved => AdStatus::Approved,
            ApprovalStatus::Rejected => AdStatus::Rejected,
        }
    }
}

/// What an approval item points at. Stored explicitly so decisions never
/// have to guess from the shape of `target_id`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Ad,
    CampaignGroup,
    #[default]
    Other,
}

impl TargetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetKind::Ad => "ad",
            TargetKind::CampaignGroup => "campaign_group",
            TargetKind::Other => "other",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "ad" => Some(TargetKind::Ad),
            "campaign_group" | "campaigngroup" => Some(TargetKind::CampaignGroup),
            "other" => Some(TargetKind::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalItem {
    pub id: String,
    pub title: String,
    pub target_kind: TargetKind,
    pub target_id: Option<String>,
    pub status: ApprovalStatus,
    pub reviewer: Option<String>,
    pub note: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LaunchChecklistItem {
    pub id: String,
    pub label: String,
    pub category: String,
    pub done: bool,
    pub owner: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    #[default]
    Draft,
    Active,
    Paused,
}

impl MessageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageStatus::Draft => "draft",
            MessageStatus::Active => "active",
            MessageStatus::Paused => "paused",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(MessageStatus::Draft),
            "active" | "live" => Some(MessageStatus::Active),
            "paused" => Some(MessageStatus::Paused),
            _ => None,
        }
    }
}

/// Onboarding/retention message (email, in-app, sms) tied to a trigger event.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleMessage {
    pub id: String,
    pub name: String,
    pub channel: String,
    pub trigger_event: String,
    pub subject: Option<String>,
    pub body: String,
    pub status: MessageStatus,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Reusable copy skeleton for new ads. The only hard-deletable entity.
#[derive(Debug, Clone, PartialEq)]
pub struct AdTemplate {
    pub id: String,
    pub name: String,
    pub platform: Option<Platform>,
    pub format: String,
    pub headline: Option<String>,
    pub primary_text: String,
    pub cta: String,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityEntry {
    pub id: String,
    pub actor: String,
    pub action: String,
    pub detail: String,
    pub updated_at: Option<DateTime<Utc>>,
}
