use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Platform;

/// Approval status of an ad.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdStatus {
    #[default]
    Pending,
    Approved,
    Paused,
    Rejected,
}

impl AdStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AdStatus::Pending => "pending",
            AdStatus::Approved => "approved",
            AdStatus::Paused => "paused",
            AdStatus::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(AdStatus::Pending),
            "approved" => Some(AdStatus::Approved),
            "paused" => Some(AdStatus::Paused),
            "rejected" => Some(AdStatus::Rejected),
            _ => None,
        }
    }
}

/// Position of an ad on the human production pipeline, independent of
/// its approval status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowStage {
    Concept,
    CopyReady,
    Approved,
    CreativeBrief,
    Uploaded,
    Live,
}

impl WorkflowStage {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowStage::Concept => "concept",
            WorkflowStage::CopyReady => "copy-ready",
            WorkflowStage::Approved => "approved",
            WorkflowStage::CreativeBrief => "creative-brief",
            WorkflowStage::Uploaded => "uploaded",
            WorkflowStage::Live => "live",
        }
    }

    /// Accepts both `copy-ready` and `copy_ready` spellings.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "concept" => Some(WorkflowStage::Concept),
            "copy-ready" => Some(WorkflowStage::CopyReady),
            "approved" => Some(WorkflowStage::Approved),
            "creative-brief" => Some(WorkflowStage::CreativeBrief),
            "uploaded" => Some(WorkflowStage::Uploaded),
            "live" => Some(WorkflowStage::Live),
            _ => None,
        }
    }
}

/// One entry of an ad's append-only status history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: AdStatus,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Utm {
    pub source: String,
    pub medium: String,
    pub campaign: String,
    pub content: String,
    pub term: String,
}

pub const VARIANT_SLOTS: usize = 3;

/// Canonical ad record.
#[derive(Debug, Clone, PartialEq)]
pub struct Ad {
    pub id: String,
    pub platform: Option<Platform>,
    pub campaign_group: String,
    pub format: String,
    pub headline: Option<String>,
    pub primary_text: String,
    pub cta: String,
    pub landing_path: String,
    pub utm: Utm,
    pub status: AdStatus,
    pub workflow_stage: WorkflowStage,
    pub status_history: Vec<StatusChange>,
    /// Default single image, used when no creative variant is selected.
    pub image_url: Option<String>,
    pub image_variants: [Option<String>; VARIANT_SLOTS],
    /// 1-based slot into `image_variants`.
    pub selected_variant: Option<u8>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Ad {
    /// Image shown for the ad: the selected variant when it holds an image,
    /// otherwise the legacy single image.
    pub fn display_image(&self) -> Option<&str> {
        self.selected_variant
            .and_then(|slot| self.variant(slot))
            .or(self.image_url.as_deref())
    }

    pub fn variant(&self, slot: u8) -> Option<&str> {
        let index = usize::from(slot).checked_sub(1)?;
        self.image_variants.get(index)?.as_deref()
    }
}
