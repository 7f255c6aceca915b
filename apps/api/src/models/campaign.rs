use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Platform;

/// Id of the single budget row and the single campaign-status row.
pub const SINGLETON_ID: &str = "main";

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelBudget {
    pub allocated: f64,
    pub spent: f64,
}

/// Campaign budget. Only raw amounts are stored; remaining and burn are
/// always recomputed from them.
#[derive(Debug, Clone, PartialEq)]
pub struct Budget {
    pub total: f64,
    pub channels: BTreeMap<Platform, ChannelBudget>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            total: 0.0,
            channels: Platform::ALL
                .into_iter()
                .map(|p| (p, ChannelBudget::default()))
                .collect(),
            updated_at: None,
        }
    }
}

impl Budget {
    pub fn channel(&self, platform: Platform) -> ChannelBudget {
        self.channels.get(&platform).copied().unwrap_or_default()
    }
}

/// Overall campaign lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LaunchStatus {
    #[default]
    PreLaunch,
    Live,
    Paused,
    Ended,
}

impl LaunchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LaunchStatus::PreLaunch => "pre-launch",
            LaunchStatus::Live => "live",
            LaunchStatus::Paused => "paused",
            LaunchStatus::Ended => "ended",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "pre-launch" | "prelaunch" => Some(LaunchStatus::PreLaunch),
            "live" => Some(LaunchStatus::Live),
            "paused" => Some(LaunchStatus::Paused),
            "ended" => Some(LaunchStatus::Ended),
            _ => None,
        }
    }
}

/// Per-channel run status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Ready,
    Live,
    Paused,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Ready => "ready",
            RunStatus::Live => "live",
            RunStatus::Paused => "paused",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ready" => Some(RunStatus::Ready),
            "live" => Some(RunStatus::Live),
            "paused" => Some(RunStatus::Paused),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CampaignStatus {
    pub status: LaunchStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub channels: BTreeMap<Platform, RunStatus>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for CampaignStatus {
    fn default() -> Self {
        Self {
            status: LaunchStatus::PreLaunch,
            started_at: None,
            channels: Platform::ALL
                .into_iter()
                .map(|p| (p, RunStatus::Ready))
                .collect(),
            updated_at: None,
        }
    }
}
