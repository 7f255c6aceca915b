use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Platform;

/// Raw weekly counters for one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelCounters {
    pub spend: f64,
    pub impressions: u64,
    pub clicks: u64,
    pub signups: u64,
    pub activations: u64,
    pub paid: u64,
}

impl ChannelCounters {
    pub fn add(&mut self, other: &ChannelCounters) {
        self.spend += other.spend;
        self.impressions = self.impressions.saturating_add(other.impressions);
        self.clicks = self.clicks.saturating_add(other.clicks);
        self.signups = self.signups.saturating_add(other.signups);
        self.activations = self.activations.saturating_add(other.activations);
        self.paid = self.paid.saturating_add(other.paid);
    }
}

/// One fact row, uniquely identified by (week_start, channel).
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyMetric {
    pub id: String,
    pub week_start: NaiveDate,
    pub channel: Platform,
    pub counters: ChannelCounters,
    pub updated_at: Option<DateTime<Utc>>,
}

impl WeeklyMetric {
    pub fn key(week_start: NaiveDate, channel: Platform) -> String {
        format!("{}_{}", week_start.format("%Y-%m-%d"), channel.as_str())
    }
}

/// Presentation aggregate: every channel for one week, zero-filled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsWeek {
    pub week_start: NaiveDate,
    pub channels: BTreeMap<Platform, ChannelCounters>,
}

/// Groups per-channel rows into weeks, oldest first.
pub fn aggregate_weeks(rows: &[WeeklyMetric]) -> Vec<MetricsWeek> {
    let mut weeks: BTreeMap<NaiveDate, BTreeMap<Platform, ChannelCounters>> = BTreeMap::new();
    for row in rows {
        let week = weeks.entry(row.week_start).or_insert_with(|| {
            Platform::ALL
                .into_iter()
                .map(|p| (p, ChannelCounters::default()))
                .collect()
        });
        week.insert(row.channel, row.counters);
    }
    weeks
        .into_iter()
        .map(|(week_start, channels)| MetricsWeek {
            week_start,
            channels,
        })
        .collect()
}
