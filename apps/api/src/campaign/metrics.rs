use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::info;

use crate::audit::{self, AuditLogger, Change};
use crate::campaign::require_non_negative;
use crate::errors::AppError;
use crate::models::metrics::{aggregate_weeks, ChannelCounters, MetricsWeek, WeeklyMetric};
use crate::models::Platform;
use crate::normalize::metrics::COUNTER_COLUMNS;
use crate::normalize::{NormalizeError, Record, Row};
use crate::signals::engine::{evaluate, ChannelKpis, Signal};
use crate::store::remote::Predicate;
use crate::store::Store;

#[derive(Debug, Clone, Serialize)]
pub struct ChannelHealth {
    pub channel: Platform,
    pub week_start: NaiveDate,
    pub counters: ChannelCounters,
    pub kpis: ChannelKpis,
    pub signal: Signal,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthTotals {
    pub counters: ChannelCounters,
    pub kpis: ChannelKpis,
    pub signal: Signal,
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignHealth {
    pub channels: Vec<ChannelHealth>,
    pub totals: HealthTotals,
}

/// Writes one (week, channel) fact. Idempotent: the same week and channel
/// always land on the same record.
pub async fn upsert_metric(
    store: &Store,
    audit: &AuditLogger,
    input: &Row,
) -> Result<WeeklyMetric, AppError> {
    require_non_negative::<WeeklyMetric>(input, COUNTER_COLUMNS)?;
    let mut metric = WeeklyMetric::from_raw(input).map_err(|e| match e {
        NormalizeError::MissingIdentity { .. } => {
            AppError::Validation("week_start and a known channel are required".to_string())
        }
        other => other.into(),
    })?;
    let now = Utc::now();
    metric.set_updated_at(now);

    let before: Option<WeeklyMetric> = store.get(&metric.id).await?;
    let action = if before.is_some() { audit::UPDATED } else { audit::CREATED };
    audit
        .journaled(Change::new(action, now), before.as_ref(), Some(&metric), store.upsert(&metric))
        .await?;
    info!("Upserted metrics {}", metric.id);
    Ok(metric)
}

/// Rows within `[from, to]` (inclusive), oldest week first.
pub async fn list_metrics(
    store: &Store,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    channel: Option<Platform>,
) -> Result<Vec<WeeklyMetric>, AppError> {
    let mut filter = Vec::new();
    if let Some(from) = from {
        filter.push(Predicate::Gte("week_start".into(), from.format("%Y-%m-%d").to_string()));
    }
    if let Some(to) = to {
        filter.push(Predicate::Lte("week_start".into(), to.format("%Y-%m-%d").to_string()));
    }
    if let Some(channel) = channel {
        filter.push(Predicate::eq("channel", channel.as_str()));
    }
    let mut rows: Vec<WeeklyMetric> = store.list(&filter).await?;
    rows.sort_by(|a, b| (a.week_start, a.channel).cmp(&(b.week_start, b.channel)));
    Ok(rows)
}

pub async fn metrics_weeks(
    store: &Store,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<Vec<MetricsWeek>, AppError> {
    let rows = list_metrics(store, from, to, None).await?;
    Ok(aggregate_weeks(&rows))
}

/// Latest week per channel, each with KPIs and a signal, plus totals over
/// those same rows.
pub fn health_of(rows: &[WeeklyMetric]) -> CampaignHealth {
    let mut latest: BTreeMap<Platform, &WeeklyMetric> = BTreeMap::new();
    for row in rows {
        latest
            .entry(row.channel)
            .and_modify(|cur| {
                if row.week_start > cur.week_start {
                    *cur = row;
                }
            })
            .or_insert(row);
    }

    let mut total = ChannelCounters::default();
    let channels = latest
        .into_values()
        .map(|row| {
            total.add(&row.counters);
            let (kpis, signal) = evaluate(&row.counters);
            ChannelHealth {
                channel: row.channel,
                week_start: row.week_start,
                counters: row.counters,
                kpis,
                signal,
            }
        })
        .collect();
    let (kpis, signal) = evaluate(&total);
    CampaignHealth {
        channels,
        totals: HealthTotals {
            counters: total,
            kpis,
            signal,
        },
    }
}

pub async fn campaign_health(store: &Store) -> Result<CampaignHealth, AppError> {
    let rows: Vec<WeeklyMetric> = store.list(&[]).await?;
    Ok(health_of(&rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::object;
    use crate::store::fallback::FallbackStore;
    use crate::store::memory::MemoryRemote;
    use crate::store::Backend;
    use serde_json::json;
    use std::sync::Arc;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_per_week_and_channel() {
        let dir = tempfile::tempdir().unwrap();
        for store in [
            Store::new(Backend::Remote(Arc::new(MemoryRemote::new()))),
            Store::new(Backend::Fallback(FallbackStore::new(dir.path()))),
        ] {
            let audit = AuditLogger::new(store.clone());
            let input = object(json!({"weekStart": "2026-03-02", "channel": "linkedin", "spend": 100}));
            upsert_metric(&store, &audit, &input).await.unwrap();
            let input = object(json!({"week_start": "2026-03-02", "platform": "LinkedIn", "spend": 150, "paid": 2}));
            let metric = upsert_metric(&store, &audit, &input).await.unwrap();
            assert_eq!(metric.id, "2026-03-02_linkedin");

            let rows = list_metrics(&store, None, None, None).await.unwrap();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].counters.spend, 150.0);
            assert_eq!(rows[0].counters.paid, 2);
        }
    }

    #[tokio::test]
    async fn test_invalid_metrics_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(Backend::Fallback(FallbackStore::new(dir.path())));
        let audit = AuditLogger::new(store.clone());
        for input in [
            json!({"week_start": "2026-03-02", "channel": "linkedin", "clicks": -1}),
            json!({"week_start": "2026-03-02", "channel": "tiktok"}),
            json!({"channel": "youtube", "spend": 10}),
            json!({"week_start": "2026-03-02", "channel": "linkedin", "clicks": 1e30}),
            json!({"week_start": "2026-03-02", "channel": "linkedin", "spend": 1e300}),
        ] {
            let err = upsert_metric(&store, &audit, &object(input)).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn test_range_and_channel_filters() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(Backend::Fallback(FallbackStore::new(dir.path())));
        let audit = AuditLogger::new(store.clone());
        for (week, channel) in [
            ("2026-02-23", "youtube"),
            ("2026-03-02", "youtube"),
            ("2026-03-02", "facebook"),
            ("2026-03-09", "youtube"),
        ] {
            upsert_metric(&store, &audit, &object(json!({"week_start": week, "channel": channel})))
                .await
                .unwrap();
        }
        let rows = list_metrics(
            &store,
            Some(date("2026-03-02")),
            Some(date("2026-03-09")),
            Some(Platform::Youtube),
        )
        .await
        .unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["2026-03-02_youtube", "2026-03-09_youtube"]);

        let weeks = metrics_weeks(&store, Some(date("2026-03-01")), None).await.unwrap();
        assert_eq!(weeks.len(), 2);
        assert_eq!(weeks[0].channels.len(), 4);
    }

    #[test]
    fn test_health_uses_latest_week_per_channel() {
        let row = |week: &str, channel: Platform, counters: ChannelCounters| WeeklyMetric {
            id: WeeklyMetric::key(date(week), channel),
            week_start: date(week),
            channel,
            counters,
            updated_at: None,
        };
        let weak = ChannelCounters {
            spend: 350.0,
            impressions: 10_000,
            clicks: 80,
            signups: 10,
            activations: 1,
            paid: 0,
        };
        let strong = ChannelCounters {
            spend: 500.0,
            impressions: 10_000,
            clicks: 200,
            signups: 40,
            activations: 20,
            paid: 10,
        };
        let health = health_of(&[
            row("2026-03-09", Platform::Linkedin, strong),
            row("2026-03-02", Platform::Linkedin, weak),
            row("2026-03-09", Platform::Youtube, weak),
        ]);
        assert_eq!(health.channels.len(), 2);
        assert_eq!(health.channels[0].channel, Platform::Linkedin);
        assert_eq!(health.channels[0].signal, Signal::Scale);
        assert_eq!(health.channels[1].signal, Signal::Kill);
        assert_eq!(health.totals.counters.spend, 850.0);
        assert_eq!(health.totals.counters.signups, 50);
    }

    #[test]
    fn test_health_totals_saturate() {
        let huge = ChannelCounters {
            spend: 1.0,
            impressions: u64::MAX,
            clicks: u64::MAX,
            signups: u64::MAX,
            activations: 1,
            paid: 1,
        };
        let row = |channel: Platform| WeeklyMetric {
            id: WeeklyMetric::key(date("2026-03-02"), channel),
            week_start: date("2026-03-02"),
            channel,
            counters: huge,
            updated_at: None,
        };
        let health = health_of(&[row(Platform::Linkedin), row(Platform::Youtube)]);
        assert_eq!(health.totals.counters.impressions, u64::MAX);
        assert_eq!(health.totals.counters.clicks, u64::MAX);
        assert_eq!(health.totals.counters.paid, 2);
    }
}
