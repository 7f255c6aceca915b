use std::collections::BTreeMap;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::audit::{self, AuditLogger, Change};
use crate::campaign::{load_singleton, require_non_negative};
use crate::errors::AppError;
use crate::models::campaign::{Budget, SINGLETON_ID};
use crate::models::Platform;
use crate::normalize::{apply_patch, Record, Row};
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelSummary {
    pub allocated: f64,
    pub spent: f64,
    pub remaining: f64,
    pub burn_pct: f64,
}

/// Read-time view over a `Budget`. Never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetSummary {
    pub total: f64,
    pub allocated: f64,
    pub spent: f64,
    pub remaining: f64,
    pub unallocated: f64,
    pub burn_pct: f64,
    pub channels: BTreeMap<Platform, ChannelSummary>,
}

fn pct(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}

pub fn summarize(budget: &Budget) -> BudgetSummary {
    let channels: BTreeMap<Platform, ChannelSummary> = Platform::ALL
        .into_iter()
        .map(|p| {
            let c = budget.channel(p);
            let summary = ChannelSummary {
                allocated: c.allocated,
                spent: c.spent,
                remaining: c.allocated - c.spent,
                burn_pct: pct(c.spent, c.allocated),
            };
            (p, summary)
        })
        .collect();
    let allocated: f64 = channels.values().map(|c| c.allocated).sum();
    let spent: f64 = channels.values().map(|c| c.spent).sum();
    BudgetSummary {
        total: budget.total,
        allocated,
        spent,
        remaining: budget.total - spent,
        unallocated: budget.total - allocated,
        burn_pct: pct(spent, budget.total),
        channels,
    }
}

pub async fn get_budget(store: &Store) -> Result<Budget, AppError> {
    load_singleton(store).await
}

/// Sets any of the total and per-channel allocated/spent amounts. Each is
/// independent; omitted amounts keep their stored value.
pub async fn update_budget(store: &Store, audit: &AuditLogger, patch: &Row) -> Result<Budget, AppError> {
    let amounts: Vec<&str> = Budget::FIELDS
        .iter()
        .map(|f| f.row)
        .filter(|row| *row != "id" && *row != "updated_at")
        .collect();
    require_non_negative::<Budget>(patch, &amounts)?;

    let now = Utc::now();
    let updated = store
        .mutate_or_default::<Budget, AppError, _, _>(
            audit,
            SINGLETON_ID,
            |current| {
                let mut next = apply_patch(current, patch, &["updated_at"])?;
                next.set_updated_at(now);
                Ok(next)
            },
            |_, _| Change::new(audit::UPDATED, now),
        )
        .await?;
    info!("Updated budget (total {})", updated.after.total);
    Ok(updated.after)
}
