use chrono::{DateTime, Utc};
use tracing::info;

use crate::audit::{self, AuditLogger, Change};
use crate::campaign::load_singleton;
use crate::errors::AppError;
use crate::models::campaign::{CampaignStatus, LaunchStatus, RunStatus, SINGLETON_ID};
use crate::models::Platform;
use crate::normalize::{apply_patch, Fields, Record, Row};
use crate::store::Store;

pub async fn get_campaign_status(store: &Store) -> Result<CampaignStatus, AppError> {
    load_singleton(store).await
}

/// Rejects status values that would otherwise normalize to a default.
fn validate_patch(patch: &Row) -> Result<(), AppError> {
    let fields = Fields::new(patch, CampaignStatus::FIELDS);
    if let Some(raw) = fields.opt_text("status") {
        LaunchStatus::parse(&raw)
            .ok_or_else(|| AppError::Validation(format!("unknown campaign status '{raw}'")))?;
    }
    for p in Platform::ALL {
        let column = format!("{}_status", p.as_str());
        if let Some(raw) = fields.opt_text(&column) {
            RunStatus::parse(&raw).ok_or_else(|| {
                AppError::Validation(format!("unknown {} run status '{raw}'", p.as_str()))
            })?;
        }
    }
    Ok(())
}

/// Overall status and per-channel run statuses are set independently.
pub async fn update_campaign_status(
    store: &Store,
    audit: &AuditLogger,
    patch: &Row,
) -> Result<CampaignStatus, AppError> {
    validate_patch(patch)?;
    let now = Utc::now();
    let updated = store
        .mutate_or_default::<CampaignStatus, AppError, _, _>(
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
    info!("Campaign status -> {}", updated.after.status.as_str());
    Ok(updated.after)
}

/// Sets the campaign live, stamps `started_at` and sets every channel live,
/// all in one write.
pub async fn go_live(
    store: &Store,
    audit: &AuditLogger,
    at: Option<DateTime<Utc>>,
) -> Result<CampaignStatus, AppError> {
    let now = Utc::now();
    let live = store
        .mutate_or_default::<CampaignStatus, AppError, _, _>(
            audit,
            SINGLETON_ID,
            |current| {
                let mut next = current.clone();
                next.status = LaunchStatus::Live;
                next.started_at = Some(at.unwrap_or(now));
                for p in Platform::ALL {
                    next.channels.insert(p, RunStatus::Live);
                }
                next.set_updated_at(now);
                Ok(next)
            },
            |_, _| Change::new(audit::WENT_LIVE, now),
        )
        .await?;
    info!("Campaign went live");
    Ok(live.after)
}
