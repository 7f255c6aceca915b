use chrono::Utc;
use tracing::{info, warn};

use crate::audit::{self, AuditLogger, Change};
use crate::errors::AppError;
use crate::models::ad::Ad;
use crate::models::satellite::{ApprovalItem, ApprovalStatus, TargetKind};
use crate::records;
use crate::store::Store;
use crate::workflow::service::{get_ad, transition_ad};

#[derive(Debug, Clone)]
pub struct Decision {
    pub status: ApprovalStatus,
    pub reviewer: Option<String>,
    pub note: Option<String>,
}

/// Records a decision on an approval item. When the item targets an ad,
/// the ad is moved to the matching status with the decision note.
///
/// Routing uses the item's explicit `target_kind`; the shape of
/// `target_id` is never inspected. The targeted ad is checked before
/// anything is written, and if moving it fails the item's decision is
/// reverted along with its audit entry.
pub async fn decide_approval(
    store: &Store,
    audit: &AuditLogger,
    id: &str,
    decision: Decision,
) -> Result<(ApprovalItem, Option<Ad>), AppError> {
    let current: ApprovalItem = records::get(store, id).await?;
    let target_ad = match (current.target_kind, current.target_id.as_deref()) {
        (TargetKind::Ad, Some(ad_id)) => Some(get_ad(store, ad_id).await?.id),
        (TargetKind::Ad, None) => {
            return Err(AppError::Validation(format!(
                "approval {id} targets an ad but has no target_id"
            )))
        }
        _ => None,
    };

    let now = Utc::now();
    let note = decision.note.as_deref();
    let decided = store
        .mutate::<ApprovalItem, AppError, _, _>(
            audit,
            id,
            |current| {
                let mut next = current.clone();
                next.status = decision.status;
                if decision.reviewer.is_some() {
                    next.reviewer = decision.reviewer.clone();
                }
                next.note = decision.note.clone();
                next.updated_at = Some(now);
                Ok(next)
            },
            |_, _| Change::new(audit::STATUS_CHANGED, now).note(note),
        )
        .await?;
    info!("Approval {id} -> {}", decided.after.status.as_str());

    let Some(ad_id) = target_ad else {
        return Ok((decided.after, None));
    };
    match transition_ad(store, audit, &ad_id, decision.status.as_ad_status(), None, note).await {
        Ok(ad) => Ok((decided.after, Some(ad))),
        Err(err) => {
            if let Err(e) = decided.revert(store, audit).await {
                warn!("Failed to revert approval {id} after ad {ad_id} failed: {e}");
            }
            Err(err)
        }
    }
}
