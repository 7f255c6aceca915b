//! Ad operations. Every read-modify-write goes through `Store::mutate`, and
//! every mutation is journaled: a write that fails leaves no audit entry.

use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use crate::audit::{self, AuditLogger, Change};
use crate::errors::AppError;
use crate::models::ad::{Ad, AdStatus, WorkflowStage, VARIANT_SLOTS};
use crate::models::Platform;
use crate::normalize::{apply_patch, Fields, Record, Row};
use crate::records::{self, prepare_new};
use crate::signals::trade;
use crate::store::remote::Predicate;
use crate::store::Store;
use crate::workflow::state_machine::{apply_stage, apply_status, seed_history};

/// Lifecycle fields only the state machine may write.
const PATCH_SKIP: &[&str] = &[
    "status",
    "workflow_stage",
    "status_history",
    "created_at",
    "updated_at",
];

#[derive(Debug, Default, Clone, Deserialize)]
pub struct AdFilter {
    pub platform: Option<String>,
    pub status: Option<String>,
    pub workflow_stage: Option<String>,
    pub campaign_group: Option<String>,
    pub trade: Option<String>,
}

pub fn parse_status(raw: &str) -> Result<AdStatus, AppError> {
    AdStatus::parse(raw).ok_or_else(|| AppError::Validation(format!("unknown status '{raw}'")))
}

pub fn parse_stage(raw: &str) -> Result<WorkflowStage, AppError> {
    WorkflowStage::parse(raw)
        .ok_or_else(|| AppError::Validation(format!("unknown workflow stage '{raw}'")))
}

impl AdFilter {
    fn predicates(&self) -> Result<Vec<Predicate>, AppError> {
        let mut filter = Vec::new();
        if let Some(raw) = &self.platform {
            let platform = Platform::parse(raw)
                .ok_or_else(|| AppError::Validation(format!("unknown platform '{raw}'")))?;
            filter.push(Predicate::eq("platform", platform.as_str()));
        }
        if let Some(raw) = &self.status {
            filter.push(Predicate::eq("status", parse_status(raw)?.as_str()));
        }
        if let Some(raw) = &self.workflow_stage {
            filter.push(Predicate::eq("workflow_stage", parse_stage(raw)?.as_str()));
        }
        if let Some(group) = &self.campaign_group {
            filter.push(Predicate::eq("campaign_group", group.as_str()));
        }
        Ok(filter)
    }
}

/// Chooses the audit action that best describes the difference.
fn change_action(before: &Ad, after: &Ad) -> &'static str {
    if before.status != after.status {
        audit::STATUS_CHANGED
    } else if before.workflow_stage != after.workflow_stage {
        audit::STAGE_CHANGED
    } else {
        audit::UPDATED
    }
}

pub async fn get_ad(store: &Store, id: &str) -> Result<Ad, AppError> {
    records::get(store, id).await
}

pub async fn list_ads(store: &Store, filter: &AdFilter) -> Result<Vec<Ad>, AppError> {
    let ads: Vec<Ad> = store.list(&filter.predicates()?).await?;
    let Some(wanted) = filter.trade.as_deref().map(str::to_ascii_lowercase) else {
        return Ok(ads);
    };
    Ok(ads
        .into_iter()
        .filter(|ad| trade::classify(&ad.campaign_group, &ad.utm.campaign, &ad.landing_path) == wanted)
        .collect())
}

/// Creates an ad. Status defaults to pending, the stage is derived when
/// not given and the history starts with one entry.
pub async fn create_ad(store: &Store, audit: &AuditLogger, input: &Row) -> Result<Ad, AppError> {
    let fields = Fields::new(input, Ad::FIELDS);
    if let Some(raw) = fields.opt_text("status") {
        parse_status(&raw)?;
    }
    if let Some(raw) = fields.opt_text("workflow_stage") {
        parse_stage(&raw)?;
    }
    let now = Utc::now();
    let mut ad: Ad = prepare_new(input, now)?;
    seed_history(&mut ad, now);
    audit
        .journaled(Change::new(audit::CREATED, now), None, Some(&ad), store.insert(&ad))
        .await?;
    info!("Created ad {} ({})", ad.id, ad.status.as_str());
    Ok(ad)
}

/// Applies a content patch in either naming convention. `status`,
/// `workflow_stage` and `note` in the patch are routed through the state
/// machine.
pub async fn update_ad(
    store: &Store,
    audit: &AuditLogger,
    id: &str,
    patch: &Row,
) -> Result<Ad, AppError> {
    let fields = Fields::new(patch, Ad::FIELDS);
    let status = fields.opt_text("status").map(|s| parse_status(&s)).transpose()?;
    let stage = fields
        .opt_text("workflow_stage")
        .map(|s| parse_stage(&s))
        .transpose()?;
    let note = patch.get("note").and_then(|v| v.as_str());
    let now = Utc::now();

    let updated = store
        .mutate::<Ad, AppError, _, _>(
            audit,
            id,
            |current| {
                let mut next = apply_patch(current, patch, PATCH_SKIP)?;
                match (status, stage) {
                    (Some(status), stage) => {
                        apply_status(&mut next, status, stage, note, now);
                    }
                    (None, Some(stage)) => apply_stage(&mut next, stage),
                    (None, None) => {}
                }
                next.set_updated_at(now);
                Ok(next)
            },
            |before, after| Change::new(change_action(before, after), now).note(note),
        )
        .await?;
    info!("Updated ad {id}");
    Ok(updated.after)
}

pub async fn transition_ad(
    store: &Store,
    audit: &AuditLogger,
    id: &str,
    status: AdStatus,
    stage: Option<WorkflowStage>,
    note: Option<&str>,
) -> Result<Ad, AppError> {
    let now = Utc::now();
    let moved = store
        .mutate::<Ad, AppError, _, _>(
            audit,
            id,
            |current| {
                let mut next = current.clone();
                apply_status(&mut next, status, stage, note, now);
                next.set_updated_at(now);
                Ok(next)
            },
            |before, after| Change::new(change_action(before, after), now).note(note),
        )
        .await?;
    info!(
        "Ad {id} status {} -> {}",
        moved.before.status.as_str(),
        moved.after.status.as_str()
    );
    Ok(moved.after)
}

/// Places the ad on the pipeline board without touching status or history.
pub async fn set_stage(
    store: &Store,
    audit: &AuditLogger,
    id: &str,
    stage: WorkflowStage,
) -> Result<Ad, AppError> {
    let now = Utc::now();
    let staged = store
        .mutate::<Ad, AppError, _, _>(
            audit,
            id,
            |current| {
                let mut next = current.clone();
                apply_stage(&mut next, stage);
                next.set_updated_at(now);
                Ok(next)
            },
            |_, _| Change::new(audit::STAGE_CHANGED, now),
        )
        .await?;
    info!("Ad {id} stage -> {}", stage.as_str());
    Ok(staged.after)
}

/// Points the ad at creative slot `slot` (1-based), which must hold an image.
pub async fn select_variant(
    store: &Store,
    audit: &AuditLogger,
    id: &str,
    slot: u8,
) -> Result<Ad, AppError> {
    if !(1..=VARIANT_SLOTS as u8).contains(&slot) {
        return Err(AppError::Validation(format!(
            "variant slot must be between 1 and {VARIANT_SLOTS}"
        )));
    }
    let now = Utc::now();
    let selected = store
        .mutate::<Ad, AppError, _, _>(
            audit,
            id,
            |current| {
                if current.variant(slot).is_none() {
                    return Err(AppError::Validation(format!(
                        "variant slot {slot} has no image"
                    )));
                }
                let mut next = current.clone();
                next.selected_variant = Some(slot);
                next.set_updated_at(now);
                Ok(next)
            },
            |_, _| Change::new(audit::VARIANT_SELECTED, now),
        )
        .await?;
    info!("Ad {id} selected variant {slot}");
    Ok(selected.after)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audit::AuditEntry;
    use crate::normalize::object;
    use crate::store::fallback::FallbackStore;
    use crate::store::memory::MemoryRemote;
    use crate::store::Backend;
    use crate::workflow::state_machine::CREATED_NOTE;
    use serde_json::json;
    use std::sync::Arc;

    fn new_ad(id: &str) -> Row {
        object(json!({
            "id": id,
            "platform": "linkedin",
            "campaignGroup": "4h_linkedin_duct",
            "primaryText": "Stop chasing invoices.",
            "cta": "Start free",
            "landingPath": "/trades/duct",
            "imageVariants": ["a.png", null, "c.png"]
        }))
    }

    fn services() -> Vec<(Store, AuditLogger, Option<tempfile::TempDir>)> {
        let dir = tempfile::tempdir().unwrap();
        let remote = Store::new(Backend::Remote(Arc::new(MemoryRemote::new())));
        let fallback = Store::new(Backend::Fallback(FallbackStore::new(dir.path())));
        vec![
            (remote.clone(), AuditLogger::new(remote), None),
            (fallback.clone(), AuditLogger::new(fallback), Some(dir)),
        ]
    }

    async fn actions(audit: &AuditLogger, id: &str) -> Vec<String> {
        let entries: Vec<AuditEntry> = audit.list(Some("ad"), Some(id)).await.unwrap();
        entries.into_iter().map(|e| e.action).collect()
    }

    #[tokio::test]
    async fn test_create_defaults_and_seeds_history() {
        for (store, audit, _dir) in services() {
            let ad = create_ad(&store, &audit, &new_ad("ad-1")).await.unwrap();
            assert_eq!(ad.status, AdStatus::Pending);
            assert_eq!(ad.workflow_stage, WorkflowStage::CopyReady);
            assert_eq!(ad.status_history.len(), 1);
            assert_eq!(ad.status_history[0].note.as_deref(), Some(CREATED_NOTE));
            assert_eq!(get_ad(&store, "ad-1").await.unwrap(), ad);
        }
    }

    #[tokio::test]
    async fn test_create_requires_content_fields() {
        for (store, audit, _dir) in services() {
            let err = create_ad(&store, &audit, &object(json!({"platform": "youtube"})))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
            assert!(store.list::<Ad>(&[]).await.unwrap().is_empty());
            assert!(audit.list(None, None).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_duplicate_id_conflicts_and_keeps_existing() {
        for (store, audit, _dir) in services() {
            let original = create_ad(&store, &audit, &new_ad("ad-1")).await.unwrap();
            let mut dup = new_ad("ad-1");
            dup.insert("primaryText".into(), json!("Overwritten?"));
            let err = create_ad(&store, &audit, &dup).await.unwrap_err();
            assert!(matches!(err, AppError::Conflict(_)));
            assert_eq!(get_ad(&store, "ad-1").await.unwrap(), original);
            assert_eq!(actions(&audit, "ad-1").await, vec!["created"]);
        }
    }

    #[tokio::test]
    async fn test_transitions_append_history_and_audit() {
        for (store, audit, _dir) in services() {
            create_ad(&store, &audit, &new_ad("ad-1")).await.unwrap();
            let approved = transition_ad(&store, &audit, "ad-1", AdStatus::Approved, None, Some("ok"))
                .await
                .unwrap();
            assert_eq!(approved.workflow_stage, WorkflowStage::Approved);
            assert_eq!(approved.status_history.len(), 2);

            let staged = set_stage(&store, &audit, "ad-1", WorkflowStage::CreativeBrief)
                .await
                .unwrap();
            assert_eq!(staged.status_history.len(), 2);
            assert_eq!(staged.status, AdStatus::Approved);

            let paused = transition_ad(&store, &audit, "ad-1", AdStatus::Paused, None, None)
                .await
                .unwrap();
            assert_eq!(paused.workflow_stage, WorkflowStage::Uploaded);
            assert_eq!(paused.status_history.len(), 3);

            assert_eq!(
                actions(&audit, "ad-1").await,
                vec!["status_changed", "stage_changed", "status_changed", "created"]
            );
        }
    }

    #[tokio::test]
    async fn test_content_update_leaves_history() {
        for (store, audit, _dir) in services() {
            create_ad(&store, &audit, &new_ad("ad-1")).await.unwrap();
            let patch = object(json!({"primary_text": "New copy", "statusHistory": []}));
            let ad = update_ad(&store, &audit, "ad-1", &patch).await.unwrap();
            assert_eq!(ad.primary_text, "New copy");
            assert_eq!(ad.status_history.len(), 1);

            let patch = object(json!({"status": "rejected", "note": "off brand"}));
            let ad = update_ad(&store, &audit, "ad-1", &patch).await.unwrap();
            assert_eq!(ad.workflow_stage, WorkflowStage::Concept);
            assert_eq!(ad.status_history.len(), 2);
            assert_eq!(ad.status_history[1].note.as_deref(), Some("off brand"));

            let bad = object(json!({"status": "archived"}));
            let err = update_ad(&store, &audit, "ad-1", &bad).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn test_select_variant_requires_image() {
        for (store, audit, _dir) in services() {
            create_ad(&store, &audit, &new_ad("ad-1")).await.unwrap();
            let ad = select_variant(&store, &audit, "ad-1", 3).await.unwrap();
            assert_eq!(ad.display_image(), Some("c.png"));

            for slot in [0, 2, 4] {
                let err = select_variant(&store, &audit, "ad-1", slot).await.unwrap_err();
                assert!(matches!(err, AppError::Validation(_)), "slot {slot}");
            }
            let err = select_variant(&store, &audit, "ad-404", 1).await.unwrap_err();
            assert!(matches!(err, AppError::NotFound(_)));
        }
    }

    #[tokio::test]
    async fn test_list_filters_including_trade() {
        for (store, audit, _dir) in services() {
            create_ad(&store, &audit, &new_ad("ad-1")).await.unwrap();
            let mut other = new_ad("ad-2");
            other.insert("campaignGroup".into(), json!("nb2_2026-03_trowel_d2"));
            other.insert("platform".into(), json!("youtube"));
            create_ad(&store, &audit, &other).await.unwrap();
            transition_ad(&store, &audit, "ad-2", AdStatus::Approved, None, None)
                .await
                .unwrap();

            let by_trade = list_ads(
                &store,
                &AdFilter {
                    trade: Some("trowel".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
            assert_eq!(by_trade.len(), 1);
            assert_eq!(by_trade[0].id, "ad-2");

            let by_stage = list_ads(
                &store,
                &AdFilter {
                    workflow_stage: Some("copy_ready".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
            assert_eq!(by_stage.len(), 1);
            assert_eq!(by_stage[0].id, "ad-1");

            let bad = AdFilter {
                platform: Some("myspace".into()),
                ..Default::default()
            };
            assert!(matches!(list_ads(&store, &bad).await, Err(AppError::Validation(_))));
        }
    }

    #[tokio::test]
    async fn test_stage_survives_remote_without_stage_column() {
        let remote = Arc::new(MemoryRemote::new().without_column("ads", "workflow_stage"));
        let store = Store::new(Backend::Remote(remote.clone()));
        let audit = AuditLogger::new(store.clone());

        create_ad(&store, &audit, &new_ad("ad-1")).await.unwrap();
        set_stage(&store, &audit, "ad-1", WorkflowStage::Live).await.unwrap();

        assert!(remote.rows("ads")[0].get("workflow_stage").is_none());
        let read = get_ad(&store, "ad-1").await.unwrap();
        assert_eq!(read.workflow_stage, WorkflowStage::Live);

        let live = list_ads(
            &store,
            &AdFilter {
                workflow_stage: Some("live".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(live.len(), 1);
    }

    #[tokio::test]
    async fn test_unparkable_stage_fails_create_cleanly() {
        let remote = Arc::new(
            MemoryRemote::new()
                .without_column("ads", "workflow_stage")
                .without_table("schema_overrides"),
        );
        let store = Store::new(Backend::Remote(remote.clone()));
        let audit = AuditLogger::new(store.clone());

        for _ in 0..2 {
            let err = create_ad(&store, &audit, &new_ad("ad-1")).await.unwrap_err();
            assert!(matches!(err, AppError::StoreUnavailable(_)), "{err:?}");
        }
        assert!(remote.rows("ads").is_empty());
        assert!(remote.rows("audit_log").is_empty());
    }

    #[tokio::test]
    async fn test_unwritable_audit_log_blocks_create() {
        let remote = Arc::new(MemoryRemote::new().without_table("audit_log"));
        let store = Store::new(Backend::Remote(remote.clone()));
        let audit = AuditLogger::new(store.clone());

        let err = create_ad(&store, &audit, &new_ad("ad-1")).await.unwrap_err();
        assert!(matches!(err, AppError::StoreUnavailable(_)));
        assert!(remote.rows("ads").is_empty());
    }

    #[tokio::test]
    async fn test_failed_transition_is_not_audited() {
        let remote = Arc::new(MemoryRemote::new());
        let store = Store::new(Backend::Remote(remote.clone()));
        let audit = AuditLogger::new(store.clone());
        create_ad(&store, &audit, &new_ad("ad-1")).await.unwrap();
        remote.fail_writes_to("ads");

        let err = transition_ad(&store, &audit, "ad-1", AdStatus::Approved, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::StoreUnavailable(_)));
        assert_eq!(get_ad(&store, "ad-1").await.unwrap().status, AdStatus::Pending);
        assert_eq!(actions(&audit, "ad-1").await, vec!["created"]);
    }
}
