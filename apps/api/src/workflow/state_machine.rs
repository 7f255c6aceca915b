//! Ad status transitions and the derived workflow stage.
//!
//! Any status may be requested explicitly, including a return to
//! `pending`; nothing reverts automatically. A status change appends
//! exactly one history entry. A stage-only change never touches status or
//! history.

use chrono::{DateTime, Utc};

use crate::models::ad::{Ad, AdStatus, StatusChange, WorkflowStage};

pub const DEFAULT_NOTE: &str = "Status updated";
pub const CREATED_NOTE: &str = "Created";

/// Default bridge from approval status to the production pipeline, used
/// whenever no stage is supplied.
pub fn derive_stage(status: AdStatus) -> WorkflowStage {
    match status {
        AdStatus::Approved => WorkflowStage::Approved,
        AdStatus::Paused => WorkflowStage::Uploaded,
        AdStatus::Rejected => WorkflowStage::Concept,
        AdStatus::Pending => WorkflowStage::CopyReady,
    }
}

/// History timestamps never go backwards, even if the clock does.
fn next_at(ad: &Ad, now: DateTime<Utc>) -> DateTime<Utc> {
    ad.status_history
        .last()
        .map_or(now, |last| last.at.max(now))
}

/// Moves `ad` to `status`. Returns whether the status actually changed.
///
/// When it did, the stage becomes `stage` (or the derived one) and one
/// history entry is appended. Requesting the current status only applies
/// an explicit `stage`, if any.
pub fn apply_status(
    ad: &mut Ad,
    status: AdStatus,
    stage: Option<WorkflowStage>,
    note: Option<&str>,
    now: DateTime<Utc>,
) -> bool {
    if ad.status == status {
        if let Some(stage) = stage {
            ad.workflow_stage = stage;
        }
        return false;
    }
    let at = next_at(ad, now);
    let note = note
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_NOTE);
    ad.status = status;
    ad.workflow_stage = stage.unwrap_or_else(|| derive_stage(status));
    ad.status_history.push(StatusChange {
        status,
        at,
        note: Some(note.to_string()),
    });
    true
}

pub fn apply_stage(ad: &mut Ad, stage: WorkflowStage) {
    ad.workflow_stage = stage;
}

/// Seeds the history of a newly created ad with its initial status.
pub fn seed_history(ad: &mut Ad, now: DateTime<Utc>) {
    if ad.status_history.is_empty() {
        ad.status_history.push(StatusChange {
            status: ad.status,
            at: now,
            note: Some(CREATED_NOTE.to_string()),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Record;
    use chrono::Duration;
    use serde_json::json;

    fn ad() -> Ad {
        Ad::from_value(&json!({"id": "ad-1", "status": "pending"})).unwrap()
    }

    #[test]
    fn test_derived_stage_for_every_status() {
        let now = Utc::now();
        for (status, stage) in [
            (AdStatus::Approved, WorkflowStage::Approved),
            (AdStatus::Paused, WorkflowStage::Uploaded),
            (AdStatus::Rejected, WorkflowStage::Concept),
        ] {
            let mut a = ad();
            assert!(apply_status(&mut a, status, None, None, now));
            assert_eq!(a.workflow_stage, stage);
        }
        let mut a = ad();
        apply_status(&mut a, AdStatus::Paused, None, None, now);
        apply_status(&mut a, AdStatus::Pending, None, None, now);
        assert_eq!(a.workflow_stage, WorkflowStage::CopyReady);
    }

    #[test]
    fn test_each_change_appends_exactly_one_entry() {
        let mut a = ad();
        let now = Utc::now();
        assert!(apply_status(&mut a, AdStatus::Approved, None, Some("looks good"), now));
        assert_eq!(a.status_history.len(), 1);
        assert_eq!(a.status_history[0].note.as_deref(), Some("looks good"));

        assert!(apply_status(&mut a, AdStatus::Paused, None, None, now));
        assert_eq!(a.status_history.len(), 2);
        assert_eq!(a.status_history[1].note.as_deref(), Some(DEFAULT_NOTE));
    }

    #[test]
    fn test_same_status_only_moves_explicit_stage() {
        let mut a = ad();
        let now = Utc::now();
        assert!(!apply_status(&mut a, AdStatus::Pending, Some(WorkflowStage::Concept), None, now));
        assert!(a.status_history.is_empty());
        assert_eq!(a.workflow_stage, WorkflowStage::Concept);
    }

    #[test]
    fn test_explicit_stage_overrides_derivation() {
        let mut a = ad();
        apply_status(
            &mut a,
            AdStatus::Approved,
            Some(WorkflowStage::CreativeBrief),
            None,
            Utc::now(),
        );
        assert_eq!(a.workflow_stage, WorkflowStage::CreativeBrief);
    }

    #[test]
    fn test_history_timestamps_are_monotonic() {
        let mut a = ad();
        let now = Utc::now();
        apply_status(&mut a, AdStatus::Approved, None, None, now);
        apply_status(&mut a, AdStatus::Paused, None, None, now - Duration::minutes(5));
        assert!(a.status_history[1].at >= a.status_history[0].at);
    }

    #[test]
    fn test_stage_change_leaves_status_and_history() {
        let mut a = ad();
        seed_history(&mut a, Utc::now());
        apply_stage(&mut a, WorkflowStage::Live);
        assert_eq!(a.status, AdStatus::Pending);
        assert_eq!(a.status_history.len(), 1);
        assert_eq!(a.status_history[0].note.as_deref(), Some(CREATED_NOTE));
    }
}
