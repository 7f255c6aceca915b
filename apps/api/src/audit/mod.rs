//! Before/after trail of every mutation, written ahead of the mutation.
//!
//! Each write is journaled: its entry is appended first, then the primary
//! write runs. A failed write retracts the entry again, and a failed append
//! means the write never runs, so a failed call leaves neither a record
//! change nor an entry behind. Entries go to whichever backend the primary
//! write goes to. In fallback mode the document keeps only the newest
//! `AUDIT_CAP` entries.

pub mod handlers;

use std::future::Future;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;

use crate::models::audit::AuditEntry;
use crate::normalize::{Record, Row};
use crate::records::new_id;
use crate::store::remote::Predicate;
use crate::store::{Store, StoreError};

pub const AUDIT_CAP: usize = 200;

pub const CREATED: &str = "created";
pub const UPDATED: &str = "updated";
pub const DELETED: &str = "deleted";
pub const STATUS_CHANGED: &str = "status_changed";
pub const STAGE_CHANGED: &str = "stage_changed";
pub const VARIANT_SELECTED: &str = "variant_selected";
pub const WENT_LIVE: &str = "went_live";

/// How one mutation is described in the log.
#[derive(Debug, Clone, Copy)]
pub struct Change<'a> {
    pub action: &'a str,
    pub note: Option<&'a str>,
    pub at: DateTime<Utc>,
}

impl<'a> Change<'a> {
    pub fn new(action: &'a str, at: DateTime<Utc>) -> Self {
        Self {
            action,
            note: None,
            at,
        }
    }

    pub fn note(mut self, note: Option<&'a str>) -> Self {
        self.note = note;
        self
    }
}

/// An appended entry, plus whatever the cap evicted to make room for it.
#[derive(Debug)]
pub struct Pending {
    entry_id: String,
    evicted: Vec<Row>,
}

#[derive(Clone)]
pub struct AuditLogger {
    store: Store,
}

impl AuditLogger {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Appends the entry for a mutation of `T` that is about to be written.
    pub async fn record<T: Record>(
        &self,
        change: Change<'_>,
        old: Option<&T>,
        new: Option<&T>,
    ) -> Result<Pending, StoreError> {
        let entry = build_entry(change, old, new);
        let evicted = self.store.append_capped(&entry, AUDIT_CAP).await?;
        Ok(Pending {
            entry_id: entry.id,
            evicted,
        })
    }

    /// Takes back an entry whose write did not happen.
    pub async fn retract(&self, pending: Pending) {
        if let Err(e) = self
            .store
            .retract_appended::<AuditEntry>(&pending.entry_id, pending.evicted)
            .await
        {
            warn!("Failed to retract audit entry {}: {e}", pending.entry_id);
        }
    }

    /// Journals one write: appends the entry, then runs `write`. Either both
    /// land or neither does.
    pub async fn journaled<T, W>(
        &self,
        change: Change<'_>,
        old: Option<&T>,
        new: Option<&T>,
        write: W,
    ) -> Result<Pending, StoreError>
    where
        T: Record,
        W: Future<Output = Result<(), StoreError>>,
    {
        let pending = self.record(change, old, new).await?;
        match write.await {
            Ok(()) => Ok(pending),
            Err(e) => {
                self.retract(pending).await;
                Err(e)
            }
        }
    }

    /// Entries newest first, optionally narrowed to one entity type and id.
    pub async fn list(
        &self,
        entity_type: Option<&str>,
        entity_id: Option<&str>,
    ) -> Result<Vec<AuditEntry>, StoreError> {
        let mut filter = Vec::new();
        if let Some(t) = entity_type {
            filter.push(Predicate::eq("entity_type", t));
        }
        if let Some(id) = entity_id {
            filter.push(Predicate::eq("entity_id", id));
        }
        let mut entries: Vec<AuditEntry> = self.store.list(&filter).await?;
        // Stored order is append order; reversing first keeps ties newest first.
        entries.reverse();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }
}

fn snapshot<T: Record>(rec: Option<&T>) -> Value {
    rec.map(|r| Value::Object(r.to_row())).unwrap_or(Value::Null)
}

fn build_entry<T: Record>(change: Change<'_>, old: Option<&T>, new: Option<&T>) -> AuditEntry {
    let entity_id = new
        .or(old)
        .map(|r| r.id().to_string())
        .unwrap_or_default();
    AuditEntry {
        id: new_id(AuditEntry::ID_PREFIX),
        entity_type: T::ENTITY.to_string(),
        entity_id,
        action: change.action.to_string(),
        old_value: snapshot(old),
        new_value: snapshot(new),
        note: change
            .note
            .filter(|n| !n.trim().is_empty())
            .map(str::to_string),
        timestamp: Some(change.at),
    }
}
