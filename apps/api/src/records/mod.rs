//! Generic create/read/update/delete over any `Record`.
//!
//! Entity-specific services (ads, budget, metrics) build on these helpers;
//! satellite entities use them directly.

pub mod handlers;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::audit::{self, AuditLogger, Change};
use crate::errors::AppError;
use crate::models::satellite::AdTemplate;
use crate::normalize::{apply_patch, Fields, Record, Row};
use crate::store::remote::Predicate;
use crate::store::{Store, StoreError};

/// Fields a generic patch never touches directly.
const PATCH_SKIP: &[&str] = &["created_at", "updated_at"];

/// Entities that may be removed from the store outright. Everything else
/// is only ever soft-updated.
pub trait HardDelete: Record {}

impl HardDelete for AdTemplate {}

pub fn new_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

/// Normalizes client input into a new record: assigns an id when none is
/// given, checks required fields and stamps both timestamps.
pub fn prepare_new<T: Record>(input: &Row, now: DateTime<Utc>) -> Result<T, AppError> {
    let mut raw = input.clone();
    if Fields::new(input, T::FIELDS).opt_text("id").is_none() {
        raw.insert("id".into(), Value::String(new_id(T::ID_PREFIX)));
    }
    let mut rec = T::from_raw(&raw)?;
    rec.validate_new().map_err(AppError::Validation)?;
    rec.set_created_at(now);
    rec.set_updated_at(now);
    Ok(rec)
}

pub async fn create<T: Record>(
    store: &Store,
    audit: &AuditLogger,
    input: &Row,
) -> Result<T, AppError> {
    let now = Utc::now();
    let rec: T = prepare_new(input, now)?;
    audit
        .journaled(Change::new(audit::CREATED, now), None, Some(&rec), store.insert(&rec))
        .await?;
    info!("Created {} {}", T::ENTITY, rec.id());
    Ok(rec)
}

pub async fn get<T: Record>(store: &Store, id: &str) -> Result<T, AppError> {
    store
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {id}", T::ENTITY)))
}

pub async fn list<T: Record>(store: &Store, filter: &[Predicate]) -> Result<Vec<T>, AppError> {
    Ok(store.list(filter).await?)
}

/// Applies a partial update written in either naming convention.
pub async fn update<T: Record>(
    store: &Store,
    audit: &AuditLogger,
    id: &str,
    patch: &Row,
) -> Result<T, AppError> {
    let now = Utc::now();
    let updated = store
        .mutate::<T, AppError, _, _>(
            audit,
            id,
            |current| {
                let mut next = apply_patch(current, patch, PATCH_SKIP)?;
                next.set_updated_at(now);
                Ok(next)
            },
            |_, _| Change::new(audit::UPDATED, now),
        )
        .await?;
    info!("Updated {} {id}", T::ENTITY);
    Ok(updated.after)
}

pub async fn delete<T: HardDelete>(
    store: &Store,
    audit: &AuditLogger,
    id: &str,
) -> Result<(), AppError> {
    let current: T = get(store, id).await?;
    let remove = async {
        if store.delete::<T>(id).await? {
            Ok(())
        } else {
            Err(StoreError::NotFound {
                entity: T::ENTITY,
                id: id.to_string(),
            })
        }
    };
    audit
        .journaled(Change::new(audit::DELETED, Utc::now()), Some(&current), None, remove)
        .await?;
    info!("Deleted {} {id}", T::ENTITY);
    Ok(())
}
