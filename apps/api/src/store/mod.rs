//! Dual-backend persistence.
//!
//! `Store` exposes one set of record operations over either the remote
//! relational store or the local fallback documents. The backend is chosen
//! once at startup and passed in; nothing here reads global state.
//!
//! The remote path writes row shapes one row at a time. The fallback path
//! reads and overwrites whole documents in the legacy shape.

pub mod fallback;
#[cfg(test)]
pub mod memory;
pub mod overrides;
pub mod remote;

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::audit::{AuditLogger, Change, Pending};
use crate::normalize::{NormalizeError, Record, Row};
use fallback::FallbackStore;
use overrides::WriteOp;
use remote::{Predicate, RemoteError, RemoteStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} {id} already exists")]
    Conflict { entity: &'static str, id: String },

    #[error("remote store error: {0}")]
    Remote(#[from] RemoteError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not valid JSON: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

/// Active persistence backend.
#[derive(Clone)]
pub enum Backend {
    Remote(Arc<dyn RemoteStore>),
    Fallback(FallbackStore),
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Remote(_) => "remote",
            Backend::Fallback(_) => "fallback",
        }
    }
}

/// A committed read-modify-write and its journal entry.
pub struct Mutation<T> {
    pub before: T,
    pub after: T,
    entry: Pending,
}

impl<T: Record> Mutation<T> {
    /// Writes `before` back and retracts the journal entry. For callers whose
    /// follow-up step failed after this write landed.
    pub async fn revert(self, store: &Store, journal: &AuditLogger) -> Result<(), StoreError> {
        store.upsert(&self.before).await?;
        journal.retract(self.entry).await;
        Ok(())
    }
}

#[derive(Clone)]
pub struct Store {
    backend: Backend,
}

fn raw_id(row: &Row) -> Option<String> {
    match row.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Normalizes raw records, skipping (and logging) ones that cannot be.
fn normalize_all<T: Record>(rows: &[Row]) -> Vec<T> {
    rows.iter()
        .filter_map(|raw| match T::from_raw(raw) {
            Ok(rec) => Some(rec),
            Err(e) => {
                warn!("Skipping malformed {} record: {e}", T::ENTITY);
                None
            }
        })
        .collect()
}

impl Store {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub async fn get<T: Record>(&self, id: &str) -> Result<Option<T>, StoreError> {
        match &self.backend {
            Backend::Remote(remote) => {
                let mut rows = remote
                    .select(T::TABLE, &[Predicate::eq("id", id)])
                    .await?;
                rows.truncate(1);
                overrides::overlay::<T>(remote.as_ref(), &mut rows, Some(id)).await?;
                rows.first().map(T::from_raw).transpose().map_err(Into::into)
            }
            Backend::Fallback(fs) if T::SINGLETON => match fs.read_document(T::COLLECTION).await? {
                Some(Value::Object(doc)) => Ok(Some(T::from_raw(&doc)?)),
                _ => Ok(None),
            },
            Backend::Fallback(fs) => {
                let rows = fs.read_collection(T::COLLECTION).await?;
                rows.iter()
                    .find(|r| raw_id(r).as_deref() == Some(id))
                    .map(T::from_raw)
                    .transpose()
                    .map_err(Into::into)
            }
        }
    }

    /// Lists records matching every predicate. Predicates name row-shape
    /// columns and behave identically on both backends.
    pub async fn list<T: Record>(&self, filter: &[Predicate]) -> Result<Vec<T>, StoreError> {
        let records: Vec<T> = match &self.backend {
            Backend::Remote(remote) => {
                // Drift columns may live in the override table, so they are
                // filtered after the overlay rather than pushed down.
                let pushed: Vec<Predicate> = filter
                    .iter()
                    .filter(|p| !T::DRIFT_COLUMNS.contains(&p.column()))
                    .cloned()
                    .collect();
                let mut rows = remote.select(T::TABLE, &pushed).await?;
                overrides::overlay::<T>(remote.as_ref(), &mut rows, None).await?;
                normalize_all(&rows)
            }
            Backend::Fallback(fs) if T::SINGLETON => match fs.read_document(T::COLLECTION).await? {
                Some(Value::Object(doc)) => normalize_all(&[doc]),
                _ => Vec::new(),
            },
            Backend::Fallback(fs) => normalize_all(&fs.read_collection(T::COLLECTION).await?),
        };
        Ok(records
            .into_iter()
            .filter(|rec| {
                let row = rec.to_row();
                filter.iter().all(|p| p.matches(&row))
            })
            .collect())
    }

    /// Inserts a new record. Fails with `Conflict` before writing anything
    /// when the id is already taken.
    pub async fn insert<T: Record>(&self, rec: &T) -> Result<(), StoreError> {
        let conflict = || StoreError::Conflict {
            entity: T::ENTITY,
            id: rec.id().to_string(),
        };
        if self.get::<T>(rec.id()).await?.is_some() {
            return Err(conflict());
        }
        match &self.backend {
            Backend::Remote(remote) => {
                match overrides::write_row(remote.as_ref(), WriteOp::Insert, rec).await {
                    Err(StoreError::Remote(e))
                        if e.kind() == remote::RemoteErrorKind::UniqueViolation =>
                    {
                        Err(conflict())
                    }
                    other => other.map(|_| ()),
                }
            }
            Backend::Fallback(fs) if T::SINGLETON => {
                fs.write_document(T::COLLECTION, &Value::Object(rec.to_legacy()))
                    .await
            }
            Backend::Fallback(fs) => {
                let mut rows = fs.read_collection(T::COLLECTION).await?;
                rows.push(rec.to_legacy());
                fs.write_collection(T::COLLECTION, rows).await
            }
        }
    }

    /// Rewrites an existing record by id.
    pub async fn update<T: Record>(&self, rec: &T) -> Result<(), StoreError> {
        let not_found = || StoreError::NotFound {
            entity: T::ENTITY,
            id: rec.id().to_string(),
        };
        match &self.backend {
            Backend::Remote(remote) => {
                let affected = overrides::write_row(remote.as_ref(), WriteOp::Update, rec).await?;
                if affected == 0 {
                    return Err(not_found());
                }
                Ok(())
            }
            Backend::Fallback(fs) if T::SINGLETON => {
                fs.write_document(T::COLLECTION, &Value::Object(rec.to_legacy()))
                    .await
            }
            Backend::Fallback(fs) => {
                let mut rows = fs.read_collection(T::COLLECTION).await?;
                let slot = rows
                    .iter_mut()
                    .find(|r| raw_id(r).as_deref() == Some(rec.id()))
                    .ok_or_else(not_found)?;
                *slot = rec.to_legacy();
                fs.write_collection(T::COLLECTION, rows).await
            }
        }
    }

    /// Inserts or replaces by id.
    pub async fn upsert<T: Record>(&self, rec: &T) -> Result<(), StoreError> {
        match &self.backend {
            Backend::Remote(remote) => {
                overrides::write_row(remote.as_ref(), WriteOp::Upsert, rec).await?;
                Ok(())
            }
            Backend::Fallback(fs) if T::SINGLETON => {
                fs.write_document(T::COLLECTION, &Value::Object(rec.to_legacy()))
                    .await
            }
            Backend::Fallback(fs) => {
                let mut rows = fs.read_collection(T::COLLECTION).await?;
                match rows
                    .iter_mut()
                    .find(|r| raw_id(r).as_deref() == Some(rec.id()))
                {
                    Some(slot) => *slot = rec.to_legacy(),
                    None => rows.push(rec.to_legacy()),
                }
                fs.write_collection(T::COLLECTION, rows).await
            }
        }
    }

    /// Hard delete. Returns whether a record was removed.
    pub async fn delete<T: Record>(&self, id: &str) -> Result<bool, StoreError> {
        match &self.backend {
            Backend::Remote(remote) => Ok(remote.delete(T::TABLE, id).await? > 0),
            Backend::Fallback(fs) => {
                let mut rows = fs.read_collection(T::COLLECTION).await?;
                let before = rows.len();
                rows.retain(|r| raw_id(r).as_deref() != Some(id));
                if rows.len() == before {
                    return Ok(false);
                }
                fs.write_collection(T::COLLECTION, rows).await?;
                Ok(true)
            }
        }
    }

    /// Appends a record to an append-only collection. In fallback mode the
    /// document keeps only the newest `cap` entries; the evicted ones are
    /// returned so the append can be retracted exactly.
    pub async fn append_capped<T: Record>(&self, rec: &T, cap: usize) -> Result<Vec<Row>, StoreError> {
        match &self.backend {
            Backend::Remote(remote) => {
                remote.insert(T::TABLE, &rec.to_row()).await?;
                Ok(Vec::new())
            }
            Backend::Fallback(fs) => {
                let mut rows = fs.read_collection(T::COLLECTION).await?;
                rows.push(rec.to_legacy());
                let evicted: Vec<Row> = if rows.len() > cap {
                    rows.drain(..rows.len() - cap).collect()
                } else {
                    Vec::new()
                };
                fs.write_collection(T::COLLECTION, rows).await?;
                Ok(evicted)
            }
        }
    }

    /// Undoes `append_capped`: drops the appended record and puts the
    /// evicted ones back at the front.
    pub async fn retract_appended<T: Record>(&self, id: &str, evicted: Vec<Row>) -> Result<(), StoreError> {
        match &self.backend {
            Backend::Remote(remote) => {
                remote.delete(T::TABLE, id).await?;
                Ok(())
            }
            Backend::Fallback(fs) => {
                let mut rows = evicted;
                rows.extend(
                    fs.read_collection(T::COLLECTION)
                        .await?
                        .into_iter()
                        .filter(|r| raw_id(r).as_deref() != Some(id)),
                );
                fs.write_collection(T::COLLECTION, rows).await
            }
        }
    }

    /// Read-modify-write of one record: the only place a mutation reads
    /// current state and writes the next one. The write is journaled under
    /// the entry `describe` returns for the (before, after) pair.
    ///
    /// There is no locking or version check between the read and the write;
    /// a concurrent writer can be overwritten.
    pub async fn mutate<'c, T, E, F, D>(
        &self,
        journal: &AuditLogger,
        id: &str,
        f: F,
        describe: D,
    ) -> Result<Mutation<T>, E>
    where
        T: Record,
        E: From<StoreError>,
        F: FnOnce(&T) -> Result<T, E>,
        D: FnOnce(&T, &T) -> Change<'c>,
    {
        let before = self.get::<T>(id).await?.ok_or_else(|| StoreError::NotFound {
            entity: T::ENTITY,
            id: id.to_string(),
        })?;
        let after = f(&before)?;
        let entry = journal
            .journaled(describe(&before, &after), Some(&before), Some(&after), self.update(&after))
            .await?;
        Ok(Mutation {
            before,
            after,
            entry,
        })
    }

    /// `mutate` for records that exist implicitly: starts from
    /// `T::default()` when nothing is stored under `id` yet.
    pub async fn mutate_or_default<'c, T, E, F, D>(
        &self,
        journal: &AuditLogger,
        id: &str,
        f: F,
        describe: D,
    ) -> Result<Mutation<T>, E>
    where
        T: Record + Default,
        E: From<StoreError>,
        F: FnOnce(&T) -> Result<T, E>,
        D: FnOnce(&T, &T) -> Change<'c>,
    {
        let before = self.get::<T>(id).await?.unwrap_or_default();
        let after = f(&before)?;
        let entry = journal
            .journaled(describe(&before, &after), Some(&before), Some(&after), self.upsert(&after))
            .await?;
        Ok(Mutation {
            before,
            after,
            entry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::satellite::AdTemplate;
    use crate::normalize::Record;
    use memory::MemoryRemote;
    use serde_json::json;

    fn template(id: &str, name: &str) -> AdTemplate {
        AdTemplate::from_value(&json!({"id": id, "name": name, "platform": "linkedin"})).unwrap()
    }

    fn backends() -> Vec<(Store, Option<tempfile::TempDir>)> {
        let dir = tempfile::tempdir().unwrap();
        vec![
            (
                Store::new(Backend::Remote(Arc::new(MemoryRemote::new()))),
                None,
            ),
            (
                Store::new(Backend::Fallback(FallbackStore::new(dir.path()))),
                Some(dir),
            ),
        ]
    }

    #[tokio::test]
    async fn test_crud_behaves_the_same_on_both_backends() {
        for (store, _dir) in backends() {
            let backend = store.backend().name();
            store.insert(&template("tpl-1", "A")).await.unwrap();
            store.insert(&template("tpl-2", "B")).await.unwrap();

            let dup = store.insert(&template("tpl-1", "A2")).await;
            assert!(matches!(dup, Err(StoreError::Conflict { .. })), "{backend}");
            let kept: AdTemplate = store.get("tpl-1").await.unwrap().unwrap();
            assert_eq!(kept.name, "A", "{backend}");

            store.update(&template("tpl-2", "B2")).await.unwrap();
            let all: Vec<AdTemplate> = store.list(&[]).await.unwrap();
            assert_eq!(all.len(), 2, "{backend}");

            let filtered: Vec<AdTemplate> = store
                .list(&[Predicate::eq("name", "B2")])
                .await
                .unwrap();
            assert_eq!(filtered.len(), 1, "{backend}");
            assert_eq!(filtered[0].id, "tpl-2", "{backend}");

            let missing = store.update(&template("tpl-9", "Z")).await;
            assert!(matches!(missing, Err(StoreError::NotFound { .. })), "{backend}");

            assert!(store.delete::<AdTemplate>("tpl-1").await.unwrap(), "{backend}");
            assert!(!store.delete::<AdTemplate>("tpl-1").await.unwrap(), "{backend}");
            assert!(store.get::<AdTemplate>("tpl-1").await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_fallback_reads_row_shaped_documents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("templates.json"),
            r#"[{"id": "tpl-1", "name": "Row", "primary_text": "snake"}, {"name": "no id"}]"#,
        )
        .unwrap();
        let store = Store::new(Backend::Fallback(FallbackStore::new(dir.path())));
        let all: Vec<AdTemplate> = store.list(&[]).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].primary_text, "snake");
    }

    #[tokio::test]
    async fn test_append_capped_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(Backend::Fallback(FallbackStore::new(dir.path())));
        for i in 0..5 {
            let evicted = store
                .append_capped(&template(&format!("tpl-{i}"), "x"), 3)
                .await
                .unwrap();
            assert_eq!(evicted.len(), usize::from(i >= 3));
        }
        let all: Vec<AdTemplate> = store.list(&[]).await.unwrap();
        let ids: Vec<_> = all.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["tpl-2", "tpl-3", "tpl-4"]);

        let evicted = store.append_capped(&template("tpl-5", "x"), 3).await.unwrap();
        store.retract_appended::<AdTemplate>("tpl-5", evicted).await.unwrap();
        let all: Vec<AdTemplate> = store.list(&[]).await.unwrap();
        let ids: Vec<_> = all.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["tpl-2", "tpl-3", "tpl-4"]);
    }

    #[tokio::test]
    async fn test_mutation_can_be_reverted() {
        for (store, _dir) in backends() {
            let journal = AuditLogger::new(store.clone());
            store.insert(&template("tpl-1", "A")).await.unwrap();
            let renamed: Mutation<AdTemplate> = store
                .mutate::<AdTemplate, StoreError, _, _>(
                    &journal,
                    "tpl-1",
                    |t| Ok(template(&t.id, "B")),
                    |_, _| Change::new(crate::audit::UPDATED, chrono::Utc::now()),
                )
                .await
                .unwrap();
            assert_eq!(renamed.after.name, "B");
            assert_eq!(journal.list(None, None).await.unwrap().len(), 1);

            renamed.revert(&store, &journal).await.unwrap();
            let kept: AdTemplate = store.get("tpl-1").await.unwrap().unwrap();
            assert_eq!(kept.name, "A");
            assert!(journal.list(None, None).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_remote_failure_surfaces_as_remote_error() {
        let remote = Arc::new(MemoryRemote::new());
        let store = Store::new(Backend::Remote(remote.clone()));
        store.insert(&template("tpl-1", "A")).await.unwrap();
        remote.fail_writes();
        let err = store.update(&template("tpl-1", "B")).await.unwrap_err();
        assert!(matches!(err, StoreError::Remote(_)));
        let kept: AdTemplate = store.get("tpl-1").await.unwrap().unwrap();
        assert_eq!(kept.name, "A");
    }
}
