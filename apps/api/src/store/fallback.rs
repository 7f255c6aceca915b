//! Local JSON-document store used when no remote store is configured.
//!
//! One document per collection (`<DATA_DIR>/<collection>.json`). Every call
//! reads or overwrites the whole document; concurrent writers are last
//! writer wins at document granularity.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::normalize::Row;
use crate::store::StoreError;

#[derive(Debug, Clone)]
pub struct FallbackStore {
    root: PathBuf,
}

impl FallbackStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.json"))
    }

    /// Returns `None` when the document does not exist yet.
    pub async fn read_document(&self, name: &str) -> Result<Option<Value>, StoreError> {
        let path = self.path(name);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        if text.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| StoreError::Json { path, source })
    }

    /// Overwrites the document through a temp file and rename, so a reader
    /// never sees a partially written file.
    pub async fn write_document(&self, name: &str, doc: &Value) -> Result<(), StoreError> {
        let path = self.path(name);
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| StoreError::Io {
                path: self.root.clone(),
                source,
            })?;
        let body = serde_json::to_vec_pretty(doc).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        let tmp = self.root.join(format!(".{name}.{}.tmp", Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|source| StoreError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
        debug!("Wrote fallback document {}", path.display());
        Ok(())
    }

    /// Reads a collection document as a list of raw records.
    ///
    /// Accepts a bare array or an object wrapping the array under the
    /// collection name (`{"ads": [...]}`). Non-object items are skipped.
    pub async fn read_collection(&self, name: &str) -> Result<Vec<Row>, StoreError> {
        let items = match self.read_document(name).await? {
            Some(Value::Array(items)) => items,
            Some(Value::Object(mut wrapper)) => match wrapper.remove(name) {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };
        Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(row) => Some(row),
                _ => None,
            })
            .collect())
    }

    pub async fn write_collection(&self, name: &str, rows: Vec<Row>) -> Result<(), StoreError> {
        let doc = Value::Array(rows.into_iter().map(Value::Object).collect());
        self.write_document(name, &doc).await
    }
}
