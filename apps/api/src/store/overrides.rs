//! Schema-drift tolerance for the remote store.
//!
//! When a write fails because the remote table lacks one of the record's
//! `DRIFT_COLUMNS`, the column is stripped from the row, the write is
//! retried, and the stripped value is parked in `schema_overrides` keyed by
//! (table, entity id, column). Reads overlay parked values onto rows whose
//! own column is absent or null. If the override table cannot take the value
//! either, the write fails as a whole.

use serde_json::{json, Value};
use tracing::warn;

use crate::normalize::{object, Record, Row};
use crate::store::remote::{Predicate, RemoteError, RemoteErrorKind, RemoteStore};
use crate::store::StoreError;

pub const OVERRIDE_TABLE: &str = "schema_overrides";

#[derive(Debug, Clone, Copy)]
pub enum WriteOp {
    Insert,
    Update,
    Upsert,
}

impl WriteOp {
    async fn run(
        self,
        remote: &dyn RemoteStore,
        table: &str,
        id: &str,
        row: &Row,
    ) -> Result<u64, RemoteError> {
        match self {
            WriteOp::Insert => remote.insert(table, row).await,
            WriteOp::Update => remote.update(table, id, row).await,
            WriteOp::Upsert => remote.upsert(table, row).await,
        }
    }
}

fn override_id(table: &str, entity_id: &str, column: &str) -> String {
    format!("{table}:{entity_id}:{column}")
}

/// An override row written ahead of a primary write, with the row it replaced.
struct Parked {
    id: String,
    previous: Option<Row>,
}

async fn park(
    remote: &dyn RemoteStore,
    table: &str,
    entity_id: &str,
    column: &str,
    value: Value,
    updated_at: &Value,
) -> Result<Parked, StoreError> {
    let id = override_id(table, entity_id, column);
    let previous = remote
        .select(OVERRIDE_TABLE, &[Predicate::eq("id", id.as_str())])
        .await?
        .into_iter()
        .next();
    let row = object(json!({
        "id": id,
        "table_name": table,
        "entity_id": entity_id,
        "column_name": column,
        "value": value,
        "updated_at": updated_at,
    }));
    remote.upsert(OVERRIDE_TABLE, &row).await?;
    Ok(Parked { id, previous })
}

/// Puts the override table back the way it was before `parked` was written.
async fn unpark(remote: &dyn RemoteStore, parked: Vec<Parked>) {
    for p in parked.into_iter().rev() {
        let restored = match &p.previous {
            Some(row) => remote.upsert(OVERRIDE_TABLE, row).await,
            None => remote.delete(OVERRIDE_TABLE, &p.id).await,
        };
        if let Err(e) = restored {
            warn!("Failed to restore schema override {}: {e}", p.id);
        }
    }
}

/// Writes `rec` as a row, diverting drifted columns to the override table.
/// Returns the number of rows the primary write touched.
///
/// Overrides are written before the retried primary write. When that write
/// fails or touches nothing, they are rolled back, so a failed call leaves
/// both tables as they were.
pub async fn write_row<T: Record>(
    remote: &dyn RemoteStore,
    op: WriteOp,
    rec: &T,
) -> Result<u64, StoreError> {
    let id = rec.id();
    let mut row = rec.to_row();
    let updated_at = row.get("updated_at").cloned().unwrap_or(Value::Null);
    let mut parked: Vec<Parked> = Vec::new();

    let result: Result<u64, StoreError> = 'write: loop {
        match op.run(remote, T::TABLE, id, &row).await {
            Ok(affected) => break Ok(affected),
            Err(err) if err.kind() == RemoteErrorKind::SchemaDrift => {
                let drifted: Vec<&'static str> = T::DRIFT_COLUMNS
                    .iter()
                    .copied()
                    .filter(|col| row.contains_key(*col) && err.mentions(col))
                    .collect();
                if drifted.is_empty() {
                    break Err(err.into());
                }
                for col in drifted {
                    warn!(
                        "Remote table {} has no column {col}; parking value for {} {id} in {OVERRIDE_TABLE}",
                        T::TABLE,
                        T::ENTITY
                    );
                    let Some(value) = row.remove(col) else {
                        continue;
                    };
                    match park(remote, T::TABLE, id, col, value, &updated_at).await {
                        Ok(p) => parked.push(p),
                        Err(e) => break 'write Err(e),
                    }
                }
            }
            Err(err) => break Err(err.into()),
        }
    };

    match result {
        Ok(affected) if affected > 0 => Ok(affected),
        other => {
            unpark(remote, parked).await;
            other
        }
    }
}

/// Overlays parked drift-column values onto `rows` in place. A missing
/// override table means nothing was ever parked.
pub async fn overlay<T: Record>(
    remote: &dyn RemoteStore,
    rows: &mut [Row],
    entity_id: Option<&str>,
) -> Result<(), StoreError> {
    if T::DRIFT_COLUMNS.is_empty() || rows.is_empty() {
        return Ok(());
    }
    let mut filter = vec![Predicate::eq("table_name", T::TABLE)];
    if let Some(id) = entity_id {
        filter.push(Predicate::eq("entity_id", id));
    }
    let overrides = match remote.select(OVERRIDE_TABLE, &filter).await {
        Ok(overrides) => overrides,
        Err(err) if err.kind() == RemoteErrorKind::SchemaDrift => return Ok(()),
        Err(err) => return Err(err.into()),
    };

    for o in &overrides {
        let (Some(entity), Some(column), Some(value)) = (
            o.get("entity_id").and_then(Value::as_str),
            o.get("column_name").and_then(Value::as_str),
            o.get("value"),
        ) else {
            continue;
        };
        if !T::DRIFT_COLUMNS.contains(&column) {
            continue;
        }
        for row in rows.iter_mut() {
            let matches = row.get("id").and_then(Value::as_str) == Some(entity);
            let column_empty = row.get(column).map_or(true, Value::is_null);
            if matches && column_empty {
                row.insert(column.to_string(), value.clone());
            }
        }
    }
    Ok(())
}
