//! In-memory `RemoteStore` used by tests to run the same scenarios as the
//! fallback store, including a remote schema that lags behind the core.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::normalize::Row;
use crate::store::remote::{Predicate, RemoteError, RemoteStore};

#[derive(Default)]
pub struct MemoryRemote {
    tables: Mutex<HashMap<String, Vec<Row>>>,
    missing_columns: HashMap<String, HashSet<String>>,
    missing_tables: HashSet<String>,
    fail_writes: Mutex<bool>,
    failing_tables: Mutex<HashSet<String>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates a table whose schema has not been migrated to include `column`.
    pub fn without_column(mut self, table: &str, column: &str) -> Self {
        self.missing_columns
            .entry(table.to_string())
            .or_default()
            .insert(column.to_string());
        self
    }

    pub fn without_table(mut self, table: &str) -> Self {
        self.missing_tables.insert(table.to_string());
        self
    }

    /// Every subsequent write fails with a connection error.
    pub fn fail_writes(&self) {
        *self.fail_writes.lock().unwrap() = true;
    }

    /// Subsequent writes to `table` alone fail with a connection error.
    pub fn fail_writes_to(&self, table: &str) {
        self.failing_tables.lock().unwrap().insert(table.to_string());
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn seed(&self, table: &str, row: Row) {
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    fn check_table(&self, table: &str) -> Result<(), RemoteError> {
        if self.missing_tables.contains(table) {
            return Err(RemoteError::new(
                Some("42P01"),
                format!("relation \"{table}\" does not exist"),
            ));
        }
        Ok(())
    }

    fn check_write(&self, table: &str, row: &Row) -> Result<(), RemoteError> {
        if *self.fail_writes.lock().unwrap() || self.failing_tables.lock().unwrap().contains(table) {
            return Err(RemoteError::new(Some("08006"), "connection reset by peer"));
        }
        self.check_table(table)?;
        if let Some(missing) = self.missing_columns.get(table) {
            if let Some(col) = row.keys().find(|k| missing.contains(*k)) {
                return Err(RemoteError::new(
                    Some("42703"),
                    format!("column \"{col}\" of relation \"{table}\" does not exist"),
                ));
            }
        }
        Ok(())
    }
}

fn row_id(row: &Row) -> Option<&str> {
    row.get("id").and_then(|v| v.as_str())
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn select(&self, table: &str, filter: &[Predicate]) -> Result<Vec<Row>, RemoteError> {
        self.check_table(table)?;
        Ok(self
            .rows(table)
            .into_iter()
            .filter(|row| filter.iter().all(|p| p.matches(row)))
            .collect())
    }

    async fn insert(&self, table: &str, row: &Row) -> Result<u64, RemoteError> {
        self.check_write(table, row)?;
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(table.to_string()).or_default();
        if rows.iter().any(|r| row_id(r) == row_id(row)) {
            return Err(RemoteError::new(
                Some("23505"),
                format!("duplicate key value violates unique constraint \"{table}_pkey\""),
            ));
        }
        rows.push(row.clone());
        Ok(1)
    }

    async fn update(&self, table: &str, id: &str, row: &Row) -> Result<u64, RemoteError> {
        self.check_write(table, row)?;
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(table.to_string()).or_default();
        match rows.iter_mut().find(|r| row_id(r) == Some(id)) {
            Some(existing) => {
                existing.extend(row.clone());
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn upsert(&self, table: &str, row: &Row) -> Result<u64, RemoteError> {
        self.check_write(table, row)?;
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(table.to_string()).or_default();
        match rows.iter_mut().find(|r| row_id(r) == row_id(row)) {
            Some(existing) => existing.extend(row.clone()),
            None => rows.push(row.clone()),
        }
        Ok(1)
    }

    async fn delete(&self, table: &str, id: &str) -> Result<u64, RemoteError> {
        self.check_write(table, &Row::new())?;
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(table.to_string()).or_default();
        let before = rows.len();
        rows.retain(|r| row_id(r) != Some(id));
        Ok((before - rows.len()) as u64)
    }
}
