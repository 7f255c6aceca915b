//! Remote relational store adapter.
//!
//! Rows cross this boundary as JSON objects. The Postgres implementation
//! reads them with `to_jsonb(t)` and writes them through
//! `jsonb_populate_record`, so the core only ever defines row shapes.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use thiserror::Error;

use crate::normalize::Row;

/// Undefined column / undefined table (Postgres) and PostgREST schema-cache misses.
const SCHEMA_DRIFT_CODES: &[&str] = &["42703", "42P01", "PGRST204", "PGRST205"];
const UNIQUE_VIOLATION: &str = "23505";

/// Structured failure from the remote store, carrying its machine-readable code.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RemoteError {
    pub code: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// The remote schema lacks a column or table the core expects.
    SchemaDrift,
    UniqueViolation,
    Other,
}

impl RemoteError {
    pub fn new(code: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            code: code.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> RemoteErrorKind {
        match self.code.as_deref() {
            Some(code) if SCHEMA_DRIFT_CODES.contains(&code) => RemoteErrorKind::SchemaDrift,
            Some(UNIQUE_VIOLATION) => RemoteErrorKind::UniqueViolation,
            _ if self.message.contains("schema cache") => RemoteErrorKind::SchemaDrift,
            _ => RemoteErrorKind::Other,
        }
    }

    /// Whether the error message names `column`.
    pub fn mentions(&self, column: &str) -> bool {
        self.message.contains(column)
    }
}

impl From<sqlx::Error> for RemoteError {
    fn from(err: sqlx::Error) -> Self {
        match err.as_database_error() {
            Some(db) => RemoteError::new(db.code().as_deref(), db.message()),
            None => RemoteError::new(None, err.to_string()),
        }
    }
}

/// Row filter over row-shape column names.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(String, Value),
    /// Equality against untyped text (a query parameter), read in the
    /// column's own type: numbers compare numerically, booleans as
    /// `true`/`false`, strings verbatim.
    EqText(String, String),
    /// Range bounds compare as text, which orders ISO dates correctly.
    Gte(String, String),
    Lte(String, String),
}

impl Predicate {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Predicate::Eq(column.to_string(), value.into())
    }

    pub fn column(&self) -> &str {
        match self {
            Predicate::Eq(c, _)
            | Predicate::EqText(c, _)
            | Predicate::Gte(c, _)
            | Predicate::Lte(c, _) => c,
        }
    }

    /// In-memory evaluation with the same semantics as the SQL rendering.
    pub fn matches(&self, row: &Row) -> bool {
        let Some(actual) = row.get(self.column()).filter(|v| !v.is_null()) else {
            return false;
        };
        match self {
            Predicate::Eq(_, expected) => values_equal(actual, expected),
            Predicate::EqText(_, raw) => text_equal(actual, raw),
            Predicate::Gte(_, bound) => text_of(actual).as_str() >= bound.as_str(),
            Predicate::Lte(_, bound) => text_of(actual).as_str() <= bound.as_str(),
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn text_equal(actual: &Value, raw: &str) -> bool {
    match actual {
        Value::String(s) => s == raw,
        Value::Number(n) => raw.trim().parse::<f64>().ok() == n.as_f64(),
        Value::Bool(b) => raw.trim() == b.to_string(),
        _ => false,
    }
}

/// JSON reading of untyped text, bound next to the raw text so Postgres can
/// match whichever type the column holds.
fn typed_text(raw: &str) -> Value {
    let trimmed = raw.trim();
    match trimmed {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => trimmed
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(raw.to_string())),
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The collaborator interface the core consumes. Implementations must not
/// interpret row contents.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn select(&self, table: &str, filter: &[Predicate]) -> Result<Vec<Row>, RemoteError>;

    async fn insert(&self, table: &str, row: &Row) -> Result<u64, RemoteError>;

    /// Updates the row with `id`, returning the number of rows touched.
    async fn update(&self, table: &str, id: &str, row: &Row) -> Result<u64, RemoteError>;

    /// Insert, or update every given column when `id` already exists.
    async fn upsert(&self, table: &str, row: &Row) -> Result<u64, RemoteError>;

    async fn delete(&self, table: &str, id: &str) -> Result<u64, RemoteError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Postgres implementation
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct PgRemoteStore {
    pool: PgPool,
}

impl PgRemoteStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Positional parameter of a `select`, bound as `text` or as `jsonb`.
enum Bind {
    Text(String),
    Json(Value),
}

/// Double-quotes an identifier after checking it is a plain snake_case name.
fn quote_ident(name: &str) -> Result<String, RemoteError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(format!("\"{name}\""))
    } else {
        Err(RemoteError::new(None, format!("invalid identifier '{name}'")))
    }
}

fn quoted_columns(row: &Row) -> Result<Vec<String>, RemoteError> {
    row.keys().map(|k| quote_ident(k)).collect()
}

fn insert_sql(table: &str, row: &Row) -> Result<String, RemoteError> {
    let cols = quoted_columns(row)?.join(", ");
    Ok(format!(
        "INSERT INTO {table} ({cols}) SELECT {cols} FROM jsonb_populate_record(NULL::{table}, $1)"
    ))
}

#[async_trait]
impl RemoteStore for PgRemoteStore {
    async fn select(&self, table: &str, filter: &[Predicate]) -> Result<Vec<Row>, RemoteError> {
        let table = quote_ident(table)?;
        let mut sql = format!("SELECT to_jsonb(t) FROM {table} t");
        let mut binds: Vec<Bind> = Vec::new();
        let mut param = |value: Bind| {
            binds.push(value);
            binds.len()
        };
        let clauses: Vec<String> = filter
            .iter()
            .map(|p| {
                let col = param(Bind::Text(p.column().to_string()));
                match p {
                    Predicate::Eq(_, v) => {
                        let val = param(Bind::Json(v.clone()));
                        format!("(to_jsonb(t) -> ${col}::text) = ${val}::jsonb")
                    }
                    Predicate::EqText(_, raw) => {
                        let typed = param(Bind::Json(typed_text(raw)));
                        let text = param(Bind::Text(raw.clone()));
                        format!(
                            "((to_jsonb(t) -> ${col}::text) = ${typed}::jsonb OR (to_jsonb(t) ->> ${col}::text) = ${text}::text)"
                        )
                    }
                    Predicate::Gte(_, v) => {
                        let val = param(Bind::Text(v.clone()));
                        format!("(to_jsonb(t) ->> ${col}::text) >= ${val}::text")
                    }
                    Predicate::Lte(_, v) => {
                        let val = param(Bind::Text(v.clone()));
                        format!("(to_jsonb(t) ->> ${col}::text) <= ${val}::text")
                    }
                }
            })
            .collect();
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        let mut query = sqlx::query_scalar::<_, Value>(&sql);
        for value in binds {
            query = match value {
                Bind::Text(s) => query.bind(s),
                Bind::Json(v) => query.bind(v),
            };
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(row) => Some(row),
                _ => None,
            })
            .collect())
    }

    async fn insert(&self, table: &str, row: &Row) -> Result<u64, RemoteError> {
        let sql = insert_sql(&quote_ident(table)?, row)?;
        let result = sqlx::query(&sql)
            .bind(Value::Object(row.clone()))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn update(&self, table: &str, id: &str, row: &Row) -> Result<u64, RemoteError> {
        let table = quote_ident(table)?;
        let sets: Vec<String> = quoted_columns(row)?
            .into_iter()
            .filter(|c| c != "\"id\"")
            .map(|c| format!("{c} = r.{c}"))
            .collect();
        if sets.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "UPDATE {table} SET {} FROM jsonb_populate_record(NULL::{table}, $1) r WHERE {table}.\"id\"::text = $2",
            sets.join(", ")
        );
        let result = sqlx::query(&sql)
            .bind(Value::Object(row.clone()))
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn upsert(&self, table: &str, row: &Row) -> Result<u64, RemoteError> {
        let quoted = quote_ident(table)?;
        let updates: Vec<String> = quoted_columns(row)?
            .into_iter()
            .filter(|c| c != "\"id\"")
            .map(|c| format!("{c} = EXCLUDED.{c}"))
            .collect();
        let mut sql = insert_sql(&quoted, row)?;
        if updates.is_empty() {
            sql.push_str(" ON CONFLICT (\"id\") DO NOTHING");
        } else {
            sql.push_str(" ON CONFLICT (\"id\") DO UPDATE SET ");
            sql.push_str(&updates.join(", "));
        }
        let result = sqlx::query(&sql)
            .bind(Value::Object(row.clone()))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, table: &str, id: &str) -> Result<u64, RemoteError> {
        let table = quote_ident(table)?;
        let sql = format!("DELETE FROM {table} WHERE \"id\"::text = $1");
        let result = sqlx::query(&sql)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            RemoteError::new(Some("42703"), "column \"workflow_stage\" does not exist").kind(),
            RemoteErrorKind::SchemaDrift
        );
        assert_eq!(
            RemoteError::new(None, "Could not find the column in the schema cache").kind(),
            RemoteErrorKind::SchemaDrift
        );
        assert_eq!(
            RemoteError::new(Some("23505"), "duplicate key").kind(),
            RemoteErrorKind::UniqueViolation
        );
        assert_eq!(
            RemoteError::new(Some("08006"), "connection failure").kind(),
            RemoteErrorKind::Other
        );
    }

    #[test]
    fn test_identifier_validation() {
        assert_eq!(quote_ident("ad_templates").unwrap(), "\"ad_templates\"");
        assert!(quote_ident("ads; drop table ads").is_err());
        assert!(quote_ident("primaryText").is_err());
    }

    #[test]
    fn test_insert_sql_lists_columns_explicitly() {
        let sql = insert_sql("\"ads\"", &row(json!({"id": "a", "status": "pending"}))).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"ads\" (\"id\", \"status\") SELECT \"id\", \"status\" FROM jsonb_populate_record(NULL::\"ads\", $1)"
        );
    }

    #[test]
    fn test_predicate_matching() {
        let r = row(json!({"week_start": "2026-03-09", "spend": 10, "channel": null}));
        assert!(Predicate::eq("spend", 10.0).matches(&r));
        assert!(Predicate::Gte("week_start".into(), "2026-03-02".into()).matches(&r));
        assert!(!Predicate::Lte("week_start".into(), "2026-03-02".into()).matches(&r));
        assert!(!Predicate::eq("channel", Value::Null).matches(&r));
        assert!(!Predicate::eq("missing", "x").matches(&r));
    }

    #[test]
    fn test_text_predicate_reads_the_column_type() {
        let r = row(json!({"spend": 150.0, "done": true, "label": "true", "count": 3}));
        assert!(Predicate::EqText("spend".into(), "150".into()).matches(&r));
        assert!(Predicate::EqText("count".into(), "3".into()).matches(&r));
        assert!(Predicate::EqText("done".into(), "true".into()).matches(&r));
        assert!(!Predicate::EqText("done".into(), "1".into()).matches(&r));
        assert!(Predicate::EqText("label".into(), "true".into()).matches(&r));
        assert!(!Predicate::EqText("label".into(), "TRUE".into()).matches(&r));
        assert_eq!(typed_text("150"), json!(150.0));
        assert_eq!(typed_text("false"), json!(false));
        assert_eq!(typed_text("copy-ready"), json!("copy-ready"));
    }
}
