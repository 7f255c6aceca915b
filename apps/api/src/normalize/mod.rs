//! Entity normalizer.
//!
//! Stored records arrive in one of two naming conventions: the relational
//! row shape (`primary_text`, `utm_campaign`) or the legacy document shape
//! (`primaryText`, nested `utm.campaign`). Each entity parses either into a
//! single canonical struct and writes back through two serializers:
//! `to_row` for the remote store and `to_legacy` for fallback documents.
//! Clients receive `to_dual`, which carries both conventions.
//!
//! Lookup order for every field is: row name, then each legacy alias in
//! declaration order, then the field's default. `null` counts as absent.

pub mod ad;
pub mod audit;
pub mod budget;
pub mod campaign;
pub mod metrics;
pub mod satellite;

use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

/// A raw record in either naming convention.
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum NormalizeError {
    #[error("{entity} record is missing its id")]
    MissingIdentity { entity: &'static str },

    #[error("{entity} record is not a JSON object")]
    NotAnObject { entity: &'static str },
}

/// Row column name plus the legacy paths that may hold the same value.
/// Paths are dotted; numeric segments index into arrays (`imageVariants.0`).
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub row: &'static str,
    pub aliases: &'static [&'static str],
}

pub const fn field(row: &'static str, aliases: &'static [&'static str]) -> FieldSpec {
    FieldSpec { row, aliases }
}

/// Canonical entity contract shared by every collection.
pub trait Record: Clone + Send + Sync + Sized + 'static {
    /// Entity type tag used in audit entries.
    const ENTITY: &'static str;
    /// Remote table name.
    const TABLE: &'static str;
    /// Fallback document name (without extension).
    const COLLECTION: &'static str;
    const ID_PREFIX: &'static str;
    const FIELDS: &'static [FieldSpec];
    /// Stored as one object document in fallback mode instead of an array.
    const SINGLETON: bool = false;
    /// Columns the remote schema may not have yet. Writes that fail on one
    /// of these are redirected to the override table.
    const DRIFT_COLUMNS: &'static [&'static str] = &[];

    fn id(&self) -> &str;
    fn from_raw(raw: &Row) -> Result<Self, NormalizeError>;
    fn to_row(&self) -> Row;
    fn to_legacy(&self) -> Row;
    fn set_updated_at(&mut self, at: DateTime<Utc>);

    fn set_created_at(&mut self, _at: DateTime<Utc>) {}

    /// Required-field check run on create only.
    fn validate_new(&self) -> Result<(), String> {
        Ok(())
    }

    fn from_value(value: &Value) -> Result<Self, NormalizeError> {
        match value {
            Value::Object(raw) => Self::from_raw(raw),
            _ => Err(NormalizeError::NotAnObject {
                entity: Self::ENTITY,
            }),
        }
    }

    /// Client-facing shape: the legacy document with every row column
    /// layered on top, so each field is readable under both names.
    fn to_dual(&self) -> Value {
        let mut out = self.to_legacy();
        out.extend(self.to_row());
        Value::Object(out)
    }
}

/// Reads canonical fields out of a raw record through a `FieldSpec` table.
pub struct Fields<'a> {
    raw: &'a Row,
    specs: &'static [FieldSpec],
}

impl<'a> Fields<'a> {
    pub fn new(raw: &'a Row, specs: &'static [FieldSpec]) -> Self {
        Self { raw, specs }
    }

    /// First non-null value under the row name or any alias.
    pub fn value(&self, row: &str) -> Option<&'a Value> {
        if let Some(v) = lookup(self.raw, row) {
            return Some(v);
        }
        let spec = self.specs.iter().find(|s| s.row == row)?;
        spec.aliases.iter().find_map(|path| lookup(self.raw, path))
    }

    pub fn text(&self, row: &str) -> String {
        self.opt_text(row).unwrap_or_default()
    }

    /// Blank strings resolve to `None`.
    pub fn opt_text(&self, row: &str) -> Option<String> {
        let s = match self.value(row)? {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return None,
        };
        if s.trim().is_empty() {
            None
        } else {
            Some(s)
        }
    }

    pub fn number(&self, row: &str) -> f64 {
        self.value(row).and_then(as_number).unwrap_or(0.0)
    }

    /// Non-negative integer counter; negative or fractional input is clamped
    /// and rounded, and values past `u64::MAX` saturate.
    pub fn count(&self, row: &str) -> u64 {
        let n = self.number(row);
        if n.is_finite() && n > 0.0 {
            n.round() as u64
        } else {
            0
        }
    }

    pub fn flag(&self, row: &str) -> bool {
        match self.value(row) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
            Some(Value::String(s)) => matches!(s.trim(), "true" | "1" | "yes"),
            _ => false,
        }
    }

    pub fn timestamp(&self, row: &str) -> Option<DateTime<Utc>> {
        self.value(row).and_then(parse_timestamp)
    }

    pub fn date(&self, row: &str) -> Option<NaiveDate> {
        self.value(row).and_then(parse_date)
    }

    /// Entity id as a string; numeric ids are accepted.
    pub fn id(&self, entity: &'static str) -> Result<String, NormalizeError> {
        self.opt_text("id")
            .ok_or(NormalizeError::MissingIdentity { entity })
    }
}

fn lookup<'a>(raw: &'a Row, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = raw.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// RFC 3339 strings (including Postgres `+00:00` offsets) or epoch millis.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

/// `YYYY-MM-DD`, or the date part of a full timestamp.
pub fn parse_date(value: &Value) -> Option<NaiveDate> {
    let s = value.as_str()?.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(value).map(|dt| dt.date_naive()))
}

pub fn timestamp_value(at: Option<DateTime<Utc>>) -> Value {
    at.map(|dt| Value::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
        .unwrap_or(Value::Null)
}

pub fn date_value(date: Option<NaiveDate>) -> Value {
    date.map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
        .unwrap_or(Value::Null)
}

/// Unwraps a `json!({...})` literal into a row.
pub fn object(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

pub fn opt_value(s: &Option<String>) -> Value {
    s.as_ref()
        .map(|s| Value::String(s.clone()))
        .unwrap_or(Value::Null)
}

/// Applies a partial update written in either convention onto `current`.
///
/// Each field present in `patch` (under any of its names, row name first)
/// replaces the current value; fields named in `skip` are left alone.
/// The merged row is normalized again, so the result is canonical.
pub fn apply_patch<T: Record>(current: &T, patch: &Row, skip: &[&str]) -> Result<T, NormalizeError> {
    let mut row = current.to_row();
    let fields = Fields::new(patch, T::FIELDS);
    for spec in T::FIELDS {
        if spec.row == "id" || skip.contains(&spec.row) {
            continue;
        }
        if let Some(v) = fields.value(spec.row) {
            row.insert(spec.row.to_string(), v.clone());
        }
    }
    T::from_raw(&row)
}

/// Normalizes `raw`, checks the record survives all three serializers, and
/// checks every undotted alias in the dual shape agrees with its row column.
#[cfg(test)]
pub(crate) fn assert_round_trip<T: Record + PartialEq + std::fmt::Debug>(raw: Value) -> T {
    let rec = T::from_value(&raw).unwrap();
    assert_eq!(T::from_raw(&rec.to_row()).unwrap(), rec, "row shape of {raw}");
    assert_eq!(T::from_raw(&rec.to_legacy()).unwrap(), rec, "legacy shape of {raw}");
    let dual = rec.to_dual();
    assert_eq!(T::from_value(&dual).unwrap(), rec, "dual shape of {raw}");
    for spec in T::FIELDS {
        for alias in spec.aliases.iter().filter(|a| !a.contains('.')) {
            if let Some(v) = dual.get(*alias) {
                assert_eq!(Some(v), dual.get(spec.row), "{alias} vs {}", spec.row);
            }
        }
    }
    rec
}
