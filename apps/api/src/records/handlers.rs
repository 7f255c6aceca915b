//! Generic Axum handlers, instantiated per entity in the router
//! (e.g. `get(handlers::handle_list::<AdTemplate>)`).

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;

use crate::errors::AppError;
use crate::normalize::{Record, Row};
use crate::records::{self, HardDelete};
use crate::state::AppState;
use crate::store::remote::Predicate;

/// Translates query parameters (in either naming convention) into equality
/// predicates on row columns. Values stay text; the store reads them in
/// each column's own type.
pub fn query_filter<T: Record>(params: &HashMap<String, String>) -> Result<Vec<Predicate>, AppError> {
    let mut filter = Vec::with_capacity(params.len());
    for (key, raw) in params {
        let spec = T::FIELDS
            .iter()
            .find(|s| s.row == key.as_str() || s.aliases.contains(&key.as_str()))
            .ok_or_else(|| {
                AppError::Validation(format!("unknown {} filter '{key}'", T::ENTITY))
            })?;
        filter.push(Predicate::EqText(spec.row.to_string(), raw.clone()));
    }
    Ok(filter)
}

/// GET /api/<collection>
pub async fn handle_list<T: Record>(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Value>>, AppError> {
    let filter = query_filter::<T>(&params)?;
    let records: Vec<T> = records::list(&state.store, &filter).await?;
    Ok(Json(records.iter().map(Record::to_dual).collect()))
}

/// GET /api/<collection>/:id
pub async fn handle_get<T: Record>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let rec: T = records::get(&state.store, &id).await?;
    Ok(Json(rec.to_dual()))
}

/// POST /api/<collection>
pub async fn handle_create<T: Record>(
    State(state): State<AppState>,
    Json(input): Json<Row>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let rec: T = records::create(&state.store, &state.audit, &input).await?;
    Ok((StatusCode::CREATED, Json(rec.to_dual())))
}

/// PATCH /api/<collection>/:id
pub async fn handle_update<T: Record>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<Row>,
) -> Result<Json<Value>, AppError> {
    let rec: T = records::update(&state.store, &state.audit, &id, &patch).await?;
    Ok(Json(rec.to_dual()))
}

/// DELETE /api/<collection>/:id
pub async fn handle_delete<T: HardDelete>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    records::delete::<T>(&state.store, &state.audit, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
