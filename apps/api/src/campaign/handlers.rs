//! Axum route handlers for budget, campaign status and metrics.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::campaign::budget::{get_budget, summarize, update_budget};
use crate::campaign::metrics::{
    campaign_health, list_metrics, metrics_weeks, upsert_metric, CampaignHealth,
};
use crate::campaign::status::{get_campaign_status, go_live, update_campaign_status};
use crate::errors::AppError;
use crate::models::campaign::Budget;
use crate::models::metrics::MetricsWeek;
use crate::models::Platform;
use crate::normalize::{Record, Row};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct GoLiveRequest {
    #[serde(alias = "startedAt")]
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub channel: Option<String>,
}

fn budget_body(budget: &Budget) -> Value {
    let mut body = budget.to_dual();
    if let Value::Object(map) = &mut body {
        map.insert("summary".into(), json!(summarize(budget)));
    }
    body
}

// ────────────────────────────────────────────────────────────────────────────
// Budget
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/budget
pub async fn handle_get_budget(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let budget = get_budget(&state.store).await?;
    Ok(Json(budget_body(&budget)))
}

/// PATCH /api/budget
pub async fn handle_update_budget(
    State(state): State<AppState>,
    Json(patch): Json<Row>,
) -> Result<Json<Value>, AppError> {
    let budget = update_budget(&state.store, &state.audit, &patch).await?;
    Ok(Json(budget_body(&budget)))
}

// ────────────────────────────────────────────────────────────────────────────
// Campaign status
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/campaign/status
pub async fn handle_get_campaign_status(
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    Ok(Json(get_campaign_status(&state.store).await?.to_dual()))
}

/// PATCH /api/campaign/status
pub async fn handle_update_campaign_status(
    State(state): State<AppState>,
    Json(patch): Json<Row>,
) -> Result<Json<Value>, AppError> {
    let status = update_campaign_status(&state.store, &state.audit, &patch).await?;
    Ok(Json(status.to_dual()))
}

/// POST /api/campaign/go-live
pub async fn handle_go_live(
    State(state): State<AppState>,
    body: Option<Json<GoLiveRequest>>,
) -> Result<Json<Value>, AppError> {
    let Json(request) = body.unwrap_or_default();
    let status = go_live(&state.store, &state.audit, request.started_at).await?;
    Ok(Json(status.to_dual()))
}

// ────────────────────────────────────────────────────────────────────────────
// Metrics
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/metrics
pub async fn handle_list_metrics(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> Result<Json<Vec<Value>>, AppError> {
    let channel = query
        .channel
        .as_deref()
        .map(|c| {
            Platform::parse(c).ok_or_else(|| AppError::Validation(format!("unknown channel '{c}'")))
        })
        .transpose()?;
    let rows = list_metrics(&state.store, query.from, query.to, channel).await?;
    Ok(Json(rows.iter().map(Record::to_dual).collect()))
}

/// POST /api/metrics
pub async fn handle_upsert_metric(
    State(state): State<AppState>,
    Json(input): Json<Row>,
) -> Result<Json<Value>, AppError> {
    let metric = upsert_metric(&state.store, &state.audit, &input).await?;
    Ok(Json(metric.to_dual()))
}

/// GET /api/metrics/weeks
pub async fn handle_metrics_weeks(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> Result<Json<Vec<MetricsWeek>>, AppError> {
    Ok(Json(metrics_weeks(&state.store, query.from, query.to).await?))
}

/// GET /api/metrics/health
pub async fn handle_campaign_health(
    State(state): State<AppState>,
) -> Result<Json<CampaignHealth>, AppError> {
    Ok(Json(campaign_health(&state.store).await?))
}
