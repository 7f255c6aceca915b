//! Axum route handlers for ads and approval decisions.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::models::satellite::ApprovalStatus;
use crate::normalize::{Record, Row};
use crate::signals::trade::{Trade, TRADES};
use crate::state::AppState;
use crate::workflow::approvals::{decide_approval, Decision};
use crate::workflow::service::{
    create_ad, get_ad, list_ads, parse_stage, parse_status, select_variant, set_stage,
    transition_ad, update_ad, AdFilter,
};

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub status: String,
    #[serde(alias = "workflowStage", alias = "stage")]
    pub workflow_stage: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StageRequest {
    #[serde(alias = "workflowStage", alias = "stage")]
    pub workflow_stage: String,
}

#[derive(Debug, Deserialize)]
pub struct VariantRequest {
    #[serde(alias = "selectedVariant", alias = "selected_variant")]
    pub slot: u8,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub status: String,
    pub reviewer: Option<String>,
    pub note: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Ads
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/ads
pub async fn handle_list_ads(
    State(state): State<AppState>,
    Query(filter): Query<AdFilter>,
) -> Result<Json<Vec<Value>>, AppError> {
    let ads = list_ads(&state.store, &filter).await?;
    Ok(Json(ads.iter().map(Record::to_dual).collect()))
}

/// GET /api/ads/:id
pub async fn handle_get_ad(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    Ok(Json(get_ad(&state.store, &id).await?.to_dual()))
}

/// POST /api/ads
pub async fn handle_create_ad(
    State(state): State<AppState>,
    Json(input): Json<Row>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let ad = create_ad(&state.store, &state.audit, &input).await?;
    Ok((StatusCode::CREATED, Json(ad.to_dual())))
}

/// PATCH /api/ads/:id
pub async fn handle_update_ad(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<Row>,
) -> Result<Json<Value>, AppError> {
    let ad = update_ad(&state.store, &state.audit, &id, &patch).await?;
    Ok(Json(ad.to_dual()))
}

/// POST /api/ads/:id/status
pub async fn handle_transition_ad(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<Value>, AppError> {
    let status = parse_status(&request.status)?;
    let stage = request
        .workflow_stage
        .as_deref()
        .map(parse_stage)
        .transpose()?;
    let ad = transition_ad(
        &state.store,
        &state.audit,
        &id,
        status,
        stage,
        request.note.as_deref(),
    )
    .await?;
    Ok(Json(ad.to_dual()))
}

/// POST /api/ads/:id/stage
pub async fn handle_set_stage(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<StageRequest>,
) -> Result<Json<Value>, AppError> {
    let stage = parse_stage(&request.workflow_stage)?;
    let ad = set_stage(&state.store, &state.audit, &id, stage).await?;
    Ok(Json(ad.to_dual()))
}

/// POST /api/ads/:id/variant
pub async fn handle_select_variant(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<VariantRequest>,
) -> Result<Json<Value>, AppError> {
    let ad = select_variant(&state.store, &state.audit, &id, request.slot).await?;
    Ok(Json(ad.to_dual()))
}

/// GET /api/trades
pub async fn handle_list_trades() -> Json<&'static [Trade]> {
    Json(TRADES)
}

// ────────────────────────────────────────────────────────────────────────────
// Approvals
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/approvals/:id/decision
pub async fn handle_decide_approval(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<Value>, AppError> {
    let status = ApprovalStatus::parse(&request.status).ok_or_else(|| {
        AppError::Validation(format!("unknown approval status '{}'", request.status))
    })?;
    let decision = Decision {
        status,
        reviewer: request.reviewer,
        note: request.note,
    };
    let (approval, ad) = decide_approval(&state.store, &state.audit, &id, decision).await?;
    Ok(Json(json!({
        "approval": approval.to_dual(),
        "ad": ad.map(|a| a.to_dual()),
    })))
}
