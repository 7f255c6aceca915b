use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::errors::AppError;
use crate::normalize::Record;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
}

/// GET /api/audit
pub async fn handle_list_audit(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<Value>>, AppError> {
    let entries = state
        .audit
        .list(query.entity_type.as_deref(), query.entity_id.as_deref())
        .await?;
    Ok(Json(entries.iter().map(Record::to_dual).collect()))
}
