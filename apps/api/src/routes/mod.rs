pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::audit::handlers::handle_list_audit;
use crate::campaign::handlers as campaign;
use crate::models::satellite::{
    ActivityEntry, AdTemplate, ApprovalItem, LaunchChecklistItem, LifecycleMessage,
};
use crate::records::handlers as records;
use crate::state::AppState;
use crate::workflow::handlers as workflow;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Ads
        .route(
            "/api/ads",
            get(workflow::handle_list_ads).post(workflow::handle_create_ad),
        )
        .route(
            "/api/ads/:id",
            get(workflow::handle_get_ad).patch(workflow::handle_update_ad),
        )
        .route("/api/ads/:id/status", post(workflow::handle_transition_ad))
        .route("/api/ads/:id/stage", post(workflow::handle_set_stage))
        .route("/api/ads/:id/variant", post(workflow::handle_select_variant))
        .route("/api/trades", get(workflow::handle_list_trades))
        // Satellite entities
        .route(
            "/api/templates",
            get(records::handle_list::<AdTemplate>).post(records::handle_create::<AdTemplate>),
        )
        .route(
            "/api/templates/:id",
            get(records::handle_get::<AdTemplate>)
                .patch(records::handle_update::<AdTemplate>)
                .delete(records::handle_delete::<AdTemplate>),
        )
        .route(
            "/api/approvals",
            get(records::handle_list::<ApprovalItem>).post(records::handle_create::<ApprovalItem>),
        )
        .route(
            "/api/approvals/:id",
            get(records::handle_get::<ApprovalItem>).patch(records::handle_update::<ApprovalItem>),
        )
        .route(
            "/api/approvals/:id/decision",
            post(workflow::handle_decide_approval),
        )
        .route(
            "/api/checklist",
            get(records::handle_list::<LaunchChecklistItem>)
                .post(records::handle_create::<LaunchChecklistItem>),
        )
        .route(
            "/api/checklist/:id",
            get(records::handle_get::<LaunchChecklistItem>)
                .patch(records::handle_update::<LaunchChecklistItem>),
        )
        .route(
            "/api/lifecycle-messages",
            get(records::handle_list::<LifecycleMessage>)
                .post(records::handle_create::<LifecycleMessage>),
        )
        .route(
            "/api/lifecycle-messages/:id",
            get(records::handle_get::<LifecycleMessage>)
                .patch(records::handle_update::<LifecycleMessage>),
        )
        .route(
            "/api/activity",
            get(records::handle_list::<ActivityEntry>).post(records::handle_create::<ActivityEntry>),
        )
        .route("/api/activity/:id", get(records::handle_get::<ActivityEntry>))
        // Budget & campaign status
        .route(
            "/api/budget",
            get(campaign::handle_get_budget).patch(campaign::handle_update_budget),
        )
        .route(
            "/api/campaign/status",
            get(campaign::handle_get_campaign_status).patch(campaign::handle_update_campaign_status),
        )
        .route("/api/campaign/go-live", post(campaign::handle_go_live))
        // Metrics
        .route(
            "/api/metrics",
            get(campaign::handle_list_metrics).post(campaign::handle_upsert_metric),
        )
        .route("/api/metrics/weeks", get(campaign::handle_metrics_weeks))
        .route("/api/metrics/health", get(campaign::handle_campaign_health))
        // Audit
        .route("/api/audit", get(handle_list_audit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::fallback::FallbackStore;
    use crate::store::{Backend, Store};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app(dir: &tempfile::TempDir) -> Router {
        let config = Config {
            database_url: None,
            data_dir: dir.path().to_path_buf(),
            port: 0,
            rust_log: "info".into(),
            db_max_connections: 1,
        };
        let store = Store::new(Backend::Fallback(FallbackStore::new(dir.path())));
        build_router(AppState::new(store, config))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(b) => request.body(Body::from(b.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health_reports_backend() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = call(&app(&dir), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["backend"], json!("fallback"));
    }

    #[tokio::test]
    async fn test_ad_lifecycle_over_http() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir);
        let ad = json!({
            "id": "ad-1",
            "platform": "linkedin",
            "primary_text": "Stop chasing invoices.",
            "cta": "Start free",
            "landing_path": "/duct"
        });
        let (status, body) = call(&app, "POST", "/api/ads", Some(ad.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["primaryText"], body["primary_text"]);
        assert_eq!(body["workflowStage"], json!("copy-ready"));

        let (status, body) = call(&app, "POST", "/api/ads", Some(ad)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], json!("CONFLICT"));

        let (status, body) = call(
            &app,
            "POST",
            "/api/ads/ad-1/status",
            Some(json!({"status": "approved", "note": "ship it"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["workflow_stage"], json!("approved"));
        assert_eq!(body["statusHistory"].as_array().map(Vec::len), Some(2));

        let (status, body) = call(&app, "GET", "/api/ads/ad-404", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], json!("NOT_FOUND"));

        let (status, body) = call(&app, "GET", "/api/audit?entity_id=ad-1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["action"], json!("status_changed"));
    }

    #[tokio::test]
    async fn test_budget_includes_derived_summary() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir);
        let (status, body) = call(
            &app,
            "PATCH",
            "/api/budget",
            Some(json!({"total": 1000, "linkedinSpent": 250})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"]["burn_pct"], json!(25.0));
        assert_eq!(body["summary"]["remaining"], json!(750.0));

        let (status, _) = call(&app, "PATCH", "/api/budget", Some(json!({"total": -5}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_only_templates_can_be_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir);
        let (status, _) = call(
            &app,
            "POST",
            "/api/templates",
            Some(json!({"id": "tpl-1", "name": "Hero"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, _) = call(&app, "DELETE", "/api/templates/tpl-1", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, "DELETE", "/api/checklist/chk-1", None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }
}
