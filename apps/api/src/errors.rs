use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::normalize::NormalizeError;
use crate::store::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The active store could not complete the call. Carries the
    /// collaborator's message for diagnostics.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => AppError::NotFound(format!("{entity} {id}")),
            StoreError::Conflict { entity, id } => {
                AppError::Conflict(format!("{entity} {id} already exists"))
            }
            StoreError::Remote(e) => match e.code {
                Some(code) => AppError::StoreUnavailable(format!("{} ({code})", e.message)),
                None => AppError::StoreUnavailable(e.message),
            },
            e @ (StoreError::Io { .. } | StoreError::Json { .. }) => {
                AppError::StoreUnavailable(e.to_string())
            }
            StoreError::Normalize(e) => {
                AppError::Internal(anyhow::Error::new(e).context("stored record is malformed"))
            }
        }
    }
}

/// Normalizer failures at this layer come from client input.
impl From<NormalizeError> for AppError {
    fn from(err: NormalizeError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::StoreUnavailable(msg) => {
                tracing::error!("Store unavailable: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "STORE_UNAVAILABLE",
                    msg.clone(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::remote::RemoteError;

    #[test]
    fn test_store_errors_map_to_status_codes() {
        let cases = [
            (
                AppError::from(StoreError::NotFound { entity: "ad", id: "ad-1".into() }),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::from(StoreError::Conflict { entity: "ad", id: "ad-1".into() }),
                StatusCode::CONFLICT,
            ),
            (
                AppError::from(StoreError::Remote(RemoteError::new(Some("08006"), "reset"))),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                AppError::from(NormalizeError::MissingIdentity { entity: "ad" }),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.parts().0, expected, "{err}");
        }
    }

    #[test]
    fn test_remote_message_is_attached() {
        let err = AppError::from(StoreError::Remote(RemoteError::new(
            Some("08006"),
            "connection reset",
        )));
        let (_, code, message) = err.parts();
        assert_eq!(code, "STORE_UNAVAILABLE");
        assert_eq!(message, "connection reset (08006)");
    }
}
