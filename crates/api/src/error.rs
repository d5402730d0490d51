use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use flowgate_core::error::CoreError;
use flowgate_db::StoreError;
use flowgate_worker::{RegistryError, ServiceError};
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps the domain errors of the lower crates and adds HTTP-specific
/// variants. Implements [`IntoResponse`] to produce consistent JSON error
/// responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Job submission, lookup and webhook errors.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Flow registry reload and configuration errors.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Core(CoreError::Validation(errors.to_string()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core_error(core),

            AppError::Service(err) => match err {
                ServiceError::FlowNotConfigured(_) => {
                    (StatusCode::NOT_FOUND, "FLOW_NOT_CONFIGURED", err.to_string())
                }
                ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string()),
                ServiceError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                ServiceError::PaymentRequest(_) => {
                    tracing::warn!(error = %err, "Payment request failed");
                    (StatusCode::BAD_GATEWAY, "PAYMENT_REQUEST_FAILED", err.to_string())
                }
                ServiceError::Launch { .. } => {
                    (StatusCode::BAD_GATEWAY, "LAUNCH_FAILED", err.to_string())
                }
                ServiceError::Store(store) => classify_store_error(store),
            },

            AppError::Registry(err) => match err {
                RegistryError::Discovery(_) | RegistryError::Timeout(_) => {
                    tracing::warn!(error = %err, "Flow discovery failed");
                    (StatusCode::BAD_GATEWAY, "DISCOVERY_FAILED", err.to_string())
                }
                RegistryError::UnknownFlow(_) => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string())
                }
                RegistryError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                RegistryError::Store(store) => classify_store_error(store),
            },

            AppError::Store(err) => classify_store_error(err),

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn classify_core_error(err: &CoreError) -> (StatusCode, &'static str, String) {
    match err {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
    }
}

/// Classify a store error into an HTTP status, error code, and message.
///
/// Illegal transitions and duplicates are conflicts; everything else is
/// logged and reported as a sanitized 500.
fn classify_store_error(err: &StoreError) -> (StatusCode, &'static str, String) {
    match err {
        StoreError::IllegalTransition { .. } | StoreError::Duplicate(_) => {
            (StatusCode::CONFLICT, "CONFLICT", err.to_string())
        }
        StoreError::Database(db) => {
            tracing::error!(error = %db, "Database error");
            internal()
        }
        StoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Store error");
            internal()
        }
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}
