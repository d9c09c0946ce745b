use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use kapow_pipeline::PipelineError;
use kapow_store::StoreError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`PipelineError`] and [`StoreError`] and implements
/// [`IntoResponse`] to produce consistent `{error, code}` JSON bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Pipeline(pipeline) => match pipeline {
                PipelineError::Config(msg) => {
                    (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone())
                }
                PipelineError::Store(store) => classify_store_error(store),
                PipelineError::Cancelled => (
                    // Nginx's convention for "client closed request".
                    StatusCode::from_u16(499).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                    "CANCELLED",
                    "request cancelled".to_string(),
                ),
                PipelineError::Compose(e) => {
                    tracing::error!(error = %e, "Composition failed");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        e.to_string(),
                    )
                }
                PipelineError::Fatal(msg) => {
                    tracing::error!(error = %msg, "Pipeline failed");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        msg.clone(),
                    )
                }
            },

            AppError::Store(store) => classify_store_error(store),

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn classify_store_error(err: &StoreError) -> (StatusCode, &'static str, String) {
    match err {
        StoreError::NotFound(id) => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("Project {id} not found"),
        ),
        other => {
            tracing::error!(error = %other, "Project store error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}
