use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Entry could not be decrypted")]
    Integrity,

    #[error("Summary generation failed")]
    SummaryFailed(#[source] anyhow::Error),

    #[error("Chat failed")]
    ChatFailed(#[source] anyhow::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Config(msg) => {
                tracing::error!(error = %msg, "Configuration error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".into(),
                )
            }
            // Tag mismatch means tampering, corruption, or a key mismatch.
            // Surface a fixed message, never partial plaintext or crypto detail.
            AppError::Integrity => {
                tracing::error!("Entry decryption failed integrity check");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::SummaryFailed(e) => {
                tracing::warn!(error = %e, "Summary generation failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "Failed to generate emotional summary. Please try again.".into(),
                )
            }
            AppError::ChatFailed(e) => {
                tracing::warn!(error = %e, "Chat completion failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "The companion is unavailable right now. Please try again.".into(),
                )
            }
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".into(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!(error = %e, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".into(),
                )
            }
        };

        let body = json!({
            "error": {
                "message": message,
                "code": status.as_u16(),
            }
        });

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
