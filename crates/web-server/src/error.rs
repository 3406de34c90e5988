use analytics::AnalyticsError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use broker_sync::SyncError;
use core_types::CoreError;
use database::DbError;
use importer::ImportError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Database error: {0}")]
    Database(#[from] DbError),
    #[error("Broker error: {0}")]
    Sync(#[from] SyncError),
    #[error("Import error: {0}")]
    Import(#[from] ImportError),
    #[error("Analytics error: {0}")]
    Analytics(#[from] AnalyticsError),
    #[error("Invalid input: {0}")]
    Input(#[from] CoreError),
}

impl AppError {
    fn from_db(err: DbError) -> (StatusCode, String) {
        match err {
            DbError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            DbError::Conflict(entity) => (StatusCode::CONFLICT, format!("{entity} already exists")),
            other => {
                tracing::error!(error = ?other, "Database error.");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal database error occurred".to_string(),
                )
            }
        }
    }

    /// Status and user-facing message. Internal failures are logged here and
    /// replaced with a generic message.
    pub fn status_and_message(self) -> (StatusCode, String) {
        match self {
            AppError::Validation(message) => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            AppError::Input(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            AppError::Analytics(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            AppError::Database(err) => Self::from_db(err),
            AppError::Import(err) => match err {
                ImportError::Write(_) => {
                    tracing::error!(error = ?err, "CSV export failed.");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Failed to build the export".to_string(),
                    )
                }
                other => (StatusCode::BAD_REQUEST, other.to_string()),
            },
            AppError::Sync(err) => match err {
                SyncError::NotConfigured
                | SyncError::InvalidCredentials(_)
                | SyncError::CredentialsRejected(_) => (StatusCode::BAD_REQUEST, err.to_string()),
                SyncError::Broker(_) => {
                    tracing::warn!(error = %err, "Broker request failed.");
                    (StatusCode::BAD_GATEWAY, err.to_string())
                }
                SyncError::Store(db_err) => Self::from_db(db_err),
                SyncError::Vault(_) => {
                    tracing::error!(error = ?err, "Credential vault error.");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Stored broker credentials could not be read".to_string(),
                    )
                }
            },
        }
    }
}

/// Converts our custom `AppError` into an HTTP response.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = self.status_and_message();
        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}
