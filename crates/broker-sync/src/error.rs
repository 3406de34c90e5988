use api_client::error::ApiError;
use database::DbError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Tradovate credentials not configured")]
    NotConfigured,

    #[error("{0}")]
    InvalidCredentials(String),

    #[error("Failed to validate credentials: {0}")]
    CredentialsRejected(ApiError),

    #[error("Sync failed: {0}")]
    Broker(#[from] ApiError),

    #[error("Credential vault error: {0}")]
    Vault(String),

    #[error("Storage error: {0}")]
    Store(#[from] DbError),
}
