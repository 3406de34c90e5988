use crate::{context::AccountContext, error::AppError, handlers::MessageResponse, AppState};
use axum::{extract::State, Json};
use broker_sync::{BrokerStatus, SyncOutcome};
use core_types::{BrokerCredentials, BrokerEnvironment};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    #[serde(flatten)]
    pub credentials: BrokerCredentials,
    pub environment: Option<String>,
}

/// # GET /api/tradovate/status
pub async fn status(
    State(state): State<Arc<AppState>>,
    ctx: AccountContext,
) -> Result<Json<BrokerStatus>, AppError> {
    Ok(Json(state.broker.status(ctx.id()).await?))
}

/// # POST /api/tradovate/credentials
/// Credentials are checked against the broker before anything is stored.
pub async fn save_credentials(
    State(state): State<Arc<AppState>>,
    ctx: AccountContext,
    Json(body): Json<CredentialsRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let environment = match body.environment.as_deref() {
        None | Some("") => BrokerEnvironment::default(),
        Some(raw) => BrokerEnvironment::from_str(raw)?,
    };
    state
        .broker
        .save_credentials(ctx.id(), &body.credentials, environment)
        .await?;
    Ok(Json(MessageResponse::new("Tradovate credentials saved and validated")))
}

/// # DELETE /api/tradovate/credentials
pub async fn delete_credentials(
    State(state): State<Arc<AppState>>,
    ctx: AccountContext,
) -> Result<Json<MessageResponse>, AppError> {
    state.broker.delete_credentials(ctx.id()).await?;
    Ok(Json(MessageResponse::new("Tradovate credentials removed")))
}

/// # POST /api/tradovate/sync
pub async fn sync(
    State(state): State<Arc<AppState>>,
    ctx: AccountContext,
) -> Result<Json<SyncOutcome>, AppError> {
    Ok(Json(state.broker.sync(ctx.id()).await?))
}
