use crate::{context::AccountContext, error::AppError, AppState};
use axum::{extract::State, http::StatusCode, Json};
use core_types::{Account, CoreError, Theme};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct ThemeRequest {
    pub theme: Option<String>,
}

/// # POST /api/accounts
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<Account>), AppError> {
    let username = body.username.trim();
    Account::validate_username(username)?;
    let account = state.db_repo.create_account(username).await?;
    tracing::info!(account_id = %account.id, "Account created.");
    Ok((StatusCode::CREATED, Json(account)))
}

/// # GET /api/account
/// The caller's account, including whether a broker is configured.
pub async fn get_account(ctx: AccountContext) -> Json<Account> {
    Json(ctx.account)
}

/// # POST /api/account/theme
pub async fn set_theme(
    State(state): State<Arc<AppState>>,
    ctx: AccountContext,
    Json(body): Json<ThemeRequest>,
) -> Result<Json<Account>, AppError> {
    let raw = body.theme.ok_or(CoreError::MissingField("theme"))?;
    let theme = Theme::from_str(&raw)?;
    let account = state.db_repo.update_theme(ctx.id(), theme).await?;
    Ok(Json(account))
}
