use crate::{error::AppError, AppState};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use core_types::Account;
use database::DbError;
use std::sync::Arc;
use uuid::Uuid;

pub const ACCOUNT_HEADER: &str = "x-account-id";

/// The account a request acts for, resolved from the `x-account-id` header.
///
/// Handlers receive it as an argument; nothing account-specific lives outside
/// the request.
#[derive(Debug, Clone)]
pub struct AccountContext {
    pub account: Account,
}

impl AccountContext {
    pub fn id(&self) -> Uuid {
        self.account.id
    }
}

pub(crate) fn parse_account_header(parts: &Parts) -> Result<Uuid, AppError> {
    let raw = parts
        .headers
        .get(ACCOUNT_HEADER)
        .ok_or_else(|| AppError::Validation(format!("Missing {ACCOUNT_HEADER} header")))?;
    raw.to_str()
        .ok()
        .and_then(|value| Uuid::parse_str(value.trim()).ok())
        .ok_or_else(|| AppError::Validation(format!("Invalid {ACCOUNT_HEADER} header")))
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AccountContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let account_id = parse_account_header(parts)?;
        let account = state
            .db_repo
            .get_account(account_id)
            .await
            .map_err(|e| match e {
                DbError::NotFound => AppError::NotFound("Account not found".to_string()),
                other => AppError::Database(other),
            })?;
        Ok(AccountContext { account })
    }
}
