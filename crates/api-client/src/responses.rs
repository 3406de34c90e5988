use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::fmt;

// Tradovate speaks camelCase; `rename_all` maps it onto snake_case fields.

/// Body of `POST /auth/accesstokenrequest`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenRequest<'a> {
    pub name: &'a str,
    pub password: &'a str,
    pub app_id: &'a str,
    pub app_version: &'a str,
    pub cid: &'a str,
    pub sec: &'a str,
}

/// The broker answers 200 even for rejected logins; only the presence of
/// `accessToken` marks success.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenResponse {
    pub access_token: Option<String>,
    pub error_text: Option<String>,
    pub expiration_time: Option<String>,
}

impl AccessTokenResponse {
    pub fn into_token(self) -> Result<AccessToken, ApiError> {
        match self.access_token {
            Some(token) if !token.is_empty() => Ok(AccessToken(token)),
            _ => Err(ApiError::AuthFailed(self.error_text.unwrap_or_else(|| {
                "Authentication failed - no access token returned".to_string()
            }))),
        }
    }
}

/// A bearer token for authenticated calls.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// A single contract from `GET /contract/item`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub id: i64,
    pub name: String,
}
