use crate::error::ApiError;
use async_trait::async_trait;
use configuration::BrokerSettings;
use core_types::{BrokerCredentials, BrokerEnvironment, Fill};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub mod error;
pub mod responses;
// --- Public API ---
pub use responses::{AccessToken, AccessTokenRequest, AccessTokenResponse, Contract};

/// The abstract interface to the broker's REST API.
/// Sync logic depends only on this trait, so a mock can stand in for the
/// network in tests.
#[async_trait]
pub trait BrokerApi: Send + Sync {
    /// Exchanges login material for a bearer token.
    async fn authenticate(&self, credentials: &BrokerCredentials) -> Result<AccessToken, ApiError>;

    /// Fetches every fill the broker has for the user. (Authenticated)
    async fn list_fills(&self, token: &AccessToken) -> Result<Vec<Fill>, ApiError>;

    /// Looks up one contract by id. (Authenticated)
    async fn get_contract(&self, token: &AccessToken, contract_id: i64) -> Result<Contract, ApiError>;
}

/// A concrete implementation of `BrokerApi` for Tradovate.
#[derive(Clone)]
pub struct TradovateClient {
    client: reqwest::Client,
    base_url: String,
    app_version: String,
}

impl TradovateClient {
    pub fn new(environment: BrokerEnvironment, settings: &BrokerSettings) -> Result<Self, ApiError> {
        let base_url = match environment {
            BrokerEnvironment::Live => settings.live_url.clone(),
            BrokerEnvironment::Demo => settings.demo_url.clone(),
        };

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = settings.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| ApiError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            app_version: settings.app_version.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn _get_authed<T: DeserializeOwned>(
        &self,
        token: &AccessToken,
        resource: &str,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = request.bearer_auth(token.as_str()).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(ApiError::Status {
                resource: resource.to_string(),
                status: status.as_u16(),
            });
        }

        let text = response.text().await?;
        serde_json::from_str::<T>(&text).map_err(|e| ApiError::Deserialization(e.to_string()))
    }
}

#[async_trait]
impl BrokerApi for TradovateClient {
    async fn authenticate(&self, credentials: &BrokerCredentials) -> Result<AccessToken, ApiError> {
        let url = format!("{}/auth/accesstokenrequest", self.base_url);
        let body = AccessTokenRequest {
            name: &credentials.username,
            password: &credentials.password,
            app_id: &credentials.cid,
            app_version: &self.app_version,
            cid: &credentials.cid,
            sec: &credentials.secret,
        };

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::AuthFailed(format!("{} {}", status.as_u16(), text)));
        }

        tracing::debug!(base_url = %self.base_url, "Tradovate access token requested.");
        serde_json::from_str::<AccessTokenResponse>(&text)
            .map_err(|e| ApiError::Deserialization(e.to_string()))?
            .into_token()
    }

    async fn list_fills(&self, token: &AccessToken) -> Result<Vec<Fill>, ApiError> {
        let url = format!("{}/fill/list", self.base_url);
        self._get_authed(token, "fills", self.client.get(&url)).await
    }

    async fn get_contract(&self, token: &AccessToken, contract_id: i64) -> Result<Contract, ApiError> {
        let url = format!("{}/contract/item", self.base_url);
        let request = self.client.get(&url).query(&[("id", contract_id)]);
        self._get_authed(token, &format!("contract {contract_id}"), request)
            .await
    }
}
