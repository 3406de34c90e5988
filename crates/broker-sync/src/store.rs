use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{Account, BrokerEnvironment, Trade};
use database::{DbError, DbRepository, EncryptedCredentials};
use std::collections::HashSet;
use uuid::Uuid;

/// The persistence the sync needs. `DbRepository` is the production store.
#[async_trait]
pub trait SyncStore: Send + Sync {
    async fn account(&self, account_id: Uuid) -> Result<Account, DbError>;

    async fn credentials(
        &self,
        account_id: Uuid,
    ) -> Result<Option<(EncryptedCredentials, BrokerEnvironment)>, DbError>;

    async fn save_credentials(
        &self,
        account_id: Uuid,
        credentials: &EncryptedCredentials,
        environment: BrokerEnvironment,
    ) -> Result<(), DbError>;

    async fn clear_credentials(&self, account_id: Uuid) -> Result<(), DbError>;

    async fn existing_order_ids(
        &self,
        owner_id: Uuid,
        order_ids: &[String],
    ) -> Result<HashSet<String>, DbError>;

    /// Returns `false` when a trade for the same order already exists.
    async fn insert_broker_trade(&self, trade: &Trade) -> Result<bool, DbError>;

    async fn touch_last_sync(&self, account_id: Uuid, at: DateTime<Utc>) -> Result<(), DbError>;
}

#[async_trait]
impl SyncStore for DbRepository {
    async fn account(&self, account_id: Uuid) -> Result<Account, DbError> {
        self.get_account(account_id).await
    }

    async fn credentials(
        &self,
        account_id: Uuid,
    ) -> Result<Option<(EncryptedCredentials, BrokerEnvironment)>, DbError> {
        self.get_broker_credentials(account_id).await
    }

    async fn save_credentials(
        &self,
        account_id: Uuid,
        credentials: &EncryptedCredentials,
        environment: BrokerEnvironment,
    ) -> Result<(), DbError> {
        self.save_broker_credentials(account_id, credentials, environment).await
    }

    async fn clear_credentials(&self, account_id: Uuid) -> Result<(), DbError> {
        self.clear_broker_credentials(account_id).await
    }

    async fn existing_order_ids(
        &self,
        owner_id: Uuid,
        order_ids: &[String],
    ) -> Result<HashSet<String>, DbError> {
        DbRepository::existing_order_ids(self, owner_id, order_ids).await
    }

    async fn insert_broker_trade(&self, trade: &Trade) -> Result<bool, DbError> {
        DbRepository::insert_broker_trade(self, trade).await
    }

    async fn touch_last_sync(&self, account_id: Uuid, at: DateTime<Utc>) -> Result<(), DbError> {
        DbRepository::touch_last_sync(self, account_id, at).await
    }
}
