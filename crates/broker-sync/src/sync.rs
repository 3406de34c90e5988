use crate::error::SyncError;
use crate::store::SyncStore;
use crate::trades::{group_fills, synthesize_trade, ContractCache};
use crate::vault::CredentialVault;
use api_client::error::ApiError;
use api_client::{BrokerApi, TradovateClient};
use chrono::{DateTime, Utc};
use configuration::BrokerSettings;
use core_types::{BrokerCredentials, BrokerEnvironment};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Produces a broker client for the environment an account is configured for.
pub trait BrokerFactory: Send + Sync {
    fn client(&self, environment: BrokerEnvironment) -> Result<Arc<dyn BrokerApi>, ApiError>;
}

/// Builds real `TradovateClient`s from the broker settings.
#[derive(Debug, Clone)]
pub struct TradovateFactory {
    settings: BrokerSettings,
}

impl TradovateFactory {
    pub fn new(settings: BrokerSettings) -> Self {
        Self { settings }
    }
}

impl BrokerFactory for TradovateFactory {
    fn client(&self, environment: BrokerEnvironment) -> Result<Arc<dyn BrokerApi>, ApiError> {
        Ok(Arc::new(TradovateClient::new(environment, &self.settings)?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub message: String,
    pub synced: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerStatus {
    pub configured: bool,
    pub environment: BrokerEnvironment,
    pub last_sync_time: Option<DateTime<Utc>>,
}

/// Pulls broker fills into an account's journal.
///
/// A pass is a straight sequence of network calls (auth, fill list, contract
/// lookups) followed by one insert per new order. Nothing is retried.
#[derive(Clone)]
pub struct BrokerSync {
    store: Arc<dyn SyncStore>,
    brokers: Arc<dyn BrokerFactory>,
    vault: CredentialVault,
}

impl BrokerSync {
    pub fn new(store: Arc<dyn SyncStore>, brokers: Arc<dyn BrokerFactory>, vault: CredentialVault) -> Self {
        Self { store, brokers, vault }
    }

    /// Checks the credentials against the broker, then stores them encrypted.
    /// A previous `last_sync_time` is kept.
    pub async fn save_credentials(
        &self,
        account_id: Uuid,
        credentials: &BrokerCredentials,
        environment: BrokerEnvironment,
    ) -> Result<(), SyncError> {
        if !credentials.is_complete() {
            return Err(SyncError::InvalidCredentials(
                "All Tradovate credential fields are required".to_string(),
            ));
        }

        let api = self.brokers.client(environment)?;
        api.authenticate(credentials)
            .await
            .map_err(SyncError::CredentialsRejected)?;

        // Fail with NotFound before encrypting for an unknown account.
        self.store.account(account_id).await?;
        let sealed = self.vault.seal(credentials)?;
        self.store.save_credentials(account_id, &sealed, environment).await?;

        tracing::info!(%account_id, %environment, "Tradovate credentials saved and validated.");
        Ok(())
    }

    pub async fn status(&self, account_id: Uuid) -> Result<BrokerStatus, SyncError> {
        let account = self.store.account(account_id).await?;
        Ok(BrokerStatus {
            configured: account.broker_configured,
            environment: account.broker_environment,
            last_sync_time: account.last_sync_time,
        })
    }

    pub async fn delete_credentials(&self, account_id: Uuid) -> Result<(), SyncError> {
        self.store.clear_credentials(account_id).await?;
        tracing::info!(%account_id, "Tradovate credentials removed.");
        Ok(())
    }

    /// Runs one sync pass and returns how many new trades were stored.
    pub async fn sync(&self, account_id: Uuid) -> Result<SyncOutcome, SyncError> {
        let (sealed, environment) = self
            .store
            .credentials(account_id)
            .await?
            .ok_or(SyncError::NotConfigured)?;
        let credentials = self.vault.open(&sealed)?;

        let api = self.brokers.client(environment)?;
        let token = api.authenticate(&credentials).await?;
        let fills = api.list_fills(&token).await?;

        if fills.is_empty() {
            self.store.touch_last_sync(account_id, Utc::now()).await?;
            tracing::info!(%account_id, "Tradovate sync found no fills.");
            return Ok(SyncOutcome {
                message: "No fills found".to_string(),
                synced: 0,
            });
        }

        let fetched = fills.len();
        let groups = group_fills(fills);
        let keys: Vec<String> = groups.iter().map(|g| g.key.clone()).collect();
        let existing = self.store.existing_order_ids(account_id, &keys).await?;

        let source = environment.source_label();
        let mut contracts = ContractCache::new();
        let mut synced = 0;

        for group in groups.iter().filter(|g| !existing.contains(&g.key)) {
            let ticker = contracts
                .resolve(api.as_ref(), &token, group.first().contract_id)
                .await;
            let trade = synthesize_trade(account_id, group, ticker, &source);

            match self.store.insert_broker_trade(&trade).await {
                Ok(true) => synced += 1,
                Ok(false) => {
                    tracing::warn!(order_id = %group.key, "Trade for order already exists; skipped.");
                }
                Err(e) => {
                    tracing::warn!(order_id = %group.key, error = %e, "Failed to save synced trade.");
                }
            }
        }

        self.store.touch_last_sync(account_id, Utc::now()).await?;
        tracing::info!(
            %account_id,
            fetched,
            orders = groups.len(),
            already_synced = existing.len(),
            synced,
            "Tradovate sync complete."
        );

        Ok(SyncOutcome {
            message: format!("Synced {synced} new trades"),
            synced,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use api_client::{AccessToken, Contract};
    use async_trait::async_trait;
    use core_types::{Account, Fill, Theme, Trade};
    use database::{DbError, EncryptedCredentials};
    use rust_decimal_macros::dec;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use chrono::TimeZone;

    const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    #[derive(Default)]
    struct MemoryStore {
        account: Mutex<Option<Account>>,
        credentials: Mutex<Option<(EncryptedCredentials, BrokerEnvironment)>>,
        trades: Mutex<Vec<Trade>>,
    }

    impl MemoryStore {
        fn with_account(id: Uuid) -> Self {
            let store = Self::default();
            *store.account.lock().unwrap() = Some(Account {
                id,
                username: "trader".to_string(),
                theme: Theme::Dark,
                broker_environment: BrokerEnvironment::Demo,
                broker_configured: false,
                last_sync_time: None,
                created_at: Utc::now(),
            });
            store
        }

        fn trades(&self) -> Vec<Trade> {
            self.trades.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SyncStore for MemoryStore {
        async fn account(&self, _account_id: Uuid) -> Result<Account, DbError> {
            self.account.lock().unwrap().clone().ok_or(DbError::NotFound)
        }

        async fn credentials(
            &self,
            _account_id: Uuid,
        ) -> Result<Option<(EncryptedCredentials, BrokerEnvironment)>, DbError> {
            Ok(self.credentials.lock().unwrap().clone())
        }

        async fn save_credentials(
            &self,
            _account_id: Uuid,
            credentials: &EncryptedCredentials,
            environment: BrokerEnvironment,
        ) -> Result<(), DbError> {
            *self.credentials.lock().unwrap() = Some((credentials.clone(), environment));
            if let Some(account) = self.account.lock().unwrap().as_mut() {
                account.broker_configured = true;
                account.broker_environment = environment;
            }
            Ok(())
        }

        async fn clear_credentials(&self, _account_id: Uuid) -> Result<(), DbError> {
            *self.credentials.lock().unwrap() = None;
            if let Some(account) = self.account.lock().unwrap().as_mut() {
                account.broker_configured = false;
                account.broker_environment = BrokerEnvironment::Demo;
                account.last_sync_time = None;
            }
            Ok(())
        }

        async fn existing_order_ids(
            &self,
            owner_id: Uuid,
            order_ids: &[String],
        ) -> Result<HashSet<String>, DbError> {
            Ok(self
                .trades
                .lock()
                .unwrap()
                .iter()
                .filter(|t| t.owner_id == owner_id)
                .filter_map(|t| t.tradovate_order_id.clone())
                .filter(|id| order_ids.contains(id))
                .collect())
        }

        async fn insert_broker_trade(&self, trade: &Trade) -> Result<bool, DbError> {
            let mut trades = self.trades.lock().unwrap();
            if trades.iter().any(|t| {
                t.owner_id == trade.owner_id && t.tradovate_order_id == trade.tradovate_order_id
            }) {
                return Ok(false);
            }
            trades.push(trade.clone());
            Ok(true)
        }

        async fn touch_last_sync(&self, _account_id: Uuid, at: DateTime<Utc>) -> Result<(), DbError> {
            if let Some(account) = self.account.lock().unwrap().as_mut() {
                account.last_sync_time = Some(at);
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockBroker {
        reject_auth: bool,
        fills: Vec<Fill>,
        contracts: HashMap<i64, String>,
        lookups: Mutex<usize>,
    }

    #[async_trait]
    impl BrokerApi for MockBroker {
        async fn authenticate(&self, _credentials: &BrokerCredentials) -> Result<AccessToken, ApiError> {
            if self.reject_auth {
                Err(ApiError::AuthFailed("Incorrect username or password".to_string()))
            } else {
                Ok(AccessToken::new("token"))
            }
        }

        async fn list_fills(&self, _token: &AccessToken) -> Result<Vec<Fill>, ApiError> {
            Ok(self.fills.clone())
        }

        async fn get_contract(&self, _token: &AccessToken, contract_id: i64) -> Result<Contract, ApiError> {
            *self.lookups.lock().unwrap() += 1;
            self.contracts
                .get(&contract_id)
                .map(|name| Contract { id: contract_id, name: name.clone() })
                .ok_or(ApiError::Status { resource: format!("contract {contract_id}"), status: 404 })
        }
    }

    struct MockFactory(Arc<MockBroker>);

    impl BrokerFactory for MockFactory {
        fn client(&self, _environment: BrokerEnvironment) -> Result<Arc<dyn BrokerApi>, ApiError> {
            Ok(self.0.clone())
        }
    }

    fn fill(id: i64, order_id: i64, contract_id: i64, price: rust_decimal::Decimal) -> Fill {
        Fill {
            id,
            order_id: Some(order_id),
            contract_id,
            qty: dec!(1),
            price,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap(),
        }
    }

    fn credentials() -> BrokerCredentials {
        BrokerCredentials {
            username: "trader".to_string(),
            password: "pw".to_string(),
            cid: "42".to_string(),
            secret: "s3cret".to_string(),
        }
    }

    async fn configured(broker: MockBroker) -> (BrokerSync, Arc<MemoryStore>, Arc<MockBroker>, Uuid) {
        let account_id = Uuid::new_v4();
        let store = Arc::new(MemoryStore::with_account(account_id));
        let broker = Arc::new(broker);
        let vault = CredentialVault::from_hex(KEY).unwrap();
        let sealed = vault.seal(&credentials()).unwrap();
        store
            .save_credentials(account_id, &sealed, BrokerEnvironment::Demo)
            .await
            .unwrap();
        let sync = BrokerSync::new(store.clone(), Arc::new(MockFactory(broker.clone())), vault);
        (sync, store, broker, account_id)
    }

    #[tokio::test]
    async fn sync_merges_fills_per_order() {
        let broker = MockBroker {
            fills: vec![fill(1, 500, 3, dec!(100)), fill(2, 500, 3, dec!(102))],
            contracts: HashMap::from([(3, "MNQM4".to_string())]),
            ..MockBroker::default()
        };
        let (sync, store, _, account_id) = configured(broker).await;

        let outcome = sync.sync(account_id).await.unwrap();
        assert_eq!(outcome.synced, 1);

        let trades = store.trades();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].ticker, "MNQM4");
        assert_eq!(trades[0].quantity, dec!(2));
        assert_eq!(trades[0].enter_price, dec!(101));
        assert_eq!(computed_pl(&trades[0]), dec!(0));
        assert_eq!(trades[0].tradovate_source.as_deref(), Some("tradovate_demo"));
    }

    fn computed_pl(trade: &Trade) -> rust_decimal::Decimal {
        (trade.exit_price - trade.enter_price) * trade.quantity
    }

    #[tokio::test]
    async fn rerunning_over_the_same_fills_syncs_nothing() {
        let broker = MockBroker {
            fills: vec![fill(1, 500, 3, dec!(100)), fill(2, 501, 3, dec!(99))],
            contracts: HashMap::from([(3, "ESM4".to_string())]),
            ..MockBroker::default()
        };
        let (sync, store, _, account_id) = configured(broker).await;

        assert_eq!(sync.sync(account_id).await.unwrap().synced, 2);
        assert_eq!(sync.sync(account_id).await.unwrap().synced, 0);
        assert_eq!(store.trades().len(), 2);
    }

    #[tokio::test]
    async fn contract_lookups_are_cached_and_fall_back() {
        let broker = MockBroker {
            fills: vec![
                fill(1, 1, 3, dec!(10)),
                fill(2, 2, 3, dec!(11)),
                fill(3, 3, 8, dec!(12)),
            ],
            contracts: HashMap::from([(3, "CLK4".to_string())]),
            ..MockBroker::default()
        };
        let (sync, store, broker, account_id) = configured(broker).await;

        assert_eq!(sync.sync(account_id).await.unwrap().synced, 3);
        assert_eq!(*broker.lookups.lock().unwrap(), 2);

        let tickers: Vec<String> = store.trades().into_iter().map(|t| t.ticker).collect();
        assert_eq!(tickers, vec!["CLK4", "CLK4", "Contract-8"]);
    }

    #[tokio::test]
    async fn empty_fill_list_still_records_sync_time() {
        let (sync, store, _, account_id) = configured(MockBroker::default()).await;

        let outcome = sync.sync(account_id).await.unwrap();
        assert_eq!(outcome.synced, 0);
        assert_eq!(outcome.message, "No fills found");
        assert!(store.account.lock().unwrap().as_ref().unwrap().last_sync_time.is_some());
    }

    #[tokio::test]
    async fn auth_failure_aborts_the_pass() {
        let broker = MockBroker {
            reject_auth: true,
            fills: vec![fill(1, 1, 3, dec!(10))],
            ..MockBroker::default()
        };
        let (sync, store, _, account_id) = configured(broker).await;

        let err = sync.sync(account_id).await.unwrap_err();
        assert!(matches!(err, SyncError::Broker(ApiError::AuthFailed(_))));
        assert!(store.trades().is_empty());
        assert!(store.account.lock().unwrap().as_ref().unwrap().last_sync_time.is_none());
    }

    #[tokio::test]
    async fn unconfigured_account_cannot_sync() {
        let account_id = Uuid::new_v4();
        let store = Arc::new(MemoryStore::with_account(account_id));
        let sync = BrokerSync::new(
            store,
            Arc::new(MockFactory(Arc::new(MockBroker::default()))),
            CredentialVault::from_hex(KEY).unwrap(),
        );
        assert!(matches!(sync.sync(account_id).await, Err(SyncError::NotConfigured)));
    }

    #[tokio::test]
    async fn credentials_are_validated_then_stored_encrypted() {
        let account_id = Uuid::new_v4();
        let store = Arc::new(MemoryStore::with_account(account_id));
        let sync = BrokerSync::new(
            store.clone(),
            Arc::new(MockFactory(Arc::new(MockBroker::default()))),
            CredentialVault::from_hex(KEY).unwrap(),
        );

        sync.save_credentials(account_id, &credentials(), BrokerEnvironment::Live)
            .await
            .unwrap();

        let (sealed, env) = store.credentials.lock().unwrap().clone().unwrap();
        assert_eq!(env, BrokerEnvironment::Live);
        assert_ne!(sealed.password, "pw");

        let status = sync.status(account_id).await.unwrap();
        assert!(status.configured);
        assert_eq!(status.environment, BrokerEnvironment::Live);

        sync.delete_credentials(account_id).await.unwrap();
        let status = sync.status(account_id).await.unwrap();
        assert!(!status.configured);
        assert_eq!(status.environment, BrokerEnvironment::Demo);
        assert!(status.last_sync_time.is_none());
    }

    #[tokio::test]
    async fn rejected_or_incomplete_credentials_are_not_stored() {
        let account_id = Uuid::new_v4();
        let store = Arc::new(MemoryStore::with_account(account_id));
        let rejecting = MockBroker { reject_auth: true, ..MockBroker::default() };
        let sync = BrokerSync::new(
            store.clone(),
            Arc::new(MockFactory(Arc::new(rejecting))),
            CredentialVault::from_hex(KEY).unwrap(),
        );

        let err = sync
            .save_credentials(account_id, &credentials(), BrokerEnvironment::Demo)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::CredentialsRejected(_)));

        let mut partial = credentials();
        partial.secret.clear();
        let err = sync
            .save_credentials(account_id, &partial, BrokerEnvironment::Demo)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidCredentials(_)));
        assert!(store.credentials.lock().unwrap().is_none());
    }
}
