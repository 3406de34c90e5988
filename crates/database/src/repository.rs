use crate::DbError;
use chrono::{DateTime, Utc};
use core_types::{Account, BrokerEnvironment, Tag, Theme, Trade, TradeDraft};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, Postgres};
use sqlx::{FromRow, Transaction};
use std::collections::HashSet;
use uuid::Uuid;

/// The `DbRepository` provides a high-level, application-specific interface
/// to the database. It encapsulates all SQL queries and data access logic.
#[derive(Debug, Clone)]
pub struct DbRepository {
    pool: PgPool,
}

/// Broker credentials as stored: each field is an opaque ciphertext string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedCredentials {
    pub username: String,
    pub password: String,
    pub cid: String,
    pub secret: String,
}

const TRADE_SELECT: &str = r#"
    SELECT
        t.trade_id, t.owner_id, t.ticker, t.enter_time, t.exit_time,
        t.enter_price, t.exit_price, t.quantity, t.manual_pl, t.comments,
        t.screenshot, t.tradovate_order_id, t.tradovate_source, t.created_at,
        COALESCE(array_agg(tt.tag_id) FILTER (WHERE tt.tag_id IS NOT NULL), '{}'::uuid[]) AS tags
    FROM trades AS t
    LEFT JOIN trade_tags AS tt ON tt.trade_id = t.trade_id
"#;

const ACCOUNT_COLUMNS: &str = "account_id, username, theme, broker_environment, \
     broker_username IS NOT NULL AS broker_configured, last_sync_time, created_at";

/// Row shape of `TRADE_SELECT`.
#[derive(Debug, Clone, FromRow)]
struct DbTrade {
    trade_id: Uuid,
    owner_id: Uuid,
    ticker: String,
    enter_time: DateTime<Utc>,
    exit_time: DateTime<Utc>,
    enter_price: Decimal,
    exit_price: Decimal,
    quantity: Decimal,
    manual_pl: Option<Decimal>,
    comments: String,
    screenshot: Option<String>,
    tradovate_order_id: Option<String>,
    tradovate_source: Option<String>,
    created_at: DateTime<Utc>,
    tags: Vec<Uuid>,
}

impl From<DbTrade> for Trade {
    fn from(row: DbTrade) -> Self {
        Trade {
            id: row.trade_id,
            owner_id: row.owner_id,
            ticker: row.ticker,
            enter_time: row.enter_time,
            exit_time: row.exit_time,
            enter_price: row.enter_price,
            exit_price: row.exit_price,
            quantity: row.quantity,
            manual_pl: row.manual_pl,
            comments: row.comments,
            tags: row.tags,
            screenshot: row.screenshot,
            tradovate_order_id: row.tradovate_order_id,
            tradovate_source: row.tradovate_source,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct DbTag {
    tag_id: Uuid,
    owner_id: Uuid,
    name: String,
    color: String,
}

impl From<DbTag> for Tag {
    fn from(row: DbTag) -> Self {
        Tag {
            id: row.tag_id,
            owner_id: row.owner_id,
            name: row.name,
            color: row.color,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct DbAccount {
    account_id: Uuid,
    username: String,
    theme: Theme,
    broker_environment: BrokerEnvironment,
    broker_configured: bool,
    last_sync_time: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<DbAccount> for Account {
    fn from(row: DbAccount) -> Self {
        Account {
            id: row.account_id,
            username: row.username,
            theme: row.theme,
            broker_environment: row.broker_environment,
            broker_configured: row.broker_configured,
            last_sync_time: row.last_sync_time,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct DbCredentials {
    broker_username: Option<String>,
    broker_password: Option<String>,
    broker_cid: Option<String>,
    broker_secret: Option<String>,
    broker_environment: BrokerEnvironment,
}

impl DbRepository {
    /// Creates a new `DbRepository` with a shared database connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ==========================================================================
    // Trades
    // ==========================================================================

    /// All of an owner's trades, oldest exit first.
    pub async fn list_trades(&self, owner_id: Uuid) -> Result<Vec<Trade>, DbError> {
        let query = format!(
            "{TRADE_SELECT} WHERE t.owner_id = $1 GROUP BY t.trade_id ORDER BY t.exit_time ASC"
        );
        let rows = sqlx::query_as::<_, DbTrade>(&query)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Trade::from).collect())
    }

    pub async fn get_trade(&self, owner_id: Uuid, trade_id: Uuid) -> Result<Trade, DbError> {
        let query = format!(
            "{TRADE_SELECT} WHERE t.owner_id = $1 AND t.trade_id = $2 GROUP BY t.trade_id"
        );
        sqlx::query_as::<_, DbTrade>(&query)
            .bind(owner_id)
            .bind(trade_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Trade::from)
            .ok_or(DbError::NotFound)
    }

    /// Saves one user-entered trade and its tag links atomically.
    pub async fn insert_trade(&self, owner_id: Uuid, draft: &TradeDraft) -> Result<Trade, DbError> {
        let mut tx = self.pool.begin().await?;
        let trade_id = Self::insert_draft(&mut tx, owner_id, draft).await?;
        tx.commit().await?;
        self.get_trade(owner_id, trade_id).await
    }

    /// Saves a batch of imported trades within a single transaction: either
    /// every row lands or none do.
    pub async fn insert_trades(&self, owner_id: Uuid, drafts: &[TradeDraft]) -> Result<usize, DbError> {
        let mut tx = self.pool.begin().await?;
        for draft in drafts {
            Self::insert_draft(&mut tx, owner_id, draft).await?;
        }
        tx.commit().await?;
        Ok(drafts.len())
    }

    /// Saves a broker-synthesized trade unless the owner already has one for
    /// the same order. Returns whether a row was written.
    pub async fn insert_broker_trade(&self, trade: &Trade) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            INSERT INTO trades (
                trade_id, owner_id, ticker, enter_time, exit_time, enter_price,
                exit_price, quantity, manual_pl, comments, screenshot,
                tradovate_order_id, tradovate_source, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (owner_id, tradovate_order_id) DO NOTHING
            "#,
        )
        .bind(trade.id)
        .bind(trade.owner_id)
        .bind(&trade.ticker)
        .bind(trade.enter_time)
        .bind(trade.exit_time)
        .bind(trade.enter_price)
        .bind(trade.exit_price)
        .bind(trade.quantity)
        .bind(trade.manual_pl)
        .bind(&trade.comments)
        .bind(trade.screenshot.as_deref())
        .bind(trade.tradovate_order_id.as_deref())
        .bind(trade.tradovate_source.as_deref())
        .bind(trade.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Replaces a trade's editable fields and tag set. Last write wins.
    pub async fn update_trade(
        &self,
        owner_id: Uuid,
        trade_id: Uuid,
        draft: &TradeDraft,
    ) -> Result<Trade, DbError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE trades SET
                ticker = $3, enter_time = $4, exit_time = $5, enter_price = $6,
                exit_price = $7, quantity = $8, manual_pl = $9, comments = $10, screenshot = $11
            WHERE trade_id = $1 AND owner_id = $2
            "#,
        )
        .bind(trade_id)
        .bind(owner_id)
        .bind(&draft.ticker)
        .bind(draft.enter_time)
        .bind(draft.exit_time)
        .bind(draft.enter_price)
        .bind(draft.exit_price)
        .bind(draft.quantity)
        .bind(draft.manual_pl)
        .bind(&draft.comments)
        .bind(draft.screenshot.as_deref())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        sqlx::query("DELETE FROM trade_tags WHERE trade_id = $1")
            .bind(trade_id)
            .execute(&mut *tx)
            .await?;
        Self::link_tags(&mut tx, owner_id, trade_id, &draft.tags).await?;

        tx.commit().await?;
        self.get_trade(owner_id, trade_id).await
    }

    pub async fn delete_trade(&self, owner_id: Uuid, trade_id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM trades WHERE trade_id = $1 AND owner_id = $2")
            .bind(trade_id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// Which of `order_ids` the owner has already imported from the broker.
    pub async fn existing_order_ids(
        &self,
        owner_id: Uuid,
        order_ids: &[String],
    ) -> Result<HashSet<String>, DbError> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT tradovate_order_id FROM trades WHERE owner_id = $1 AND tradovate_order_id = ANY($2)",
        )
        .bind(owner_id)
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().collect())
    }

    async fn insert_draft(
        tx: &mut Transaction<'_, Postgres>,
        owner_id: Uuid,
        draft: &TradeDraft,
    ) -> Result<Uuid, DbError> {
        let trade_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO trades (
                trade_id, owner_id, ticker, enter_time, exit_time, enter_price,
                exit_price, quantity, manual_pl, comments, screenshot
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(trade_id)
        .bind(owner_id)
        .bind(&draft.ticker)
        .bind(draft.enter_time)
        .bind(draft.exit_time)
        .bind(draft.enter_price)
        .bind(draft.exit_price)
        .bind(draft.quantity)
        .bind(draft.manual_pl)
        .bind(&draft.comments)
        .bind(draft.screenshot.as_deref())
        .execute(&mut **tx)
        .await?;

        Self::link_tags(tx, owner_id, trade_id, &draft.tags).await?;
        Ok(trade_id)
    }

    /// Links only tags that belong to the owner; unknown ids are dropped.
    async fn link_tags(
        tx: &mut Transaction<'_, Postgres>,
        owner_id: Uuid,
        trade_id: Uuid,
        tag_ids: &[Uuid],
    ) -> Result<(), DbError> {
        if tag_ids.is_empty() {
            return Ok(());
        }
        sqlx::query(
            r#"
            INSERT INTO trade_tags (trade_id, tag_id)
            SELECT $1, tag_id FROM tags WHERE owner_id = $2 AND tag_id = ANY($3)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(trade_id)
        .bind(owner_id)
        .bind(tag_ids)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    // ==========================================================================
    // Tags
    // ==========================================================================

    /// An owner's tags, sorted by name.
    pub async fn list_tags(&self, owner_id: Uuid) -> Result<Vec<Tag>, DbError> {
        let rows = sqlx::query_as::<_, DbTag>(
            "SELECT tag_id, owner_id, name, color FROM tags WHERE owner_id = $1 ORDER BY name ASC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Tag::from).collect())
    }

    pub async fn insert_tag(&self, owner_id: Uuid, name: &str, color: &str) -> Result<Tag, DbError> {
        sqlx::query_as::<_, DbTag>(
            r#"
            INSERT INTO tags (tag_id, owner_id, name, color) VALUES ($1, $2, $3, $4)
            RETURNING tag_id, owner_id, name, color
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(name)
        .bind(color)
        .fetch_one(&self.pool)
        .await
        .map(Tag::from)
        .map_err(|e| DbError::from_insert(e, "A tag with that name"))
    }

    /// Updates whichever of `name` and `color` are given.
    pub async fn update_tag(
        &self,
        owner_id: Uuid,
        tag_id: Uuid,
        name: Option<&str>,
        color: Option<&str>,
    ) -> Result<Tag, DbError> {
        sqlx::query_as::<_, DbTag>(
            r#"
            UPDATE tags SET name = COALESCE($3, name), color = COALESCE($4, color)
            WHERE tag_id = $1 AND owner_id = $2
            RETURNING tag_id, owner_id, name, color
            "#,
        )
        .bind(tag_id)
        .bind(owner_id)
        .bind(name)
        .bind(color)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DbError::from_insert(e, "A tag with that name"))?
        .map(Tag::from)
        .ok_or(DbError::NotFound)
    }

    /// Deletes a tag and strips it from every trade in one transaction.
    /// Returns how many trades lost the tag.
    pub async fn delete_tag(&self, owner_id: Uuid, tag_id: Uuid) -> Result<u64, DbError> {
        let mut tx = self.pool.begin().await?;

        let stripped = sqlx::query(
            r#"
            DELETE FROM trade_tags
            WHERE tag_id = $1
              AND EXISTS (SELECT 1 FROM tags WHERE tag_id = $1 AND owner_id = $2)
            "#,
        )
        .bind(tag_id)
        .bind(owner_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let deleted = sqlx::query("DELETE FROM tags WHERE tag_id = $1 AND owner_id = $2")
            .bind(tag_id)
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            // Dropping `tx` rolls back.
            return Err(DbError::NotFound);
        }

        tx.commit().await?;
        Ok(stripped)
    }

    // ==========================================================================
    // Accounts
    // ==========================================================================

    pub async fn create_account(&self, username: &str) -> Result<Account, DbError> {
        let query = format!(
            "INSERT INTO accounts (account_id, username) VALUES ($1, $2) RETURNING {ACCOUNT_COLUMNS}"
        );
        sqlx::query_as::<_, DbAccount>(&query)
            .bind(Uuid::new_v4())
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map(Account::from)
            .map_err(|e| DbError::from_insert(e, "An account with that username"))
    }

    pub async fn get_account(&self, account_id: Uuid) -> Result<Account, DbError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE account_id = $1");
        sqlx::query_as::<_, DbAccount>(&query)
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Account::from)
            .ok_or(DbError::NotFound)
    }

    pub async fn find_account_by_username(&self, username: &str) -> Result<Account, DbError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = $1");
        sqlx::query_as::<_, DbAccount>(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .map(Account::from)
            .ok_or(DbError::NotFound)
    }

    pub async fn update_theme(&self, account_id: Uuid, theme: Theme) -> Result<Account, DbError> {
        let query = format!(
            "UPDATE accounts SET theme = $2 WHERE account_id = $1 RETURNING {ACCOUNT_COLUMNS}"
        );
        sqlx::query_as::<_, DbAccount>(&query)
            .bind(account_id)
            .bind(theme)
            .fetch_optional(&self.pool)
            .await?
            .map(Account::from)
            .ok_or(DbError::NotFound)
    }

    /// The stored ciphertexts and environment, or `None` when the account has
    /// not configured a broker.
    pub async fn get_broker_credentials(
        &self,
        account_id: Uuid,
    ) -> Result<Option<(EncryptedCredentials, BrokerEnvironment)>, DbError> {
        let row = sqlx::query_as::<_, DbCredentials>(
            r#"
            SELECT broker_username, broker_password, broker_cid, broker_secret, broker_environment
            FROM accounts WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DbError::NotFound)?;

        let credentials = match (row.broker_username, row.broker_password, row.broker_cid, row.broker_secret) {
            (Some(username), Some(password), Some(cid), Some(secret)) => Some((
                EncryptedCredentials { username, password, cid, secret },
                row.broker_environment,
            )),
            _ => None,
        };
        Ok(credentials)
    }

    /// Stores new credentials; the previous `last_sync_time` is kept.
    pub async fn save_broker_credentials(
        &self,
        account_id: Uuid,
        credentials: &EncryptedCredentials,
        environment: BrokerEnvironment,
    ) -> Result<(), DbError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts SET
                broker_username = $2, broker_password = $3, broker_cid = $4,
                broker_secret = $5, broker_environment = $6
            WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .bind(&credentials.username)
        .bind(&credentials.password)
        .bind(&credentials.cid)
        .bind(&credentials.secret)
        .bind(environment)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// Forgets the broker entirely: credentials, environment and sync time.
    pub async fn clear_broker_credentials(&self, account_id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts SET
                broker_username = NULL, broker_password = NULL, broker_cid = NULL,
                broker_secret = NULL, broker_environment = 'demo', last_sync_time = NULL
            WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    pub async fn touch_last_sync(&self, account_id: Uuid, at: DateTime<Utc>) -> Result<(), DbError> {
        sqlx::query("UPDATE accounts SET last_sync_time = $2 WHERE account_id = $1")
            .bind(account_id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
