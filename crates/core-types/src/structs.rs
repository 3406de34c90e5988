use crate::enums::{BrokerEnvironment, Theme};
use crate::error::CoreError;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// One closed (or manually recorded) position in a user's journal.
///
/// Realized P/L is deliberately absent: it is derived from the prices and
/// quantity (or `manual_pl`) every time analytics run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub ticker: String,
    pub enter_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub enter_price: Decimal,
    pub exit_price: Decimal,
    pub quantity: Decimal,
    #[serde(rename = "manualPL")]
    pub manual_pl: Option<Decimal>,
    pub comments: String,
    pub tags: Vec<Uuid>,
    pub screenshot: Option<String>,
    pub tradovate_order_id: Option<String>,
    pub tradovate_source: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Trade {
    /// Builds a fresh, unsaved trade owned by `owner_id`.
    pub fn new(owner_id: Uuid, draft: TradeDraft) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            ticker: draft.ticker,
            enter_time: draft.enter_time,
            exit_time: draft.exit_time,
            enter_price: draft.enter_price,
            exit_price: draft.exit_price,
            quantity: draft.quantity,
            manual_pl: draft.manual_pl,
            comments: draft.comments,
            tags: draft.tags,
            screenshot: draft.screenshot,
            tradovate_order_id: None,
            tradovate_source: None,
            created_at: Utc::now(),
        }
    }

    /// Time between entry and exit. Negative when the exit precedes the entry.
    pub fn holding_period(&self) -> Duration {
        self.exit_time - self.enter_time
    }

    pub fn has_tag(&self, tag_id: &Uuid) -> bool {
        self.tags.contains(tag_id)
    }
}

/// The user-editable field set of a trade, already checked for presence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeDraft {
    pub ticker: String,
    pub enter_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub enter_price: Decimal,
    pub exit_price: Decimal,
    pub quantity: Decimal,
    #[serde(rename = "manualPL", default)]
    pub manual_pl: Option<Decimal>,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub tags: Vec<Uuid>,
    #[serde(default)]
    pub screenshot: Option<String>,
}

impl TradeDraft {
    /// Checks value constraints that the type system does not capture.
    pub fn validate(&self, max_screenshot_bytes: usize) -> Result<(), CoreError> {
        if self.ticker.trim().is_empty() {
            return Err(CoreError::MissingField("ticker"));
        }
        if self.enter_price < Decimal::ZERO {
            return Err(CoreError::InvalidInput(
                "enterPrice".to_string(),
                "must not be negative".to_string(),
            ));
        }
        if self.exit_price < Decimal::ZERO {
            return Err(CoreError::InvalidInput(
                "exitPrice".to_string(),
                "must not be negative".to_string(),
            ));
        }
        check_magnitude("enterPrice", self.enter_price)?;
        check_magnitude("exitPrice", self.exit_price)?;
        check_magnitude("quantity", self.quantity)?;
        if let Some(manual_pl) = self.manual_pl {
            check_magnitude("manualPL", manual_pl)?;
        }
        if let Some(screenshot) = &self.screenshot {
            if !screenshot.starts_with("data:image/") {
                return Err(CoreError::InvalidInput(
                    "screenshot".to_string(),
                    "must be an image data URI".to_string(),
                ));
            }
            if screenshot.len() > max_screenshot_bytes {
                return Err(CoreError::InvalidInput(
                    "screenshot".to_string(),
                    format!("exceeds {max_screenshot_bytes} bytes"),
                ));
            }
        }
        Ok(())
    }
}

/// Largest absolute price, quantity or manual P/L a trade may carry (10^12).
/// Keeps `(exit - enter) * quantity` and journal-wide sums inside `Decimal`
/// range.
pub const MAX_TRADE_MAGNITUDE: Decimal = Decimal::from_parts(0xD4A5_1000, 0xE8, 0, false, 0);

fn check_magnitude(field: &str, value: Decimal) -> Result<(), CoreError> {
    if value.abs() > MAX_TRADE_MAGNITUDE {
        return Err(CoreError::InvalidInput(
            field.to_string(),
            format!("must not exceed {MAX_TRADE_MAGNITUDE} in magnitude"),
        ));
    }
    Ok(())
}

/// A trade as submitted by a client, where any field may be absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeInput {
    pub ticker: Option<String>,
    pub enter_time: Option<DateTime<Utc>>,
    pub exit_time: Option<DateTime<Utc>>,
    pub enter_price: Option<Decimal>,
    pub exit_price: Option<Decimal>,
    pub quantity: Option<Decimal>,
    #[serde(rename = "manualPL")]
    pub manual_pl: Option<Decimal>,
    pub comments: Option<String>,
    pub tags: Option<Vec<Uuid>>,
    pub screenshot: Option<String>,
}

impl TradeInput {
    /// Converts to a draft, reporting the first missing required field.
    pub fn into_draft(self) -> Result<TradeDraft, CoreError> {
        let ticker = self
            .ticker
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(CoreError::MissingField("ticker"))?;
        let enter_time = self.enter_time.ok_or(CoreError::MissingField("enterTime"))?;
        let exit_time = self.exit_time.ok_or(CoreError::MissingField("exitTime"))?;
        let enter_price = self.enter_price.ok_or(CoreError::MissingField("enterPrice"))?;
        let exit_price = self.exit_price.ok_or(CoreError::MissingField("exitPrice"))?;
        let quantity = self.quantity.ok_or(CoreError::MissingField("quantity"))?;

        Ok(TradeDraft {
            ticker,
            enter_time,
            exit_time,
            enter_price,
            exit_price,
            quantity,
            manual_pl: self.manual_pl,
            comments: self.comments.map(|c| c.trim().to_string()).unwrap_or_default(),
            tags: self.tags.unwrap_or_default(),
            screenshot: self.screenshot.filter(|s| !s.is_empty()),
        })
    }
}

/// A user-defined label that can be attached to many trades.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub color: String,
}

/// Tag fields from a create or partial update request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagDraft {
    pub name: Option<String>,
    pub color: Option<String>,
}

impl TagDraft {
    /// Returns the trimmed name and colour, both of which a new tag needs.
    pub fn require_all(&self) -> Result<(String, String), CoreError> {
        let name = self
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or(CoreError::MissingField("name"))?;
        let color = self
            .color
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or(CoreError::MissingField("color"))?;
        Ok((name.to_string(), color.to_string()))
    }
}

/// The journal owner. Broker credentials are held separately, encrypted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub theme: Theme,
    pub broker_environment: BrokerEnvironment,
    pub broker_configured: bool,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Usernames are 1-16 characters of letters, digits, `_`, `-` or `.`.
    pub fn validate_username(username: &str) -> Result<(), CoreError> {
        let valid_len = (1..=16).contains(&username.len());
        let valid_chars = username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if valid_len && valid_chars {
            Ok(())
        } else {
            Err(CoreError::InvalidInput(
                "username".to_string(),
                "must be 1-16 letters, digits, '_', '-' or '.'".to_string(),
            ))
        }
    }
}

/// Plaintext Tradovate login material. Only ever held in memory.
///
/// Absent fields deserialize as empty so `is_complete` can report them.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BrokerCredentials {
    pub username: String,
    pub password: String,
    pub cid: String,
    pub secret: String,
}

impl BrokerCredentials {
    pub fn is_complete(&self) -> bool {
        !(self.username.is_empty()
            || self.password.is_empty()
            || self.cid.is_empty()
            || self.secret.is_empty())
    }
}

impl fmt::Debug for BrokerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("cid", &self.cid)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// A single broker execution, possibly one of several belonging to an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fill {
    pub id: i64,
    #[serde(default)]
    pub order_id: Option<i64>,
    pub contract_id: i64,
    #[serde(default)]
    pub qty: Decimal,
    #[serde(default)]
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Fill {
    /// The key fills are grouped under: the order id, or the fill's own id
    /// when the broker did not report one.
    pub fn group_key(&self) -> String {
        self.order_id.unwrap_or(self.id).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn full_input() -> TradeInput {
        TradeInput {
            ticker: Some("  ES  ".to_string()),
            enter_time: Some(Utc::now()),
            exit_time: Some(Utc::now()),
            enter_price: Some(dec!(100)),
            exit_price: Some(dec!(110)),
            quantity: Some(dec!(1)),
            ..TradeInput::default()
        }
    }

    #[test]
    fn into_draft_trims_and_defaults_optional_fields() {
        let draft = full_input().into_draft().unwrap();
        assert_eq!(draft.ticker, "ES");
        assert_eq!(draft.comments, "");
        assert!(draft.tags.is_empty());
        assert!(draft.manual_pl.is_none());
    }

    #[test]
    fn into_draft_reports_first_missing_field() {
        let mut input = full_input();
        input.exit_price = None;
        input.quantity = None;
        assert_eq!(input.into_draft(), Err(CoreError::MissingField("exitPrice")));

        let mut blank_ticker = full_input();
        blank_ticker.ticker = Some("   ".to_string());
        assert_eq!(blank_ticker.into_draft(), Err(CoreError::MissingField("ticker")));
    }

    #[test]
    fn validate_rejects_negative_prices_and_bad_screenshots() {
        let mut draft = full_input().into_draft().unwrap();
        draft.enter_price = dec!(-1);
        assert!(draft.validate(1024).is_err());

        draft.enter_price = dec!(1);
        draft.screenshot = Some("https://example.com/a.png".to_string());
        assert!(draft.validate(1024).is_err());

        draft.screenshot = Some("data:image/png;base64,AAAA".to_string());
        assert!(draft.validate(1024).is_ok());
        assert!(draft.validate(8).is_err());
    }

    #[test]
    fn validate_rejects_values_beyond_trade_magnitude() {
        assert_eq!(MAX_TRADE_MAGNITUDE, dec!(1_000_000_000_000));

        let mut draft = full_input().into_draft().unwrap();
        draft.enter_price = dec!(0);
        draft.exit_price = dec!(10_000_000_000_000_000_000_000_000_000);
        assert!(matches!(
            draft.validate(1024),
            Err(CoreError::InvalidInput(field, _)) if field == "exitPrice"
        ));

        draft.exit_price = MAX_TRADE_MAGNITUDE;
        draft.quantity = -MAX_TRADE_MAGNITUDE;
        assert!(draft.validate(1024).is_ok());

        draft.manual_pl = Some(dec!(-50_000_000_000_000_000_000_000_000_000));
        assert!(matches!(
            draft.validate(1024),
            Err(CoreError::InvalidInput(field, _)) if field == "manualPL"
        ));
    }

    #[test]
    fn manual_pl_serializes_as_manual_pl() {
        let json = r#"{"ticker":"NQ","enterTime":"2024-01-02T14:30:00Z","exitTime":"2024-01-02T15:00:00Z",
            "enterPrice":"50","exitPrice":40,"quantity":5,"manualPL":-1}"#;
        let input: TradeInput = serde_json::from_str(json).unwrap();
        let draft = input.into_draft().unwrap();
        assert_eq!(draft.manual_pl, Some(dec!(-1)));
        assert_eq!(draft.exit_price, dec!(40));
    }

    #[test]
    fn usernames_follow_the_account_pattern() {
        assert!(Account::validate_username("trader_01").is_ok());
        assert!(Account::validate_username("").is_err());
        assert!(Account::validate_username("way_too_long_username").is_err());
        assert!(Account::validate_username("bad name").is_err());
    }

    #[test]
    fn fills_group_by_order_then_fill_id() {
        let mut fill = Fill {
            id: 7,
            order_id: Some(42),
            contract_id: 1,
            qty: dec!(1),
            price: dec!(100),
            timestamp: Utc::now(),
        };
        assert_eq!(fill.group_key(), "42");
        fill.order_id = None;
        assert_eq!(fill.group_key(), "7");
    }

    #[test]
    fn credentials_debug_hides_secrets() {
        let creds = BrokerCredentials {
            username: "u".into(),
            password: "hunter2".into(),
            cid: "9".into(),
            secret: "s3cret".into(),
        };
        let printed = format!("{creds:?}");
        assert!(!printed.contains("hunter2"));
        assert!(!printed.contains("s3cret"));
    }
}
