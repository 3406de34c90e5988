use api_client::{AccessToken, BrokerApi};
use chrono::Utc;
use core_types::{Fill, Trade};
use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

/// All fills that share one grouping key.
#[derive(Debug, Clone, PartialEq)]
pub struct FillGroup {
    pub key: String,
    pub fills: Vec<Fill>,
}

impl FillGroup {
    pub fn first(&self) -> &Fill {
        &self.fills[0]
    }

    pub fn net_qty(&self) -> Decimal {
        self.fills.iter().map(|f| f.qty).sum()
    }

    /// Quantity-weighted mean price. A fill with zero (or absent) quantity
    /// weighs as one in the numerator, and a net quantity of zero divides by
    /// one. Out-of-range notionals saturate.
    pub fn average_price(&self) -> Decimal {
        let notional = self.fills.iter().fold(Decimal::ZERO, |acc, f| {
            let weight = if f.qty.is_zero() { Decimal::ONE } else { f.qty };
            acc.saturating_add(f.price.saturating_mul(weight))
        });
        let qty = self.net_qty();
        let denominator = if qty.is_zero() { Decimal::ONE } else { qty };
        notional.checked_div(denominator).unwrap_or(notional)
    }
}

/// Groups fills by order id (falling back to fill id), keeping the order in
/// which each key was first seen. Groups are never empty.
pub fn group_fills(fills: Vec<Fill>) -> Vec<FillGroup> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<FillGroup> = Vec::new();

    for fill in fills {
        let key = fill.group_key();
        match index.get(&key) {
            Some(&i) => groups[i].fills.push(fill),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(FillGroup { key, fills: vec![fill] });
            }
        }
    }
    groups
}

/// One flat trade per order: entry and exit share the first fill's time and
/// the average price, so the computed P/L is zero until edited.
pub fn synthesize_trade(owner_id: Uuid, group: &FillGroup, ticker: String, source: &str) -> Trade {
    let first = group.first();
    let price = group.average_price();
    Trade {
        id: Uuid::new_v4(),
        owner_id,
        ticker,
        enter_time: first.timestamp,
        exit_time: first.timestamp,
        enter_price: price,
        exit_price: price,
        quantity: group.net_qty().abs(),
        manual_pl: None,
        comments: String::new(),
        tags: Vec::new(),
        screenshot: None,
        tradovate_order_id: Some(group.key.clone()),
        tradovate_source: Some(source.to_string()),
        created_at: Utc::now(),
    }
}

/// Contract-name lookups for a single sync pass.
#[derive(Debug, Default)]
pub struct ContractCache {
    names: HashMap<i64, String>,
}

impl ContractCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves a contract id to its ticker, asking the broker at most once per
    /// id. A failed or empty lookup yields `Contract-{id}`.
    pub async fn resolve(&mut self, api: &dyn BrokerApi, token: &AccessToken, contract_id: i64) -> String {
        if let Some(name) = self.names.get(&contract_id) {
            return name.clone();
        }

        let name = match api.get_contract(token, contract_id).await {
            Ok(contract) if !contract.name.is_empty() => contract.name,
            Ok(_) => fallback_name(contract_id),
            Err(e) => {
                tracing::warn!(contract_id, error = %e, "Contract lookup failed; using fallback name.");
                fallback_name(contract_id)
            }
        };
        self.names.insert(contract_id, name.clone());
        name
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn fallback_name(contract_id: i64) -> String {
    format!("Contract-{contract_id}")
}
