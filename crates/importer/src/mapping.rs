use crate::error::ImportError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const TICKER: &[&str] = &["ticker", "symbol", "instrument", "contract", "product", "market"];
const ENTER_TIME: &[&str] = &[
    "entertime", "entrytime", "opentime", "entrydate", "enterdate", "opendate", "opened",
    "timein", "boughttimestamp", "entry",
];
const EXIT_TIME: &[&str] = &[
    "exittime", "closetime", "exitdate", "closedate", "closed", "timeout", "soldtimestamp",
    "exit",
];
const ENTER_PRICE: &[&str] = &[
    "enterprice", "entryprice", "openprice", "buyprice", "pricein", "avgentryprice",
];
const EXIT_PRICE: &[&str] = &[
    "exitprice", "closeprice", "sellprice", "priceout", "avgexitprice",
];
const QUANTITY: &[&str] = &["quantity", "qty", "size", "contracts", "shares", "volume"];
const MANUAL_PL: &[&str] = &[
    "manualpl", "pl", "pnl", "profitloss", "profit", "netpl", "netpnl", "realizedpnl",
];
const COMMENTS: &[&str] = &["comments", "comment", "notes", "note", "description"];

/// Which CSV header feeds each trade field.
///
/// Produced by `detect_mapping` and shown to the user, who may send back an
/// edited copy to override the guess.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMapping {
    pub ticker: Option<String>,
    pub enter_time: Option<String>,
    pub exit_time: Option<String>,
    pub enter_price: Option<String>,
    pub exit_price: Option<String>,
    pub quantity: Option<String>,
    #[serde(rename = "manualPL")]
    pub manual_pl: Option<String>,
    pub comments: Option<String>,
}

/// Header positions for a mapping applied to a concrete header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ColumnIndices {
    pub ticker: usize,
    pub enter_time: usize,
    pub exit_time: usize,
    pub enter_price: usize,
    pub exit_price: usize,
    pub quantity: usize,
    pub manual_pl: Option<usize>,
    pub comments: Option<usize>,
}

/// Lowercase, alphanumerics only: `"Entry Price ($)"` becomes `"entryprice"`.
pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Guesses a mapping from header aliases. Each header is claimed by at most
/// one field; earlier aliases in a field's list win.
pub fn detect_mapping<S: AsRef<str>>(headers: &[S]) -> ColumnMapping {
    let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h.as_ref())).collect();
    let mut claimed: HashSet<usize> = HashSet::new();

    let mut find = |aliases: &[&str]| -> Option<String> {
        aliases.iter().find_map(|alias| {
            let idx = normalized
                .iter()
                .enumerate()
                .position(|(i, h)| h == alias && !claimed.contains(&i))?;
            claimed.insert(idx);
            Some(headers[idx].as_ref().to_string())
        })
    };

    ColumnMapping {
        ticker: find(TICKER),
        enter_time: find(ENTER_TIME),
        exit_time: find(EXIT_TIME),
        enter_price: find(ENTER_PRICE),
        exit_price: find(EXIT_PRICE),
        quantity: find(QUANTITY),
        manual_pl: find(MANUAL_PL),
        comments: find(COMMENTS),
    }
}

impl ColumnMapping {
    /// Names of required fields with no column assigned.
    pub fn missing_required(&self) -> Vec<&'static str> {
        [
            ("ticker", &self.ticker),
            ("enterTime", &self.enter_time),
            ("exitTime", &self.exit_time),
            ("enterPrice", &self.enter_price),
            ("exitPrice", &self.exit_price),
            ("quantity", &self.quantity),
        ]
        .into_iter()
        .filter(|(_, column)| column.as_deref().is_none_or(str::is_empty))
        .map(|(name, _)| name)
        .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_required().is_empty()
    }

    pub(crate) fn resolve(&self, headers: &[String]) -> Result<ColumnIndices, ImportError> {
        let missing = self.missing_required();
        if !missing.is_empty() {
            return Err(ImportError::MissingColumns(missing));
        }

        let position = |column: &Option<String>| -> Result<Option<usize>, ImportError> {
            match column.as_deref() {
                None | Some("") => Ok(None),
                Some(name) => headers
                    .iter()
                    .position(|h| h.trim() == name.trim())
                    .map(Some)
                    .ok_or_else(|| ImportError::UnknownColumn(name.to_string())),
            }
        };
        let required = |column: &Option<String>| -> Result<usize, ImportError> {
            position(column)?.ok_or_else(|| ImportError::UnknownColumn(String::new()))
        };

        Ok(ColumnIndices {
            ticker: required(&self.ticker)?,
            enter_time: required(&self.enter_time)?,
            exit_time: required(&self.exit_time)?,
            enter_price: required(&self.enter_price)?,
            exit_price: required(&self.exit_price)?,
            quantity: required(&self.quantity)?,
            manual_pl: position(&self.manual_pl)?,
            comments: position(&self.comments)?,
        })
    }
}
