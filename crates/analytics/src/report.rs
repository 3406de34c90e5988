use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Summary statistics over a set of trades.
///
/// This struct is the output of `AnalyticsEngine::summarize` and is what the
/// dashboard, the breakdown views and the CLI `stats` table all render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalStats {
    // I. Profitability
    #[serde(rename = "totalPL")]
    pub total_pl: Decimal,
    pub gross_profit: Decimal,
    pub gross_loss: Decimal,
    pub profit_factor: Decimal, // gross profit itself when there are no losses
    pub expectancy: Decimal,

    // II. Trade-level
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: Decimal,
    pub avg_win: Decimal,
    pub avg_loss: Decimal, // mean of the losing P/Ls, so zero or negative
    pub best_trade: Decimal,
    pub worst_trade: Decimal,

    // III. Risk
    pub max_drawdown: Decimal,
    pub longest_win_streak: usize,
    pub longest_loss_streak: usize,

    // IV. Time
    pub avg_duration_ms: i64,
}

impl JournalStats {
    /// Creates a zeroed-out report, which is also the result for no trades.
    pub fn new() -> Self {
        Self {
            total_pl: Decimal::ZERO,
            gross_profit: Decimal::ZERO,
            gross_loss: Decimal::ZERO,
            profit_factor: Decimal::ZERO,
            expectancy: Decimal::ZERO,
            total_trades: 0,
            wins: 0,
            losses: 0,
            win_rate: Decimal::ZERO,
            avg_win: Decimal::ZERO,
            avg_loss: Decimal::ZERO,
            best_trade: Decimal::ZERO,
            worst_trade: Decimal::ZERO,
            max_drawdown: Decimal::ZERO,
            longest_win_streak: 0,
            longest_loss_streak: 0,
            avg_duration_ms: 0,
        }
    }
}

impl Default for JournalStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Cumulative P/L immediately after one trade closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub trade_id: Uuid,
    pub pl: Decimal,
    pub cumulative_pl: Decimal,
}

/// Statistics for the trades carrying one tag. `tag_id` is `None` for the
/// group of untagged trades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagStats {
    pub tag_id: Option<Uuid>,
    pub name: String,
    pub color: Option<String>,
    pub stats: JournalStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerStats {
    pub ticker: String,
    pub stats: JournalStats,
}
