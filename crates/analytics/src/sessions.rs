use crate::pnl::{profit_factor, realized_pl};
use chrono::{TimeZone, Timelike};
use core_types::Trade;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Performance of every trade entered within one 30-minute slot of the day.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionBucket {
    /// `HH:MM` of the slot start, local to the viewer.
    pub key: String,
    pub trade_count: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: Decimal,
    #[serde(rename = "totalPL")]
    pub total_pl: Decimal,
    #[serde(rename = "avgPL")]
    pub avg_pl: Decimal,
    #[serde(skip)]
    gross_profit: Decimal,
    #[serde(skip)]
    gross_loss: Decimal,
}

impl SessionBucket {
    fn empty(key: String) -> Self {
        Self {
            key,
            trade_count: 0,
            wins: 0,
            losses: 0,
            win_rate: Decimal::ZERO,
            total_pl: Decimal::ZERO,
            avg_pl: Decimal::ZERO,
            gross_profit: Decimal::ZERO,
            gross_loss: Decimal::ZERO,
        }
    }

    fn record(&mut self, pl: Decimal) {
        self.trade_count += 1;
        self.total_pl = self.total_pl.saturating_add(pl);
        if pl > Decimal::ZERO {
            self.wins += 1;
            self.gross_profit = self.gross_profit.saturating_add(pl);
        } else if pl < Decimal::ZERO {
            self.losses += 1;
            self.gross_loss = self.gross_loss.saturating_add(pl.abs());
        }
    }

    fn finish(mut self) -> Self {
        let count = Decimal::from(self.trade_count);
        self.win_rate = Decimal::from(self.wins) / count * Decimal::ONE_HUNDRED;
        self.avg_pl = self.total_pl / count;
        self
    }

    /// Same convention as the journal-wide figure: gross profit when the
    /// slot has no losses.
    pub fn profit_factor(&self) -> Decimal {
        profit_factor(self.gross_profit, self.gross_loss)
    }
}

/// Buckets trades by local entry time-of-day, truncated to :00 or :30.
///
/// The date is discarded, so a slot mixes trades from every day. Buckets come
/// back sorted by key, and only slots with at least one trade appear.
pub fn group_by_entry_time_bucket<Tz: TimeZone>(trades: &[Trade], tz: &Tz) -> Vec<SessionBucket> {
    let mut buckets: BTreeMap<String, SessionBucket> = BTreeMap::new();

    for trade in trades {
        let key = slot_key(trade, tz);
        buckets
            .entry(key.clone())
            .or_insert_with(|| SessionBucket::empty(key))
            .record(realized_pl(trade));
    }

    buckets.into_values().map(SessionBucket::finish).collect()
}

fn slot_key<Tz: TimeZone>(trade: &Trade, tz: &Tz) -> String {
    let local = trade.enter_time.with_timezone(tz);
    let minute = if local.minute() < 30 { 0 } else { 30 };
    format!("{:02}:{:02}", local.hour(), minute)
}
