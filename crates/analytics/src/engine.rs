use crate::pnl::{holding_period_ms, profit_factor, realized_pl};
use crate::report::{EquityPoint, JournalStats, TagStats, TickerStats};
use core_types::{Tag, Trade};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// A stateless calculator for deriving journal statistics from trades.
#[derive(Debug, Default)]
pub struct AnalyticsEngine {}

impl AnalyticsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The main entry point for calculating summary statistics.
    ///
    /// # Arguments
    ///
    /// * `trades` - The trades to summarize, in any order.
    ///
    /// # Returns
    ///
    /// A `JournalStats`; all zeros when `trades` is empty.
    pub fn summarize(&self, trades: &[Trade]) -> JournalStats {
        let refs: Vec<&Trade> = trades.iter().collect();
        self.summarize_refs(&refs)
    }

    fn summarize_refs(&self, trades: &[&Trade]) -> JournalStats {
        let mut report = JournalStats::new();

        if trades.is_empty() {
            return report;
        }

        let chronological = chronological(trades);

        self.calculate_profitability(trades, &mut report);
        self.calculate_drawdown(&chronological, &mut report);
        self.calculate_streaks(&chronological, &mut report);
        self.calculate_time_metrics(trades, &mut report);

        report
    }

    /// Cumulative P/L after each trade, in exit-time order.
    pub fn equity_curve(&self, trades: &[Trade]) -> Vec<EquityPoint> {
        let refs: Vec<&Trade> = trades.iter().collect();
        let mut cumulative = Decimal::ZERO;

        chronological(&refs)
            .into_iter()
            .map(|trade| {
                let pl = realized_pl(trade);
                cumulative = cumulative.saturating_add(pl);
                EquityPoint {
                    timestamp: trade.exit_time,
                    trade_id: trade.id,
                    pl,
                    cumulative_pl: cumulative,
                }
            })
            .collect()
    }

    /// Statistics per tag, in the order `tags` is given, followed by an
    /// "Untagged" group when any trade has no tags. A trade carrying several
    /// tags counts toward each of them.
    pub fn summarize_by_tag(&self, trades: &[Trade], tags: &[Tag]) -> Vec<TagStats> {
        let mut breakdown: Vec<TagStats> = tags
            .iter()
            .map(|tag| {
                let tagged: Vec<&Trade> = trades.iter().filter(|t| t.has_tag(&tag.id)).collect();
                TagStats {
                    tag_id: Some(tag.id),
                    name: tag.name.clone(),
                    color: Some(tag.color.clone()),
                    stats: self.summarize_refs(&tagged),
                }
            })
            .collect();

        let untagged: Vec<&Trade> = trades.iter().filter(|t| t.tags.is_empty()).collect();
        if !untagged.is_empty() {
            breakdown.push(TagStats {
                tag_id: None,
                name: "Untagged".to_string(),
                color: None,
                stats: self.summarize_refs(&untagged),
            });
        }

        breakdown
    }

    /// Statistics per ticker, sorted by ticker.
    pub fn summarize_by_ticker(&self, trades: &[Trade]) -> Vec<TickerStats> {
        let mut by_ticker: BTreeMap<&str, Vec<&Trade>> = BTreeMap::new();
        for trade in trades {
            by_ticker.entry(trade.ticker.as_str()).or_default().push(trade);
        }

        by_ticker
            .into_iter()
            .map(|(ticker, group)| TickerStats {
                ticker: ticker.to_string(),
                stats: self.summarize_refs(&group),
            })
            .collect()
    }

    /// Totals, win/loss counts, averages and the ratios built from them.
    fn calculate_profitability(&self, trades: &[&Trade], report: &mut JournalStats) {
        report.total_trades = trades.len();

        let mut best: Option<Decimal> = None;
        let mut worst: Option<Decimal> = None;

        for trade in trades {
            let pl = realized_pl(trade);
            report.total_pl = report.total_pl.saturating_add(pl);

            if pl > Decimal::ZERO {
                report.gross_profit = report.gross_profit.saturating_add(pl);
                report.wins += 1;
            } else if pl < Decimal::ZERO {
                report.gross_loss = report.gross_loss.saturating_add(pl.abs());
                report.losses += 1;
            }

            best = Some(best.map_or(pl, |b| b.max(pl)));
            worst = Some(worst.map_or(pl, |w| w.min(pl)));
        }

        report.best_trade = best.unwrap_or_default();
        report.worst_trade = worst.unwrap_or_default();

        // --- Ratios ---
        let hundred = Decimal::ONE_HUNDRED;
        report.win_rate = Decimal::from(report.wins) / Decimal::from(report.total_trades) * hundred;

        if report.wins > 0 {
            report.avg_win = report.gross_profit / Decimal::from(report.wins);
        }
        if report.losses > 0 {
            report.avg_loss = -report.gross_loss / Decimal::from(report.losses);
        }

        report.profit_factor = profit_factor(report.gross_profit, report.gross_loss);

        let win_fraction = report.win_rate / hundred;
        report.expectancy =
            win_fraction * report.avg_win + (Decimal::ONE - win_fraction) * report.avg_loss;
    }

    /// Largest peak-to-trough decline of cumulative P/L. The peak starts at
    /// zero, so a losing first trade is already a drawdown.
    fn calculate_drawdown(&self, chronological: &[&Trade], report: &mut JournalStats) {
        let mut running = Decimal::ZERO;
        let mut peak = Decimal::ZERO;
        let mut max_drawdown = Decimal::ZERO;

        for trade in chronological {
            running = running.saturating_add(realized_pl(trade));
            if running > peak {
                peak = running;
            }
            let drawdown = peak.saturating_sub(running);
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
            }
        }

        report.max_drawdown = max_drawdown;
    }

    /// Longest runs of consecutive winners and losers. A break-even trade
    /// continues a losing run.
    fn calculate_streaks(&self, chronological: &[&Trade], report: &mut JournalStats) {
        let mut current_win = 0;
        let mut current_loss = 0;

        for trade in chronological {
            if realized_pl(trade) > Decimal::ZERO {
                current_win += 1;
                current_loss = 0;
            } else {
                current_loss += 1;
                current_win = 0;
            }
            report.longest_win_streak = report.longest_win_streak.max(current_win);
            report.longest_loss_streak = report.longest_loss_streak.max(current_loss);
        }
    }

    fn calculate_time_metrics(&self, trades: &[&Trade], report: &mut JournalStats) {
        let total_ms = trades
            .iter()
            .fold(0i64, |acc, t| acc.saturating_add(holding_period_ms(t)));
        report.avg_duration_ms = total_ms / trades.len() as i64;
    }
}

/// Trades ordered by exit time; ties keep their input order.
fn chronological<'a>(trades: &[&'a Trade]) -> Vec<&'a Trade> {
    let mut ordered = trades.to_vec();
    ordered.sort_by_key(|t| t.exit_time);
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use core_types::TradeDraft;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, 13, 0, 0).unwrap() + Duration::minutes(minute)
    }

    /// A trade closing at `minute` with the given P/L via manual override.
    fn closed(minute: i64, pl: Decimal) -> Trade {
        priced(minute, dec!(0), dec!(0), dec!(1), Some(pl))
    }

    fn priced(minute: i64, enter: Decimal, exit: Decimal, qty: Decimal, manual: Option<Decimal>) -> Trade {
        Trade::new(
            Uuid::new_v4(),
            TradeDraft {
                ticker: "ES".to_string(),
                enter_time: at(minute - 10),
                exit_time: at(minute),
                enter_price: enter,
                exit_price: exit,
                quantity: qty,
                manual_pl: manual,
                comments: String::new(),
                tags: Vec::new(),
                screenshot: None,
            },
        )
    }

    #[test]
    fn empty_input_is_all_zero() {
        let stats = AnalyticsEngine::new().summarize(&[]);
        assert_eq!(stats, JournalStats::new());
    }

    #[test]
    fn single_winning_trade() {
        let trades = vec![priced(0, dec!(100), dec!(110), dec!(10), None)];
        let stats = AnalyticsEngine::new().summarize(&trades);

        assert_eq!(stats.total_pl, dec!(100));
        assert_eq!(stats.win_rate, dec!(100));
        assert_eq!(stats.best_trade, dec!(100));
        assert_eq!(stats.worst_trade, dec!(100));
        assert_eq!(stats.profit_factor, dec!(100));
        assert_eq!(stats.expectancy, dec!(100));
        assert_eq!(stats.max_drawdown, dec!(0));
        assert_eq!(stats.avg_duration_ms, 600_000);
    }

    #[test]
    fn manual_override_drives_statistics() {
        let trades = vec![priced(0, dec!(50), dec!(40), dec!(5), Some(dec!(-1)))];
        let stats = AnalyticsEngine::new().summarize(&trades);
        assert_eq!(stats.total_pl, dec!(-1));
        assert_eq!(stats.losses, 1);
        assert_eq!(stats.avg_loss, dec!(-1));
        // Peak starts at zero, so the first loss is already a drawdown.
        assert_eq!(stats.max_drawdown, dec!(1));
    }

    #[test]
    fn out_of_range_trades_saturate_instead_of_panicking() {
        let huge = dec!(10_000_000_000_000_000_000_000_000_000);
        let trades = vec![
            priced(0, dec!(0), huge, dec!(10), None),
            closed(1, dec!(50_000_000_000_000_000_000_000_000_000)),
            closed(2, dec!(50_000_000_000_000_000_000_000_000_000)),
            priced(3, huge, dec!(0), dec!(10), None),
        ];
        let engine = AnalyticsEngine::new();

        let stats = engine.summarize(&trades);
        assert_eq!(stats.wins, 3);
        assert_eq!(stats.losses, 1);
        assert_eq!(stats.gross_profit, Decimal::MAX);
        assert_eq!(stats.gross_loss, Decimal::MAX);
        assert_eq!(stats.max_drawdown, Decimal::MAX);
        assert_eq!(stats.best_trade, Decimal::MAX);
        assert_eq!(stats.worst_trade, Decimal::MIN);

        let curve = engine.equity_curve(&trades);
        assert_eq!(curve[2].cumulative_pl, Decimal::MAX);

        let days = crate::calendar::group_by_day(&trades, &Utc);
        assert_eq!(days.values().map(|d| d.trade_count).sum::<usize>(), 4);
    }

    #[test]
    fn trades_at_the_validation_bound_sum_exactly() {
        let max = core_types::MAX_TRADE_MAGNITUDE;
        let trades: Vec<Trade> = (0..1000).map(|i| priced(i, dec!(0), max, max, None)).collect();
        let stats = AnalyticsEngine::new().summarize(&trades);
        assert_eq!(stats.total_pl, max * max * Decimal::from(1000));
    }

    #[test]
    fn mixed_trades_produce_expected_ratios() {
        let trades = vec![
            closed(0, dec!(200)),
            closed(1, dec!(-100)),
            closed(2, dec!(100)),
            closed(3, dec!(0)),
        ];
        let stats = AnalyticsEngine::new().summarize(&trades);

        assert_eq!(stats.total_trades, 4);
        assert_eq!(stats.wins, 2);
        assert_eq!(stats.losses, 1);
        assert!(stats.wins + stats.losses <= stats.total_trades);
        assert_eq!(stats.win_rate, dec!(50));
        assert_eq!(stats.avg_win, dec!(150));
        assert_eq!(stats.avg_loss, dec!(-100));
        assert_eq!(stats.gross_profit, dec!(300));
        assert_eq!(stats.gross_loss, dec!(100));
        assert_eq!(stats.profit_factor, dec!(3));
        // 0.5 * 150 + 0.5 * -100
        assert_eq!(stats.expectancy, dec!(25));
        assert_eq!(stats.best_trade, dec!(200));
        assert_eq!(stats.worst_trade, dec!(-100));
    }

    #[test]
    fn total_pl_is_order_independent() {
        let mut trades = vec![closed(5, dec!(12.5)), closed(1, dec!(-3)), closed(3, dec!(7))];
        let forward = AnalyticsEngine::new().summarize(&trades);
        trades.reverse();
        let backward = AnalyticsEngine::new().summarize(&trades);
        assert_eq!(forward.total_pl, dec!(16.5));
        assert_eq!(forward, backward);
    }

    #[test]
    fn drawdown_follows_exit_time_not_input_order() {
        // Chronologically: +100, -150, +20, -30 -> peak 100, trough -60.
        let trades = vec![
            closed(3, dec!(-30)),
            closed(0, dec!(100)),
            closed(2, dec!(20)),
            closed(1, dec!(-150)),
        ];
        let stats = AnalyticsEngine::new().summarize(&trades);
        assert_eq!(stats.max_drawdown, dec!(160));
    }

    #[test]
    fn monotonic_gains_have_no_drawdown() {
        let trades: Vec<Trade> = (0..5).map(|i| closed(i, dec!(10))).collect();
        let stats = AnalyticsEngine::new().summarize(&trades);
        assert_eq!(stats.max_drawdown, dec!(0));
        assert_eq!(stats.longest_win_streak, 5);
        assert_eq!(stats.longest_loss_streak, 0);
    }

    #[test]
    fn break_even_trades_extend_losing_streaks() {
        let trades = vec![
            closed(0, dec!(5)),
            closed(1, dec!(-5)),
            closed(2, dec!(0)),
            closed(3, dec!(-1)),
            closed(4, dec!(5)),
            closed(5, dec!(5)),
        ];
        let stats = AnalyticsEngine::new().summarize(&trades);
        assert_eq!(stats.longest_loss_streak, 3);
        assert_eq!(stats.longest_win_streak, 2);
    }

    #[test]
    fn equity_curve_accumulates_in_exit_order() {
        let trades = vec![closed(2, dec!(5)), closed(0, dec!(10)), closed(1, dec!(-4))];
        let curve = AnalyticsEngine::new().equity_curve(&trades);
        let cumulative: Vec<Decimal> = curve.iter().map(|p| p.cumulative_pl).collect();
        assert_eq!(cumulative, vec![dec!(10), dec!(6), dec!(11)]);
    }

    #[test]
    fn tag_breakdown_counts_multi_tagged_trades_in_each_group() {
        let owner = Uuid::new_v4();
        let scalp = Tag { id: Uuid::new_v4(), owner_id: owner, name: "scalp".into(), color: "#f00".into() };
        let news = Tag { id: Uuid::new_v4(), owner_id: owner, name: "news".into(), color: "#0f0".into() };

        let mut both = closed(0, dec!(10));
        both.tags = vec![scalp.id, news.id];
        let mut only_scalp = closed(1, dec!(-4));
        only_scalp.tags = vec![scalp.id];
        let untagged = closed(2, dec!(1));

        let trades = vec![both, only_scalp, untagged];
        let breakdown = AnalyticsEngine::new().summarize_by_tag(&trades, &[scalp.clone(), news.clone()]);

        assert_eq!(breakdown.len(), 3);
        assert_eq!(breakdown[0].stats.total_trades, 2);
        assert_eq!(breakdown[0].stats.total_pl, dec!(6));
        assert_eq!(breakdown[1].stats.total_trades, 1);
        assert_eq!(breakdown[2].tag_id, None);
        assert_eq!(breakdown[2].stats.total_pl, dec!(1));
    }

    #[test]
    fn ticker_breakdown_is_sorted() {
        let mut nq = closed(0, dec!(3));
        nq.ticker = "NQ".into();
        let es = closed(1, dec!(2));
        let breakdown = AnalyticsEngine::new().summarize_by_ticker(&[nq, es]);
        let tickers: Vec<&str> = breakdown.iter().map(|t| t.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["ES", "NQ"]);
    }
}
