use core_types::Trade;
use rust_decimal::Decimal;

/// Realized profit/loss of a trade.
///
/// A manual override always wins; otherwise it is
/// `(exit_price - enter_price) * quantity`, whatever its sign. Results beyond
/// the `Decimal` range saturate at `Decimal::MAX` / `Decimal::MIN`.
pub fn realized_pl(trade: &Trade) -> Decimal {
    match trade.manual_pl {
        Some(pl) => pl,
        None => trade
            .exit_price
            .saturating_sub(trade.enter_price)
            .saturating_mul(trade.quantity),
    }
}

/// Holding period in milliseconds. Negative durations pass through.
pub fn holding_period_ms(trade: &Trade) -> i64 {
    trade.holding_period().num_milliseconds()
}

/// Gross profit over gross loss. With no losses the ratio is reported as the
/// gross profit itself rather than infinity.
pub fn profit_factor(gross_profit: Decimal, gross_loss: Decimal) -> Decimal {
    if gross_loss > Decimal::ZERO {
        gross_profit.checked_div(gross_loss).unwrap_or(Decimal::MAX)
    } else {
        gross_profit
    }
}

/// Renders a millisecond duration the way the dashboard shows it:
/// `2d 3h 15m`, `3h 15m 4s`, `15m 4s` or `4s`.
pub fn format_duration(milliseconds: i64) -> String {
    let total_seconds = milliseconds.div_euclid(1000);
    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3_600;
    let minutes = (total_seconds % 3_600) / 60;
    let seconds = total_seconds % 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use core_types::TradeDraft;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn trade(enter: Decimal, exit: Decimal, qty: Decimal, manual: Option<Decimal>) -> Trade {
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 14, 30, 0).unwrap();
        Trade::new(
            Uuid::new_v4(),
            TradeDraft {
                ticker: "ES".to_string(),
                enter_time: at,
                exit_time: at,
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
    fn computed_pl_follows_price_difference() {
        assert_eq!(realized_pl(&trade(dec!(100), dec!(110), dec!(10), None)), dec!(100));
        assert_eq!(realized_pl(&trade(dec!(50), dec!(40), dec!(5), None)), dec!(-50));
        assert_eq!(realized_pl(&trade(dec!(50), dec!(50), dec!(5), None)), dec!(0));
    }

    #[test]
    fn manual_pl_overrides_prices() {
        assert_eq!(realized_pl(&trade(dec!(50), dec!(40), dec!(5), Some(dec!(-1)))), dec!(-1));
        assert_eq!(realized_pl(&trade(dec!(1), dec!(1000), dec!(5), Some(dec!(0)))), dec!(0));
    }

    #[test]
    fn profit_factor_without_losses_is_gross_profit() {
        assert_eq!(profit_factor(dec!(300), dec!(0)), dec!(300));
        assert_eq!(profit_factor(dec!(300), dec!(150)), dec!(2));
    }

    #[test]
    fn out_of_range_values_saturate() {
        let huge = dec!(10_000_000_000_000_000_000_000_000_000);
        assert_eq!(realized_pl(&trade(dec!(0), huge, dec!(10), None)), Decimal::MAX);
        assert_eq!(realized_pl(&trade(huge, dec!(0), dec!(10), None)), Decimal::MIN);
        assert_eq!(profit_factor(Decimal::MAX, dec!(0.001)), Decimal::MAX);
    }

    #[test]
    fn durations_render_largest_units_first() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(65_000), "1m 5s");
        assert_eq!(format_duration(3_723_000), "1h 2m 3s");
        assert_eq!(format_duration(90_061_000), "1d 1h 1m");
    }
}
