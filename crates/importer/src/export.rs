use crate::error::ImportError;
use analytics::realized_pl;
use chrono::SecondsFormat;
use core_types::Trade;
use csv::Writer;

pub const EXPORT_HEADER: [&str; 9] = [
    "ticker",
    "enterTime",
    "exitTime",
    "enterPrice",
    "exitPrice",
    "quantity",
    "manualPL",
    "comments",
    "pl",
];

/// Writes trades as CSV with RFC 3339 timestamps and the computed P/L last.
pub fn export_trades(trades: &[Trade]) -> Result<String, ImportError> {
    let mut wtr = Writer::from_writer(Vec::new());
    wtr.write_record(EXPORT_HEADER)?;

    for trade in trades {
        wtr.write_record([
            trade.ticker.clone(),
            trade.enter_time.to_rfc3339_opts(SecondsFormat::Millis, true),
            trade.exit_time.to_rfc3339_opts(SecondsFormat::Millis, true),
            trade.enter_price.to_string(),
            trade.exit_price.to_string(),
            trade.quantity.to_string(),
            trade.manual_pl.map(|pl| pl.to_string()).unwrap_or_default(),
            trade.comments.clone(),
            realized_pl(trade).to_string(),
        ])?;
    }

    let bytes = wtr.into_inner().map_err(|e| ImportError::Write(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ImportError::Write(e.to_string()))
}
