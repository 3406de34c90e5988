use crate::error::ImportError;
use crate::mapping::{detect_mapping, ColumnIndices, ColumnMapping};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use core_types::TradeDraft;
use csv::{ReaderBuilder, StringRecord, Trim};
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
];
const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

const SAMPLE_ROWS: usize = 5;

/// What the user sees before confirming an import.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPreview {
    pub headers: Vec<String>,
    pub mapping: ColumnMapping,
    pub missing: Vec<&'static str>,
    pub row_count: usize,
    pub sample: Vec<Vec<String>>,
}

fn reader(csv: &str) -> csv::Reader<&[u8]> {
    ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(csv.as_bytes())
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|field| field.is_empty())
}

/// Reads the header, guesses a mapping and shows the first few rows.
pub fn preview(csv: &str) -> Result<ImportPreview, ImportError> {
    let mut rdr = reader(csv);
    let headers: Vec<String> = rdr.headers()?.iter().map(String::from).collect();

    let mut row_count = 0;
    let mut sample = Vec::new();
    for record in rdr.records() {
        let record = record?;
        if is_blank(&record) {
            continue;
        }
        if sample.len() < SAMPLE_ROWS {
            sample.push(record.iter().map(String::from).collect());
        }
        row_count += 1;
    }

    let mapping = detect_mapping(headers.as_slice());
    Ok(ImportPreview {
        missing: mapping.missing_required(),
        headers,
        mapping,
        row_count,
        sample,
    })
}

/// Turns CSV text into trade drafts.
///
/// Naive timestamps are read in `offset`; RFC 3339 timestamps carry their own.
/// Any bad row fails the whole import so nothing is half-saved.
pub fn parse_trades(
    csv: &str,
    mapping: &ColumnMapping,
    offset: FixedOffset,
    max_rows: usize,
) -> Result<Vec<TradeDraft>, ImportError> {
    let mut rdr = reader(csv);
    let headers: Vec<String> = rdr.headers()?.iter().map(String::from).collect();
    let columns = mapping.resolve(&headers)?;

    let mut drafts = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        if is_blank(&record) {
            continue;
        }
        if drafts.len() == max_rows {
            return Err(ImportError::TooManyRows { max: max_rows });
        }
        let row = i + 1;
        let draft = parse_row(&record, &columns, offset)
            .map_err(|message| ImportError::Row { row, message })?;
        drafts.push(draft);
    }

    if drafts.is_empty() {
        return Err(ImportError::Empty);
    }
    tracing::debug!(rows = drafts.len(), "Parsed CSV trades.");
    Ok(drafts)
}

fn parse_row(record: &StringRecord, columns: &ColumnIndices, offset: FixedOffset) -> Result<TradeDraft, String> {
    let ticker = required(record, columns.ticker, "ticker")?.to_uppercase();
    let enter_time = parse_time(required(record, columns.enter_time, "enterTime")?, offset, "enterTime")?;
    let exit_time = parse_time(required(record, columns.exit_time, "exitTime")?, offset, "exitTime")?;
    let enter_price = parse_decimal(required(record, columns.enter_price, "enterPrice")?, "enterPrice")?;
    let exit_price = parse_decimal(required(record, columns.exit_price, "exitPrice")?, "exitPrice")?;
    let quantity = parse_decimal(required(record, columns.quantity, "quantity")?, "quantity")?;

    let manual_pl = match columns.manual_pl.map(|idx| cell(record, idx)) {
        None | Some("") => None,
        Some(value) => Some(parse_decimal(value, "manualPL")?),
    };
    let comments = columns
        .comments
        .map(|idx| cell(record, idx))
        .unwrap_or("")
        .to_string();

    let draft = TradeDraft {
        ticker,
        enter_time,
        exit_time,
        enter_price,
        exit_price,
        quantity,
        manual_pl,
        comments,
        tags: Vec::new(),
        screenshot: None,
    };
    draft.validate(0).map_err(|e| e.to_string())?;
    Ok(draft)
}

fn cell(record: &StringRecord, idx: usize) -> &str {
    record.get(idx).unwrap_or("").trim()
}

fn required<'a>(record: &'a StringRecord, idx: usize, field: &str) -> Result<&'a str, String> {
    match cell(record, idx) {
        "" => Err(format!("missing {field}")),
        value => Ok(value),
    }
}

/// Accepts `1,234.50`, `$12` and accounting-style `(12.50)` for negatives.
pub fn parse_decimal(raw: &str, field: &str) -> Result<Decimal, String> {
    let cleaned: String = raw.chars().filter(|c| !matches!(c, '$' | ',' | ' ')).collect();
    let (negative, digits) = match cleaned.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, cleaned.as_str()),
    };
    let value = Decimal::from_str(digits)
        .or_else(|_| Decimal::from_scientific(digits))
        .map_err(|_| format!("invalid {field} '{raw}'"))?;
    Ok(if negative { -value } else { value })
}

pub fn parse_time(raw: &str, offset: FixedOffset, field: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NAIVE_DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| format!("invalid {field} '{raw}'"))?;

    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| format!("invalid {field} '{raw}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const CSV: &str = "\
Symbol,Entry Time,Exit Time,Entry Price,Exit Price,Qty,P&L,Notes
es ,2024-03-01 09:30:00,2024-03-01 09:45:00,5000,5010,2,,breakout
NQ,2024-03-01T10:00:00Z,2024-03-01T10:05:00Z,\"18,000.25\",17990,1,(25.50),
";

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn preview_detects_mapping_and_counts_rows() {
        let preview = preview(CSV).unwrap();
        assert_eq!(preview.headers.len(), 8);
        assert_eq!(preview.row_count, 2);
        assert!(preview.missing.is_empty());
        assert_eq!(preview.sample[1][0], "NQ");
    }

    #[test]
    fn parses_rows_into_drafts() {
        let mapping = detect_mapping(preview(CSV).unwrap().headers.as_slice());
        let drafts = parse_trades(CSV, &mapping, utc(), 500).unwrap();

        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].ticker, "ES");
        assert_eq!(drafts[0].quantity, dec!(2));
        assert_eq!(drafts[0].manual_pl, None);
        assert_eq!(drafts[0].comments, "breakout");
        assert_eq!(drafts[1].enter_price, dec!(18000.25));
        assert_eq!(drafts[1].manual_pl, Some(dec!(-25.50)));
        assert_eq!(drafts[1].comments, "");
    }

    #[test]
    fn naive_times_use_the_callers_offset() {
        let mapping = detect_mapping(preview(CSV).unwrap().headers.as_slice());
        let new_york = FixedOffset::west_opt(5 * 3600).unwrap();
        let drafts = parse_trades(CSV, &mapping, new_york, 500).unwrap();

        assert_eq!(drafts[0].enter_time, Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap());
        // RFC 3339 values ignore the offset.
        assert_eq!(drafts[1].enter_time, Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn errors_name_the_row_and_field() {
        let csv = "ticker,enterTime,exitTime,enterPrice,exitPrice,quantity\n\
                   ES,2024-03-01,2024-03-01,1,2,1\n\
                   ES,2024-03-01,2024-03-01,abc,2,1\n";
        let mapping = detect_mapping(&["ticker", "enterTime", "exitTime", "enterPrice", "exitPrice", "quantity"]);
        match parse_trades(csv, &mapping, utc(), 500) {
            Err(ImportError::Row { row, message }) => {
                assert_eq!(row, 2);
                assert!(message.contains("enterPrice"));
            }
            other => panic!("expected a row error, got {other:?}"),
        }
    }

    #[test]
    fn negative_prices_are_rejected() {
        let csv = "ticker,enterTime,exitTime,enterPrice,exitPrice,quantity\nES,2024-03-01,2024-03-01,-1,2,1\n";
        let mapping = detect_mapping(&["ticker", "enterTime", "exitTime", "enterPrice", "exitPrice", "quantity"]);
        assert!(matches!(
            parse_trades(csv, &mapping, utc(), 500),
            Err(ImportError::Row { row: 1, .. })
        ));
    }

    #[test]
    fn row_cap_is_enforced() {
        let mapping = detect_mapping(preview(CSV).unwrap().headers.as_slice());
        assert!(matches!(
            parse_trades(CSV, &mapping, utc(), 1),
            Err(ImportError::TooManyRows { max: 1 })
        ));
    }

    #[test]
    fn missing_columns_fail_before_reading_rows() {
        let csv = "Symbol,Qty\nES,1\n";
        let mapping = detect_mapping(&["Symbol", "Qty"]);
        assert!(matches!(
            parse_trades(csv, &mapping, utc(), 500),
            Err(ImportError::MissingColumns(_))
        ));
    }

    #[test]
    fn header_only_input_is_empty() {
        let csv = "ticker,enterTime,exitTime,enterPrice,exitPrice,quantity\n";
        let mapping = detect_mapping(&["ticker", "enterTime", "exitTime", "enterPrice", "exitPrice", "quantity"]);
        assert!(matches!(parse_trades(csv, &mapping, utc(), 500), Err(ImportError::Empty)));
    }

    #[test]
    fn accepts_us_style_timestamps() {
        let t = parse_time("03/01/2024 02:15 PM", utc(), "exitTime").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 3, 1, 14, 15, 0).unwrap());
        assert!(parse_time("yesterday", utc(), "exitTime").is_err());
    }
}
