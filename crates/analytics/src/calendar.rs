use crate::error::AnalyticsError;
use crate::pnl::realized_pl;
use chrono::{Datelike, FixedOffset, NaiveDate, TimeZone};
use core_types::Trade;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Number of intensity tiers per sign in the heatmap and calendar views.
const INTENSITY_TIERS: u8 = 4;

/// All trades that exited on one local calendar day.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayBucket {
    #[serde(rename = "totalPL")]
    pub total_pl: Decimal,
    pub trade_count: usize,
    pub trade_ids: Vec<Uuid>,
}

/// How a day is styled: no trades, trades netting to zero, or a tiered
/// profit or loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "tier", rename_all = "lowercase")]
pub enum DayActivity {
    None,
    Flat,
    Profit(u8),
    Loss(u8),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthSummary {
    pub month: u32,
    #[serde(rename = "totalPL")]
    pub total_pl: Decimal,
    pub trade_count: usize,
    pub win_days: usize,
    pub loss_days: usize,
    pub flat_days: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarCell {
    pub date: NaiveDate,
    pub pl: Decimal,
    pub trade_count: usize,
    pub activity: DayActivity,
}

/// One month laid out for a Sunday-first grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthCalendar {
    pub year: i32,
    pub month: u32,
    /// Empty cells before the 1st (0 when the month starts on a Sunday).
    pub leading_blanks: u32,
    pub cells: Vec<CalendarCell>,
}

/// The fixed zone `minutes` east of UTC (New York in winter is `-300`), or
/// `None` when it lies outside +/-24h.
pub fn offset_from_minutes(minutes: i32) -> Option<FixedOffset> {
    minutes.checked_mul(60).and_then(FixedOffset::east_opt)
}

/// Groups trades by the exit date as seen in `tz`.
///
/// Near-midnight exits land on different days for viewers in different
/// zones. The partition is lossless: day totals sum to the overall P/L.
pub fn group_by_day<Tz: TimeZone>(trades: &[Trade], tz: &Tz) -> BTreeMap<NaiveDate, DayBucket> {
    let mut days: BTreeMap<NaiveDate, DayBucket> = BTreeMap::new();

    for trade in trades {
        let date = trade.exit_time.with_timezone(tz).date_naive();
        let bucket = days.entry(date).or_default();
        bucket.total_pl = bucket.total_pl.saturating_add(realized_pl(trade));
        bucket.trade_count += 1;
        bucket.trade_ids.push(trade.id);
    }

    days
}

/// Per-month totals for `year`, always twelve entries.
pub fn monthly_grid(days: &BTreeMap<NaiveDate, DayBucket>, year: i32) -> Vec<MonthSummary> {
    let mut months: Vec<MonthSummary> = (1..=12)
        .map(|month| MonthSummary {
            month,
            total_pl: Decimal::ZERO,
            trade_count: 0,
            win_days: 0,
            loss_days: 0,
            flat_days: 0,
        })
        .collect();

    for (date, bucket) in days.iter().filter(|(d, _)| d.year() == year) {
        let summary = &mut months[date.month0() as usize];
        summary.total_pl = summary.total_pl.saturating_add(bucket.total_pl);
        summary.trade_count += bucket.trade_count;
        if bucket.total_pl > Decimal::ZERO {
            summary.win_days += 1;
        } else if bucket.total_pl < Decimal::ZERO {
            summary.loss_days += 1;
        } else {
            summary.flat_days += 1;
        }
    }

    months
}

/// Every day of one month, with intensity scaled to the month's largest day.
pub fn month_calendar(
    days: &BTreeMap<NaiveDate, DayBucket>,
    year: i32,
    month: u32,
) -> Result<MonthCalendar, AnalyticsError> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AnalyticsError::InvalidPeriod(format!("{year}-{month:02}")))?;
    let dates: Vec<NaiveDate> = first.iter_days().take_while(|d| d.month() == month).collect();

    Ok(MonthCalendar {
        year,
        month,
        leading_blanks: first.weekday().num_days_from_sunday(),
        cells: cells_for(days, &dates),
    })
}

/// Every day of `year`, with intensity scaled to the year's largest day.
pub fn year_heatmap(
    days: &BTreeMap<NaiveDate, DayBucket>,
    year: i32,
) -> Result<Vec<CalendarCell>, AnalyticsError> {
    let first = NaiveDate::from_ymd_opt(year, 1, 1)
        .ok_or_else(|| AnalyticsError::InvalidPeriod(year.to_string()))?;
    let dates: Vec<NaiveDate> = first.iter_days().take_while(|d| d.year() == year).collect();
    Ok(cells_for(days, &dates))
}

fn cells_for(days: &BTreeMap<NaiveDate, DayBucket>, dates: &[NaiveDate]) -> Vec<CalendarCell> {
    let max_abs = dates
        .iter()
        .filter_map(|d| days.get(d))
        .map(|b| b.total_pl.abs())
        .max()
        .unwrap_or(Decimal::ZERO);

    dates
        .iter()
        .map(|date| match days.get(date) {
            Some(bucket) => CalendarCell {
                date: *date,
                pl: bucket.total_pl,
                trade_count: bucket.trade_count,
                activity: classify(bucket, max_abs),
            },
            None => CalendarCell {
                date: *date,
                pl: Decimal::ZERO,
                trade_count: 0,
                activity: DayActivity::None,
            },
        })
        .collect()
}

/// Styles a day relative to `max_abs`, the largest absolute day P/L in view.
pub fn classify(bucket: &DayBucket, max_abs: Decimal) -> DayActivity {
    if bucket.trade_count == 0 {
        return DayActivity::None;
    }
    if bucket.total_pl.is_zero() {
        return DayActivity::Flat;
    }

    let tier = intensity_tier(bucket.total_pl.abs(), max_abs);
    if bucket.total_pl > Decimal::ZERO {
        DayActivity::Profit(tier)
    } else {
        DayActivity::Loss(tier)
    }
}

/// `ceil(abs / max * 4)`, clamped to `1..=4`.
fn intensity_tier(abs_pl: Decimal, max_abs: Decimal) -> u8 {
    if max_abs.is_zero() {
        return 1;
    }
    let scaled = (abs_pl / max_abs * Decimal::from(INTENSITY_TIERS)).ceil();
    scaled.to_u8().unwrap_or(INTENSITY_TIERS).clamp(1, INTENSITY_TIERS)
}
