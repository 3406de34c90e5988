use crate::{context::AccountContext, error::AppError, AppState};
use analytics::calendar::{month_calendar, monthly_grid, year_heatmap, CalendarCell, MonthCalendar, MonthSummary};
use analytics::{
    format_duration, group_by_day, group_by_entry_time_bucket, offset_from_minutes, AnalyticsEngine, DayBucket,
    EquityPoint, JournalStats, SessionBucket, TagStats, TickerStats,
};
use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{Datelike, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Calendar and time-of-day views are computed in the viewer's zone, given as
/// minutes east of UTC (`-300` for New York in winter).
#[derive(Debug, Default, Deserialize)]
pub struct PeriodQuery {
    pub tz_offset: Option<i32>,
    pub year: Option<i32>,
    pub month: Option<u32>,
}

impl PeriodQuery {
    pub fn offset(&self) -> Result<FixedOffset, AppError> {
        let minutes = self.tz_offset.unwrap_or(0);
        offset_from_minutes(minutes).ok_or_else(|| AppError::Validation(format!("Invalid tz_offset: {minutes}")))
    }

    /// The requested year and month, defaulting to "now" in the viewer's zone.
    pub fn period(&self, offset: &FixedOffset) -> (i32, u32) {
        let today = Utc::now().with_timezone(offset).date_naive();
        (
            self.year.unwrap_or(today.year()),
            self.month.unwrap_or(today.month()),
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResponse {
    pub stats: JournalStats,
    pub avg_duration: String,
    pub equity_curve: Vec<EquityPoint>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownResponse {
    pub by_tag: Vec<TagStats>,
    pub by_ticker: Vec<TickerStats>,
}

/// # GET /api/analytics/summary
pub async fn summary(
    State(state): State<Arc<AppState>>,
    ctx: AccountContext,
) -> Result<Json<SummaryResponse>, AppError> {
    let trades = state.db_repo.list_trades(ctx.id()).await?;
    let engine = AnalyticsEngine::new();
    let stats = engine.summarize(&trades);

    Ok(Json(SummaryResponse {
        avg_duration: format_duration(stats.avg_duration_ms),
        equity_curve: engine.equity_curve(&trades),
        stats,
    }))
}

/// # GET /api/analytics/breakdown
pub async fn breakdown(
    State(state): State<Arc<AppState>>,
    ctx: AccountContext,
) -> Result<Json<BreakdownResponse>, AppError> {
    let trades = state.db_repo.list_trades(ctx.id()).await?;
    let tags = state.db_repo.list_tags(ctx.id()).await?;
    let engine = AnalyticsEngine::new();

    Ok(Json(BreakdownResponse {
        by_tag: engine.summarize_by_tag(&trades, &tags),
        by_ticker: engine.summarize_by_ticker(&trades),
    }))
}

/// # GET /api/analytics/daily?tz_offset
/// Every day with at least one exit, keyed `YYYY-MM-DD`.
pub async fn daily(
    State(state): State<Arc<AppState>>,
    ctx: AccountContext,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<BTreeMap<NaiveDate, DayBucket>>, AppError> {
    let offset = query.offset()?;
    let trades = state.db_repo.list_trades(ctx.id()).await?;
    Ok(Json(group_by_day(&trades, &offset)))
}

/// # GET /api/analytics/calendar?year&month&tz_offset
pub async fn calendar(
    State(state): State<Arc<AppState>>,
    ctx: AccountContext,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<MonthCalendar>, AppError> {
    let offset = query.offset()?;
    let (year, month) = query.period(&offset);
    let trades = state.db_repo.list_trades(ctx.id()).await?;
    let days = group_by_day(&trades, &offset);
    Ok(Json(month_calendar(&days, year, month)?))
}

/// # GET /api/analytics/monthly?year&tz_offset
pub async fn monthly(
    State(state): State<Arc<AppState>>,
    ctx: AccountContext,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Vec<MonthSummary>>, AppError> {
    let offset = query.offset()?;
    let (year, _) = query.period(&offset);
    let trades = state.db_repo.list_trades(ctx.id()).await?;
    let days = group_by_day(&trades, &offset);
    Ok(Json(monthly_grid(&days, year)))
}

/// # GET /api/analytics/heatmap?year&tz_offset
pub async fn heatmap(
    State(state): State<Arc<AppState>>,
    ctx: AccountContext,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Vec<CalendarCell>>, AppError> {
    let offset = query.offset()?;
    let (year, _) = query.period(&offset);
    let trades = state.db_repo.list_trades(ctx.id()).await?;
    let days = group_by_day(&trades, &offset);
    Ok(Json(year_heatmap(&days, year)?))
}

/// # GET /api/analytics/sessions?tz_offset
pub async fn sessions(
    State(state): State<Arc<AppState>>,
    ctx: AccountContext,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Vec<SessionBucket>>, AppError> {
    let offset = query.offset()?;
    let trades = state.db_repo.list_trades(ctx.id()).await?;
    Ok(Json(group_by_entry_time_bucket(&trades, &offset)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_defaults_to_utc_and_rejects_nonsense() {
        assert_eq!(PeriodQuery::default().offset().unwrap().local_minus_utc(), 0);

        let ny = PeriodQuery { tz_offset: Some(-300), ..PeriodQuery::default() };
        assert_eq!(ny.offset().unwrap().local_minus_utc(), -300 * 60);

        let bogus = PeriodQuery { tz_offset: Some(100_000), ..PeriodQuery::default() };
        assert!(bogus.offset().is_err());
    }

    #[test]
    fn explicit_period_wins_over_today() {
        let query = PeriodQuery { tz_offset: None, year: Some(2023), month: Some(2) };
        assert_eq!(query.period(&query.offset().unwrap()), (2023, 2));
    }
}
