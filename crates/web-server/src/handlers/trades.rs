use crate::{context::AccountContext, error::AppError, handlers::MessageResponse, AppState};
use analytics::{pnl::holding_period_ms, realized_pl};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use core_types::{Trade, TradeDraft, TradeInput};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// A stored trade plus the values derived from it on read.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeView {
    #[serde(flatten)]
    pub trade: Trade,
    pub pl: Decimal,
    pub duration_ms: i64,
}

impl From<Trade> for TradeView {
    fn from(trade: Trade) -> Self {
        Self {
            pl: realized_pl(&trade),
            duration_ms: holding_period_ms(&trade),
            trade,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub trades: Vec<TradeInput>,
}

#[derive(Debug, Serialize)]
pub struct ImportedResponse {
    pub message: String,
    pub imported: usize,
}

impl ImportedResponse {
    pub fn new(imported: usize) -> Self {
        Self {
            message: format!("Imported {imported} trades"),
            imported,
        }
    }
}

fn checked_draft(state: &AppState, input: TradeInput) -> Result<TradeDraft, AppError> {
    let draft = input.into_draft()?;
    draft.validate(state.settings.import.max_screenshot_bytes)?;
    Ok(draft)
}

/// # GET /api/trades
pub async fn list_trades(
    State(state): State<Arc<AppState>>,
    ctx: AccountContext,
) -> Result<Json<Vec<TradeView>>, AppError> {
    let trades = state.db_repo.list_trades(ctx.id()).await?;
    Ok(Json(trades.into_iter().map(TradeView::from).collect()))
}

/// # POST /api/trades
pub async fn create_trade(
    State(state): State<Arc<AppState>>,
    ctx: AccountContext,
    Json(input): Json<TradeInput>,
) -> Result<(StatusCode, Json<TradeView>), AppError> {
    let draft = checked_draft(&state, input)?;
    let trade = state.db_repo.insert_trade(ctx.id(), &draft).await?;
    Ok((StatusCode::CREATED, Json(trade.into())))
}

/// # PUT /api/trades/:id
/// Replaces every editable field. Concurrent edits are last-write-wins.
pub async fn update_trade(
    State(state): State<Arc<AppState>>,
    ctx: AccountContext,
    Path(trade_id): Path<Uuid>,
    Json(input): Json<TradeInput>,
) -> Result<Json<TradeView>, AppError> {
    let draft = checked_draft(&state, input)?;
    let trade = state
        .db_repo
        .update_trade(ctx.id(), trade_id, &draft)
        .await
        .map_err(|e| not_found(e, "Trade not found"))?;
    Ok(Json(trade.into()))
}

/// # DELETE /api/trades/:id
pub async fn delete_trade(
    State(state): State<Arc<AppState>>,
    ctx: AccountContext,
    Path(trade_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .db_repo
        .delete_trade(ctx.id(), trade_id)
        .await
        .map_err(|e| not_found(e, "Trade not found"))?;
    Ok(Json(MessageResponse::new("Trade deleted")))
}

/// # POST /api/trades/bulk
/// All-or-nothing: one invalid entry rejects the whole batch.
pub async fn bulk_import(
    State(state): State<Arc<AppState>>,
    ctx: AccountContext,
    Json(body): Json<BulkRequest>,
) -> Result<Json<ImportedResponse>, AppError> {
    let max_rows = state.settings.import.max_rows;
    if body.trades.is_empty() {
        return Err(AppError::Validation("No trades to import".to_string()));
    }
    if body.trades.len() > max_rows {
        return Err(AppError::Validation(format!(
            "Too many rows: at most {max_rows} trades can be imported at once"
        )));
    }

    let drafts = body
        .trades
        .into_iter()
        .enumerate()
        .map(|(i, input)| {
            let mut draft = checked_draft(&state, input)
                .map_err(|e| AppError::Validation(format!("Row {}: {}", i + 1, e.status_and_message().1)))?;
            draft.ticker = draft.ticker.to_uppercase();
            Ok(draft)
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    let imported = state.db_repo.insert_trades(ctx.id(), &drafts).await?;
    tracing::info!(account_id = %ctx.id(), imported, "Bulk trade import complete.");
    Ok(Json(ImportedResponse::new(imported)))
}

pub(crate) fn not_found(err: database::DbError, message: &str) -> AppError {
    match err {
        database::DbError::NotFound => AppError::NotFound(message.to_string()),
        other => AppError::Database(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use core_types::TradeDraft;
    use rust_decimal::Decimal;

    #[test]
    fn trade_view_carries_computed_pl_alongside_fields() {
        let now = Utc::now();
        let trade = Trade::new(
            Uuid::new_v4(),
            TradeDraft {
                ticker: "ES".to_string(),
                enter_time: now,
                exit_time: now + chrono::Duration::minutes(5),
                enter_price: Decimal::from(100),
                exit_price: Decimal::from(110),
                quantity: Decimal::from(10),
                manual_pl: None,
                comments: String::new(),
                tags: Vec::new(),
                screenshot: None,
            },
        );
        let json = serde_json::to_value(TradeView::from(trade)).unwrap();
        assert_eq!(json["ticker"], "ES");
        assert_eq!(json["durationMs"], 300_000);
        assert!(json.get("pl").is_some());
        assert!(json.get("manualPL").is_some());
    }
}
