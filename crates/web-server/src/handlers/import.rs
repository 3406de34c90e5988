use crate::{
    context::AccountContext,
    error::AppError,
    handlers::{analytics::PeriodQuery, trades::ImportedResponse},
    AppState,
};
use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Json,
};
use importer::{detect_mapping, export_trades, parse_trades, preview, ColumnMapping, ImportPreview};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvRequest {
    pub csv: String,
    /// The user's confirmed mapping; detected from the header when absent.
    #[serde(default)]
    pub mapping: Option<ColumnMapping>,
    /// Minutes east of UTC for timestamps without an offset.
    #[serde(default, alias = "tz_offset")]
    pub tz_offset: Option<i32>,
}

/// # POST /api/import/preview
/// Headers, the detected mapping and a few sample rows, for confirmation.
pub async fn preview_import(
    _ctx: AccountContext,
    Json(body): Json<CsvRequest>,
) -> Result<Json<ImportPreview>, AppError> {
    Ok(Json(preview(&body.csv)?))
}

/// # POST /api/import
pub async fn import_csv(
    State(state): State<Arc<AppState>>,
    ctx: AccountContext,
    Json(body): Json<CsvRequest>,
) -> Result<Json<ImportedResponse>, AppError> {
    let offset = PeriodQuery {
        tz_offset: body.tz_offset,
        ..PeriodQuery::default()
    }
    .offset()?;

    let mapping = match body.mapping {
        Some(mapping) => mapping,
        None => detect_mapping(preview(&body.csv)?.headers.as_slice()),
    };
    let drafts = parse_trades(&body.csv, &mapping, offset, state.settings.import.max_rows)?;
    let imported = state.db_repo.insert_trades(ctx.id(), &drafts).await?;

    tracing::info!(account_id = %ctx.id(), imported, "CSV import complete.");
    Ok(Json(ImportedResponse::new(imported)))
}

/// # GET /api/export
pub async fn export_csv(
    State(state): State<Arc<AppState>>,
    ctx: AccountContext,
) -> Result<impl IntoResponse, AppError> {
    let trades = state.db_repo.list_trades(ctx.id()).await?;
    let csv = export_trades(&trades)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"trades.csv\""),
        ],
        csv,
    ))
}
