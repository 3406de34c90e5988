use crate::{context::AccountContext, error::AppError, handlers::trades::not_found, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use core_types::{Tag, TagDraft};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagDeleted {
    pub message: String,
    pub trades_updated: u64,
}

/// # GET /api/tags
pub async fn list_tags(
    State(state): State<Arc<AppState>>,
    ctx: AccountContext,
) -> Result<Json<Vec<Tag>>, AppError> {
    Ok(Json(state.db_repo.list_tags(ctx.id()).await?))
}

/// # POST /api/tags
pub async fn create_tag(
    State(state): State<Arc<AppState>>,
    ctx: AccountContext,
    Json(body): Json<TagDraft>,
) -> Result<(StatusCode, Json<Tag>), AppError> {
    let (name, color) = body.require_all()?;
    let tag = state.db_repo.insert_tag(ctx.id(), &name, &color).await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

/// # PUT /api/tags/:id
/// Only the fields present in the body change.
pub async fn update_tag(
    State(state): State<Arc<AppState>>,
    ctx: AccountContext,
    Path(tag_id): Path<Uuid>,
    Json(body): Json<TagDraft>,
) -> Result<Json<Tag>, AppError> {
    let name = body.name.as_deref().map(str::trim);
    if name == Some("") {
        return Err(AppError::Validation("Tag name cannot be empty".to_string()));
    }
    let color = body.color.as_deref().map(str::trim).filter(|c| !c.is_empty());

    let tag = state
        .db_repo
        .update_tag(ctx.id(), tag_id, name, color)
        .await
        .map_err(|e| not_found(e, "Tag not found"))?;
    Ok(Json(tag))
}

/// # DELETE /api/tags/:id
/// Removes the tag and strips it from every trade in one transaction.
pub async fn delete_tag(
    State(state): State<Arc<AppState>>,
    ctx: AccountContext,
    Path(tag_id): Path<Uuid>,
) -> Result<Json<TagDeleted>, AppError> {
    let trades_updated = state
        .db_repo
        .delete_tag(ctx.id(), tag_id)
        .await
        .map_err(|e| not_found(e, "Tag not found"))?;
    Ok(Json(TagDeleted {
        message: "Tag deleted".to_string(),
        trades_updated,
    }))
}
