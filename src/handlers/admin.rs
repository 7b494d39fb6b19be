// src/handlers/admin.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{engine::moderation, error::AppError, state::AppState, utils::jwt::Claims};

#[derive(Debug, Deserialize)]
pub struct ReviewParams {
    pub limit: Option<i64>,
}

/// Lists active comments whose flag count crossed the review threshold.
/// Admin only; this is the queue a moderation dashboard polls.
pub async fn review_queue(
    State(state): State<AppState>,
    Query(params): Query<ReviewParams>,
) -> Result<impl IntoResponse, AppError> {
    let comments =
        moderation::review_queue(state.store.as_ref(), params.limit.unwrap_or(50)).await?;
    Ok(Json(comments))
}

/// Full edit history of one comment, oldest first.
pub async fn comment_history(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let history = moderation::comment_history(state.store.as_ref(), id).await?;
    Ok(Json(history))
}

/// Hard-delete a comment subtree. Irreversible, for legal takedowns.
pub async fn hard_delete_comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    moderation::hard_delete_comment(state.store.as_ref(), id, &claims.role).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Hard-delete every comment under a content item.
pub async fn hard_delete_content(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(content_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    moderation::hard_delete_content(
        state.store.as_ref(),
        state.registry.as_ref(),
        content_id,
        &claims.role,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
