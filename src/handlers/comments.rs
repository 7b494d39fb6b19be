use axum::{
    Extension, Json,
    body::Bytes,
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use std::net::SocketAddr;
use validator::Validate;

use crate::{
    engine::{interaction, moderation, thread},
    error::AppError,
    models::comment::{
        CreateCommentRequest, DeleteCommentRequest, EditCommentRequest, FlagCommentRequest,
        ThreadParams,
    },
    state::AppState,
    utils::{
        ip::client_ip,
        jwt::{Claims, OptionalClaims},
    },
};

/// Create a new comment on a content item.
/// Anonymous callers are allowed; the rate limiter has already run.
pub async fn create_comment(
    State(state): State<AppState>,
    Extension(OptionalClaims(claims)): Extension<OptionalClaims>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(content_id): Path<i64>,
    headers: HeaderMap,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let author_id = claims.as_ref().map(|c| c.user_id());
    let origin_ip = client_ip(&headers, Some(peer));
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string());

    let comment = thread::create_comment(
        state.store.as_ref(),
        state.registry.as_ref(),
        content_id,
        author_id,
        payload,
        origin_ip,
        user_agent,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

/// Fetch one page of a content item's comment thread.
pub async fn get_thread(
    State(state): State<AppState>,
    Path(content_id): Path<i64>,
    Query(params): Query<ThreadParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = thread::get_thread(
        state.store.as_ref(),
        state.registry.as_ref(),
        content_id,
        params,
    )
    .await?;

    Ok(Json(page))
}

/// Edit a comment's text. Author only, within the edit window.
pub async fn edit_comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<EditCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let comment = moderation::edit_comment(
        state.store.as_ref(),
        id,
        claims.user_id(),
        &payload.text,
        state.config.edit_window_secs,
        Utc::now(),
    )
    .await?;

    Ok(Json(comment))
}

/// Soft-delete a comment. Author, moderator or admin; the moderator path
/// may attach a reason in the body.
pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    // The body is optional: authors send nothing, moderators may attach
    // a reason for the audit log.
    let reason = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<DeleteCommentRequest>(&body)
            .map_err(|e| AppError::InvalidInput(e.to_string()))?
            .reason
    };

    moderation::soft_delete(
        state.store.as_ref(),
        id,
        claims.user_id(),
        &claims.role,
        reason,
        Utc::now(),
    )
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Toggle the requester's like on a comment.
pub async fn toggle_like(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let liked = interaction::toggle_like(state.store.as_ref(), id, claims.user_id()).await?;
    Ok(Json(liked))
}

/// Flag a comment for moderator attention.
pub async fn flag_comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<FlagCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let flagged = interaction::flag_comment(
        state.store.as_ref(),
        id,
        claims.user_id(),
        &payload.reason,
        state.config.flag_review_threshold,
    )
    .await?;

    Ok(Json(flagged))
}
