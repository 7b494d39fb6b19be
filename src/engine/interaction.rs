// src/engine/interaction.rs

use crate::{
    error::AppError,
    models::comment::{Comment, FlagReason, FlagState, LikeState},
    store::CommentStore,
};

async fn active_comment(store: &dyn CommentStore, comment_id: i64) -> Result<Comment, AppError> {
    let comment = store
        .comment_by_id(comment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;
    if !comment.is_active {
        return Err(AppError::Invalid(
            "Cannot interact with a deleted comment".to_string(),
        ));
    }
    Ok(comment)
}

/// Toggles the requester's like on a comment and returns the resulting
/// state. Concurrent duplicate toggles converge on the store's unique
/// constraint rather than double-counting.
pub async fn toggle_like(
    store: &dyn CommentStore,
    comment_id: i64,
    user_id: i64,
) -> Result<LikeState, AppError> {
    active_comment(store, comment_id).await?;
    store.toggle_like(comment_id, user_id).await
}

/// Records a flag against a comment. Re-flagging is a no-op that reports
/// the current state. Crossing the configured threshold marks the comment
/// for moderator review; it is a signal, never an automatic takedown.
pub async fn flag_comment(
    store: &dyn CommentStore,
    comment_id: i64,
    user_id: i64,
    reason: &str,
    review_threshold: i32,
) -> Result<FlagState, AppError> {
    let reason = FlagReason::parse(reason).ok_or_else(|| {
        AppError::InvalidInput(
            "Flag reason must be one of: spam, harassment, inappropriate, other".to_string(),
        )
    })?;

    active_comment(store, comment_id).await?;

    let state = store.record_flag(comment_id, user_id, reason).await?;

    if state.flag_count >= review_threshold {
        store.mark_needs_review(comment_id).await?;
        tracing::info!(
            comment_id,
            flag_count = state.flag_count,
            "comment marked for review"
        );
    }

    Ok(state)
}
