// src/engine/moderation.rs

use chrono::{DateTime, Duration, Utc};

use crate::{
    engine::validate_text,
    error::AppError,
    models::comment::{Comment, EditHistoryEntry},
    store::{CommentStore, ContentRegistry},
};

/// Edits a comment's text within the edit window.
///
/// Only the recorded author may edit; anonymous comments have no recorded
/// author and can never be edited by anyone. The pre-edit text is appended
/// to the history and the overwrite happens in the same store transaction,
/// so N edits always leave N reconstructable history rows.
///
/// `now` is passed in by the caller so the window boundary is testable.
pub async fn edit_comment(
    store: &dyn CommentStore,
    comment_id: i64,
    requester_id: i64,
    new_text: &str,
    edit_window_secs: i64,
    now: DateTime<Utc>,
) -> Result<Comment, AppError> {
    let comment = store
        .comment_by_id(comment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    if !comment.is_active {
        return Err(AppError::Invalid(
            "Cannot edit a deleted comment".to_string(),
        ));
    }

    match comment.author_id {
        None => {
            return Err(AppError::Forbidden(
                "Anonymous comments cannot be edited".to_string(),
            ));
        }
        Some(author_id) if author_id != requester_id => {
            return Err(AppError::Forbidden(
                "Only the author can edit this comment".to_string(),
            ));
        }
        Some(_) => {}
    }

    if now - comment.created_at > Duration::seconds(edit_window_secs) {
        return Err(AppError::Invalid("Edit window expired".to_string()));
    }

    let text = validate_text(new_text)?;
    let updated = store.apply_edit(comment_id, &text, now).await?;

    tracing::info!(comment_id, "comment edited");
    Ok(updated)
}

/// Soft-deletes a comment: marks it inactive and swaps its text for the
/// placeholder. Allowed for the author and for moderators/admins.
/// Descendants are left alone so replies keep their context; there is no
/// transition back to active.
pub async fn soft_delete(
    store: &dyn CommentStore,
    comment_id: i64,
    requester_id: i64,
    requester_role: &str,
    reason: Option<String>,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let comment = store
        .comment_by_id(comment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    if !comment.is_active {
        return Err(AppError::Invalid("Comment is already deleted".to_string()));
    }

    let is_author = comment.author_id == Some(requester_id);
    let is_moderator = requester_role == "moderator" || requester_role == "admin";
    if !is_author && !is_moderator {
        return Err(AppError::Forbidden(
            "You are not authorized to delete this comment".to_string(),
        ));
    }

    store.soft_delete(comment_id, now).await?;

    if is_moderator && !is_author {
        tracing::info!(
            comment_id,
            moderator = requester_id,
            reason = reason.as_deref().unwrap_or("unspecified"),
            "comment removed by moderator"
        );
    } else {
        tracing::info!(comment_id, "comment removed by author");
    }
    Ok(())
}

/// Irreversibly removes a comment, its descendants, and their like, flag
/// and history rows. Admin only; meant for legal takedowns rather than
/// routine moderation.
pub async fn hard_delete_comment(
    store: &dyn CommentStore,
    comment_id: i64,
    requester_role: &str,
) -> Result<u64, AppError> {
    if requester_role != "admin" {
        return Err(AppError::Forbidden(
            "Hard deletion requires the admin role".to_string(),
        ));
    }

    if store.comment_by_id(comment_id).await?.is_none() {
        return Err(AppError::NotFound("Comment not found".to_string()));
    }

    let removed = store.hard_delete_comment(comment_id).await?;
    tracing::warn!(comment_id, removed, "comment subtree hard-deleted");
    Ok(removed)
}

/// Irreversibly removes every comment under a content item.
pub async fn hard_delete_content(
    store: &dyn CommentStore,
    registry: &dyn ContentRegistry,
    content_id: i64,
    requester_role: &str,
) -> Result<u64, AppError> {
    if requester_role != "admin" {
        return Err(AppError::Forbidden(
            "Hard deletion requires the admin role".to_string(),
        ));
    }

    if !registry.exists(content_id).await? {
        return Err(AppError::NotFound("Content item not found".to_string()));
    }

    let removed = store.hard_delete_content(content_id).await?;
    tracing::warn!(content_id, removed, "content comments hard-deleted");
    Ok(removed)
}

/// Active comments whose flag count crossed the review threshold.
pub async fn review_queue(
    store: &dyn CommentStore,
    limit: i64,
) -> Result<Vec<Comment>, AppError> {
    store.review_queue(limit.clamp(1, 200)).await
}

/// Edit history for one comment, oldest first.
pub async fn comment_history(
    store: &dyn CommentStore,
    comment_id: i64,
) -> Result<Vec<EditHistoryEntry>, AppError> {
    if store.comment_by_id(comment_id).await?.is_none() {
        return Err(AppError::NotFound("Comment not found".to_string()));
    }
    store.edit_history(comment_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{NewComment, memory::MemoryStore};

    const DAY: i64 = 24 * 3600;

    async fn seed_comment(store: &MemoryStore, content_id: i64, author_id: Option<i64>) -> Comment {
        store
            .insert_comment(NewComment {
                content_id,
                parent_id: None,
                depth: 0,
                author_id,
                display_name: author_id.map_or("Anonymous".to_string(), |_| "user".to_string()),
                text: "original".to_string(),
                origin_ip: None,
                user_agent: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn edit_chain_builds_history() {
        let store = MemoryStore::new();
        let content = store.add_content();
        let u1 = store.add_user("alice");
        let comment = seed_comment(&store, content, Some(u1)).await;

        let now = Utc::now();
        edit_comment(&store, comment.id, u1, "second", DAY, now)
            .await
            .unwrap();
        let updated = edit_comment(&store, comment.id, u1, "third", DAY, now)
            .await
            .unwrap();

        assert_eq!(updated.text, "third");
        assert!(updated.is_edited);
        assert_eq!(updated.last_edited_at, Some(now));

        let history = comment_history(&store, comment.id).await.unwrap();
        let texts: Vec<&str> = history.iter().map(|h| h.previous_text.as_str()).collect();
        assert_eq!(texts, vec!["original", "second"]);
    }

    #[tokio::test]
    async fn edit_window_boundary() {
        let store = MemoryStore::new();
        let content = store.add_content();
        let u1 = store.add_user("bob");
        let comment = seed_comment(&store, content, Some(u1)).await;

        let created = Utc::now();
        store.backdate_comment(comment.id, created);

        // 23h59m59s after creation: still editable.
        let almost = created + Duration::seconds(DAY - 1);
        edit_comment(&store, comment.id, u1, "in time", DAY, almost)
            .await
            .unwrap();

        // 24h + 1s: rejected.
        let late = created + Duration::seconds(DAY + 1);
        let err = edit_comment(&store, comment.id, u1, "too late", DAY, late)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Invalid(_)));
    }

    #[tokio::test]
    async fn anonymous_and_foreign_edits_forbidden() {
        let store = MemoryStore::new();
        let content = store.add_content();
        let u1 = store.add_user("carol");
        let u2 = store.add_user("dave");

        let anon = seed_comment(&store, content, None).await;
        let err = edit_comment(&store, anon.id, u1, "hijack", DAY, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let owned = seed_comment(&store, content, Some(u1)).await;
        let err = edit_comment(&store, owned.id, u2, "hijack", DAY, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn soft_delete_rules() {
        let store = MemoryStore::new();
        let content = store.add_content();
        let u1 = store.add_user("erin");
        let u2 = store.add_user("frank");
        let comment = seed_comment(&store, content, Some(u1)).await;

        // A random user may not delete someone else's comment.
        let err = soft_delete(&store, comment.id, u2, "user", None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        // A moderator may.
        soft_delete(
            &store,
            comment.id,
            u2,
            "moderator",
            Some("harassment".to_string()),
            Utc::now(),
        )
        .await
        .unwrap();

        let deleted = store.comment_by_id(comment.id).await.unwrap().unwrap();
        assert!(!deleted.is_active);
        assert_eq!(deleted.text, "[deleted]");
        assert!(deleted.deleted_at.is_some());

        // Deleting twice is an illegal transition.
        let err = soft_delete(&store, comment.id, u1, "user", None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Invalid(_)));

        // And the deleted comment can no longer be edited.
        let err = edit_comment(&store, comment.id, u1, "undo?", DAY, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Invalid(_)));
    }

    #[tokio::test]
    async fn hard_delete_cascades_subtree() {
        let store = MemoryStore::new();
        let content = store.add_content();
        let u1 = store.add_user("gail");

        let root = seed_comment(&store, content, Some(u1)).await;
        let child = store
            .insert_comment(NewComment {
                content_id: content,
                parent_id: Some(root.id),
                depth: 1,
                author_id: Some(u1),
                display_name: "gail".to_string(),
                text: "child".to_string(),
                origin_ip: None,
                user_agent: None,
            })
            .await
            .unwrap();
        let leaf = store
            .insert_comment(NewComment {
                content_id: content,
                parent_id: Some(child.id),
                depth: 2,
                author_id: Some(u1),
                display_name: "gail".to_string(),
                text: "leaf".to_string(),
                origin_ip: None,
                user_agent: None,
            })
            .await
            .unwrap();

        store.toggle_like(leaf.id, u1).await.unwrap();
        edit_comment(&store, root.id, u1, "edited", DAY, Utc::now())
            .await
            .unwrap();

        let err = hard_delete_comment(&store, root.id, "moderator")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let removed = hard_delete_comment(&store, root.id, "admin").await.unwrap();
        assert_eq!(removed, 3);

        assert!(store.comment_by_id(root.id).await.unwrap().is_none());
        assert!(store.comment_by_id(child.id).await.unwrap().is_none());
        assert!(store.comment_by_id(leaf.id).await.unwrap().is_none());
        assert_eq!(store.comments_count(content), 0);

        // History rows went with the comment; the lookup now 404s.
        let err = comment_history(&store, root.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
