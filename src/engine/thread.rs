// src/engine/thread.rs

use std::collections::HashMap;

use crate::{
    engine::validate_text,
    error::AppError,
    models::comment::{
        ANONYMOUS_NAME, Comment, CreateCommentRequest, MAX_DEPTH, ThreadNode, ThreadPage,
        ThreadParams,
    },
    store::{CommentStore, ContentRegistry, NewComment},
};

/// Validates and inserts a new comment.
///
/// * The content item must exist (checked against the registry).
/// * Replies must point at an active parent under the same content item,
///   and the tree is capped at three levels (depth 0, 1, 2).
/// * The display name is stamped at write time: "Anonymous" for token-less
///   authors and for authors who asked for anonymity, the profile handle
///   otherwise.
pub async fn create_comment(
    store: &dyn CommentStore,
    registry: &dyn ContentRegistry,
    content_id: i64,
    author_id: Option<i64>,
    payload: CreateCommentRequest,
    origin_ip: Option<String>,
    user_agent: Option<String>,
) -> Result<Comment, AppError> {
    if !registry.exists(content_id).await? {
        return Err(AppError::NotFound("Content item not found".to_string()));
    }

    let text = validate_text(&payload.text)?;

    let depth = match payload.parent_id {
        Some(parent_id) => {
            let parent = store
                .comment_by_id(parent_id)
                .await?
                .ok_or_else(|| AppError::InvalidInput("Parent comment not found".to_string()))?;

            if parent.content_id != content_id {
                return Err(AppError::InvalidInput(
                    "Parent comment belongs to a different content item".to_string(),
                ));
            }
            if !parent.is_active {
                return Err(AppError::InvalidInput(
                    "Cannot reply to a deleted comment".to_string(),
                ));
            }
            if parent.depth >= MAX_DEPTH {
                return Err(AppError::InvalidInput("Nesting too deep".to_string()));
            }
            parent.depth + 1
        }
        None => 0,
    };

    let display_name = match author_id {
        None => ANONYMOUS_NAME.to_string(),
        Some(_) if payload.wants_anonymous => ANONYMOUS_NAME.to_string(),
        Some(user_id) => store
            .author_handle(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Author profile not found".to_string()))?,
    };

    let comment = store
        .insert_comment(NewComment {
            content_id,
            parent_id: payload.parent_id,
            depth,
            author_id,
            display_name,
            text,
            origin_ip,
            user_agent,
        })
        .await?;

    tracing::info!(
        comment_id = comment.id,
        content_id,
        depth = comment.depth,
        "comment created"
    );
    Ok(comment)
}

/// Fetches one page of a thread: top-level comments in the requested sort
/// order, each carrying its reply subtree in chronological order.
///
/// Pagination runs over every top-level row, inactive placeholders
/// included, so deletions never shift page boundaries. After slicing, a
/// node survives only if it is active or still has an active descendant:
/// an inactive parent is kept as a placeholder to preserve the thread
/// structure, a childless inactive row drops out.
pub async fn get_thread(
    store: &dyn CommentStore,
    registry: &dyn ContentRegistry,
    content_id: i64,
    params: ThreadParams,
) -> Result<ThreadPage, AppError> {
    if !registry.exists(content_id).await? {
        return Err(AppError::NotFound("Content item not found".to_string()));
    }

    let page = params.page.unwrap_or(1).max(1);
    let page_size = params.page_size.unwrap_or(20).clamp(1, 100);
    let offset = i64::from(page - 1) * i64::from(page_size);

    let total = store.count_top_level(content_id).await?;
    let top = store
        .top_level_page(content_id, params.sort, i64::from(page_size), offset)
        .await?;

    let top_ids: Vec<i64> = top.iter().map(|c| c.id).collect();
    let level_one = store.replies_for(&top_ids).await?;
    let level_one_ids: Vec<i64> = level_one.iter().map(|c| c.id).collect();
    let level_two = store.replies_for(&level_one_ids).await?;

    // Group replies under their parents; reply ordering from the store is
    // already chronological.
    let mut leaves: HashMap<i64, Vec<Comment>> = HashMap::new();
    for reply in level_two {
        if let Some(parent) = reply.parent_id {
            leaves.entry(parent).or_default().push(reply);
        }
    }
    let mut branches: HashMap<i64, Vec<ThreadNode>> = HashMap::new();
    for reply in level_one {
        let replies: Vec<ThreadNode> = leaves
            .remove(&reply.id)
            .unwrap_or_default()
            .into_iter()
            .filter(|leaf| leaf.is_active)
            .map(|leaf| ThreadNode {
                comment: leaf,
                replies: Vec::new(),
            })
            .collect();

        if reply.is_active || !replies.is_empty() {
            if let Some(parent) = reply.parent_id {
                branches
                    .entry(parent)
                    .or_default()
                    .push(ThreadNode { comment: reply, replies });
            }
        }
    }

    let comments: Vec<ThreadNode> = top
        .into_iter()
        .filter_map(|comment| {
            let replies = branches.remove(&comment.id).unwrap_or_default();
            if comment.is_active || !replies.is_empty() {
                Some(ThreadNode { comment, replies })
            } else {
                None
            }
        })
        .collect();

    Ok(ThreadPage {
        comments,
        page,
        page_size,
        total,
    })
}
