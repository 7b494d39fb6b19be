// src/store/memory.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use crate::{
    error::AppError,
    models::comment::{
        Comment, DELETED_PLACEHOLDER, EditHistoryEntry, FlagReason, FlagState, LikeState, SortKey,
    },
    store::{CommentStore, ContentRegistry, NewComment},
};

#[derive(Default)]
struct Inner {
    next_comment_id: i64,
    next_user_id: i64,
    next_content_id: i64,
    comments: BTreeMap<i64, Comment>,
    likes: BTreeSet<(i64, i64)>,
    flags: BTreeMap<(i64, i64), (FlagReason, DateTime<Utc>)>,
    history: Vec<EditHistoryEntry>,
    users: BTreeMap<i64, String>,
    contents: BTreeMap<i64, i64>, // content_id -> comments_count
}

/// In-memory backend implementing both the comment store and the content
/// registry. The comment arena is a flat id-keyed map with `parent_id` as
/// a lookup key, so the hard-delete cascade is a plain id-set computation.
///
/// A single mutex makes every operation atomic, which is exactly the
/// guarantee the Postgres adapter gets from transactions and unique
/// constraints. Used by the test suites and by local development without
/// a database.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, AppError> {
        self.inner
            .lock()
            .map_err(|_| AppError::Unavailable("memory store lock poisoned".to_string()))
    }

    /// Test/dev fixture: register a user and return its id.
    pub fn add_user(&self, username: &str) -> i64 {
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        inner.next_user_id += 1;
        let id = inner.next_user_id;
        inner.users.insert(id, username.to_string());
        id
    }

    /// Test/dev fixture: register a content item and return its id.
    pub fn add_content(&self) -> i64 {
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        inner.next_content_id += 1;
        let id = inner.next_content_id;
        inner.contents.insert(id, 0);
        id
    }

    /// Test fixture: rewrite a comment's creation time so edit-window
    /// boundaries can be exercised without sleeping.
    pub fn backdate_comment(&self, comment_id: i64, created_at: DateTime<Utc>) {
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        if let Some(comment) = inner.comments.get_mut(&comment_id) {
            comment.created_at = created_at;
        }
    }

    /// Cached comment count for a content item (the delta consumers see).
    pub fn comments_count(&self, content_id: i64) -> i64 {
        let inner = self.inner.lock().expect("memory store lock poisoned");
        inner.contents.get(&content_id).copied().unwrap_or(0)
    }
}

fn descendant_ids(inner: &Inner, root: i64) -> Vec<i64> {
    let children: Vec<i64> = inner
        .comments
        .values()
        .filter(|c| c.parent_id == Some(root))
        .map(|c| c.id)
        .collect();
    let grandchildren: Vec<i64> = inner
        .comments
        .values()
        .filter(|c| c.parent_id.is_some_and(|p| children.contains(&p)))
        .map(|c| c.id)
        .collect();

    let mut ids = vec![root];
    ids.extend(children);
    ids.extend(grandchildren);
    ids
}

fn purge(inner: &mut Inner, ids: &[i64]) -> u64 {
    let mut removed = 0;
    for id in ids {
        if let Some(comment) = inner.comments.remove(id) {
            removed += 1;
            if let Some(count) = inner.contents.get_mut(&comment.content_id) {
                *count = (*count - 1).max(0);
            }
        }
    }
    inner.likes.retain(|(cid, _)| !ids.contains(cid));
    inner.flags.retain(|(cid, _), _| !ids.contains(cid));
    inner.history.retain(|h| !ids.contains(&h.comment_id));
    removed
}

#[async_trait]
impl CommentStore for MemoryStore {
    async fn author_handle(&self, user_id: i64) -> Result<Option<String>, AppError> {
        let inner = self.lock()?;
        Ok(inner.users.get(&user_id).cloned())
    }

    async fn insert_comment(&self, new: NewComment) -> Result<Comment, AppError> {
        let mut inner = self.lock()?;
        inner.next_comment_id += 1;
        let id = inner.next_comment_id;

        let comment = Comment {
            id,
            content_id: new.content_id,
            parent_id: new.parent_id,
            depth: new.depth,
            author_id: new.author_id,
            display_name: new.display_name,
            text: new.text,
            is_edited: false,
            last_edited_at: None,
            is_active: true,
            needs_review: false,
            like_count: 0,
            flag_count: 0,
            created_at: Utc::now(),
            deleted_at: None,
            origin_ip: new.origin_ip,
            user_agent: new.user_agent,
        };

        inner.comments.insert(id, comment.clone());
        if let Some(count) = inner.contents.get_mut(&new.content_id) {
            *count += 1;
        }
        Ok(comment)
    }

    async fn comment_by_id(&self, id: i64) -> Result<Option<Comment>, AppError> {
        let inner = self.lock()?;
        Ok(inner.comments.get(&id).cloned())
    }

    async fn count_top_level(&self, content_id: i64) -> Result<i64, AppError> {
        let inner = self.lock()?;
        Ok(inner
            .comments
            .values()
            .filter(|c| c.content_id == content_id && c.parent_id.is_none())
            .count() as i64)
    }

    async fn top_level_page(
        &self,
        content_id: i64,
        sort: SortKey,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Comment>, AppError> {
        let inner = self.lock()?;
        let mut top: Vec<Comment> = inner
            .comments
            .values()
            .filter(|c| c.content_id == content_id && c.parent_id.is_none())
            .cloned()
            .collect();

        match sort {
            SortKey::Newest => top.sort_by(|a, b| {
                b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))
            }),
            SortKey::Oldest => top.sort_by(|a, b| {
                a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))
            }),
            SortKey::MostLiked => top.sort_by(|a, b| {
                b.like_count
                    .cmp(&a.like_count)
                    .then(a.created_at.cmp(&b.created_at))
                    .then(a.id.cmp(&b.id))
            }),
        }

        Ok(top
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn replies_for(&self, parent_ids: &[i64]) -> Result<Vec<Comment>, AppError> {
        let inner = self.lock()?;
        let mut replies: Vec<Comment> = inner
            .comments
            .values()
            .filter(|c| c.parent_id.is_some_and(|p| parent_ids.contains(&p)))
            .cloned()
            .collect();
        replies.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(replies)
    }

    async fn toggle_like(&self, comment_id: i64, user_id: i64) -> Result<LikeState, AppError> {
        let mut inner = self.lock()?;
        if !inner.comments.contains_key(&comment_id) {
            return Err(AppError::NotFound("Comment not found".to_string()));
        }

        let key = (comment_id, user_id);
        let liked = if inner.likes.remove(&key) {
            false
        } else {
            inner.likes.insert(key);
            true
        };

        let comment = inner
            .comments
            .get_mut(&comment_id)
            .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;
        comment.like_count = if liked {
            comment.like_count + 1
        } else {
            (comment.like_count - 1).max(0)
        };

        Ok(LikeState {
            liked,
            like_count: comment.like_count,
        })
    }

    async fn record_flag(
        &self,
        comment_id: i64,
        user_id: i64,
        reason: FlagReason,
    ) -> Result<FlagState, AppError> {
        let mut inner = self.lock()?;
        if !inner.comments.contains_key(&comment_id) {
            return Err(AppError::NotFound("Comment not found".to_string()));
        }

        let key = (comment_id, user_id);
        let is_new = !inner.flags.contains_key(&key);
        if is_new {
            inner.flags.insert(key, (reason, Utc::now()));
        }

        let comment = inner
            .comments
            .get_mut(&comment_id)
            .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;
        if is_new {
            comment.flag_count += 1;
        }

        Ok(FlagState {
            flagged: true,
            flag_count: comment.flag_count,
        })
    }

    async fn mark_needs_review(&self, comment_id: i64) -> Result<(), AppError> {
        let mut inner = self.lock()?;
        if let Some(comment) = inner.comments.get_mut(&comment_id) {
            comment.needs_review = true;
        }
        Ok(())
    }

    async fn apply_edit(
        &self,
        comment_id: i64,
        new_text: &str,
        now: DateTime<Utc>,
    ) -> Result<Comment, AppError> {
        let mut inner = self.lock()?;
        let previous_text = inner
            .comments
            .get(&comment_id)
            .map(|c| c.text.clone())
            .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

        inner.history.push(EditHistoryEntry {
            comment_id,
            previous_text,
            edited_at: now,
        });

        let comment = inner
            .comments
            .get_mut(&comment_id)
            .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;
        comment.text = new_text.to_string();
        comment.is_edited = true;
        comment.last_edited_at = Some(now);
        Ok(comment.clone())
    }

    async fn soft_delete(&self, comment_id: i64, now: DateTime<Utc>) -> Result<(), AppError> {
        let mut inner = self.lock()?;
        if let Some(comment) = inner.comments.get_mut(&comment_id) {
            comment.is_active = false;
            comment.text = DELETED_PLACEHOLDER.to_string();
            comment.deleted_at = Some(now);
        }
        Ok(())
    }

    async fn hard_delete_comment(&self, comment_id: i64) -> Result<u64, AppError> {
        let mut inner = self.lock()?;
        if !inner.comments.contains_key(&comment_id) {
            return Ok(0);
        }
        let ids = descendant_ids(&inner, comment_id);
        Ok(purge(&mut inner, &ids))
    }

    async fn hard_delete_content(&self, content_id: i64) -> Result<u64, AppError> {
        let mut inner = self.lock()?;
        let ids: Vec<i64> = inner
            .comments
            .values()
            .filter(|c| c.content_id == content_id)
            .map(|c| c.id)
            .collect();
        Ok(purge(&mut inner, &ids))
    }

    async fn edit_history(&self, comment_id: i64) -> Result<Vec<EditHistoryEntry>, AppError> {
        let inner = self.lock()?;
        Ok(inner
            .history
            .iter()
            .filter(|h| h.comment_id == comment_id)
            .cloned()
            .collect())
    }

    async fn review_queue(&self, limit: i64) -> Result<Vec<Comment>, AppError> {
        let inner = self.lock()?;
        let mut flagged: Vec<Comment> = inner
            .comments
            .values()
            .filter(|c| c.needs_review && c.is_active)
            .cloned()
            .collect();
        flagged.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        flagged.truncate(limit.max(0) as usize);
        Ok(flagged)
    }
}

#[async_trait]
impl ContentRegistry for MemoryStore {
    async fn exists(&self, content_id: i64) -> Result<bool, AppError> {
        let inner = self.lock()?;
        Ok(inner.contents.contains_key(&content_id))
    }
}
