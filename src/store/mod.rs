// src/store/mod.rs

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::comment::{Comment, EditHistoryEntry, FlagReason, FlagState, LikeState, SortKey},
};

/// Fields the thread engine supplies when inserting a comment. The store
/// assigns the id and `created_at`, and bumps the content item's comment
/// count in the same transaction.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub content_id: i64,
    pub parent_id: Option<i64>,
    pub depth: i16,
    pub author_id: Option<i64>,
    pub display_name: String,
    pub text: String,
    pub origin_ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Persistence contract for comment rows and their like/flag/history rows.
///
/// The engines hold no mutable state of their own; every concurrency
/// guarantee lives behind this trait. Implementations must provide:
///
/// * a uniqueness constraint on `(comment_id, user_id)` for likes and for
///   flags, so concurrent "insert if absent" races resolve to one winner;
/// * transactional atomicity for `apply_edit` (history append + overwrite)
///   and `toggle_like` (row flip + counter), so readers never observe a
///   half-applied mutation;
/// * counter maintenance via atomic increments, never read-modify-write.
#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Resolve a user's handle for display-name stamping at write time.
    async fn author_handle(&self, user_id: i64) -> Result<Option<String>, AppError>;

    async fn insert_comment(&self, new: NewComment) -> Result<Comment, AppError>;

    async fn comment_by_id(&self, id: i64) -> Result<Option<Comment>, AppError>;

    /// Counts every top-level comment under a content item, inactive rows
    /// included, so page boundaries stay stable.
    async fn count_top_level(&self, content_id: i64) -> Result<i64, AppError>;

    async fn top_level_page(
        &self,
        content_id: i64,
        sort: SortKey,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Comment>, AppError>;

    /// Batched reply fetch for a set of parent ids, chronological order.
    /// Returns inactive rows too; the engine decides what survives pruning.
    async fn replies_for(&self, parent_ids: &[i64]) -> Result<Vec<Comment>, AppError>;

    /// Atomically flips the like row for `(comment_id, user_id)` and the
    /// denormalized counter, returning the resulting state.
    async fn toggle_like(&self, comment_id: i64, user_id: i64) -> Result<LikeState, AppError>;

    /// Records a flag if the user has not flagged this comment before.
    /// A duplicate is a no-op returning the current count.
    async fn record_flag(
        &self,
        comment_id: i64,
        user_id: i64,
        reason: FlagReason,
    ) -> Result<FlagState, AppError>;

    /// Idempotent marker consumed by the moderation review queue.
    async fn mark_needs_review(&self, comment_id: i64) -> Result<(), AppError>;

    /// Appends the pre-edit text to the history and overwrites the body,
    /// in one transaction. Returns the updated row.
    async fn apply_edit(
        &self,
        comment_id: i64,
        new_text: &str,
        now: DateTime<Utc>,
    ) -> Result<Comment, AppError>;

    /// Marks the comment inactive and replaces its text with the
    /// placeholder. Descendants are left untouched.
    async fn soft_delete(&self, comment_id: i64, now: DateTime<Utc>) -> Result<(), AppError>;

    /// Physically removes the comment, its descendants, and all their
    /// like/flag/history rows. Returns the number of comments removed.
    async fn hard_delete_comment(&self, comment_id: i64) -> Result<u64, AppError>;

    /// Physically removes every comment under a content item.
    async fn hard_delete_content(&self, content_id: i64) -> Result<u64, AppError>;

    /// Edit history for one comment, oldest first.
    async fn edit_history(&self, comment_id: i64) -> Result<Vec<EditHistoryEntry>, AppError>;

    /// Active comments marked `needs_review`, most recently created first.
    async fn review_queue(&self, limit: i64) -> Result<Vec<Comment>, AppError>;
}

/// Existence check against the content registry owning the items comments
/// attach to. The registry itself is an external collaborator; the core
/// only ever asks this one question.
#[async_trait]
pub trait ContentRegistry: Send + Sync {
    async fn exists(&self, content_id: i64) -> Result<bool, AppError>;
}
