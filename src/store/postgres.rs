// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::comment::{
        Comment, DELETED_PLACEHOLDER, EditHistoryEntry, FlagReason, FlagState, LikeState, SortKey,
    },
    store::{CommentStore, ContentRegistry, NewComment},
};

const COMMENT_COLS: &str = "id, content_id, parent_id, depth, author_id, display_name, text, \
     is_edited, last_edited_at, is_active, needs_review, like_count, flag_count, \
     created_at, deleted_at, origin_ip, user_agent";

/// Postgres-backed comment store. All multi-statement mutations run inside
/// a transaction; counters are maintained with atomic `UPDATE .. + 1`
/// statements so concurrent writers cannot lose updates.
#[derive(Clone)]
pub struct PgCommentStore {
    pool: PgPool,
}

impl PgCommentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommentStore for PgCommentStore {
    async fn author_handle(&self, user_id: i64) -> Result<Option<String>, AppError> {
        let handle = sqlx::query_scalar::<_, String>("SELECT username FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(handle)
    }

    async fn insert_comment(&self, new: NewComment) -> Result<Comment, AppError> {
        let mut tx = self.pool.begin().await?;

        let comment = sqlx::query_as::<_, Comment>(&format!(
            "INSERT INTO comments \
             (content_id, parent_id, depth, author_id, display_name, text, origin_ip, user_agent) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COMMENT_COLS}"
        ))
        .bind(new.content_id)
        .bind(new.parent_id)
        .bind(new.depth)
        .bind(new.author_id)
        .bind(&new.display_name)
        .bind(&new.text)
        .bind(&new.origin_ip)
        .bind(&new.user_agent)
        .fetch_one(&mut *tx)
        .await?;

        // Count delta the content registry may cache.
        sqlx::query("UPDATE content_items SET comments_count = comments_count + 1 WHERE id = $1")
            .bind(new.content_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(comment)
    }

    async fn comment_by_id(&self, id: i64) -> Result<Option<Comment>, AppError> {
        let comment =
            sqlx::query_as::<_, Comment>(&format!("SELECT {COMMENT_COLS} FROM comments WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(comment)
    }

    async fn count_top_level(&self, content_id: i64) -> Result<i64, AppError> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM comments WHERE content_id = $1 AND parent_id IS NULL",
        )
        .bind(content_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    async fn top_level_page(
        &self,
        content_id: i64,
        sort: SortKey,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Comment>, AppError> {
        // Fixed clauses only; nothing user-supplied is interpolated.
        let order = match sort {
            SortKey::Newest => "created_at DESC, id DESC",
            SortKey::Oldest => "created_at ASC, id ASC",
            SortKey::MostLiked => "like_count DESC, created_at ASC, id ASC",
        };

        let comments = sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COMMENT_COLS} FROM comments \
             WHERE content_id = $1 AND parent_id IS NULL \
             ORDER BY {order} LIMIT $2 OFFSET $3"
        ))
        .bind(content_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    async fn replies_for(&self, parent_ids: &[i64]) -> Result<Vec<Comment>, AppError> {
        if parent_ids.is_empty() {
            return Ok(Vec::new());
        }

        let comments = sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COMMENT_COLS} FROM comments \
             WHERE parent_id = ANY($1) \
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(parent_ids.to_vec())
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    async fn toggle_like(&self, comment_id: i64, user_id: i64) -> Result<LikeState, AppError> {
        let mut tx = self.pool.begin().await?;

        // The unique pair decides the direction: exactly one of two racing
        // inserts wins, the loser takes the delete branch on its retry-free
        // pass because the row now exists.
        let inserted = sqlx::query(
            "INSERT INTO comment_likes (comment_id, user_id) VALUES ($1, $2) \
             ON CONFLICT (comment_id, user_id) DO NOTHING",
        )
        .bind(comment_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let (liked, like_count) = if inserted == 1 {
            let count = sqlx::query_scalar::<_, i32>(
                "UPDATE comments SET like_count = like_count + 1 WHERE id = $1 RETURNING like_count",
            )
            .bind(comment_id)
            .fetch_one(&mut *tx)
            .await?;
            (true, count)
        } else {
            sqlx::query("DELETE FROM comment_likes WHERE comment_id = $1 AND user_id = $2")
                .bind(comment_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;

            let count = sqlx::query_scalar::<_, i32>(
                "UPDATE comments SET like_count = GREATEST(0, like_count - 1) \
                 WHERE id = $1 RETURNING like_count",
            )
            .bind(comment_id)
            .fetch_one(&mut *tx)
            .await?;
            (false, count)
        };

        tx.commit().await?;
        Ok(LikeState { liked, like_count })
    }

    async fn record_flag(
        &self,
        comment_id: i64,
        user_id: i64,
        reason: FlagReason,
    ) -> Result<FlagState, AppError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO comment_flags (comment_id, user_id, reason) VALUES ($1, $2, $3) \
             ON CONFLICT (comment_id, user_id) DO NOTHING",
        )
        .bind(comment_id)
        .bind(user_id)
        .bind(reason.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let flag_count = if inserted == 1 {
            sqlx::query_scalar::<_, i32>(
                "UPDATE comments SET flag_count = flag_count + 1 WHERE id = $1 RETURNING flag_count",
            )
            .bind(comment_id)
            .fetch_one(&mut *tx)
            .await?
        } else {
            // Repeat flag from the same user: report current state.
            sqlx::query_scalar::<_, i32>("SELECT flag_count FROM comments WHERE id = $1")
                .bind(comment_id)
                .fetch_one(&mut *tx)
                .await?
        };

        tx.commit().await?;
        Ok(FlagState {
            flagged: true,
            flag_count,
        })
    }

    async fn mark_needs_review(&self, comment_id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE comments SET needs_review = TRUE WHERE id = $1")
            .bind(comment_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn apply_edit(
        &self,
        comment_id: i64,
        new_text: &str,
        now: DateTime<Utc>,
    ) -> Result<Comment, AppError> {
        let mut tx = self.pool.begin().await?;

        // Lock the row so the history snapshot and the overwrite see the
        // same pre-edit text even under concurrent edits.
        let previous_text =
            sqlx::query_scalar::<_, String>("SELECT text FROM comments WHERE id = $1 FOR UPDATE")
                .bind(comment_id)
                .fetch_one(&mut *tx)
                .await?;

        sqlx::query(
            "INSERT INTO comment_edit_history (comment_id, previous_text, edited_at) \
             VALUES ($1, $2, $3)",
        )
        .bind(comment_id)
        .bind(&previous_text)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let comment = sqlx::query_as::<_, Comment>(&format!(
            "UPDATE comments SET text = $2, is_edited = TRUE, last_edited_at = $3 \
             WHERE id = $1 RETURNING {COMMENT_COLS}"
        ))
        .bind(comment_id)
        .bind(new_text)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(comment)
    }

    async fn soft_delete(&self, comment_id: i64, now: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE comments SET is_active = FALSE, text = $2, deleted_at = $3 WHERE id = $1",
        )
        .bind(comment_id)
        .bind(DELETED_PLACEHOLDER)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn hard_delete_comment(&self, comment_id: i64) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;

        let content_id =
            sqlx::query_scalar::<_, i64>("SELECT content_id FROM comments WHERE id = $1")
                .bind(comment_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(content_id) = content_id else {
            return Ok(0);
        };

        // Depth is capped at 2, so the descendant id-set is two lookups.
        let children =
            sqlx::query_scalar::<_, i64>("SELECT id FROM comments WHERE parent_id = $1")
                .bind(comment_id)
                .fetch_all(&mut *tx)
                .await?;
        let grandchildren =
            sqlx::query_scalar::<_, i64>("SELECT id FROM comments WHERE parent_id = ANY($1)")
                .bind(children.clone())
                .fetch_all(&mut *tx)
                .await?;

        let mut ids = vec![comment_id];
        ids.extend(children);
        ids.extend(grandchildren);

        // Like/flag/history rows go with the comments via FK cascade.
        let removed = sqlx::query("DELETE FROM comments WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query(
            "UPDATE content_items SET comments_count = GREATEST(0, comments_count - $2) \
             WHERE id = $1",
        )
        .bind(content_id)
        .bind(removed as i32)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(removed)
    }

    async fn hard_delete_content(&self, content_id: i64) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM comments WHERE content_id = $1")
            .bind(content_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("UPDATE content_items SET comments_count = 0 WHERE id = $1")
            .bind(content_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(removed)
    }

    async fn edit_history(&self, comment_id: i64) -> Result<Vec<EditHistoryEntry>, AppError> {
        let entries = sqlx::query_as::<_, EditHistoryEntry>(
            "SELECT comment_id, previous_text, edited_at FROM comment_edit_history \
             WHERE comment_id = $1 ORDER BY edited_at ASC, id ASC",
        )
        .bind(comment_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    async fn review_queue(&self, limit: i64) -> Result<Vec<Comment>, AppError> {
        let comments = sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COMMENT_COLS} FROM comments \
             WHERE needs_review AND is_active \
             ORDER BY created_at DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }
}

/// Registry adapter reading the local `content_items` table. In a split
/// deployment this would be a client for the real content service.
#[derive(Clone)]
pub struct PgContentRegistry {
    pool: PgPool,
}

impl PgContentRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContentRegistry for PgContentRegistry {
    async fn exists(&self, content_id: i64) -> Result<bool, AppError> {
        let found = sqlx::query_scalar::<_, i64>("SELECT id FROM content_items WHERE id = $1")
            .bind(content_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }
}
