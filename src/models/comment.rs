use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Text stored in place of a soft-deleted comment's body.
pub const DELETED_PLACEHOLDER: &str = "[deleted]";

/// Display name used when no author is recorded or anonymity was requested.
pub const ANONYMOUS_NAME: &str = "Anonymous";

/// Maximum comment length in characters, measured after trimming.
pub const MAX_COMMENT_CHARS: usize = 2000;

/// Maximum nesting depth: 0 = top-level, 1 = reply, 2 = reply-to-reply.
pub const MAX_DEPTH: i16 = 2;

/// Represents the 'comments' table in the database.
///
/// `origin_ip` and `user_agent` are write-once forensic fields; they are
/// never serialized, so no public read can leak them.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Comment {
    pub id: i64,
    pub content_id: i64,
    pub parent_id: Option<i64>,
    pub depth: i16,
    pub author_id: Option<i64>,
    pub display_name: String,
    pub text: String,
    pub is_edited: bool,
    pub last_edited_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub needs_review: bool,
    pub like_count: i32,
    pub flag_count: i32,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing)]
    pub origin_ip: Option<String>,
    #[serde(skip_serializing)]
    pub user_agent: Option<String>,
}

/// One row of the append-only edit history.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EditHistoryEntry {
    pub comment_id: i64,
    pub previous_text: String,
    pub edited_at: DateTime<Utc>,
}

/// DTO for creating a new comment.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(min = 1, max = 8000, message = "Comment text is required"))]
    pub text: String,

    /// Optional: the ID of the comment being replied to.
    pub parent_id: Option<i64>,

    /// Authenticated authors may still ask to be displayed as "Anonymous".
    #[serde(default)]
    pub wants_anonymous: bool,
}

/// DTO for editing an existing comment.
#[derive(Debug, Deserialize, Validate)]
pub struct EditCommentRequest {
    #[validate(length(min = 1, max = 8000, message = "Comment text is required"))]
    pub text: String,
}

/// DTO for flagging a comment. The reason is parsed against `FlagReason`
/// in the engine so an unknown value maps to `InvalidInput`, not a 422.
#[derive(Debug, Deserialize)]
pub struct FlagCommentRequest {
    pub reason: String,
}

/// Optional body for the moderator soft-delete path.
#[derive(Debug, Default, Deserialize)]
pub struct DeleteCommentRequest {
    pub reason: Option<String>,
}

/// Query parameters for fetching a thread.
#[derive(Debug, Default, Deserialize)]
pub struct ThreadParams {
    /// 1-based page over top-level comments.
    pub page: Option<u32>,

    /// Number of top-level comments per page (default: 20, max: 100).
    pub page_size: Option<u32>,

    #[serde(default)]
    pub sort: SortKey,
}

/// Sort order for top-level comments. Replies are always chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Newest,
    Oldest,
    #[serde(alias = "mostLiked")]
    MostLiked,
}

/// Accepted flag reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagReason {
    Spam,
    Harassment,
    Inappropriate,
    Other,
}

impl FlagReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagReason::Spam => "spam",
            FlagReason::Harassment => "harassment",
            FlagReason::Inappropriate => "inappropriate",
            FlagReason::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "spam" => Some(FlagReason::Spam),
            "harassment" => Some(FlagReason::Harassment),
            "inappropriate" => Some(FlagReason::Inappropriate),
            "other" => Some(FlagReason::Other),
            _ => None,
        }
    }
}

/// Result of a like toggle: the state after the call, not the action taken.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LikeState {
    pub liked: bool,
    pub like_count: i32,
}

/// Result of a flag request. `flagged` is always true after a successful
/// call; a repeat flag returns the unchanged count.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FlagState {
    pub flagged: bool,
    pub flag_count: i32,
}

/// A comment with its reply subtree attached, up to depth 2.
#[derive(Debug, Serialize)]
pub struct ThreadNode {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<ThreadNode>,
}

/// One page of a thread. `total` counts every top-level comment, inactive
/// placeholders included, so page boundaries stay stable across deletions.
#[derive(Debug, Serialize)]
pub struct ThreadPage {
    pub comments: Vec<ThreadNode>,
    pub page: u32,
    pub page_size: u32,
    pub total: i64,
}
