// src/engine/mod.rs
//
// Business rules for the comment subsystem. The engines are stateless:
// every durable fact lives behind the `CommentStore` trait, so any number
// of requests can run these functions concurrently.

pub mod interaction;
pub mod moderation;
pub mod thread;

use crate::{error::AppError, models::comment::MAX_COMMENT_CHARS, utils::html::clean_html};

/// Shared text validation for create and edit: trim, sanitize, then bound
/// the character count. The bounds apply to the sanitized form — that is
/// what gets stored, and sanitization can shrink markup-only input to
/// nothing or grow it through entity escaping.
pub(crate) fn validate_text(raw: &str) -> Result<String, AppError> {
    if raw.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "Comment text must not be empty".to_string(),
        ));
    }

    let cleaned = clean_html(raw.trim());
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Err(AppError::InvalidInput(
            "Comment text must not be empty".to_string(),
        ));
    }
    if cleaned.chars().count() > MAX_COMMENT_CHARS {
        return Err(AppError::InvalidInput(format!(
            "Comment text exceeds {} characters",
            MAX_COMMENT_CHARS
        )));
    }
    Ok(cleaned.to_string())
}
