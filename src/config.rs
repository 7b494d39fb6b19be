// src/config.rs

use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,

    /// Flag count at which a comment is marked for moderator review.
    pub flag_review_threshold: i32,

    /// How long after creation a comment stays editable, in seconds.
    pub edit_window_secs: i64,

    /// Per-IP write budget for comment creation (token bucket).
    pub comment_rate_per_second: u64,
    pub comment_rate_burst: u32,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86400);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let flag_review_threshold = env::var("FLAG_REVIEW_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        let edit_window_secs = env::var("EDIT_WINDOW_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(24 * 3600);

        let comment_rate_per_second = env::var("COMMENT_RATE_PER_SECOND")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(2);

        let comment_rate_burst = env::var("COMMENT_RATE_BURST")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            flag_review_threshold,
            edit_window_secs,
            comment_rate_per_second,
            comment_rate_burst,
        }
    }
}
