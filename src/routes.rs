// src/routes.rs

use std::sync::Arc;

use axum::{
    Router,
    http::Method,
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use tower_governor::{
    GovernorLayer, errors::GovernorError, governor::GovernorConfigBuilder,
    key_extractor::SmartIpKeyExtractor,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    error::AppError,
    handlers::{admin, comments},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware, optional_auth_middleware},
};

/// Renders rate-limiter rejections through the application error type so
/// throttled callers get the same JSON error shape as everything else.
fn throttle_response(err: GovernorError) -> Response {
    match err {
        GovernorError::TooManyRequests { wait_time, .. } => AppError::Throttled(format!(
            "Comment rate limit exceeded, retry in {}s",
            wait_time
        ))
        .into_response(),
        GovernorError::UnableToExtractKey => {
            AppError::InvalidInput("Unable to determine client address".to_string()).into_response()
        }
        GovernorError::Other { msg, .. } => {
            AppError::Unavailable(msg.unwrap_or_else(|| "rate limiter failure".to_string()))
                .into_response()
        }
    }
}

/// Assembles the main application router.
///
/// * Thread reads are public; comment creation allows anonymous callers
///   but passes the per-IP write budget first.
/// * Comment mutations (edit/delete/like/flag) require authentication.
/// * Moderation tooling sits behind auth + admin role.
/// * Global middleware (Trace, CORS) wraps everything.
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    // Per-origin write budget for comment creation. Proxy-aware key
    // extraction matches what we record as origin_ip.
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(SmartIpKeyExtractor)
            .per_second(state.config.comment_rate_per_second)
            .burst_size(state.config.comment_rate_burst)
            .finish()
            .expect("invalid rate limit configuration"),
    );

    let content_routes = Router::new()
        .route("/{content_id}/comments", get(comments::get_thread))
        .route(
            "/{content_id}/comments",
            post(comments::create_comment)
                .layer::<_, std::convert::Infallible>(middleware::from_fn_with_state(
                    state.clone(),
                    optional_auth_middleware,
                ))
                .layer(GovernorLayer::new(governor_conf).error_handler(throttle_response)),
        );

    let comment_routes = Router::new()
        .route(
            "/{id}",
            put(comments::edit_comment).delete(comments::delete_comment),
        )
        .route("/{id}/like", post(comments::toggle_like))
        .route("/{id}/flag", post(comments::flag_comment))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let admin_routes = Router::new()
        .route("/comments/review", get(admin::review_queue))
        .route("/comments/{id}/history", get(admin::comment_history))
        .route("/comments/{id}", delete(admin::hard_delete_comment))
        .route(
            "/content/{content_id}/comments",
            delete(admin::hard_delete_content),
        )
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/content", content_routes)
        .nest("/api/comments", comment_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
