use axum::extract::FromRef;
use std::sync::Arc;

use crate::{
    config::Config,
    store::{CommentStore, ContentRegistry},
};

/// Shared application state. The engines are stateless, so this is just
/// the store/registry handles plus configuration; any backend pair that
/// satisfies the traits (Postgres in production, in-memory in tests) works
/// without touching the handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CommentStore>,
    pub registry: Arc<dyn ContentRegistry>,
    pub config: Config,
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
