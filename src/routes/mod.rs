pub mod github;
pub mod home;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Application routes without the connection-level layers (rate limiting)
/// that `main` adds on top.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home::index))
        .route("/Home/Index", get(home::index))
        .route("/Home/About", get(home::about))
        .route("/health", get(home::health))
        .route(github::INDEX_PATH, get(github::index))
        .route(github::CALLBACK_PATH, get(github::callback))
        .route(github::SIGN_OUT_PATH, get(github::sign_out))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
