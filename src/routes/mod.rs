pub mod admin;
pub mod auth;
pub mod home;
pub mod multipart;
pub mod posts;
pub mod profile;
pub mod uploads;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Largest accepted request body, uploads included.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home::index))
        .route("/about", get(home::about))
        .route("/static/uploads/{filename}", get(uploads::serve))
        .merge(auth::router())
        .merge(posts::router())
        .merge(profile::router())
        .merge(admin::router())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
