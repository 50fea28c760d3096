pub mod generation;
pub mod health;
pub mod images;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /generate                                        POST generate
/// /images                                          GET list (?limit)
/// /images/{filename}                               GET artifact bytes
/// /status                                          GET model lifecycle status
/// /config                                          GET public configuration
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/generate", generation::router())
        .nest("/images", images::router())
        .route("/status", get(handlers::status::get_status))
        .route("/config", get(handlers::status::get_config))
}
