//! Request handlers.
//!
//! Handlers delegate to the [`JobExecutor`](zimage_worker::JobExecutor),
//! [`ResultStore`](zimage_store::ResultStore) and
//! [`ModelManager`](zimage_model::manager::ModelManager) held in
//! [`AppState`](crate::state::AppState) and map errors via
//! [`AppError`](crate::error::AppError).

pub mod generation;
pub mod images;
pub mod status;

use axum::Json;
use serde_json::{json, Value};

/// GET / -- shown when no frontend build is present.
pub async fn root_notice() -> Json<Value> {
    Json(json!({
        "message": "zimage API is running. Frontend not built; see /api/status and the MCP endpoint.",
    }))
}
