use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::Json;
use zimage_core::error::CoreError;

use crate::error::{AppError, AppResult};
use crate::extract::AppQuery;
use crate::query::LimitParams;
use crate::response::{DataResponse, ImageEntry};
use crate::state::AppState;

/// GET /api/images?limit=N
///
/// Newest first. Unreadable sidecars are skipped by the store.
pub async fn list_images(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<LimitParams>,
) -> AppResult<Json<DataResponse<Vec<ImageEntry>>>> {
    let store = Arc::clone(&state.store);
    let records = tokio::task::spawn_blocking(move || store.list(params.limit))
        .await
        .map_err(|e| AppError::InternalError(format!("listing task failed: {e}")))??;

    Ok(Json(DataResponse {
        data: records.into_iter().map(ImageEntry::new).collect(),
    }))
}

/// GET /api/images/{filename}
///
/// Streams the artifact bytes. Any name that does not resolve to an
/// artifact inside the output directory is a 404.
pub async fn get_image(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> AppResult<Response> {
    let store = Arc::clone(&state.store);
    let name = filename.clone();
    let path = tokio::task::spawn_blocking(move || store.resolve_artifact_path(&name))
        .await
        .map_err(|e| AppError::InternalError(format!("lookup task failed: {e}")))??;

    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AppError::Core(CoreError::NotFound {
                entity: "Image",
                name: filename.clone(),
            })
        } else {
            AppError::InternalError(format!("failed to read {}: {e}", path.display()))
        }
    })?;

    Ok((
        [
            (CONTENT_TYPE, "image/png"),
            (CACHE_CONTROL, "public, max-age=31536000, immutable"),
        ],
        bytes,
    )
        .into_response())
}
