use axum::extract::State;
use axum::Json;
use zimage_core::generation::GenerationRequest;

use crate::error::AppResult;
use crate::extract::AppJson;
use crate::response::{DataResponse, ImageEntry};
use crate::state::AppState;

/// POST /api/generate
///
/// Runs one generation and waits for it to finish. Returns 503 while the
/// model is not ready, 429 if another job is in flight and 400 for a
/// body that does not describe a valid request.
pub async fn generate(
    State(state): State<AppState>,
    AppJson(input): AppJson<GenerationRequest>,
) -> AppResult<Json<DataResponse<ImageEntry>>> {
    input.validate()?;

    let record = state.executor.submit(input).await?;

    Ok(Json(DataResponse {
        data: ImageEntry::new(record),
    }))
}
