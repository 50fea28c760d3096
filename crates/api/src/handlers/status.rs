use axum::extract::State;
use axum::Json;
use serde::Serialize;
use zimage_model::manager::ModelStatus;

use crate::response::DataResponse;
use crate::state::AppState;

/// Client-visible configuration.
#[derive(Debug, Serialize)]
pub struct PublicConfig {
    pub mcp_path: String,
    pub default_width: u32,
    pub default_height: u32,
    pub default_steps: u32,
    pub max_history: usize,
    pub model_repo: String,
}

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<DataResponse<ModelStatus>> {
    Json(DataResponse {
        data: state.model.status_report(),
    })
}

/// GET /api/config
pub async fn get_config(State(state): State<AppState>) -> Json<DataResponse<PublicConfig>> {
    let defaults = state.executor.defaults();
    Json(DataResponse {
        data: PublicConfig {
            mcp_path: state.config.mcp_path.clone(),
            default_width: defaults.width,
            default_height: defaults.height,
            default_steps: defaults.steps,
            max_history: state.store.max_history(),
            model_repo: state.model.model_identity().to_string(),
        },
    })
}
