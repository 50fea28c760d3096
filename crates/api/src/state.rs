use std::sync::Arc;

use zimage_model::manager::ModelManager;
use zimage_model::pipeline::PipelineLoader;
use zimage_store::{ResultStore, StoreError};
use zimage_worker::JobExecutor;

use crate::config::ServerConfig;

/// Shared application state available to all handlers via axum's `State` extractor.
///
/// Must be `Clone` (axum requirement). Every field is an `Arc`, so clones
/// are cheap and share the same model, store and gate.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub model: Arc<ModelManager>,
    pub store: Arc<ResultStore>,
    pub executor: Arc<JobExecutor>,
}

impl AppState {
    /// Wire up the model manager, result store and executor.
    ///
    /// The model is left `Unloaded`; call [`ModelManager::spawn_load`] to
    /// start acquisition.
    pub fn new(config: ServerConfig, loader: Box<dyn PipelineLoader>) -> Result<Self, StoreError> {
        let model = Arc::new(ModelManager::new(config.model.clone(), loader));
        let store = Arc::new(ResultStore::open(&config.output_dir, config.max_history)?);
        let executor = Arc::new(JobExecutor::new(
            Arc::clone(&model),
            Arc::clone(&store),
            config.generation,
        ));

        Ok(Self {
            config: Arc::new(config),
            model,
            store,
            executor,
        })
    }
}
