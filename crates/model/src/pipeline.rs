//! The compute-resource contract.
//!
//! A [`PipelineLoader`] performs the slow one-time acquisition (download,
//! weight loading, warm-up) and yields a [`Pipeline`]. Both calls block the
//! current thread; callers run them on the blocking pool.

use std::path::PathBuf;

use zimage_core::generation::InferenceParams;

use crate::config::Dtype;
use crate::parallelism::Parallelism;

/// Everything a loader needs to acquire the resource.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub repo_id: String,
    pub cache_dir: PathBuf,
    pub dtype: Dtype,
    pub parallelism: Parallelism,
}

/// A loaded image-generation pipeline.
///
/// `generate` must be deterministic: the same parameters (including the
/// seed) produce byte-identical output.
pub trait Pipeline: Send + Sync {
    /// Render one image and return it encoded as PNG.
    fn generate(&self, params: &InferenceParams) -> Result<Vec<u8>, PipelineError>;
}

/// Acquires a [`Pipeline`]. Called at most once per process.
pub trait PipelineLoader: Send + Sync {
    fn load(&self, options: &LoadOptions) -> Result<Box<dyn Pipeline>, PipelineError>;
}

/// Errors raised by a pipeline or its loader.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The parameters cannot be rendered by this pipeline.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The resource failed (weights missing, out of memory, encoder error...).
    #[error("{0}")]
    Resource(String),
}
