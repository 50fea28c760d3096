//! Single-flight job executor.
//!
//! [`JobExecutor::submit`] is the only way to run a generation. At most
//! one job is in flight at a time; a second caller is turned away with
//! [`ExecutorError::Busy`] instead of queuing. The gate covers default
//! resolution, inference and persistence. It is held by the blocking task
//! doing the work, so it stays held until that work has finished even if
//! the caller's future is dropped.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use zimage_core::error::CoreError;
use zimage_core::generation::{self, GenerationDefaults, GenerationRequest};
use zimage_core::job::{new_job_id, JobRecord};
use zimage_model::manager::{ModelError, ModelManager};
use zimage_store::ResultStore;

/// Prompt characters included in log lines.
const LOGGED_PROMPT_CHARS: usize = 100;

/// Errors returned by [`JobExecutor::submit`].
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("Model is not loaded yet ({0}). Please wait.")]
    NotReady(String),

    #[error("Another image is currently being generated. Please wait.")]
    Busy,

    /// Inference or persistence failed. The job was not recorded.
    #[error("{0}")]
    Generation(String),
}

impl From<ExecutorError> for CoreError {
    fn from(err: ExecutorError) -> Self {
        let message = err.to_string();
        match err {
            ExecutorError::NotReady(_) => CoreError::NotReady(message),
            ExecutorError::Busy => CoreError::Busy(message),
            ExecutorError::Generation(_) => CoreError::Generation(message),
        }
    }
}

/// Runs generation jobs one at a time against the shared model.
pub struct JobExecutor {
    model: Arc<ModelManager>,
    store: Arc<ResultStore>,
    defaults: GenerationDefaults,
    /// Single permit: holding it means a job is in flight.
    gate: Arc<Semaphore>,
}

impl JobExecutor {
    pub fn new(
        model: Arc<ModelManager>,
        store: Arc<ResultStore>,
        defaults: GenerationDefaults,
    ) -> Self {
        Self {
            model,
            store,
            defaults,
            gate: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn defaults(&self) -> &GenerationDefaults {
        &self.defaults
    }

    /// Whether a job currently holds the gate.
    pub fn is_busy(&self) -> bool {
        self.gate.available_permits() == 0
    }

    /// Run one generation job and persist its result.
    ///
    /// Fails immediately with [`ExecutorError::NotReady`] or
    /// [`ExecutorError::Busy`] without blocking. Failures past the gate are
    /// reported as [`ExecutorError::Generation`] and leave the model state
    /// untouched.
    pub async fn submit(&self, request: GenerationRequest) -> Result<JobRecord, ExecutorError> {
        let state = self.model.status();
        if !state.is_ready() {
            return Err(ExecutorError::NotReady(state.to_string()));
        }

        let permit = Arc::clone(&self.gate)
            .try_acquire_owned()
            .map_err(|_| ExecutorError::Busy)?;

        let job = Job {
            model: Arc::clone(&self.model),
            store: Arc::clone(&self.store),
            defaults: self.defaults,
        };

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job.run(request)
        })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Generation task aborted");
            ExecutorError::Generation(format!("Generation task aborted: {e}"))
        })?
    }
}

/// Everything one job needs, moved onto the blocking pool.
struct Job {
    model: Arc<ModelManager>,
    store: Arc<ResultStore>,
    defaults: GenerationDefaults,
}

impl Job {
    fn run(self, request: GenerationRequest) -> Result<JobRecord, ExecutorError> {
        let job_id = new_job_id();
        let params = generation::resolve(request, &self.defaults);

        tracing::info!(
            job_id = %job_id,
            width = params.width,
            height = params.height,
            steps = params.steps,
            seed = params.seed,
            prompt = %params.prompt.chars().take(LOGGED_PROMPT_CHARS).collect::<String>(),
            "Generating image",
        );

        let started = Instant::now();
        let artifact = self.model.invoke(&params).map_err(|e| {
            tracing::error!(job_id = %job_id, error = %e, "Image generation failed");
            match e {
                ModelError::NotReady(state) => ExecutorError::NotReady(state.to_string()),
                ModelError::Pipeline(e) => ExecutorError::Generation(e.to_string()),
            }
        })?;
        let elapsed = started.elapsed();

        let record = JobRecord::new(
            job_id,
            params,
            elapsed,
            chrono::Utc::now(),
            self.model.model_identity(),
        );

        self.store.persist(&record, &artifact).map_err(|e| {
            tracing::error!(job_id = %record.id, error = %e, "Failed to persist job result");
            ExecutorError::Generation(e.to_string())
        })?;

        tracing::info!(
            job_id = %record.id,
            filename = %record.filename,
            elapsed_secs = record.generation_time_seconds,
            "Image generated",
        );
        Ok(record)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
