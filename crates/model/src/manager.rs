//! Model lifecycle management.
//!
//! [`ModelManager`] owns the single pipeline instance for the process. The
//! lifecycle is `Unloaded -> Loading -> Ready | Failed`. It is published
//! through a [`tokio::sync::watch`] channel, so [`ModelManager::status`]
//! never waits behind a load or an inference call. A failed load stays
//! failed until the process restarts.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use serde::Serialize;
use tokio::sync::watch;
use zimage_core::error::CoreError;
use zimage_core::generation::InferenceParams;

use crate::config::{Dtype, ModelConfig};
use crate::parallelism::Parallelism;
use crate::pipeline::{LoadOptions, Pipeline, PipelineError, PipelineLoader};

/// Lifecycle state of the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelState {
    Unloaded,
    Loading,
    Ready,
    /// Terminal: the load failed with the captured reason.
    Failed(String),
}

impl ModelState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl fmt::Display for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unloaded => f.write_str("unloaded"),
            Self::Loading => f.write_str("loading"),
            Self::Ready => f.write_str("ready"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Status snapshot reported to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelStatus {
    pub is_loaded: bool,
    pub is_loading: bool,
    pub error: Option<String>,
    pub model_repo: String,
    pub dtype: Dtype,
}

/// Errors returned by [`ModelManager::invoke`].
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model is not loaded yet ({0})")]
    NotReady(ModelState),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl From<ModelError> for CoreError {
    fn from(err: ModelError) -> Self {
        let message = err.to_string();
        match err {
            ModelError::NotReady(_) => CoreError::NotReady(message),
            ModelError::Pipeline(_) => CoreError::Generation(message),
        }
    }
}

/// Owns the pipeline and its lifecycle state.
///
/// Created once at startup and shared behind an `Arc`.
pub struct ModelManager {
    config: ModelConfig,
    loader: Box<dyn PipelineLoader>,
    state: watch::Sender<ModelState>,
    /// Set exactly once, immediately before the `Ready` transition.
    pipeline: OnceLock<Box<dyn Pipeline>>,
}

impl ModelManager {
    pub fn new(config: ModelConfig, loader: Box<dyn PipelineLoader>) -> Self {
        let (state, _) = watch::channel(ModelState::Unloaded);
        Self {
            config,
            loader,
            state,
            pipeline: OnceLock::new(),
        }
    }

    /// Current lifecycle state. Never blocks on a load or inference.
    pub fn status(&self) -> ModelState {
        self.state.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.state.borrow().is_ready()
    }

    /// Status in the shape served by the status endpoint.
    pub fn status_report(&self) -> ModelStatus {
        let state = self.status();
        ModelStatus {
            is_loaded: state.is_ready(),
            is_loading: state == ModelState::Loading,
            error: match state {
                ModelState::Failed(reason) => Some(reason),
                _ => None,
            },
            model_repo: self.config.repo_id.clone(),
            dtype: self.config.dtype,
        }
    }

    /// Identity string recorded on every job this model produces.
    pub fn model_identity(&self) -> &str {
        &self.config.repo_id
    }

    /// Subscribe to lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<ModelState> {
        self.state.subscribe()
    }

    /// Load the model on the calling thread.
    ///
    /// Returns immediately when a load is already in progress, has
    /// succeeded, or has failed.
    pub fn load(&self) {
        if self.begin_load() {
            self.acquire();
        }
    }

    /// Start loading on the blocking thread pool.
    ///
    /// The `Unloaded -> Loading` transition happens before this returns, so
    /// callers observe `Loading` immediately. Returns `None` when no load
    /// was started.
    pub fn spawn_load(self: &Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        if !self.begin_load() {
            return None;
        }
        let manager = Arc::clone(self);
        Some(tokio::task::spawn_blocking(move || manager.acquire()))
    }

    /// Wait until no load is in progress and return the settled state.
    pub async fn wait_settled(&self) -> ModelState {
        let mut rx = self.subscribe();
        let settled = match rx.wait_for(|state| *state != ModelState::Loading).await {
            Ok(state) => state.clone(),
            Err(_) => self.status(),
        };
        settled
    }

    /// Run the held pipeline. Fails with [`ModelError::NotReady`] unless the
    /// model is `Ready`. Calls are not serialised here.
    pub fn invoke(&self, params: &InferenceParams) -> Result<Vec<u8>, ModelError> {
        let state = self.status();
        if !state.is_ready() {
            return Err(ModelError::NotReady(state));
        }
        let pipeline = self
            .pipeline
            .get()
            .ok_or(ModelError::NotReady(ModelState::Loading))?;
        Ok(pipeline.generate(params)?)
    }

    // ---- private helpers ----

    /// Atomically claim the `Unloaded -> Loading` transition.
    fn begin_load(&self) -> bool {
        let claimed = self.state.send_if_modified(|state| {
            if *state == ModelState::Unloaded {
                *state = ModelState::Loading;
                true
            } else {
                false
            }
        });
        if !claimed {
            tracing::debug!(state = %self.status(), "Model load already requested, skipping");
        }
        claimed
    }

    /// Acquire the pipeline and publish the terminal state. No lock is held
    /// while the loader runs.
    fn acquire(&self) {
        let parallelism = Parallelism::resolve(self.config.num_threads);
        tracing::info!(
            threads = parallelism.threads,
            interop_threads = parallelism.interop_threads,
            "Configured model parallelism",
        );

        let options = LoadOptions {
            repo_id: self.config.repo_id.clone(),
            cache_dir: self.config.cache_dir.clone(),
            dtype: self.config.dtype,
            parallelism,
        };
        tracing::info!(
            model = %options.repo_id,
            cache_dir = %options.cache_dir.display(),
            dtype = %options.dtype,
            "Loading model",
        );

        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.loader.load(&options)));

        let next = match outcome {
            Ok(Ok(pipeline)) => {
                if self.pipeline.set(pipeline).is_err() {
                    tracing::warn!("Pipeline handle was already set, keeping the first one");
                }
                tracing::info!(
                    model = %self.config.repo_id,
                    elapsed_secs = started.elapsed().as_secs_f64(),
                    "Model loaded",
                );
                ModelState::Ready
            }
            Ok(Err(e)) => {
                let reason = format!("Failed to load model: {e}");
                tracing::error!(model = %self.config.repo_id, error = %reason, "Model load failed");
                ModelState::Failed(reason)
            }
            Err(payload) => {
                let reason = format!("Failed to load model: {}", panic_message(&*payload));
                tracing::error!(model = %self.config.repo_id, error = %reason, "Model loader panicked");
                ModelState::Failed(reason)
            }
        };

        self.state.send_replace(next);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "loader panicked".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Mutex};
    use std::time::Duration;

    use assert_matches::assert_matches;

    use super::*;

    /// Echoes the seed back so tests can see the call went through.
    struct EchoPipeline;

    impl Pipeline for EchoPipeline {
        fn generate(&self, params: &InferenceParams) -> Result<Vec<u8>, PipelineError> {
            Ok(params.seed.to_le_bytes().to_vec())
        }
    }

    /// Counts acquisitions and optionally waits for a release signal.
    #[derive(Default)]
    struct CountingLoader {
        loads: Arc<AtomicUsize>,
        release: Option<Mutex<mpsc::Receiver<()>>>,
        fail_with: Option<String>,
    }

    impl PipelineLoader for CountingLoader {
        fn load(&self, _options: &LoadOptions) -> Result<Box<dyn Pipeline>, PipelineError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if let Some(release) = &self.release {
                let _ = release.lock().unwrap().recv();
            }
            match &self.fail_with {
                Some(reason) => Err(PipelineError::Resource(reason.clone())),
                None => Ok(Box::new(EchoPipeline)),
            }
        }
    }

    struct PanickingLoader;

    impl PipelineLoader for PanickingLoader {
        fn load(&self, _options: &LoadOptions) -> Result<Box<dyn Pipeline>, PipelineError> {
            panic!("weights corrupted");
        }
    }

    fn params(seed: u64) -> InferenceParams {
        InferenceParams {
            prompt: "a red fox, photo".into(),
            width: 8,
            height: 8,
            steps: 1,
            guidance_scale: 0.0,
            seed,
        }
    }

    fn manager(loader: impl PipelineLoader + 'static) -> Arc<ModelManager> {
        let config = ModelConfig {
            num_threads: 2,
            ..ModelConfig::default()
        };
        Arc::new(ModelManager::new(config, Box::new(loader)))
    }

    #[test]
    fn starts_unloaded() {
        let manager = manager(CountingLoader::default());
        assert_eq!(manager.status(), ModelState::Unloaded);
        let report = manager.status_report();
        assert!(!report.is_loaded);
        assert!(!report.is_loading);
        assert_eq!(report.error, None);
        assert_eq!(report.model_repo, "Tongyi-MAI/Z-Image-Turbo");
    }

    #[test]
    fn load_transitions_to_ready() {
        let manager = manager(CountingLoader::default());
        manager.load();
        assert_eq!(manager.status(), ModelState::Ready);
        assert!(manager.status_report().is_loaded);
    }

    #[test]
    fn load_is_idempotent_once_ready() {
        let loads = Arc::new(AtomicUsize::new(0));
        let manager = manager(CountingLoader {
            loads: Arc::clone(&loads),
            ..CountingLoader::default()
        });
        manager.load();
        manager.load();
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_load_is_terminal() {
        let loads = Arc::new(AtomicUsize::new(0));
        let manager = manager(CountingLoader {
            loads: Arc::clone(&loads),
            fail_with: Some("no space left on device".into()),
            ..CountingLoader::default()
        });
        manager.load();
        assert_matches!(manager.status(), ModelState::Failed(reason) if reason.contains("no space left"));

        manager.load();
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        let report = manager.status_report();
        assert!(!report.is_loaded);
        assert!(report.error.unwrap().starts_with("Failed to load model"));
    }

    #[test]
    fn loader_panic_is_captured_as_failure() {
        let manager = manager(PanickingLoader);
        manager.load();
        assert_matches!(manager.status(), ModelState::Failed(reason) if reason.contains("weights corrupted"));
    }

    #[test]
    fn invoke_before_ready_fails_with_not_ready() {
        let manager = manager(CountingLoader::default());
        assert_matches!(
            manager.invoke(&params(1)),
            Err(ModelError::NotReady(ModelState::Unloaded))
        );
    }

    #[test]
    fn invoke_after_ready_reaches_pipeline() {
        let manager = manager(CountingLoader::default());
        manager.load();
        assert_eq!(manager.invoke(&params(7)).unwrap(), 7u64.to_le_bytes().to_vec());
    }

    #[test]
    fn not_ready_maps_to_core_error() {
        let err: CoreError = ModelError::NotReady(ModelState::Loading).into();
        assert_matches!(err, CoreError::NotReady(msg) if msg.contains("loading"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn status_is_readable_while_loading() {
        let (release_tx, release_rx) = mpsc::channel();
        let manager = manager(CountingLoader {
            release: Some(Mutex::new(release_rx)),
            ..CountingLoader::default()
        });

        let handle = manager.spawn_load().expect("load should start");
        assert_eq!(manager.status(), ModelState::Loading);
        assert!(manager.status_report().is_loading);
        assert_matches!(manager.invoke(&params(1)), Err(ModelError::NotReady(ModelState::Loading)));

        release_tx.send(()).unwrap();
        handle.await.unwrap();
        assert_eq!(manager.status(), ModelState::Ready);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_loads_acquire_once() {
        let (release_tx, release_rx) = mpsc::channel();
        let loads = Arc::new(AtomicUsize::new(0));
        let manager = manager(CountingLoader {
            loads: Arc::clone(&loads),
            release: Some(Mutex::new(release_rx)),
            ..CountingLoader::default()
        });

        let first = {
            let manager = Arc::clone(&manager);
            tokio::task::spawn_blocking(move || manager.load())
        };
        let second = {
            let manager = Arc::clone(&manager);
            tokio::task::spawn_blocking(move || manager.load())
        };

        // Let both callers reach the loader before releasing it.
        tokio::time::sleep(Duration::from_millis(50)).await;
        release_tx.send(()).unwrap();
        first.await.unwrap();
        second.await.unwrap();

        assert_eq!(manager.wait_settled().await, ModelState::Ready);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(manager.spawn_load().is_none());
    }

    #[tokio::test]
    async fn wait_settled_reports_failure() {
        let manager = manager(CountingLoader {
            fail_with: Some("checksum mismatch".into()),
            ..CountingLoader::default()
        });
        manager.spawn_load();
        assert_matches!(manager.wait_settled().await, ModelState::Failed(_));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn wait_settled_blocks_until_load_finishes() {
        let (release_tx, release_rx) = mpsc::channel();
        let manager = manager(CountingLoader {
            release: Some(Mutex::new(release_rx)),
            ..CountingLoader::default()
        });
        let mut transitions = manager.subscribe();
        let handle = manager.spawn_load().unwrap();
        assert_eq!(*transitions.borrow_and_update(), ModelState::Loading);

        let waiter = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.wait_settled().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        release_tx.send(()).unwrap();
        assert_eq!(waiter.await.unwrap(), ModelState::Ready);
        handle.await.unwrap();
        assert!(transitions.has_changed().unwrap());
        assert_eq!(*transitions.borrow_and_update(), ModelState::Ready);
    }
}
