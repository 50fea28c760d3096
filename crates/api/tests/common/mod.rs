#![allow(dead_code)]

use std::sync::{mpsc, Mutex};

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use zimage_core::generation::{GenerationDefaults, InferenceParams};
use zimage_model::config::ModelConfig;
use zimage_model::pipeline::{LoadOptions, Pipeline, PipelineError, PipelineLoader};
use zimage_model::procedural::ProceduralLoader;

use zimage_api::config::ServerConfig;
use zimage_api::router::build_app_router;
use zimage_api::state::AppState;

/// A router plus the state and scratch directory behind it.
///
/// The temp directory is removed when this is dropped, so keep it alive
/// for the whole test.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub dir: TempDir,
}

/// Build a test `ServerConfig` writing into `dir`.
///
/// Defaults are kept small so generations finish quickly.
pub fn test_config(dir: &TempDir) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["*".to_string()],
        request_timeout_secs: 30,
        static_dir: dir.path().join("no-frontend"),
        model: ModelConfig {
            num_threads: 2,
            ..ModelConfig::default()
        },
        generation: GenerationDefaults {
            width: 64,
            height: 48,
            steps: 3,
            guidance_scale: 0.0,
        },
        output_dir: dir.path().join("generated"),
        max_history: 5,
        ..ServerConfig::default()
    }
}

/// Build the full application router through the same builder as `main.rs`.
/// The model is left unloaded.
pub fn build_app_with(loader: impl PipelineLoader + 'static) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);
    let state = AppState::new(config, Box::new(loader)).unwrap();
    let router = build_app_router(state.clone());
    TestApp { router, state, dir }
}

/// App backed by the procedural renderer, model not yet loaded.
pub fn build_unloaded_app() -> TestApp {
    build_app_with(ProceduralLoader)
}

/// App backed by the procedural renderer with the model ready.
pub async fn build_test_app() -> TestApp {
    let app = build_unloaded_app();
    app.state.model.spawn_load();
    app.state.model.wait_settled().await;
    assert!(app.state.model.is_ready());
    app
}

/// Loader that always fails.
pub struct FailingLoader;

impl PipelineLoader for FailingLoader {
    fn load(&self, _options: &LoadOptions) -> Result<Box<dyn Pipeline>, PipelineError> {
        Err(PipelineError::Resource("weights not found".into()))
    }
}

/// Pipeline that signals when a generation starts and blocks until released.
pub struct GatedPipeline {
    pub entered: Mutex<mpsc::Sender<()>>,
    pub release: Mutex<mpsc::Receiver<()>>,
}

impl Pipeline for GatedPipeline {
    fn generate(&self, params: &InferenceParams) -> Result<Vec<u8>, PipelineError> {
        let _ = self.entered.lock().unwrap().send(());
        let _ = self.release.lock().unwrap().recv();
        Ok(params.seed.to_le_bytes().to_vec())
    }
}

/// Loader handing out one [`GatedPipeline`].
pub struct GatedLoader(pub Mutex<Option<GatedPipeline>>);

impl PipelineLoader for GatedLoader {
    fn load(&self, _options: &LoadOptions) -> Result<Box<dyn Pipeline>, PipelineError> {
        self.0
            .lock()
            .unwrap()
            .take()
            .map(|p| Box::new(p) as Box<dyn Pipeline>)
            .ok_or_else(|| PipelineError::Resource("already loaded".into()))
    }
}

/// Send a GET request and return the response.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    post_raw(app, uri, body.to_string()).await
}

/// Send a POST request with a raw body labelled as JSON.
pub async fn post_raw(app: Router, uri: &str, body: impl Into<String>) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.into()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body into bytes.
pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
