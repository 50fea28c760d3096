use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use zimage_core::generation::{
    GenerationDefaults, DEFAULT_GUIDANCE_SCALE, DEFAULT_HEIGHT, DEFAULT_STEPS, DEFAULT_WIDTH,
};
use zimage_model::config::{Dtype, ModelConfig, DEFAULT_CACHE_DIR, DEFAULT_REPO_ID};
use zimage_model::pipeline::PipelineLoader;
use zimage_model::procedural::ProceduralLoader;
use zimage_store::DEFAULT_MAX_HISTORY;

/// Which [`PipelineLoader`] backs the model manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelBackend {
    /// The built-in deterministic CPU renderer.
    #[default]
    Procedural,
}

impl ModelBackend {
    pub fn loader(self) -> Box<dyn PipelineLoader> {
        match self {
            ModelBackend::Procedural => Box::new(ProceduralLoader),
        }
    }
}

impl FromStr for ModelBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "procedural" => Ok(Self::Procedural),
            other => Err(format!("unknown model backend '{other}'")),
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// Defaults are suitable for running locally. Override via environment
/// variables (or a `.env` file) in deployment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins. A single `*` allows any origin.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds. Must cover one full generation.
    pub request_timeout_secs: u64,
    /// Route of the MCP endpoint (default: `/mcp`).
    pub mcp_path: String,
    /// Frontend build directory, served as the fallback when present.
    pub static_dir: PathBuf,
    pub backend: ModelBackend,
    pub model: ModelConfig,
    pub generation: GenerationDefaults,
    /// Where artifacts and sidecars are written.
    pub output_dir: PathBuf,
    /// Records returned by a listing without an explicit limit.
    pub max_history: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            cors_origins: vec!["*".into()],
            request_timeout_secs: 300,
            mcp_path: "/mcp".into(),
            static_dir: PathBuf::from("static"),
            backend: ModelBackend::default(),
            model: ModelConfig::default(),
            generation: GenerationDefaults::default(),
            output_dir: PathBuf::from("generated"),
            max_history: DEFAULT_MAX_HISTORY,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                    |
    /// |--------------------------|----------------------------|
    /// | `HOST`                   | `0.0.0.0`                  |
    /// | `PORT`                   | `8000`                     |
    /// | `CORS_ORIGINS`           | `*`                        |
    /// | `REQUEST_TIMEOUT_SECS`   | `300`                      |
    /// | `MCP_PATH`               | `/mcp`                     |
    /// | `STATIC_DIR`             | `static`                   |
    /// | `MODEL_BACKEND`          | `procedural`               |
    /// | `MODEL_REPO_ID`          | `Tongyi-MAI/Z-Image-Turbo` |
    /// | `MODEL_CACHE_DIR`        | `/models`                  |
    /// | `MODEL_DTYPE`            | `bfloat16`                 |
    /// | `NUM_THREADS`            | `0` (auto)                 |
    /// | `DEFAULT_WIDTH`          | `512`                      |
    /// | `DEFAULT_HEIGHT`         | `512`                      |
    /// | `DEFAULT_STEPS`          | `9`                        |
    /// | `DEFAULT_GUIDANCE_SCALE` | `0.0`                      |
    /// | `OUTPUT_DIR`             | `generated`                |
    /// | `MAX_HISTORY`            | `10`                       |
    ///
    /// Panics on malformed values so misconfiguration fails at startup.
    /// An unknown `MODEL_DTYPE` only logs a warning and falls back to
    /// `bfloat16`.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = parse_env("PORT", "8000");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = parse_env("REQUEST_TIMEOUT_SECS", "300");

        let mcp_path = std::env::var("MCP_PATH").unwrap_or_else(|_| "/mcp".into());
        if !mcp_path.starts_with('/') || mcp_path.len() < 2 {
            panic!("MCP_PATH must be an absolute path other than '/' (got '{mcp_path}')");
        }

        let static_dir = PathBuf::from(std::env::var("STATIC_DIR").unwrap_or_else(|_| "static".into()));
        let backend: ModelBackend = parse_env("MODEL_BACKEND", "procedural");

        let model = ModelConfig {
            repo_id: std::env::var("MODEL_REPO_ID").unwrap_or_else(|_| DEFAULT_REPO_ID.into()),
            cache_dir: PathBuf::from(
                std::env::var("MODEL_CACHE_DIR").unwrap_or_else(|_| DEFAULT_CACHE_DIR.into()),
            ),
            dtype: Dtype::parse_or_default(
                &std::env::var("MODEL_DTYPE").unwrap_or_else(|_| "bfloat16".into()),
            ),
            num_threads: parse_env("NUM_THREADS", "0"),
        };

        let generation = GenerationDefaults {
            width: parse_env("DEFAULT_WIDTH", &DEFAULT_WIDTH.to_string()),
            height: parse_env("DEFAULT_HEIGHT", &DEFAULT_HEIGHT.to_string()),
            steps: parse_env("DEFAULT_STEPS", &DEFAULT_STEPS.to_string()),
            guidance_scale: parse_env("DEFAULT_GUIDANCE_SCALE", &DEFAULT_GUIDANCE_SCALE.to_string()),
        };
        generation
            .validate()
            .unwrap_or_else(|e| panic!("Invalid generation defaults: {e}"));

        let output_dir = PathBuf::from(std::env::var("OUTPUT_DIR").unwrap_or_else(|_| "generated".into()));
        let max_history: usize = parse_env("MAX_HISTORY", &DEFAULT_MAX_HISTORY.to_string());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            mcp_path,
            static_dir,
            backend,
            model,
            generation,
            output_dir,
            max_history,
        }
    }

    /// True when `CORS_ORIGINS` allows any origin.
    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }
}

fn parse_env<T>(key: &str, default: &str) -> T
where
    T: FromStr,
    T::Err: Display,
{
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse()
        .unwrap_or_else(|e| panic!("{key} must be a valid {}: {e}", std::any::type_name::<T>()))
}
