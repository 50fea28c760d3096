//! The `generate_image` tool.
//!
//! Tool calls go through the same [`JobExecutor`](zimage_worker::JobExecutor)
//! as `POST /api/generate`, so the single-flight gate covers both surfaces.
//! Domain failures come back as a successful JSON-RPC response whose tool
//! result has `isError: true`; only malformed calls are JSON-RPC errors.

use serde::Deserialize;
use serde_json::{json, Value};
use zimage_core::generation::{GenerationRequest, MAX_DIMENSION, MAX_PROMPT_CHARS, MAX_STEPS, RANDOM_SEED};

use super::protocol::JsonRpcError;
use crate::response::ImageEntry;
use crate::state::AppState;

pub const GENERATE_IMAGE: &str = "generate_image";

/// Dimension used when an agent omits width or height.
const TOOL_DEFAULT_DIMENSION: u32 = 512;

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct GenerateImageArgs {
    prompt: String,
    #[serde(default = "default_dimension")]
    width: u32,
    #[serde(default = "default_dimension")]
    height: u32,
    #[serde(default = "default_seed")]
    seed: i64,
    #[serde(default)]
    steps: u32,
}

fn default_dimension() -> u32 {
    TOOL_DEFAULT_DIMENSION
}

fn default_seed() -> i64 {
    RANDOM_SEED
}

impl From<GenerateImageArgs> for GenerationRequest {
    fn from(args: GenerateImageArgs) -> Self {
        GenerationRequest {
            prompt: args.prompt,
            width: args.width,
            height: args.height,
            steps: args.steps,
            seed: args.seed,
        }
    }
}

/// Result of `tools/list`.
pub fn list() -> Value {
    json!({
        "tools": [{
            "name": GENERATE_IMAGE,
            "description": "Generate an image from a text prompt. Returns the job record \
                (seed, dimensions, timing) and the URL of the PNG. Only one image is \
                generated at a time; if the server is busy, try again shortly.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "prompt": {
                        "type": "string",
                        "description": "Text description of the image.",
                        "minLength": 1,
                        "maxLength": MAX_PROMPT_CHARS,
                    },
                    "width": {
                        "type": "integer",
                        "description": "Image width in pixels.",
                        "minimum": 0,
                        "maximum": MAX_DIMENSION,
                        "default": TOOL_DEFAULT_DIMENSION,
                    },
                    "height": {
                        "type": "integer",
                        "description": "Image height in pixels.",
                        "minimum": 0,
                        "maximum": MAX_DIMENSION,
                        "default": TOOL_DEFAULT_DIMENSION,
                    },
                    "seed": {
                        "type": "integer",
                        "description": "Seed for reproducible output; -1 picks one at random.",
                        "minimum": RANDOM_SEED,
                        "default": RANDOM_SEED,
                    },
                    "steps": {
                        "type": "integer",
                        "description": "Inference steps; 0 uses the server default.",
                        "minimum": 0,
                        "maximum": MAX_STEPS,
                        "default": 0,
                    },
                },
                "required": ["prompt"],
            },
        }],
    })
}

/// Handle `tools/call`.
pub async fn call(state: &AppState, params: Option<Value>) -> Result<Value, JsonRpcError> {
    let params: CallParams = serde_json::from_value(params.unwrap_or(Value::Null))
        .map_err(|e| JsonRpcError::invalid_params(format!("invalid tools/call params: {e}")))?;

    if params.name != GENERATE_IMAGE {
        return Err(JsonRpcError::invalid_params(format!(
            "Unknown tool: {}",
            params.name
        )));
    }

    let args: GenerateImageArgs =
        serde_json::from_value(params.arguments.unwrap_or_else(|| json!({})))
            .map_err(|e| JsonRpcError::invalid_params(format!("invalid arguments: {e}")))?;

    Ok(generate_image(state, args.into()).await)
}

async fn generate_image(state: &AppState, request: GenerationRequest) -> Value {
    let outcome = match request.validate() {
        Ok(()) => state.executor.submit(request).await.map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };

    match outcome {
        Ok(record) => {
            tracing::info!(filename = %record.filename, "MCP generate_image completed");
            let entry = ImageEntry::new(record);
            match serde_json::to_string_pretty(&entry) {
                Ok(text) => tool_result(text, false),
                Err(e) => tool_result(json!({ "error": e.to_string() }).to_string(), true),
            }
        }
        Err(message) => {
            tracing::warn!(error = %message, "MCP generate_image failed");
            tool_result(json!({ "error": message }).to_string(), true)
        }
    }
}

fn tool_result(text: String, is_error: bool) -> Value {
    json!({
        "content": [{ "type": "text", "text": text }],
        "isError": is_error,
    })
}
