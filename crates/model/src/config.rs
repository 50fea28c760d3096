use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

/// Default model repository, used as the resource identity.
pub const DEFAULT_REPO_ID: &str = "Tongyi-MAI/Z-Image-Turbo";
/// Default directory for downloaded model weights.
pub const DEFAULT_CACHE_DIR: &str = "/models";

/// Numeric precision the pipeline computes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    #[default]
    Bfloat16,
    Float16,
    Float32,
}

impl Dtype {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bfloat16 => "bfloat16",
            Self::Float16 => "float16",
            Self::Float32 => "float32",
        }
    }

    /// Parse a configured dtype, falling back to `bfloat16` for unknown names.
    pub fn parse_or_default(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            tracing::warn!(dtype = value, "Unknown model dtype, using bfloat16");
            Self::default()
        })
    }

    /// Round a value to the mantissa width of this dtype.
    pub fn quantize(self, value: f32) -> f32 {
        match self {
            Self::Bfloat16 => f32::from_bits(value.to_bits() & 0xFFFF_0000),
            Self::Float16 => f32::from_bits(value.to_bits() & 0xFFFF_E000),
            Self::Float32 => value,
        }
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dtype {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bfloat16" | "bf16" => Ok(Self::Bfloat16),
            "float16" | "fp16" | "f16" => Ok(Self::Float16),
            "float32" | "fp32" | "f32" => Ok(Self::Float32),
            other => Err(format!("unknown dtype '{other}'")),
        }
    }
}

/// Model loading configuration.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Repository identifier; reported as the model identity on every job.
    pub repo_id: String,
    /// Where weights are cached between runs.
    pub cache_dir: PathBuf,
    pub dtype: Dtype,
    /// Compute threads. `0` auto-detects the hardware concurrency.
    pub num_threads: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            repo_id: DEFAULT_REPO_ID.to_string(),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            dtype: Dtype::default(),
            num_threads: 0,
        }
    }
}
