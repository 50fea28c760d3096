//! Generation request bounds, default resolution and seed selection.
//!
//! A [`GenerationRequest`] arrives from a caller-facing surface with zero
//! meaning "use the configured default" and a negative seed meaning "pick
//! one". [`resolve`] turns it into [`InferenceParams`], where every
//! dimension is positive and the seed is fixed.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Request bounds
// ---------------------------------------------------------------------------

/// Maximum prompt length in characters.
pub const MAX_PROMPT_CHARS: usize = 2000;
/// Maximum width or height in pixels.
pub const MAX_DIMENSION: u32 = 2048;
/// Maximum number of inference steps.
pub const MAX_STEPS: u32 = 100;
/// Seed sentinel requesting a random seed.
pub const RANDOM_SEED: i64 = -1;
/// Random seeds are drawn uniformly from `[0, SEED_RANGE)`.
pub const SEED_RANGE: u64 = 1 << 31;

// ---------------------------------------------------------------------------
// Configured defaults
// ---------------------------------------------------------------------------

/// Default width in pixels.
pub const DEFAULT_WIDTH: u32 = 512;
/// Default height in pixels.
pub const DEFAULT_HEIGHT: u32 = 512;
/// Default step count, tuned for few-step distilled models.
pub const DEFAULT_STEPS: u32 = 9;
/// Default classifier-free guidance scale. Distilled models expect zero.
pub const DEFAULT_GUIDANCE_SCALE: f32 = 0.0;

fn default_seed() -> i64 {
    RANDOM_SEED
}

/// A caller-supplied generation request, prior to default resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub steps: u32,
    #[serde(default = "default_seed")]
    pub seed: i64,
}

impl GenerationRequest {
    /// A request that uses every configured default and a random seed.
    pub fn with_prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            width: 0,
            height: 0,
            steps: 0,
            seed: RANDOM_SEED,
        }
    }

    /// Check the request against the caller-facing bounds.
    ///
    /// - `prompt`: 1..=2000 characters, not blank
    /// - `width`, `height`: 0..=2048
    /// - `steps`: 0..=100
    /// - `seed`: >= -1
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.prompt.trim().is_empty() {
            return Err(CoreError::Validation("prompt must not be empty".into()));
        }
        let chars = self.prompt.chars().count();
        if chars > MAX_PROMPT_CHARS {
            return Err(CoreError::Validation(format!(
                "prompt must be at most {MAX_PROMPT_CHARS} characters (got {chars})"
            )));
        }
        validate_dimension("width", self.width)?;
        validate_dimension("height", self.height)?;
        if self.steps > MAX_STEPS {
            return Err(CoreError::Validation(format!(
                "steps must be between 0 and {MAX_STEPS} (got {})",
                self.steps
            )));
        }
        if self.seed < RANDOM_SEED {
            return Err(CoreError::Validation(format!(
                "seed must be >= {RANDOM_SEED} (got {})",
                self.seed
            )));
        }
        Ok(())
    }
}

fn validate_dimension(field: &str, value: u32) -> Result<(), CoreError> {
    if value > MAX_DIMENSION {
        return Err(CoreError::Validation(format!(
            "{field} must be between 0 and {MAX_DIMENSION} (got {value})"
        )));
    }
    Ok(())
}

/// Server-side generation defaults. The guidance scale is not user-settable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationDefaults {
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub guidance_scale: f32,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            steps: DEFAULT_STEPS,
            guidance_scale: DEFAULT_GUIDANCE_SCALE,
        }
    }
}

impl GenerationDefaults {
    /// Defaults must themselves be usable parameters, otherwise resolution
    /// could produce a zero dimension.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.width == 0 || self.height == 0 || self.steps == 0 {
            return Err(CoreError::Validation(format!(
                "default width, height and steps must be positive (got {}x{}, {} steps)",
                self.width, self.height, self.steps
            )));
        }
        if !self.guidance_scale.is_finite() {
            return Err(CoreError::Validation(
                "default guidance scale must be finite".into(),
            ));
        }
        Ok(())
    }
}

/// Fully resolved parameters handed to the compute resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceParams {
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub guidance_scale: f32,
    pub seed: u64,
}

/// Apply defaults to a request: zero dimensions and steps take the
/// configured value, a negative seed is replaced by [`random_seed`].
pub fn resolve(request: GenerationRequest, defaults: &GenerationDefaults) -> InferenceParams {
    InferenceParams {
        width: or_default(request.width, defaults.width),
        height: or_default(request.height, defaults.height),
        steps: or_default(request.steps, defaults.steps),
        guidance_scale: defaults.guidance_scale,
        seed: u64::try_from(request.seed).unwrap_or_else(|_| random_seed()),
        prompt: request.prompt,
    }
}

fn or_default(value: u32, default: u32) -> u32 {
    if value > 0 {
        value
    } else {
        default
    }
}

/// Draw a seed uniformly from `[0, SEED_RANGE)` using the thread-local CSPRNG.
pub fn random_seed() -> u64 {
    rand::rng().random_range(0..SEED_RANGE)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
