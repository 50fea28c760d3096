//! Built-in deterministic CPU renderer.
//!
//! [`ProceduralPipeline`] implements the [`Pipeline`] contract without
//! model weights. The image follows from the prompt and seed alone. It
//! starts from a palette gradient, then composites `steps` passes of
//! colored radial fields, each finer than the last. Rows are split across
//! the configured thread count. The output does not depend on the thread
//! count.

use std::io::Cursor;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use zimage_core::generation::InferenceParams;

use crate::config::Dtype;
use crate::pipeline::{LoadOptions, Pipeline, PipelineError, PipelineLoader};

/// Number of palette entries derived from the model identity.
const PALETTE_SIZE: usize = 6;
/// Radial fields added per step.
const FIELDS_PER_STEP: usize = 3;
/// Upper bound on rendered pixels per image.
const MAX_PIXELS: u64 = 4096 * 4096;

/// Loader for [`ProceduralPipeline`]. Acquisition only derives the palette.
#[derive(Debug, Default)]
pub struct ProceduralLoader;

impl PipelineLoader for ProceduralLoader {
    fn load(&self, options: &LoadOptions) -> Result<Box<dyn Pipeline>, PipelineError> {
        Ok(Box::new(ProceduralPipeline::new(
            &options.repo_id,
            options.dtype,
            options.parallelism.threads,
        )))
    }
}

type Rgb = [f32; 3];

/// A single radial color field.
#[derive(Debug, Clone, Copy)]
struct Field {
    cx: f32,
    cy: f32,
    /// Inverse squared radius.
    falloff: f32,
    color: Rgb,
    strength: f32,
}

pub struct ProceduralPipeline {
    palette: [Rgb; PALETTE_SIZE],
    dtype: Dtype,
    threads: usize,
}

impl ProceduralPipeline {
    pub fn new(identity: &str, dtype: Dtype, threads: usize) -> Self {
        let digest = Sha256::digest(identity.as_bytes());
        let mut palette = [[0.0; 3]; PALETTE_SIZE];
        for (entry, bytes) in palette.iter_mut().zip(digest.chunks_exact(3)) {
            for (channel, byte) in entry.iter_mut().zip(bytes) {
                *channel = f32::from(*byte) / 255.0;
            }
        }
        Self {
            palette,
            dtype,
            threads: threads.max(1),
        }
    }

    /// Sample every field for this request from a PRNG seeded by the prompt and seed.
    fn fields(&self, params: &InferenceParams) -> Vec<Field> {
        let mut hasher = Sha256::new();
        hasher.update(params.prompt.as_bytes());
        hasher.update(params.seed.to_le_bytes());
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&hasher.finalize());
        let mut rng = StdRng::from_seed(seed);

        let steps = params.steps as usize;
        let mut fields = Vec::with_capacity(steps * FIELDS_PER_STEP);
        for step in 0..steps {
            // Later steps add smaller, fainter detail.
            let scale = 1.0 / (1.0 + step as f32);
            for _ in 0..FIELDS_PER_STEP {
                let radius = rng.random_range(0.05..0.45_f32) * scale.sqrt();
                let base = self.palette[rng.random_range(0..PALETTE_SIZE)];
                let tint: Rgb = [rng.random(), rng.random(), rng.random()];
                fields.push(Field {
                    cx: rng.random(),
                    cy: rng.random(),
                    falloff: 1.0 / (radius * radius),
                    color: [
                        0.7 * base[0] + 0.3 * tint[0],
                        0.7 * base[1] + 0.3 * tint[1],
                        0.7 * base[2] + 0.3 * tint[2],
                    ],
                    strength: 0.85 * scale.max(0.2),
                });
            }
        }
        fields
    }

    fn shade(&self, u: f32, v: f32, fields: &[Field], contrast: f32) -> [u8; 3] {
        let top = self.palette[0];
        let bottom = self.palette[1];
        let mut color: Rgb = [
            top[0] + (bottom[0] - top[0]) * v,
            top[1] + (bottom[1] - top[1]) * v,
            top[2] + (bottom[2] - top[2]) * v,
        ];

        for chunk in fields.chunks(FIELDS_PER_STEP) {
            for field in chunk {
                let dx = u - field.cx;
                let dy = v - field.cy;
                let weight = field.strength * (-(dx * dx + dy * dy) * field.falloff).exp();
                for (c, target) in color.iter_mut().zip(field.color) {
                    *c += (target - *c) * weight;
                }
            }
            // Each pass settles to the working precision.
            for c in &mut color {
                *c = self.dtype.quantize(*c);
            }
        }

        color.map(|c| {
            let adjusted = ((c - 0.5) * contrast + 0.5).clamp(0.0, 1.0);
            (adjusted * 255.0).round() as u8
        })
    }

    fn render_rows(
        &self,
        rows: &mut [u8],
        first_row: usize,
        width: usize,
        height: usize,
        fields: &[Field],
        contrast: f32,
    ) {
        for (offset, row) in rows.chunks_exact_mut(width * 3).enumerate() {
            let v = (first_row + offset) as f32 / height as f32;
            for (x, pixel) in row.chunks_exact_mut(3).enumerate() {
                let u = x as f32 / width as f32;
                pixel.copy_from_slice(&self.shade(u, v, fields, contrast));
            }
        }
    }
}

impl Pipeline for ProceduralPipeline {
    fn generate(&self, params: &InferenceParams) -> Result<Vec<u8>, PipelineError> {
        if params.width == 0 || params.height == 0 || params.steps == 0 {
            return Err(PipelineError::InvalidInput(format!(
                "width, height and steps must be positive (got {}x{}, {} steps)",
                params.width, params.height, params.steps
            )));
        }
        if u64::from(params.width) * u64::from(params.height) > MAX_PIXELS {
            return Err(PipelineError::Resource(format!(
                "{}x{} exceeds the renderer's pixel budget",
                params.width, params.height
            )));
        }

        let width = params.width as usize;
        let height = params.height as usize;
        let fields = self.fields(params);
        let contrast = 1.0 + params.guidance_scale * 0.05;

        let mut buffer = vec![0u8; width * height * 3];
        let rows_per_chunk = height.div_ceil(self.threads);
        std::thread::scope(|scope| {
            for (index, rows) in buffer.chunks_mut(rows_per_chunk * width * 3).enumerate() {
                let fields = &fields;
                scope.spawn(move || {
                    self.render_rows(rows, index * rows_per_chunk, width, height, fields, contrast);
                });
            }
        });

        let image = image::RgbImage::from_raw(params.width, params.height, buffer)
            .ok_or_else(|| PipelineError::Resource("pixel buffer size mismatch".into()))?;
        let mut encoded = Cursor::new(Vec::new());
        image
            .write_to(&mut encoded, image::ImageFormat::Png)
            .map_err(|e| PipelineError::Resource(format!("PNG encoding failed: {e}")))?;
        Ok(encoded.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::parallelism::Parallelism;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G'];

    fn params(seed: u64) -> InferenceParams {
        InferenceParams {
            prompt: "a red fox, photo".into(),
            width: 48,
            height: 32,
            steps: 4,
            guidance_scale: 0.0,
            seed,
        }
    }

    fn pipeline(threads: usize) -> ProceduralPipeline {
        ProceduralPipeline::new("Tongyi-MAI/Z-Image-Turbo", Dtype::Bfloat16, threads)
    }

    #[test]
    fn output_is_png_with_requested_dimensions() {
        let bytes = pipeline(2).generate(&params(1)).unwrap();
        assert!(bytes.starts_with(PNG_MAGIC));
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (48, 32));
    }

    #[test]
    fn same_seed_produces_identical_bytes() {
        let pipeline = pipeline(2);
        assert_eq!(
            pipeline.generate(&params(99)).unwrap(),
            pipeline.generate(&params(99)).unwrap()
        );
    }

    #[test]
    fn output_does_not_depend_on_thread_count() {
        assert_eq!(
            pipeline(1).generate(&params(5)).unwrap(),
            pipeline(7).generate(&params(5)).unwrap()
        );
    }

    #[test]
    fn different_seed_or_prompt_changes_output() {
        let pipeline = pipeline(2);
        let base = pipeline.generate(&params(1)).unwrap();
        assert_ne!(base, pipeline.generate(&params(2)).unwrap());

        let mut other_prompt = params(1);
        other_prompt.prompt = "a lighthouse at dusk, painting".into();
        assert_ne!(base, pipeline.generate(&other_prompt).unwrap());
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        let mut bad = params(1);
        bad.width = 0;
        assert_matches!(pipeline(1).generate(&bad), Err(PipelineError::InvalidInput(_)));
    }

    #[test]
    fn loader_uses_configured_parallelism() {
        let options = LoadOptions {
            repo_id: "local/test".into(),
            cache_dir: std::env::temp_dir(),
            dtype: Dtype::Float32,
            parallelism: Parallelism::resolve(3),
        };
        let loaded = ProceduralLoader.load(&options).unwrap();
        assert!(loaded.generate(&params(3)).unwrap().starts_with(PNG_MAGIC));
    }
}
