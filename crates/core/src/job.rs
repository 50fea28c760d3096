//! Completed job records and the on-disk naming scheme.
//!
//! Artifacts are named `<YYYYmmdd_HHMMSS_mmm>_<id>.png` and their sidecars
//! append `.json`. The timestamp prefix makes lexicographic filename order
//! equal chronological order.

use serde::{Deserialize, Serialize};

use crate::generation::InferenceParams;
use crate::types::Timestamp;

/// File extension of generated artifacts.
pub const ARTIFACT_EXTENSION: &str = "png";
/// Suffix appended to an artifact filename to form its sidecar name.
pub const SIDECAR_SUFFIX: &str = ".json";
/// Length of the job identifier taken from a UUID v4.
pub const JOB_ID_LEN: usize = 12;

const FILENAME_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%3f";

/// Generate a new opaque job identifier.
pub fn new_job_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(JOB_ID_LEN);
    id
}

/// Artifact filename for a job completed at `timestamp`.
pub fn artifact_file_name(timestamp: &Timestamp, id: &str) -> String {
    format!(
        "{}_{id}.{ARTIFACT_EXTENSION}",
        timestamp.format(FILENAME_TIMESTAMP_FORMAT)
    )
}

/// Sidecar filename for an artifact filename.
pub fn sidecar_file_name(artifact: &str) -> String {
    format!("{artifact}{SIDECAR_SUFFIX}")
}

/// Whether `name` looks like a metadata sidecar.
pub fn is_sidecar_name(name: &str) -> bool {
    name.strip_suffix(SIDECAR_SUFFIX)
        .is_some_and(is_artifact_name)
}

/// Whether `name` looks like a generated artifact.
pub fn is_artifact_name(name: &str) -> bool {
    name.strip_suffix(ARTIFACT_EXTENSION)
        .and_then(|stem| stem.strip_suffix('.'))
        .is_some_and(|stem| !stem.is_empty())
}

/// Metadata of one completed generation job, as written to its sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    /// Artifact filename inside the storage directory.
    pub filename: String,
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub seed: u64,
    pub guidance_scale: f32,
    pub generation_time_seconds: f64,
    pub timestamp: Timestamp,
    /// Identity of the model that produced the artifact.
    pub model: String,
}

impl JobRecord {
    /// Build the record for a finished job. The elapsed time is rounded to
    /// hundredths of a second.
    pub fn new(
        id: String,
        params: InferenceParams,
        elapsed: std::time::Duration,
        timestamp: Timestamp,
        model: impl Into<String>,
    ) -> Self {
        Self {
            filename: artifact_file_name(&timestamp, &id),
            id,
            prompt: params.prompt,
            width: params.width,
            height: params.height,
            steps: params.steps,
            seed: params.seed,
            guidance_scale: params.guidance_scale,
            generation_time_seconds: (elapsed.as_secs_f64() * 100.0).round() / 100.0,
            timestamp,
            model: model.into(),
        }
    }

    /// Sidecar filename for this record.
    pub fn sidecar_name(&self) -> String {
        sidecar_file_name(&self.filename)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
