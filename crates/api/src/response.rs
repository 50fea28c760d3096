//! Shared response types for API handlers.
//!
//! All REST responses use a `{ "data": ... }` envelope. Use
//! [`DataResponse`] instead of ad-hoc `serde_json::json!({ "data": ... })`.

use serde::Serialize;
use zimage_core::job::JobRecord;

/// URL prefix under which artifacts are served.
pub const IMAGES_URL_PREFIX: &str = "/api/images";

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// A job record together with the URL of its artifact.
///
/// Serializes flat: every [`JobRecord`] field plus `url`.
#[derive(Debug, Clone, Serialize)]
pub struct ImageEntry {
    #[serde(flatten)]
    pub record: JobRecord,
    pub url: String,
}

impl ImageEntry {
    pub fn new(record: JobRecord) -> Self {
        let url = format!("{IMAGES_URL_PREFIX}/{}", record.filename);
        Self { record, url }
    }
}

impl From<JobRecord> for ImageEntry {
    fn from(record: JobRecord) -> Self {
        Self::new(record)
    }
}
