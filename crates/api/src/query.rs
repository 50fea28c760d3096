//! Shared query parameter types for API handlers.

use serde::Deserialize;

/// `?limit=` for history listings. Absent or `0` means the configured
/// history size.
#[derive(Debug, Default, Deserialize)]
pub struct LimitParams {
    pub limit: Option<usize>,
}
