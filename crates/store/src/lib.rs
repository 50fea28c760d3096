//! Durable job result storage.
//!
//! The storage directory is an append-only log: every job leaves one PNG
//! artifact and one JSON sidecar beside it. Listings are rebuilt from the
//! directory on every call, so nothing needs to be kept in sync across
//! restarts.

pub mod error;
pub mod result_store;

pub use error::StoreError;
pub use result_store::{ResultStore, DEFAULT_MAX_HISTORY};
