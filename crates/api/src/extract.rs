//! Extractors whose rejections use the [`AppError`] envelope.
//!
//! axum's stock `Json` and `Query` reject with plain-text bodies. These
//! wrappers route the rejection through `AppError` so every client error
//! comes back as `{ "error", "code" }`.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};
use zimage_core::error::CoreError;

use crate::error::AppError;

/// JSON body extractor.
///
/// A body that parses but does not fit the target type (wrong field type,
/// out-of-range number, missing field) is a `VALIDATION_ERROR`. Anything
/// else (bad syntax, missing content type) is a `BAD_REQUEST`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Query string extractor. Every rejection is a `VALIDATION_ERROR`.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(err) => {
                AppError::Core(CoreError::Validation(err.body_text()))
            }
            other => AppError::BadRequest(other.body_text()),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Core(CoreError::Validation(rejection.body_text()))
    }
}
