//! `AppError` to HTTP response mapping.

mod common;

use assert_matches::assert_matches;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use common::{body_json, get, post_json, post_raw};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use zimage_api::error::AppError;
use zimage_core::error::CoreError;
use zimage_store::StoreError;
use zimage_worker::ExecutorError;

async fn render(err: AppError) -> (StatusCode, Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn not_ready_maps_to_503() {
    let (status, body) = render(ExecutorError::NotReady("loading".into()).into()).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "NOT_READY");
    assert!(body["error"].as_str().unwrap().contains("not loaded"));
}

#[tokio::test]
async fn busy_maps_to_429() {
    let (status, body) = render(ExecutorError::Busy.into()).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "BUSY");
}

#[tokio::test]
async fn validation_maps_to_400() {
    let (status, body) =
        render(AppError::Core(CoreError::Validation("prompt must not be empty".into()))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"], "prompt must not be empty");
}

#[tokio::test]
async fn missing_artifact_maps_to_404() {
    let (status, body) = render(StoreError::NotFound("x.png".into()).into()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn generation_failure_surfaces_message() {
    let (status, body) = render(ExecutorError::Generation("out of memory".into()).into()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "GENERATION_FAILED");
    assert_eq!(body["error"], "out of memory");
}

#[tokio::test]
async fn internal_errors_are_sanitized() {
    let (status, body) =
        render(AppError::InternalError("/secret/path: permission denied".into())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "INTERNAL_ERROR");
    assert_eq!(body["error"], "An internal error occurred");
}

#[test]
fn domain_errors_convert_through_core_taxonomy() {
    assert_matches!(
        AppError::from(ExecutorError::Busy),
        AppError::Core(CoreError::Busy(_))
    );
    assert_matches!(
        AppError::from(StoreError::InvalidName("../x".into())),
        AppError::Core(CoreError::Validation(_))
    );
}

#[tokio::test]
async fn out_of_range_body_field_is_validation_error() {
    let app = common::build_test_app().await;
    let response = post_json(
        app.router,
        "/api/generate",
        json!({"prompt": "x", "width": -1}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers().get("content-type").unwrap(), "application/json");
    let body = body_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["error"].as_str().unwrap().contains("width"));
}

#[tokio::test]
async fn missing_prompt_is_validation_error() {
    let app = common::build_test_app().await;
    let response = post_json(app.router, "/api/generate", json!({"width": 64})).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["error"].as_str().unwrap().contains("prompt"));
}

#[tokio::test]
async fn unparseable_body_is_bad_request() {
    let app = common::build_test_app().await;
    let response = post_raw(app.router, "/api/generate", "{not json").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn malformed_limit_is_validation_error() {
    let app = common::build_unloaded_app();
    let response = get(app.router, "/api/images?limit=abc").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}
