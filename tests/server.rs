//! HTTP tests against a real server on an ephemeral port.

mod common;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use approx::assert_relative_eq;
use bike_forecast::{AppState, ArtifactPaths, PipelineOptions, ResourceCell, router};
use serde_json::{Value, json};

/// Serve the router for `dir` and return its base URL.
async fn spawn_app(dir: &Path) -> String {
    let cell = ResourceCell::new(ArtifactPaths::in_dir(dir), common::SEQUENCE_LENGTH);
    serve_cell(cell).await
}

async fn serve_cell(cell: ResourceCell) -> String {
    let state = AppState::new(Arc::new(cell), PipelineOptions::default());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });

    format!("http://{}", addr)
}

async fn post_predict(base: &str, body: &Value) -> (u16, Value) {
    let response = reqwest::Client::new()
        .post(format!("{}/predict", base))
        .json(body)
        .send()
        .await
        .unwrap();
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn test_health_loads_artifacts() {
    let dir = common::artifact_dir();
    let base = spawn_app(dir.path()).await;

    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model_loaded"], true);
    assert_eq!(body["scalers_loaded"], true);
    assert_eq!(body["base_dir"], dir.path().display().to_string());
}

#[tokio::test]
async fn test_health_reports_missing_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let base = spawn_app(dir.path()).await;

    let response = reqwest::get(format!("{}/health", base)).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["model_loaded"], false);
    assert!(body["error"].as_str().unwrap().contains("rnn_model.json"));
}

/// Scenario A over HTTP.
#[tokio::test]
async fn test_predict_success() {
    let dir = common::artifact_dir();
    let base = spawn_app(dir.path()).await;

    let (status, body) = post_predict(&base, &common::scenario_a()).await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "success");
    assert_relative_eq!(
        body["Prediction"].as_f64().unwrap(),
        common::SCENARIO_A_PREDICTION,
        epsilon = 1e-9
    );
}

/// Scenario B over HTTP.
#[tokio::test]
async fn test_predict_unknown_category_is_bad_request() {
    let dir = common::artifact_dir();
    let base = spawn_app(dir.path()).await;
    let mut request = common::scenario_a();
    request["Seasons"] = json!("InvalidSeason");

    let (status, body) = post_predict(&base, &request).await;

    assert_eq!(status, 400);
    assert!(body["detail"].as_str().unwrap().contains("InvalidSeason"));
}

/// Scenario C over HTTP.
#[tokio::test]
async fn test_predict_missing_field_is_bad_request() {
    let dir = common::artifact_dir();
    let base = spawn_app(dir.path()).await;
    let mut request = common::scenario_a();
    request.as_object_mut().unwrap().remove("Temp");

    let (status, body) = post_predict(&base, &request).await;

    assert_eq!(status, 400);
    assert!(body["detail"].as_str().unwrap().contains("Temp"));
}

#[tokio::test]
async fn test_predict_rejects_non_json_body() {
    let dir = common::artifact_dir();
    let base = spawn_app(dir.path()).await;

    let response = reqwest::Client::new()
        .post(format!("{}/predict", base))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["detail"].as_str().unwrap().contains("JSON"));
}

#[tokio::test]
async fn test_predict_without_artifacts_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let base = spawn_app(dir.path()).await;

    let (status, body) = post_predict(&base, &common::scenario_a()).await;

    assert_eq!(status, 503);
    assert_eq!(body["detail"], "Model not loaded");
}

/// Artifacts that disagree on the feature width are a server fault.
#[tokio::test]
async fn test_predict_with_skewed_artifacts_is_server_error() {
    let dir = common::artifact_dir();
    fs::write(
        dir.path().join("scaler_X.json"),
        json!({ "kind": "standard", "mean": vec![0.0; 16], "scale": vec![1.0; 16] }).to_string(),
    )
    .unwrap();
    let base = spawn_app(dir.path()).await;

    let (status, body) = post_predict(&base, &common::scenario_a()).await;

    assert_eq!(status, 500);
    assert!(body["detail"].as_str().unwrap().starts_with("Shape mismatch"));
}

/// A cell built from in-memory resources never touches the disk.
#[tokio::test]
async fn test_preloaded_resources_serve_without_files() {
    let dir = common::artifact_dir();
    let paths = ArtifactPaths::in_dir(dir.path());
    let resources = common::load_resources(dir.path());
    drop(dir);

    let base = serve_cell(ResourceCell::preloaded(paths, resources)).await;

    let (status, body) = post_predict(&base, &common::scenario_a()).await;
    assert_eq!(status, 200);
    assert_relative_eq!(
        body["Prediction"].as_f64().unwrap(),
        common::SCENARIO_A_PREDICTION,
        epsilon = 1e-9
    );

    let health: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");
}

/// A failed load is retried on the next request.
#[tokio::test]
async fn test_load_is_retried_after_failure() {
    let dir = tempfile::tempdir().unwrap();
    let base = spawn_app(dir.path()).await;

    let (status, _) = post_predict(&base, &common::scenario_a()).await;
    assert_eq!(status, 503);

    common::write_artifacts(dir.path());

    let (status, body) = post_predict(&base, &common::scenario_a()).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "success");
}

#[tokio::test]
async fn test_concurrent_first_requests() {
    let dir = common::artifact_dir();
    let base = spawn_app(dir.path()).await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let base = base.clone();
            tokio::spawn(async move { post_predict(&base, &common::scenario_a()).await })
        })
        .collect();

    for handle in handles {
        let (status, body) = handle.await.unwrap();
        assert_eq!(status, 200);
        assert_relative_eq!(
            body["Prediction"].as_f64().unwrap(),
            common::SCENARIO_A_PREDICTION,
            epsilon = 1e-9
        );
    }
}

#[tokio::test]
async fn test_index_page() {
    let dir = common::artifact_dir();
    let base = spawn_app(dir.path()).await;

    let response = reqwest::get(format!("{}/", base)).await.unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/html"));
    assert!(response.text().await.unwrap().contains("Bike Rental Prediction System"));
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let dir = common::artifact_dir();
    let base = spawn_app(dir.path()).await;

    let response = reqwest::Client::new()
        .get(format!("{}/health", base))
        .header("origin", "https://example.org")
        .send()
        .await
        .unwrap();

    assert_eq!(response.headers()["access-control-allow-origin"], "*");
}
