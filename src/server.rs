//! HTTP surface: landing page, health check and the prediction endpoint.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::PipelineError;
use crate::ml::{ArtifactPaths, DemandPredictor, PipelineOptions, PredictionRequest, ResourceCell};

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Shared across handlers
#[derive(Debug, Clone)]
pub struct AppState {
    pub resources: Arc<ResourceCell>,
    pub options: PipelineOptions,
}

impl AppState {
    pub fn new(resources: Arc<ResourceCell>, options: PipelineOptions) -> Self {
        Self { resources, options }
    }

    /// State with an empty resource cell pointing at the configured artifacts.
    pub fn from_config(config: &AppConfig) -> Self {
        let paths = ArtifactPaths::from_config(&config.artifacts);
        let cell = ResourceCell::new(paths, config.inference.sequence_length);
        Self::new(Arc::new(cell), PipelineOptions::from(config))
    }
}

/// Pipeline failure rendered as `{"detail": ...}`
#[derive(Debug)]
pub struct ApiError(pub PipelineError);

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(PipelineError::Validation(rejection.body_text()))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            PipelineError::Validation(_) | PipelineError::UnknownCategory { .. } => {
                StatusCode::BAD_REQUEST
            }
            PipelineError::ResourceNotLoaded(_) => StatusCode::SERVICE_UNAVAILABLE,
            PipelineError::ShapeMismatch { .. } | PipelineError::Inference(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match &self.0 {
            PipelineError::ResourceNotLoaded(_) => "Model not loaded".to_string(),
            other => other.to_string(),
        };

        if status.is_server_error() {
            tracing::error!("Prediction failed with {}: {}", status, self.0);
        } else {
            tracing::debug!("Rejected request: {}", detail);
        }

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/predict", post(predict))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Loads artifacts as a side effect; always answers 200.
async fn health(State(state): State<AppState>) -> Json<Value> {
    match state.resources.get_or_load().await {
        Ok(_) => Json(json!({
            "status": "healthy",
            "model_loaded": true,
            "scalers_loaded": true,
            "base_dir": state.resources.paths().base_dir.display().to_string(),
        })),
        Err(e) => {
            tracing::warn!("Health check could not load artifacts: {}", e);
            Json(json!({
                "status": "unhealthy",
                "error": e.to_string(),
                "model_loaded": false,
            }))
        }
    }
}

async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictionRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;

    let resources = state.resources.get_or_load().await.map_err(|e| {
        tracing::warn!("Artifacts unavailable: {}", e);
        PipelineError::from(e)
    })?;

    let predictor = DemandPredictor::new(resources, state.options);
    let prediction = tokio::task::spawn_blocking(move || predictor.predict(&request))
        .await
        .map_err(|e| PipelineError::Inference(e.to_string()))??;

    Ok(Json(json!({
        "Prediction": prediction,
        "status": "success",
    })))
}

/// Bind, try an eager artifact load, then serve until Ctrl-C.
pub async fn serve(config: &AppConfig) -> Result<()> {
    let state = AppState::from_config(config);

    tracing::info!(
        "Artifact directory: {}",
        state.resources.paths().base_dir.display()
    );
    match state.resources.get_or_load().await {
        Ok(_) => tracing::info!("Started with model loaded"),
        Err(e) => {
            tracing::warn!("Model not loaded at startup: {}", e);
            tracing::warn!("Model will load on first request");
        }
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(
        "bike-forecast v{} listening on {}",
        env!("CARGO_PKG_VERSION"),
        listener.local_addr()?
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
