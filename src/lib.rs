//! Bike Forecast Library
//!
//! Inference service for hourly bike rental demand: request validation,
//! feature engineering, scaling, the recurrent model forward pass and the
//! HTTP wrapper around them.

pub mod config;
pub mod error;
pub mod ml;
pub mod server;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{ArtifactError, PipelineError};
pub use ml::{
    ArtifactPaths, DemandPredictor, EngineeredFeatures, InferenceResources, PipelineOptions,
    PredictionRequest, ResourceCell,
};
pub use server::{AppState, router};
