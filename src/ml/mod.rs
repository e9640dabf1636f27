//! Prediction pipeline for bike rental demand
//!
//! Validates a request, engineers and scales the 17 features, repeats the
//! row across the model's timesteps, runs the recurrent model and maps the
//! output back to a bike count.

pub mod encoder;
pub mod features;
pub mod model;
pub mod persistence;
pub mod scaler;
pub mod schema;

use std::sync::Arc;

use serde_json::Value;

use crate::config::AppConfig;
use crate::error::PipelineError;

pub use encoder::{CategoricalEncoders, CategoricalField, LabelEncoder};
pub use features::EngineeredFeatures;
pub use model::{RecurrentModel, SequenceRegressor};
pub use persistence::{ArtifactPaths, InferenceResources, ResourceCell};
pub use scaler::ColumnScaler;
pub use schema::PredictionRequest;

/// Request-independent switches for the pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PipelineOptions {
    /// Reject Hour/Day outside their nominal ranges
    pub strict_ranges: bool,
    /// Clamp the final count at zero
    pub clamp_non_negative: bool,
}

impl From<&AppConfig> for PipelineOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            strict_ranges: config.validation.strict_ranges,
            clamp_non_negative: config.inference.clamp_non_negative,
        }
    }
}

/// Runs single predictions against a loaded resource bundle
#[derive(Debug, Clone)]
pub struct DemandPredictor {
    resources: Arc<InferenceResources>,
    options: PipelineOptions,
}

impl DemandPredictor {
    pub fn new(resources: Arc<InferenceResources>, options: PipelineOptions) -> Self {
        Self { resources, options }
    }

    pub fn resources(&self) -> &InferenceResources {
        &self.resources
    }

    /// Validate a raw JSON body and predict.
    pub fn predict_json(&self, body: &Value) -> Result<f64, PipelineError> {
        let request = PredictionRequest::from_value(body)?;
        self.predict(&request)
    }

    /// Predict the rental count for one validated request.
    pub fn predict(&self, request: &PredictionRequest) -> Result<f64, PipelineError> {
        if self.options.strict_ranges {
            request.check_ranges()?;
        }

        let engineered = features::transform(request, &self.resources.encoders)?;
        let scaled = self.resources.feature_scaler.transform(&engineered.to_array())?;
        let input = model::broadcast_sequence(&scaled, self.resources.sequence_length);

        let raw = self.resources.model.predict(&input)?;
        let count = self.resources.target_scaler.inverse_scalar(raw)?;

        tracing::debug!("raw prediction {:.5} -> {:.2} bikes", raw, count);

        if self.options.clamp_non_negative {
            Ok(count.max(0.0))
        } else {
            Ok(count)
        }
    }
}
