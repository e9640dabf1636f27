//! Per-column numeric scalers fit at training time
//!
//! Both the 17-column feature scaler and the one-column target scaler use
//! this type. Parameters are applied exactly as persisted, never refit.

use serde::Deserialize;

use crate::error::{ArtifactError, PipelineError};

/// Fit parameters of a scaler, tagged by `kind` in the artifact.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScalerParams {
    /// Standardization: `(x - mean) / scale`.
    Standard { mean: Vec<f64>, scale: Vec<f64> },
    /// Min-max: `x * scale + min`.
    MinMax { min: Vec<f64>, scale: Vec<f64> },
}

#[derive(Debug, Deserialize)]
struct ScalerDocument {
    #[serde(flatten)]
    params: ScalerParams,
    #[serde(default)]
    feature_names: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct ColumnScaler {
    params: ScalerParams,
    feature_names: Option<Vec<String>>,
}

impl ColumnScaler {
    pub fn new(
        params: ScalerParams,
        feature_names: Option<Vec<String>>,
    ) -> Result<Self, ArtifactError> {
        let (offset, scale) = match &params {
            ScalerParams::Standard { mean, scale } => (mean, scale),
            ScalerParams::MinMax { min, scale } => (min, scale),
        };

        if scale.is_empty() {
            return Err(ArtifactError::invalid("scaler", "no columns"));
        }
        if offset.len() != scale.len() {
            return Err(ArtifactError::invalid(
                "scaler",
                format!("{} offsets but {} scales", offset.len(), scale.len()),
            ));
        }
        if let Some(i) = scale.iter().position(|s| *s == 0.0 || !s.is_finite()) {
            return Err(ArtifactError::invalid(
                "scaler",
                format!("column {} has unusable scale {}", i, scale[i]),
            ));
        }
        if let Some(i) = offset.iter().position(|o| !o.is_finite()) {
            return Err(ArtifactError::invalid(
                "scaler",
                format!("column {} has non-finite offset", i),
            ));
        }
        if let Some(names) = &feature_names {
            if names.len() != scale.len() {
                return Err(ArtifactError::invalid(
                    "scaler",
                    format!("{} feature names for {} columns", names.len(), scale.len()),
                ));
            }
        }

        Ok(Self {
            params,
            feature_names,
        })
    }

    /// Build from a JSON scaler document.
    pub fn from_json(json: &str) -> Result<Self, ArtifactError> {
        let doc: ScalerDocument = serde_json::from_str(json)
            .map_err(|e| ArtifactError::invalid("scaler", e.to_string()))?;
        Self::new(doc.params, doc.feature_names)
    }

    /// Number of columns the scaler was fit on.
    pub fn width(&self) -> usize {
        match &self.params {
            ScalerParams::Standard { scale, .. } | ScalerParams::MinMax { scale, .. } => {
                scale.len()
            }
        }
    }

    /// Column names recorded at fit time, if the artifact carries them.
    pub fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    pub fn kind(&self) -> &'static str {
        match self.params {
            ScalerParams::Standard { .. } => "standard",
            ScalerParams::MinMax { .. } => "min_max",
        }
    }

    /// Forward transform of one row.
    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>, PipelineError> {
        self.check_width(row)?;
        let scaled = match &self.params {
            ScalerParams::Standard { mean, scale } => row
                .iter()
                .zip(mean.iter().zip(scale))
                .map(|(x, (m, s))| (x - m) / s)
                .collect(),
            ScalerParams::MinMax { min, scale } => row
                .iter()
                .zip(min.iter().zip(scale))
                .map(|(x, (m, s))| x * s + m)
                .collect(),
        };
        Ok(scaled)
    }

    /// Inverse transform of one row.
    pub fn inverse_transform(&self, row: &[f64]) -> Result<Vec<f64>, PipelineError> {
        self.check_width(row)?;
        let restored = match &self.params {
            ScalerParams::Standard { mean, scale } => row
                .iter()
                .zip(mean.iter().zip(scale))
                .map(|(x, (m, s))| x * s + m)
                .collect(),
            ScalerParams::MinMax { min, scale } => row
                .iter()
                .zip(min.iter().zip(scale))
                .map(|(x, (m, s))| (x - m) / s)
                .collect(),
        };
        Ok(restored)
    }

    /// Inverse transform of a single value; requires a one-column scaler.
    pub fn inverse_scalar(&self, value: f64) -> Result<f64, PipelineError> {
        let restored = self.inverse_transform(&[value])?;
        Ok(restored[0])
    }

    fn check_width(&self, row: &[f64]) -> Result<(), PipelineError> {
        if row.len() == self.width() {
            Ok(())
        } else {
            Err(PipelineError::shape(
                format!("{} scaler columns", self.width()),
                format!("{} values", row.len()),
            ))
        }
    }
}
