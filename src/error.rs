//! Typed errors for the prediction pipeline and artifact loading.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by a single prediction request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// Malformed, missing or mistyped request fields.
    #[error("{0}")]
    Validation(String),
    /// A categorical value that the training-time encoder never saw.
    #[error("Unknown {field} value '{value}': not in the training vocabulary")]
    UnknownCategory { field: &'static str, value: String },
    /// Artifacts could not be loaded (missing file, corrupt document, ...).
    #[error("Model not loaded: {0}")]
    ResourceNotLoaded(String),
    /// Feature width disagrees with what the model or scaler was built for.
    #[error("Shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch { expected: String, found: String },
    /// Numerical or worker failure during the forward pass.
    #[error("Inference failed: {0}")]
    Inference(String),
}

impl PipelineError {
    /// Whether the failure was caused by the request rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PipelineError::Validation(_) | PipelineError::UnknownCategory { .. }
        )
    }

    pub(crate) fn shape(expected: impl ToString, found: impl ToString) -> Self {
        PipelineError::ShapeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

/// Errors raised while loading the persisted model, scalers and encoders.
#[derive(Debug, Clone, Error)]
pub enum ArtifactError {
    #[error("Artifact file not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("IO error reading {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },
    #[error("Malformed artifact {}: {message}", .path.display())]
    Malformed { path: PathBuf, message: String },
    #[error("Invalid {artifact}: {message}")]
    Invalid { artifact: String, message: String },
    #[error(transparent)]
    Shape(#[from] PipelineError),
}

impl ArtifactError {
    pub(crate) fn invalid(artifact: impl Into<String>, message: impl Into<String>) -> Self {
        ArtifactError::Invalid {
            artifact: artifact.into(),
            message: message.into(),
        }
    }
}

impl From<ArtifactError> for PipelineError {
    fn from(err: ArtifactError) -> Self {
        match err {
            ArtifactError::Shape(inner) => inner,
            other => PipelineError::ResourceNotLoaded(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors() {
        assert!(PipelineError::Validation("missing field `Temp`".into()).is_client_error());
        assert!(
            PipelineError::UnknownCategory {
                field: "Seasons",
                value: "Monsoon".into()
            }
            .is_client_error()
        );
        assert!(!PipelineError::ResourceNotLoaded("gone".into()).is_client_error());
        assert!(!PipelineError::shape(17, 16).is_client_error());
        assert!(!PipelineError::Inference("nan".into()).is_client_error());
    }

    #[test]
    fn test_unknown_category_message_names_field_and_value() {
        let err = PipelineError::UnknownCategory {
            field: "Seasons",
            value: "Monsoon".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Seasons"));
        assert!(msg.contains("Monsoon"));
    }

    #[test]
    fn test_artifact_error_becomes_resource_not_loaded() {
        let err = ArtifactError::FileNotFound(PathBuf::from("models/scaler_X.json"));
        let converted = PipelineError::from(err);

        match converted {
            PipelineError::ResourceNotLoaded(msg) => assert!(msg.contains("scaler_X.json")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_shape_artifact_error_stays_shape_mismatch() {
        let err = ArtifactError::from(PipelineError::shape(17, 12));
        assert!(matches!(
            PipelineError::from(err),
            PipelineError::ShapeMismatch { .. }
        ));
    }
}
