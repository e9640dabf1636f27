//! Artifact loading - model, scalers and encoders read once at startup

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;

use super::encoder::{CategoricalEncoders, CategoricalField, LabelEncoder};
use super::features::EngineeredFeatures;
use super::model::{RecurrentModel, SequenceRegressor};
use super::scaler::ColumnScaler;
use crate::config::ArtifactsConfig;
use crate::error::{ArtifactError, PipelineError};

/// Resolved locations of every persisted artifact
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPaths {
    pub base_dir: PathBuf,
    pub model: PathBuf,
    pub feature_scaler: PathBuf,
    pub target_scaler: PathBuf,
    pub funcday_encoder: PathBuf,
    pub seasons_encoder: PathBuf,
    pub weekday_encoder: PathBuf,
    pub month_encoder: PathBuf,
    pub holiday_encoder: PathBuf,
}

impl ArtifactPaths {
    pub fn from_config(config: &ArtifactsConfig) -> Self {
        let dir = &config.dir;
        Self {
            base_dir: dir.clone(),
            model: dir.join(&config.model_file),
            feature_scaler: dir.join(&config.feature_scaler_file),
            target_scaler: dir.join(&config.target_scaler_file),
            funcday_encoder: dir.join(&config.funcday_encoder_file),
            seasons_encoder: dir.join(&config.seasons_encoder_file),
            weekday_encoder: dir.join(&config.weekday_encoder_file),
            month_encoder: dir.join(&config.month_encoder_file),
            holiday_encoder: dir.join(&config.holiday_encoder_file),
        }
    }

    /// Default file names inside `dir`
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self::from_config(&ArtifactsConfig {
            dir: dir.into(),
            ..ArtifactsConfig::default()
        })
    }

    fn encoder(&self, field: CategoricalField) -> &Path {
        match field {
            CategoricalField::Seasons => &self.seasons_encoder,
            CategoricalField::Holiday => &self.holiday_encoder,
            CategoricalField::FuncDay => &self.funcday_encoder,
            CategoricalField::WeekDay => &self.weekday_encoder,
            CategoricalField::Month => &self.month_encoder,
        }
    }
}

/// Everything a prediction needs, immutable once built
#[derive(Debug)]
pub struct InferenceResources {
    pub model: Box<dyn SequenceRegressor>,
    pub feature_scaler: ColumnScaler,
    pub encoders: CategoricalEncoders,
    pub target_scaler: ColumnScaler,
    pub sequence_length: usize,
    pub loaded_at: DateTime<Utc>,
}

impl InferenceResources {
    /// Assemble resources, checking that the pieces fit together.
    ///
    /// Widths are asserted here so a skewed artifact set fails at load time
    /// instead of on the first request.
    pub fn new(
        model: Box<dyn SequenceRegressor>,
        feature_scaler: ColumnScaler,
        encoders: CategoricalEncoders,
        target_scaler: ColumnScaler,
        sequence_length: usize,
    ) -> Result<Self, ArtifactError> {
        let width = EngineeredFeatures::NUM_FEATURES;

        if feature_scaler.width() != width {
            return Err(PipelineError::shape(
                format!("feature scaler with {} columns", width),
                format!("{} columns", feature_scaler.width()),
            )
            .into());
        }
        if let Some(names) = feature_scaler.feature_names() {
            if names.iter().map(String::as_str).ne(EngineeredFeatures::FEATURE_NAMES) {
                return Err(PipelineError::shape(
                    format!("{:?}", EngineeredFeatures::FEATURE_NAMES),
                    format!("{:?}", names),
                )
                .into());
            }
        }
        if model.input_width() != feature_scaler.width() {
            return Err(PipelineError::shape(
                format!("model input width {}", feature_scaler.width()),
                model.input_width(),
            )
            .into());
        }
        if let Some(steps) = model.sequence_length() {
            if steps != sequence_length {
                return Err(PipelineError::shape(
                    format!("model sequence length {}", sequence_length),
                    steps,
                )
                .into());
            }
        }
        if target_scaler.width() != 1 {
            return Err(PipelineError::shape(
                "target scaler with 1 column",
                format!("{} columns", target_scaler.width()),
            )
            .into());
        }

        Ok(Self {
            model,
            feature_scaler,
            encoders,
            target_scaler,
            sequence_length,
            loaded_at: Utc::now(),
        })
    }

    /// Load every artifact from disk.
    pub fn load(paths: &ArtifactPaths, sequence_length: usize) -> Result<Self, ArtifactError> {
        let model = RecurrentModel::from_json(&read_artifact(&paths.model)?)
            .map_err(|e| locate(e, &paths.model))?;
        tracing::info!("Model loaded from {}", paths.model.display());

        let feature_scaler = load_scaler(&paths.feature_scaler)?;
        tracing::info!("Feature scaler loaded from {}", paths.feature_scaler.display());

        let encoders = CategoricalEncoders {
            seasons: load_encoder(paths, CategoricalField::Seasons)?,
            holiday: load_encoder(paths, CategoricalField::Holiday)?,
            func_day: load_encoder(paths, CategoricalField::FuncDay)?,
            week_day: load_encoder(paths, CategoricalField::WeekDay)?,
            month: load_encoder(paths, CategoricalField::Month)?,
        };

        let target_scaler = load_scaler(&paths.target_scaler)?;
        tracing::info!("Target scaler loaded from {}", paths.target_scaler.display());

        Self::new(
            Box::new(model),
            feature_scaler,
            encoders,
            target_scaler,
            sequence_length,
        )
    }

    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        let vocab: Vec<String> = CategoricalField::ALL
            .iter()
            .map(|f| format!("{}={}", f.name(), self.encoders.get(*f).classes().len()))
            .collect();
        format!(
            "model [{}], feature scaler {} x{}, sequence length {}, vocabularies [{}], loaded {}",
            self.model.describe(),
            self.feature_scaler.kind(),
            self.feature_scaler.width(),
            self.sequence_length,
            vocab.join(", "),
            self.loaded_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }
}

fn read_artifact(path: &Path) -> Result<String, ArtifactError> {
    if !path.exists() {
        return Err(ArtifactError::FileNotFound(path.to_path_buf()));
    }
    fs::read_to_string(path).map_err(|e| ArtifactError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Attach the file path to content errors.
fn locate(err: ArtifactError, path: &Path) -> ArtifactError {
    match err {
        ArtifactError::Invalid { artifact, message } => ArtifactError::Malformed {
            path: path.to_path_buf(),
            message: format!("{}: {}", artifact, message),
        },
        other => other,
    }
}

fn load_scaler(path: &Path) -> Result<ColumnScaler, ArtifactError> {
    ColumnScaler::from_json(&read_artifact(path)?).map_err(|e| locate(e, path))
}

fn load_encoder(
    paths: &ArtifactPaths,
    field: CategoricalField,
) -> Result<LabelEncoder, ArtifactError> {
    let path = paths.encoder(field);
    let encoder =
        LabelEncoder::from_json(field, &read_artifact(path)?).map_err(|e| locate(e, path))?;
    tracing::info!(
        "Label encoder for {} loaded from {} ({} classes)",
        field.name(),
        path.display(),
        encoder.classes().len()
    );
    Ok(encoder)
}

/// Initialize-once holder for [`InferenceResources`].
///
/// Concurrent first callers wait on a single load. A failed load leaves the
/// cell empty so the next caller tries again; a successful one is kept for
/// the life of the process.
#[derive(Debug)]
pub struct ResourceCell {
    paths: ArtifactPaths,
    sequence_length: usize,
    cell: OnceCell<Arc<InferenceResources>>,
}

impl ResourceCell {
    pub fn new(paths: ArtifactPaths, sequence_length: usize) -> Self {
        Self {
            paths,
            sequence_length,
            cell: OnceCell::new(),
        }
    }

    /// A cell that already holds resources.
    pub fn preloaded(paths: ArtifactPaths, resources: InferenceResources) -> Self {
        let sequence_length = resources.sequence_length;
        Self {
            paths,
            sequence_length,
            cell: OnceCell::new_with(Some(Arc::new(resources))),
        }
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    /// Resources if they are already loaded.
    pub fn get(&self) -> Result<Arc<InferenceResources>, PipelineError> {
        self.cell.get().cloned().ok_or_else(|| {
            PipelineError::ResourceNotLoaded("artifacts have not been loaded".to_string())
        })
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    /// Return the loaded resources, loading them first if needed.
    pub async fn get_or_load(&self) -> Result<Arc<InferenceResources>, ArtifactError> {
        self.cell
            .get_or_try_init(|| async {
                let paths = self.paths.clone();
                let steps = self.sequence_length;
                let resources =
                    tokio::task::spawn_blocking(move || InferenceResources::load(&paths, steps))
                        .await
                        .map_err(|e| ArtifactError::invalid("artifact loader", e.to_string()))??;
                tracing::info!("Artifacts ready: {}", resources.summary());
                Ok::<_, ArtifactError>(Arc::new(resources))
            })
            .await
            .cloned()
    }
}
