use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub artifacts: ArtifactsConfig,
    pub inference: InferenceConfig,
    pub validation: ValidationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArtifactsConfig {
    /// Directory holding the model, scalers and encoders
    pub dir: PathBuf,
    pub model_file: String,
    pub feature_scaler_file: String,
    pub target_scaler_file: String,
    pub funcday_encoder_file: String,
    pub seasons_encoder_file: String,
    pub weekday_encoder_file: String,
    pub month_encoder_file: String,
    pub holiday_encoder_file: String,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models"),
            model_file: "rnn_model.json".to_string(),
            feature_scaler_file: "scaler_X.json".to_string(),
            target_scaler_file: "scaler_y.json".to_string(),
            funcday_encoder_file: "le_funcday.json".to_string(),
            seasons_encoder_file: "le_seasons.json".to_string(),
            weekday_encoder_file: "le_weekday.json".to_string(),
            month_encoder_file: "le_month.json".to_string(),
            holiday_encoder_file: "le_holiday.json".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct InferenceConfig {
    /// Timesteps the single feature row is repeated across
    pub sequence_length: usize,
    /// Clamp predicted counts at zero
    pub clamp_non_negative: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            sequence_length: 24,
            clamp_non_negative: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ValidationConfig {
    /// Reject Hour outside [0, 24) and Day outside [1, 31]
    pub strict_ranges: bool,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        // Load .env file (silently ignore if not present - production uses env vars directly)
        let _ = dotenvy::dotenv();

        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bike-forecast");

        let server = ServerConfig::default();
        let artifacts = ArtifactsConfig::default();
        let inference = InferenceConfig::default();

        let mut builder = Config::builder()
            // 1. Load default values
            // Server
            .set_default("server.host", server.host)?
            .set_default("server.port", i64::from(server.port))?
            // Artifacts
            .set_default("artifacts.dir", artifacts.dir.to_string_lossy().to_string())?
            .set_default("artifacts.model_file", artifacts.model_file)?
            .set_default("artifacts.feature_scaler_file", artifacts.feature_scaler_file)?
            .set_default("artifacts.target_scaler_file", artifacts.target_scaler_file)?
            .set_default("artifacts.funcday_encoder_file", artifacts.funcday_encoder_file)?
            .set_default("artifacts.seasons_encoder_file", artifacts.seasons_encoder_file)?
            .set_default("artifacts.weekday_encoder_file", artifacts.weekday_encoder_file)?
            .set_default("artifacts.month_encoder_file", artifacts.month_encoder_file)?
            .set_default("artifacts.holiday_encoder_file", artifacts.holiday_encoder_file)?
            // Inference
            .set_default("inference.sequence_length", inference.sequence_length as i64)?
            .set_default("inference.clamp_non_negative", inference.clamp_non_negative)?
            // Validation
            .set_default("validation.strict_ranges", false)?

            // 2. Load from local config file (optional, lowest priority)
            .add_source(File::from(PathBuf::from("config.toml")).required(false))

            // 3. Load from user config directory (optional, overrides local)
            .add_source(File::from(config_dir.join("config.toml")).required(false))

            // 4. Load from Environment variables (BIKE__SERVER__PORT=...)
            .add_source(Environment::with_prefix("BIKE").separator("__"));

        // Cloud platforms hand the listening port over as a bare PORT
        if let Ok(port) = std::env::var("PORT") {
            let port: u16 = port
                .trim()
                .parse()
                .with_context(|| format!("PORT must be a valid port number, got '{}'", port))?;
            builder = builder.set_override("server.port", i64::from(port))?;
        }

        let s = builder.build()?;
        Ok(s.try_deserialize()?)
    }
}
