use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use bike_forecast::{
    ArtifactPaths, DemandPredictor, InferenceResources, PipelineOptions, config::AppConfig, server,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "bike-forecast")]
#[command(about = "Bike rental demand forecasting service")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default)
    Serve,
    /// Run one request through the pipeline and print the response
    Predict {
        /// JSON request file, or '-' for stdin
        #[arg(long, short)]
        input: PathBuf,
    },
    /// Load all artifacts and print a summary
    Check,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
        .parse_lossy(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "bike_forecast=debug".to_string()),
        );

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => run_server(config),
        Command::Predict { input } => run_predict(&config, &input),
        Command::Check => run_check(&config),
    }
}

/// Run the HTTP service until interrupted
fn run_server(config: AppConfig) -> Result<()> {
    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

    rt.block_on(async {
        tracing::info!("Starting Bike Rental Forecasting API");
        server::serve(&config).await
    })
}

fn load_resources(config: &AppConfig) -> Result<InferenceResources> {
    let paths = ArtifactPaths::from_config(&config.artifacts);
    InferenceResources::load(&paths, config.inference.sequence_length)
        .with_context(|| format!("Failed to load artifacts from {}", paths.base_dir.display()))
}

/// One-shot prediction from a JSON file or stdin
fn run_predict(config: &AppConfig, input: &Path) -> Result<()> {
    let body = if input.as_os_str() == "-" {
        let mut body = String::new();
        std::io::stdin()
            .read_to_string(&mut body)
            .context("Failed to read request from stdin")?;
        body
    } else {
        std::fs::read_to_string(input)
            .with_context(|| format!("Failed to read {}", input.display()))?
    };

    let request = bike_forecast::PredictionRequest::from_json_str(&body)?;
    let resources = load_resources(config)?;
    let predictor = DemandPredictor::new(Arc::new(resources), PipelineOptions::from(config));

    let prediction = predictor.predict(&request)?;
    let response = serde_json::json!({
        "Prediction": prediction,
        "status": "success",
    });
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// Load artifacts and report what was found
fn run_check(config: &AppConfig) -> Result<()> {
    let resources = load_resources(config)?;
    println!("{}", resources.summary());
    Ok(())
}
