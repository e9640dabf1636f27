//! Shared fixtures: a complete artifact set written to a temp directory.
//!
//! The fixture model reads only the scaled Temp column, so predictions are
//! easy to compute by hand:
//!
//! ```text
//! scaled_temp = (Temp - 10) / 5
//! Prediction  = 500 + 1000 * 0.1 * scaled_temp = 400 + 20 * (Temp - 5)
//! ```

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use bike_forecast::{ArtifactPaths, EngineeredFeatures, InferenceResources};
use serde_json::{Value, json};
use tempfile::TempDir;

pub const SEQUENCE_LENGTH: usize = 24;

/// Prediction for scenario A (Temp 5.0)
pub const SCENARIO_A_PREDICTION: f64 = 400.0;

pub fn scenario_a() -> Value {
    json!({
        "Hour": 8,
        "Temp": 5.0,
        "Humidity": 40,
        "Wind": 2.0,
        "Visibility": 2000,
        "SolarRad": 0.5,
        "Rainfall": 0,
        "Snowfall": 0,
        "Seasons": "Winter",
        "Holiday": "No Holiday",
        "FuncDay": "Yes",
        "Day": 15,
        "WeekDay": "Mon",
        "Month": "1",
        "Year": 2018
    })
}

pub fn expected_prediction(temp: f64) -> f64 {
    SCENARIO_A_PREDICTION + 20.0 * (temp - 5.0)
}

fn feature_scaler() -> Value {
    let width = EngineeredFeatures::NUM_FEATURES;
    let mut mean = vec![0.0; width];
    let mut scale = vec![1.0; width];
    mean[0] = 10.0;
    scale[0] = 5.0;

    json!({
        "kind": "standard",
        "mean": mean,
        "scale": scale,
        "feature_names": EngineeredFeatures::FEATURE_NAMES,
    })
}

fn model() -> Value {
    let mut kernel = vec![vec![0.0]; EngineeredFeatures::NUM_FEATURES];
    kernel[0][0] = 0.1;

    json!({
        "input_shape": [SEQUENCE_LENGTH, EngineeredFeatures::NUM_FEATURES],
        "layers": [
            {
                "type": "simple_rnn",
                "activation": "linear",
                "kernel": kernel,
                "recurrent_kernel": [[0.0]],
                "bias": [0.0]
            },
            { "type": "dropout" },
            { "type": "dense", "kernel": [[1.0]], "bias": [0.0] }
        ]
    })
}

fn write_json(dir: &Path, name: &str, value: &Value) {
    fs::write(dir.join(name), value.to_string()).unwrap();
}

/// Write every artifact with its default file name into `dir`.
pub fn write_artifacts(dir: &Path) {
    write_json(dir, "rnn_model.json", &model());
    write_json(dir, "scaler_X.json", &feature_scaler());
    write_json(
        dir,
        "scaler_y.json",
        &json!({ "kind": "standard", "mean": [500.0], "scale": [1000.0] }),
    );
    write_json(dir, "le_funcday.json", &json!({ "classes": ["No", "Yes"] }));
    write_json(
        dir,
        "le_seasons.json",
        &json!({ "classes": ["Autumn", "Spring", "Summer", "Winter"] }),
    );
    write_json(
        dir,
        "le_weekday.json",
        &json!({ "classes": ["Fri", "Mon", "Sat", "Sun", "Thu", "Tue", "Wed"] }),
    );
    write_json(
        dir,
        "le_month.json",
        &json!({ "classes": ["1", "10", "11", "12", "2", "3", "4", "5", "6", "7", "8", "9"] }),
    );
    write_json(dir, "le_holiday.json", &json!({ "classes": ["Holiday", "No Holiday"] }));
}

/// Temp directory holding a complete artifact set.
pub fn artifact_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_artifacts(dir.path());
    dir
}

pub fn load_resources(dir: &Path) -> InferenceResources {
    InferenceResources::load(&ArtifactPaths::in_dir(dir), SEQUENCE_LENGTH)
        .expect("fixture artifacts should load")
}
