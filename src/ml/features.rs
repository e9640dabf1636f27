//! Feature engineering for rental demand predictions
//!
//! Converts a validated request into the fixed 17-column vector the feature
//! scaler and the recurrent model were trained on.

use std::f64::consts::PI;

use super::encoder::{CategoricalEncoders, CategoricalField};
use super::schema::PredictionRequest;
use crate::error::PipelineError;

/// Engineered features for a single prediction, in training column order
#[derive(Debug, Clone, PartialEq)]
pub struct EngineeredFeatures {
    // Weather passthrough
    pub temp: f64,
    pub humidity: f64,
    pub wind: f64,
    pub visibility: f64,
    pub solar_rad: f64,
    pub rainfall: f64,
    pub snowfall: f64,

    // Label-encoded calendar flags
    pub seasons_code: f64,
    pub holiday_code: f64,
    pub func_day_code: f64,
    pub week_day_code: f64,
    pub month_code: f64,

    pub year: f64,

    // Cyclical time encoding (prevents hour 23->0 discontinuity)
    pub hour_sin: f64,
    pub hour_cos: f64,
    pub day_sin: f64,
    pub day_cos: f64,
}

impl EngineeredFeatures {
    /// Number of features
    pub const NUM_FEATURES: usize = 17;

    /// Column names in the order the scaler was fit
    pub const FEATURE_NAMES: [&'static str; Self::NUM_FEATURES] = [
        "Temp",
        "Humidity",
        "Wind",
        "Visibility",
        "SolarRad",
        "Rainfall",
        "Snowfall",
        "Seasons",
        "Holiday",
        "FuncDay",
        "WeekDay",
        "Month",
        "Year",
        "Hour_sin",
        "Hour_cos",
        "Day_sin",
        "Day_cos",
    ];

    /// Convert features to the model's column order
    pub fn to_array(&self) -> [f64; Self::NUM_FEATURES] {
        [
            self.temp,
            self.humidity,
            self.wind,
            self.visibility,
            self.solar_rad,
            self.rainfall,
            self.snowfall,
            self.seasons_code,
            self.holiday_code,
            self.func_day_code,
            self.week_day_code,
            self.month_code,
            self.year,
            self.hour_sin,
            self.hour_cos,
            self.day_sin,
            self.day_cos,
        ]
    }
}

/// Hours per day, the period of the hour encoding
pub const HOUR_PERIOD: f64 = 24.0;
/// Period of the day-of-month encoding
pub const DAY_PERIOD: f64 = 31.0;

/// Build the engineered feature vector for one request.
///
/// Pure: the same request and encoders always give the same vector.
pub fn transform(
    request: &PredictionRequest,
    encoders: &CategoricalEncoders,
) -> Result<EngineeredFeatures, PipelineError> {
    let (hour_sin, hour_cos) = cyclical_encode(request.hour, HOUR_PERIOD);
    let (day_sin, day_cos) = cyclical_encode(request.day, DAY_PERIOD);

    let encode = |field: CategoricalField, value: &Option<String>| -> Result<f64, PipelineError> {
        if value.is_none() {
            tracing::warn!(
                "{} is null, using default token '{}'",
                field.name(),
                field.default_token()
            );
        }
        encoders
            .get(field)
            .transform(value.as_deref())
            .map(|code| code as f64)
    };

    Ok(EngineeredFeatures {
        temp: request.temp,
        humidity: request.humidity,
        wind: request.wind,
        visibility: request.visibility,
        solar_rad: request.solar_rad,
        rainfall: request.rainfall,
        snowfall: request.snowfall,
        seasons_code: encode(CategoricalField::Seasons, &request.seasons)?,
        holiday_code: encode(CategoricalField::Holiday, &request.holiday)?,
        func_day_code: encode(CategoricalField::FuncDay, &request.func_day)?,
        week_day_code: encode(CategoricalField::WeekDay, &request.week_day)?,
        month_code: encode(CategoricalField::Month, &request.month)?,
        year: request.year as f64,
        hour_sin,
        hour_cos,
        day_sin,
        day_cos,
    })
}

/// Cyclical encoding for periodic features
/// Returns (sin, cos) encoding to preserve continuity
pub fn cyclical_encode(value: f64, period: f64) -> (f64, f64) {
    let angle = 2.0 * PI * value / period;
    (angle.sin(), angle.cos())
}
