//! Request schema for a single prediction
//!
//! Deserializes the JSON body into a [`PredictionRequest`]. Vocabulary checks
//! for the categorical fields happen later, during encoding.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::{Value, error::Category};

use crate::error::PipelineError;

/// One validated prediction request.
///
/// Categorical fields are `None` when the client sent an explicit `null`;
/// the feature transformer substitutes the per-field default token.
/// Every field is required on the wire, unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PredictionRequest {
    #[serde(deserialize_with = "lax_f64")]
    pub hour: f64,
    #[serde(deserialize_with = "lax_f64")]
    pub temp: f64,
    #[serde(deserialize_with = "lax_f64")]
    pub humidity: f64,
    #[serde(deserialize_with = "lax_f64")]
    pub wind: f64,
    #[serde(deserialize_with = "lax_f64")]
    pub visibility: f64,
    #[serde(deserialize_with = "lax_f64")]
    pub solar_rad: f64,
    #[serde(deserialize_with = "lax_f64")]
    pub rainfall: f64,
    #[serde(deserialize_with = "lax_f64")]
    pub snowfall: f64,
    #[serde(deserialize_with = "nullable_category")]
    pub seasons: Option<String>,
    #[serde(deserialize_with = "nullable_category")]
    pub holiday: Option<String>,
    #[serde(deserialize_with = "nullable_category")]
    pub func_day: Option<String>,
    #[serde(deserialize_with = "lax_f64")]
    pub day: f64,
    #[serde(deserialize_with = "nullable_category")]
    pub week_day: Option<String>,
    #[serde(deserialize_with = "nullable_category")]
    pub month: Option<String>,
    #[serde(deserialize_with = "lax_i64")]
    pub year: i64,
}

impl PredictionRequest {
    /// Parse a raw request body.
    pub fn from_json_str(body: &str) -> Result<Self, PipelineError> {
        serde_json::from_str(body).map_err(validation_error)
    }

    /// Validate a decoded JSON value.
    pub fn from_value(value: &Value) -> Result<Self, PipelineError> {
        Self::deserialize(value).map_err(validation_error)
    }

    /// Reject hours outside `[0, 24)` and days outside `[1, 31]`.
    ///
    /// Only applied when strict range validation is configured; the cyclic
    /// encoding itself is defined for any real value.
    pub fn check_ranges(&self) -> Result<(), PipelineError> {
        let mut errors = Vec::new();
        if !(0.0..24.0).contains(&self.hour) {
            errors.push(format!("Hour: {} is outside [0, 24)", self.hour));
        }
        if !(1.0..=31.0).contains(&self.day) {
            errors.push(format!("Day: {} is outside [1, 31]", self.day));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::Validation(errors.join("; ")))
        }
    }
}

fn validation_error(err: serde_json::Error) -> PipelineError {
    match err.classify() {
        Category::Syntax | Category::Eof | Category::Io => {
            PipelineError::Validation(format!("Invalid JSON body: {}", err))
        }
        Category::Data => PipelineError::Validation(format!("Invalid request: {}", err)),
    }
}

/// Accepts JSON numbers and numeric strings; the result must be finite.
fn lax_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = deserializer.deserialize_any(LaxNumber)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(de::Error::custom(format!("{} is not a finite number", value)))
    }
}

/// Integers, integral floats and integer strings.
fn lax_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = deserializer.deserialize_any(LaxNumber)?;
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Ok(value as i64)
    } else {
        Err(de::Error::custom(format!("{} is not a valid integer", value)))
    }
}

/// A string or an explicit `null`; the key itself stays required.
fn nullable_category<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)
}

struct LaxNumber;

impl Visitor<'_> for LaxNumber {
    type Value = f64;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a number or a numeric string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
        Ok(v as f64)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
        Ok(v as f64)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
        Ok(v)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
        v.trim()
            .parse::<f64>()
            .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
    }
}
