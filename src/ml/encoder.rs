//! Categorical label encoders fit at training time

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{ArtifactError, PipelineError};

/// The five categorical request fields, in feature-vector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoricalField {
    Seasons,
    Holiday,
    FuncDay,
    WeekDay,
    Month,
}

impl CategoricalField {
    pub const ALL: [CategoricalField; 5] = [
        CategoricalField::Seasons,
        CategoricalField::Holiday,
        CategoricalField::FuncDay,
        CategoricalField::WeekDay,
        CategoricalField::Month,
    ];

    /// Wire name of the field.
    pub fn name(self) -> &'static str {
        match self {
            CategoricalField::Seasons => "Seasons",
            CategoricalField::Holiday => "Holiday",
            CategoricalField::FuncDay => "FuncDay",
            CategoricalField::WeekDay => "WeekDay",
            CategoricalField::Month => "Month",
        }
    }

    /// Token looked up when the client sends `null` for this field.
    ///
    /// Training data filled gaps with `0` (and `1` for Month) before the
    /// values were stringified, so these tokens are the encoder's view of a
    /// missing value.
    pub fn default_token(self) -> &'static str {
        match self {
            CategoricalField::Month => MONTH_DEFAULT_TOKEN,
            _ => FLAG_DEFAULT_TOKEN,
        }
    }
}

/// Null substitute for Seasons, Holiday, FuncDay and WeekDay.
pub const FLAG_DEFAULT_TOKEN: &str = "0";
/// Null substitute for Month.
pub const MONTH_DEFAULT_TOKEN: &str = "1";

#[derive(Debug, Deserialize)]
struct LabelEncoderDocument {
    classes: Vec<String>,
}

/// String-to-code lookup; the code of a class is its index in `classes`.
#[derive(Debug, Clone)]
pub struct LabelEncoder {
    field: CategoricalField,
    classes: Vec<String>,
    codes: HashMap<String, usize>,
}

impl LabelEncoder {
    pub fn new(field: CategoricalField, classes: Vec<String>) -> Result<Self, ArtifactError> {
        let artifact = format!("{} encoder", field.name());
        if classes.is_empty() {
            return Err(ArtifactError::invalid(artifact, "no classes"));
        }

        let mut codes = HashMap::with_capacity(classes.len());
        for (code, class) in classes.iter().enumerate() {
            if codes.insert(class.clone(), code).is_some() {
                return Err(ArtifactError::invalid(
                    artifact,
                    format!("duplicate class '{}'", class),
                ));
            }
        }

        Ok(Self {
            field,
            classes,
            codes,
        })
    }

    /// Build from a `{"classes": [...]}` JSON document.
    pub fn from_json(field: CategoricalField, json: &str) -> Result<Self, ArtifactError> {
        let doc: LabelEncoderDocument = serde_json::from_str(json).map_err(|e| {
            ArtifactError::invalid(format!("{} encoder", field.name()), e.to_string())
        })?;
        Self::new(field, doc.classes)
    }

    pub fn field(&self) -> CategoricalField {
        self.field
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Encode one value; `None` is replaced by the field's default token.
    pub fn transform(&self, value: Option<&str>) -> Result<usize, PipelineError> {
        let token = value.unwrap_or_else(|| self.field.default_token());
        self.codes
            .get(token)
            .copied()
            .ok_or_else(|| PipelineError::UnknownCategory {
                field: self.field.name(),
                value: token.to_string(),
            })
    }
}

/// One encoder per categorical field.
#[derive(Debug, Clone)]
pub struct CategoricalEncoders {
    pub seasons: LabelEncoder,
    pub holiday: LabelEncoder,
    pub func_day: LabelEncoder,
    pub week_day: LabelEncoder,
    pub month: LabelEncoder,
}

impl CategoricalEncoders {
    pub fn get(&self, field: CategoricalField) -> &LabelEncoder {
        match field {
            CategoricalField::Seasons => &self.seasons,
            CategoricalField::Holiday => &self.holiday,
            CategoricalField::FuncDay => &self.func_day,
            CategoricalField::WeekDay => &self.week_day,
            CategoricalField::Month => &self.month,
        }
    }
}
