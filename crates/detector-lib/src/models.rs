//! Core data models for the anomaly detector

use crate::error::PredictError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a `POST /predict` request
///
/// `features` is kept as raw JSON so that shape problems are reported as
/// invalid input instead of a deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub features: Option<Value>,
}

impl PredictRequest {
    pub fn new(features: Value) -> Self {
        Self {
            features: Some(features),
        }
    }

    /// Parse a raw request body. Anything that is not a JSON object is invalid input.
    pub fn from_slice(body: &[u8]) -> Result<Self, PredictError> {
        let value: Value = serde_json::from_slice(body).map_err(|_| PredictError::InvalidInput)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, PredictError> {
        if !value.is_object() {
            return Err(PredictError::InvalidInput);
        }
        serde_json::from_value(value).map_err(|_| PredictError::InvalidInput)
    }

    /// Returns the feature list if it is a non-empty JSON array
    pub fn feature_list(&self) -> Result<&[Value], PredictError> {
        match &self.features {
            Some(Value::Array(items)) if !items.is_empty() => Ok(items),
            _ => Err(PredictError::InvalidInput),
        }
    }
}

/// One observation to classify
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(pub Vec<f64>);

impl FeatureVector {
    /// Convert raw JSON entries into numbers.
    ///
    /// Booleans coerce to 1.0 / 0.0, every other non-number is rejected.
    pub fn from_json(items: &[Value]) -> Result<Self, PredictError> {
        items
            .iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Number(n) => n.as_f64().ok_or_else(|| not_numeric(index)),
                Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
                _ => Err(not_numeric(index)),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

fn not_numeric(index: usize) -> PredictError {
    PredictError::PredictionFailure(format!(
        "could not convert feature at index {} to a number",
        index
    ))
}

/// Successful prediction response
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub prediction: f64,
    pub trust_score: f64,
}

impl PredictionResult {
    /// Derive the trust score as a linear inversion of the raw prediction.
    /// Values outside [0, 1] are not clamped.
    pub fn from_prediction(prediction: f64) -> Self {
        Self {
            prediction,
            trust_score: 100.0 - (prediction * 100.0),
        }
    }
}

/// JSON error body returned to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl From<&PredictError> for ErrorResponse {
    fn from(err: &PredictError) -> Self {
        Self {
            error: err.to_string(),
        }
    }
}
