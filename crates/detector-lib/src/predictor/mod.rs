//! Anomaly model capability and the prediction pipeline built on it

mod inference;
mod service;

pub use inference::{InferenceStats, ModelOptions, OnnxModel, MAX_INFERENCE_MS};
pub use service::PredictionService;

use crate::models::FeatureVector;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// A loaded anomaly-detection model
///
/// Implementations are shared read-only across requests.
pub trait AnomalyModel: Send + Sync {
    /// Predict one value per input row, in row order
    fn predict_batch(&self, rows: &[FeatureVector]) -> Result<Vec<f64>>;

    /// Describe the model's inputs and outputs
    fn metadata(&self) -> ModelMetadata {
        ModelMetadata::default()
    }
}

/// Name and fact of a model input or output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorInfo {
    pub name: String,
    pub fact: String,
}

/// Static description of a loaded model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub source: String,
    pub inputs: Vec<TensorInfo>,
    pub outputs: Vec<TensorInfo>,
}

impl ModelMetadata {
    /// Names of the graph inputs, the closest thing an ONNX graph has to feature names
    pub fn input_names(&self) -> Vec<&str> {
        self.inputs.iter().map(|t| t.name.as_str()).collect()
    }
}
