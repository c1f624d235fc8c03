//! Request-to-prediction pipeline
//!
//! Validates the request, checks that a model is loaded, reshapes the
//! features into a single-row batch, runs the model and derives the
//! trust score.

use super::AnomalyModel;
use crate::error::PredictError;
use crate::models::{FeatureVector, PredictRequest, PredictionResult};
use crate::observability::DetectorMetrics;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

/// Stateless prediction service around an optional, read-only model
#[derive(Clone)]
pub struct PredictionService {
    model: Option<Arc<dyn AnomalyModel>>,
    metrics: Option<DetectorMetrics>,
}

impl PredictionService {
    pub fn new(model: Arc<dyn AnomalyModel>) -> Self {
        Self::from_option(Some(model))
    }

    /// Service that answers every valid request with `ModelUnavailable`
    pub fn without_model() -> Self {
        Self::from_option(None)
    }

    pub fn from_option(model: Option<Arc<dyn AnomalyModel>>) -> Self {
        Self {
            model,
            metrics: None,
        }
    }

    /// Record latency and outcome counters on every prediction
    pub fn with_metrics(mut self, metrics: DetectorMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Run one prediction.
    ///
    /// Input is validated before model availability is checked, so a
    /// malformed payload reports `InvalidInput` even when no model is loaded.
    pub fn predict(&self, request: &PredictRequest) -> Result<PredictionResult, PredictError> {
        let start = Instant::now();
        let result = self.run(request);

        if let Some(metrics) = &self.metrics {
            metrics.observe_prediction_latency(start.elapsed().as_secs_f64());
            match &result {
                Ok(_) => metrics.inc_predictions(),
                Err(e) => metrics.inc_prediction_errors(e.kind()),
            }
        }

        result
    }

    fn run(&self, request: &PredictRequest) -> Result<PredictionResult, PredictError> {
        debug!(features = ?request.features, "Received features (raw)");

        let items = request.feature_list()?;
        let model = self.model.as_ref().ok_or(PredictError::ModelUnavailable)?;

        let batch = vec![FeatureVector::from_json(items)?];
        debug!(rows = batch.len(), columns = batch[0].len(), batch = ?batch, "Features after reshape");

        let predictions = model.predict_batch(&batch).map_err(|e| {
            error!(error = ?e, "Model invocation failed");
            PredictError::PredictionFailure(e.to_string())
        })?;
        let prediction = predictions.first().copied().ok_or_else(|| {
            PredictError::PredictionFailure("Model returned no predictions".to_string())
        })?;
        debug!(prediction = prediction, "Model prediction");

        if !prediction.is_finite() {
            error!(prediction = prediction, "Model returned a non-finite prediction");
            return Err(PredictError::PredictionFailure(format!(
                "Model returned a non-finite prediction: {}",
                prediction
            )));
        }

        let result = PredictionResult::from_prediction(prediction);
        debug!(trust_score = result.trust_score, "Calculated trust score");

        Ok(result)
    }
}
