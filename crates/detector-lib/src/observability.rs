//! Observability infrastructure for the anomaly detector
//!
//! Provides:
//! - Prometheus metrics (prediction latency, outcomes, model state)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, GaugeVec, Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<DetectorMetricsInner> = OnceLock::new();

struct DetectorMetricsInner {
    prediction_latency_seconds: Histogram,
    predictions_total: IntCounter,
    prediction_errors_total: IntCounterVec,
    model_loaded: IntGauge,
    model_info: GaugeVec,
}

impl DetectorMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "anomaly_detector_prediction_latency_seconds",
                "Time spent serving a prediction request",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions_total: register_int_counter!(
                "anomaly_detector_predictions_total",
                "Total number of successful predictions"
            )
            .expect("Failed to register predictions_total"),

            prediction_errors_total: register_int_counter_vec!(
                "anomaly_detector_prediction_errors_total",
                "Total number of failed prediction requests by error kind",
                &["kind"]
            )
            .expect("Failed to register prediction_errors_total"),

            model_loaded: register_int_gauge!(
                "anomaly_detector_model_loaded",
                "1 if a model was loaded at startup, 0 otherwise"
            )
            .expect("Failed to register model_loaded"),

            model_info: register_gauge_vec!(
                "anomaly_detector_model_info",
                "Information about the loaded model",
                &["source"]
            )
            .expect("Failed to register model_info"),
        }
    }
}

/// Detector metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct DetectorMetrics {
    _private: (),
}

impl Default for DetectorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(DetectorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &DetectorMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn inc_predictions(&self) {
        self.inner().predictions_total.inc();
    }

    pub fn inc_prediction_errors(&self, kind: &str) {
        self.inner()
            .prediction_errors_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Record whether a model is available and where it came from
    pub fn set_model(&self, source: Option<&str>) {
        self.inner().model_info.reset();
        match source {
            Some(source) => {
                self.inner().model_loaded.set(1);
                self.inner().model_info.with_label_values(&[source]).set(1.0);
            }
            None => self.inner().model_loaded.set(0),
        }
    }

    pub fn predictions(&self) -> u64 {
        self.inner().predictions_total.get()
    }

    pub fn prediction_errors(&self, kind: &str) -> u64 {
        self.inner()
            .prediction_errors_total
            .with_label_values(&[kind])
            .get()
    }
}

/// Structured logger for detector events
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_startup(&self, version: &str, addr: &str) {
        info!(
            event = "detector_started",
            instance = %self.instance,
            version = %version,
            addr = %addr,
            "Anomaly detector started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "detector_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Anomaly detector shutting down"
        );
    }

    pub fn log_model_loaded(&self, source: &str, inputs: &[&str]) {
        info!(
            event = "model_loaded",
            instance = %self.instance,
            source = %source,
            inputs = ?inputs,
            "Model loaded successfully"
        );
    }

    pub fn log_model_load_failed(&self, source: &str, error: &str) {
        error!(
            event = "model_load_failed",
            instance = %self.instance,
            source = %source,
            error = %error,
            "Error loading model, serving without one"
        );
    }

    pub fn log_prediction(&self, feature_count: usize, prediction: f64, trust_score: f64) {
        info!(
            event = "prediction_served",
            instance = %self.instance,
            feature_count = feature_count,
            prediction = prediction,
            trust_score = trust_score,
            "Prediction served"
        );
    }

    pub fn log_prediction_failed(&self, kind: &str, message: &str) {
        if kind == "invalid_input" {
            warn!(
                event = "prediction_rejected",
                instance = %self.instance,
                kind = %kind,
                error = %message,
                "Prediction request rejected"
            );
        } else {
            error!(
                event = "prediction_failed",
                instance = %self.instance,
                kind = %kind,
                error = %message,
                "Prediction request failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detector_metrics_counters() {
        let metrics = DetectorMetrics::new();

        let before = metrics.predictions();
        metrics.inc_predictions();
        assert!(metrics.predictions() > before);

        let before = metrics.prediction_errors("model_unavailable");
        metrics.inc_prediction_errors("model_unavailable");
        assert!(metrics.prediction_errors("model_unavailable") > before);

        metrics.observe_prediction_latency(0.002);
        metrics.set_model(Some("model.onnx"));
        metrics.set_model(None);
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("detector-0");
        assert_eq!(logger.instance, "detector-0");
    }
}
