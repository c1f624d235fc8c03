//! Anomaly detection library
//!
//! This crate provides:
//! - Request and response models for the prediction endpoint
//! - The anomaly model capability and an ONNX backend
//! - The prediction service (validation, reshape, inference, trust score)
//! - Health checks and observability

pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod predictor;

pub use error::{ModelError, PredictError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{DetectorMetrics, StructuredLogger};
pub use predictor::{AnomalyModel, ModelMetadata, ModelOptions, OnnxModel, PredictionService};
