//! Error types for the prediction pipeline

use thiserror::Error;

/// Failure modes of a single prediction request
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictError {
    /// The caller did not supply a well-formed feature list
    #[error("Invalid input: 'features' must be a list")]
    InvalidInput,

    /// No model was loaded at startup
    #[error("Model not loaded")]
    ModelUnavailable,

    /// Reshape or model invocation failed
    #[error("{0}")]
    PredictionFailure(String),
}

impl PredictError {
    /// True when the caller is at fault
    pub fn is_client_error(&self) -> bool {
        matches!(self, PredictError::InvalidInput)
    }

    /// Short label used for metrics and log records
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::InvalidInput => "invalid_input",
            PredictError::ModelUnavailable => "model_unavailable",
            PredictError::PredictionFailure(_) => "prediction_failure",
        }
    }
}

/// Errors raised while loading a model from disk
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load model: {0:#}")]
    Load(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            PredictError::InvalidInput.to_string(),
            "Invalid input: 'features' must be a list"
        );
        assert_eq!(PredictError::ModelUnavailable.to_string(), "Model not loaded");
        assert_eq!(
            PredictError::PredictionFailure("shape mismatch".into()).to_string(),
            "shape mismatch"
        );
    }

    #[test]
    fn test_only_invalid_input_is_client_error() {
        assert!(PredictError::InvalidInput.is_client_error());
        assert!(!PredictError::ModelUnavailable.is_client_error());
        assert!(!PredictError::PredictionFailure(String::new()).is_client_error());
    }
}
