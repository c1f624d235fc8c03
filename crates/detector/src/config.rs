//! Detector configuration

use anyhow::Result;
use detector_lib::ModelOptions;
use serde::Deserialize;
use tracing::warn;

/// Environment variable naming the optional config file (without extension)
pub const CONFIG_FILE_ENV: &str = "DETECTOR_CONFIG";

/// Detector configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DetectorConfig {
    /// Instance name used in structured logs
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// Listen address
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Path to the ONNX model loaded at startup
    #[serde(default = "default_model_path")]
    pub model_path: String,

    /// Pin the model input to this many features
    #[serde(default)]
    pub input_features: Option<usize>,

    /// Graph output carrying the prediction
    #[serde(default)]
    pub output_index: usize,
}

fn default_instance_name() -> String {
    std::env::var("NODE_NAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    6000
}

fn default_model_path() -> String {
    "model.onnx".to_string()
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            instance_name: default_instance_name(),
            host: default_host(),
            port: default_port(),
            model_path: default_model_path(),
            input_features: None,
            output_index: 0,
        }
    }
}

impl DetectorConfig {
    /// Load configuration from an optional config file and `DETECTOR_*` environment variables
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| "detector".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name(&file).required(false))
            .add_source(config::Environment::with_prefix("DETECTOR"))
            .build()?;

        Ok(Self::deserialize_or_default(config))
    }

    /// Parse configuration from a TOML document
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(contents, config::FileFormat::Toml))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    fn deserialize_or_default(config: config::Config) -> Self {
        config.try_deserialize().unwrap_or_else(|e| {
            warn!(error = %e, "Invalid configuration, using defaults");
            Self::default()
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn model_options(&self) -> ModelOptions {
        ModelOptions {
            input_features: self.input_features,
            output_index: self.output_index,
        }
    }
}
