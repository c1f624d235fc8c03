//! Anomaly detector - serves predictions from a pre-trained model

use anomaly_detector::{api, config::DetectorConfig};
use anyhow::Result;
use detector_lib::{
    health::{components, HealthRegistry},
    AnomalyModel, DetectorMetrics, OnnxModel, PredictionService, StructuredLogger,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DETECTOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting anomaly-detector");

    let config = DetectorConfig::load()?;
    info!(instance = %config.instance_name, model_path = %config.model_path, "Detector configured");

    let health_registry = HealthRegistry::new();
    health_registry.register(components::API).await;

    let metrics = DetectorMetrics::new();
    let logger = StructuredLogger::new(&config.instance_name);

    // The model is settled before the listener binds and never changes afterwards
    let model = load_model(&config, &metrics, &logger);
    let service = PredictionService::from_option(model).with_metrics(metrics);
    health_registry.record_model(service.has_model()).await;
    let state = Arc::new(api::AppState::new(
        service,
        health_registry.clone(),
        logger.clone(),
    ));

    health_registry.set_ready(true).await;

    let addr = config.listen_addr();
    logger.log_startup(DETECTOR_VERSION, &addr);

    let shutdown_logger = logger.clone();
    api::serve(&addr, state, async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown_logger.log_shutdown("SIGINT received");
        }
    })
    .await?;

    info!("Shutting down");
    Ok(())
}

fn load_model(
    config: &DetectorConfig,
    metrics: &DetectorMetrics,
    logger: &StructuredLogger,
) -> Option<Arc<dyn AnomalyModel>> {
    match OnnxModel::from_path(&config.model_path, &config.model_options()) {
        Ok(model) => {
            let metadata = model.metadata();
            logger.log_model_loaded(&config.model_path, &metadata.input_names());
            metrics.set_model(Some(&config.model_path));
            Some(Arc::new(model))
        }
        Err(e) => {
            logger.log_model_load_failed(&config.model_path, &e.to_string());
            metrics.set_model(None);
            None
        }
    }
}
