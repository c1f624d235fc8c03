//! HTTP API: prediction endpoint plus health checks and Prometheus metrics

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use detector_lib::{
    health::{ComponentStatus, HealthRegistry},
    ErrorResponse, PredictError, PredictRequest, PredictionResult, PredictionService,
    StructuredLogger,
};
use prometheus::{Encoder, TextEncoder};
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info};

/// Liveness text served on `GET /`
pub const HOME_MESSAGE: &str = "Anomaly Detection API is Running!";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: PredictionService,
    pub health_registry: HealthRegistry,
    pub logger: StructuredLogger,
}

impl AppState {
    pub fn new(
        service: PredictionService,
        health_registry: HealthRegistry,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            service,
            health_registry,
            logger,
        }
    }
}

/// Prediction error rendered as a JSON body
pub struct ApiError(pub PredictError);

impl From<PredictError> for ApiError {
    fn from(err: PredictError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(ErrorResponse::from(&self.0))).into_response()
    }
}

async fn home() -> &'static str {
    HOME_MESSAGE
}

/// `POST /predict`
async fn predict(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<PredictionResult>, ApiError> {
    let outcome = PredictRequest::from_slice(&body).and_then(|request| {
        let feature_count = request.feature_list().map(|f| f.len()).unwrap_or(0);
        state
            .service
            .predict(&request)
            .map(|result| (feature_count, result))
    });

    match outcome {
        Ok((feature_count, result)) => {
            state
                .logger
                .log_prediction(feature_count, result.prediction, result.trust_score);
            Ok(Json(result))
        }
        Err(e) => {
            state.logger.log_prediction_failed(e.kind(), &e.to_string());
            Err(e.into())
        }
    }
}

/// Health check response - 200 if healthy or degraded, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - 200 if ready, 503 otherwise
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/predict", post(predict))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Serve the API until `shutdown` resolves
pub async fn serve(
    addr: &str,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
