//! HTTP client for a running anomaly detector

use anyhow::{Context, Result};
use detector_lib::{
    ErrorResponse, HealthResponse, PredictRequest, PredictionResult, ReadinessResponse,
};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

/// API client for the detector service
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Request a prediction for one feature vector
    pub async fn predict(&self, features: &[f64]) -> Result<PredictionResult> {
        let url = self.base_url.join("predict").context("Invalid path")?;
        let body = PredictRequest::new(serde_json::json!(features));

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            anyhow::bail!("API error ({}): {}", status, error_message(response).await);
        }

        response.json().await.context("Failed to parse response")
    }

    /// Component health; a 503 still carries a health body
    pub async fn health(&self) -> Result<(StatusCode, HealthResponse)> {
        self.get_any_status("healthz").await
    }

    pub async fn readiness(&self) -> Result<(StatusCode, ReadinessResponse)> {
        self.get_any_status("readyz").await
    }

    async fn get_any_status<T: DeserializeOwned>(&self, path: &str) -> Result<(StatusCode, T)> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        let body = response.json().await.context("Failed to parse response")?;
        Ok((status, body))
    }
}

/// Extract the `error` field of a failed response, falling back to the raw body
async fn error_message(response: Response) -> String {
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.error)
        .unwrap_or(body)
}
