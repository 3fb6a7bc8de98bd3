//! HTTP client for a REST pinning service
//!
//! - `POST {endpoint}/pins/{cid}` with `{"size_gb": requested}`, answering
//!   `{"size_gb": realized}` (an empty body or missing field means "as requested")
//! - `DELETE {endpoint}/pins/{cid}`, where 404 means "already unpinned"

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::{PinError, PinningService, Result};

/// HTTP pinning client configuration
#[derive(Debug, Clone)]
pub struct HttpPinnerConfig {
    pub endpoint: String,
    pub token: Option<String>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub user_agent: String,
}

impl Default for HttpPinnerConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9094".to_string(),
            token: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            max_retries: 3,
            retry_backoff: Duration::from_secs(1),
            user_agent: "pinkeep/0.1.0".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct PinRequest {
    size_gb: f64,
}

#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(default)]
    size_gb: Option<f64>,
}

/// Pinning service reached over HTTP
pub struct HttpPinner {
    client: Client,
    config: HttpPinnerConfig,
}

impl HttpPinner {
    pub fn new(config: HttpPinnerConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| PinError::RequestFailed(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn pin_url(&self, cid: &str) -> String {
        format!("{}/pins/{}", self.config.endpoint.trim_end_matches('/'), cid)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Run `call` until it succeeds, fails with a non-retryable error, or
    /// `max_retries` retries after the first attempt are spent
    async fn with_retry<T, F, Fut>(&self, op: &'static str, cid: &str, call: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.config.max_retries.saturating_add(1);
        let mut attempts = 0;

        loop {
            attempts += 1;

            match call().await {
                Ok(value) => {
                    if attempts > 1 {
                        debug!(op, cid, attempts, "Pinning call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempts < max_attempts => {
                    warn!(op, cid, attempts, error = %e, "Pinning call failed, retrying");

                    // Exponential backoff: base, 2*base, 4*base...
                    let backoff = self.config.retry_backoff * 2u32.pow(attempts - 1);
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    warn!(op, cid, attempts, error = %e, "Pinning call failed");
                    return Err(e);
                }
            }
        }
    }

    async fn pin_once(&self, cid: &str, size_gb: f64) -> Result<f64> {
        let request = self
            .authorize(self.client.post(self.pin_url(cid)))
            .json(&PinRequest { size_gb });

        let response = request.send().await.map_err(map_transport_error)?;
        let response = check_status(response).await?;

        let body = response
            .bytes()
            .await
            .map_err(|e| PinError::RequestFailed(format!("Failed to read body: {}", e)))?;

        if body.is_empty() {
            return Ok(size_gb);
        }

        let parsed: PinResponse = serde_json::from_slice(&body)
            .map_err(|e| PinError::InvalidResponse(e.to_string()))?;

        Ok(parsed.size_gb.unwrap_or(size_gb))
    }

    async fn unpin_once(&self, cid: &str) -> Result<()> {
        let response = self
            .authorize(self.client.delete(self.pin_url(cid)))
            .send()
            .await
            .map_err(map_transport_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(cid, "Unpin of absent cid treated as success");
            return Ok(());
        }

        check_status(response).await?;
        Ok(())
    }
}

fn map_transport_error(e: reqwest::Error) -> PinError {
    if e.is_timeout() {
        PinError::Timeout
    } else {
        PinError::RequestFailed(e.to_string())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("Unknown").to_string());

    Err(PinError::Rejected {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl PinningService for HttpPinner {
    async fn pin(&self, cid: &str, size_gb: f64) -> Result<f64> {
        debug!(cid, size_gb, "Pinning");
        let realized = self.with_retry("pin", cid, || self.pin_once(cid, size_gb)).await?;
        debug!(cid, requested = size_gb, realized, "Pinned");
        Ok(realized)
    }

    async fn unpin(&self, cid: &str) -> Result<()> {
        debug!(cid, "Unpinning");
        self.with_retry("unpin", cid, || self.unpin_once(cid)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::{Path, State},
        http::StatusCode as AxumStatus,
        routing::post,
    };
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct MockService {
        pins: Arc<Mutex<HashMap<String, f64>>>,
        failures_left: Arc<Mutex<u32>>,
    }

    async fn mock_pin(
        State(svc): State<MockService>,
        Path(cid): Path<String>,
        Json(body): Json<serde_json::Value>,
    ) -> std::result::Result<Json<serde_json::Value>, AxumStatus> {
        {
            let mut left = svc.failures_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(AxumStatus::SERVICE_UNAVAILABLE);
            }
        }

        if cid == "forbidden" {
            return Err(AxumStatus::FORBIDDEN);
        }

        let requested = body["size_gb"].as_f64().unwrap_or(0.0);
        // Realized size is rounded up to whole gigabytes
        let realized = requested.ceil();
        svc.pins.lock().unwrap().insert(cid, realized);
        Ok(Json(serde_json::json!({ "size_gb": realized })))
    }

    async fn mock_unpin(State(svc): State<MockService>, Path(cid): Path<String>) -> AxumStatus {
        match svc.pins.lock().unwrap().remove(&cid) {
            Some(_) => AxumStatus::OK,
            None => AxumStatus::NOT_FOUND,
        }
    }

    async fn start_mock_service(failures: u32) -> (String, MockService) {
        let svc = MockService::default();
        *svc.failures_left.lock().unwrap() = failures;

        let app = Router::new()
            .route("/pins/{cid}", post(mock_pin).delete(mock_unpin))
            .with_state(svc.clone());

        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), svc)
    }

    fn test_config(endpoint: String) -> HttpPinnerConfig {
        HttpPinnerConfig {
            endpoint,
            max_retries: 3,
            retry_backoff: Duration::from_millis(10),
            ..Default::default()
        }
    }

    #[test]
    fn test_http_config_defaults() {
        let config = HttpPinnerConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.user_agent, "pinkeep/0.1.0");
    }

    #[test]
    fn test_pin_url_trims_trailing_slash() {
        let pinner = HttpPinner::new(test_config("http://pins.local/".to_string())).unwrap();
        assert_eq!(pinner.pin_url("bafy1"), "http://pins.local/pins/bafy1");
    }

    #[tokio::test]
    async fn test_pin_returns_realized_size() {
        let (endpoint, svc) = start_mock_service(0).await;
        let pinner = HttpPinner::new(test_config(endpoint)).unwrap();

        let realized = pinner.pin("bafy1", 1.5).await.unwrap();
        assert_eq!(realized, 2.0);
        assert_eq!(svc.pins.lock().unwrap().get("bafy1"), Some(&2.0));
    }

    #[tokio::test]
    async fn test_pin_retries_server_errors() {
        let (endpoint, _svc) = start_mock_service(2).await;
        let pinner = HttpPinner::new(test_config(endpoint)).unwrap();

        let realized = pinner.pin("bafy1", 3.0).await.unwrap();
        assert_eq!(realized, 3.0);
    }

    #[tokio::test]
    async fn test_max_retries_counts_retries_after_first_attempt() {
        // Three failures, then success on the fourth call
        let (endpoint, _svc) = start_mock_service(3).await;
        let pinner = HttpPinner::new(test_config(endpoint)).unwrap();
        assert_eq!(pinner.pin("bafy1", 2.0).await.unwrap(), 2.0);

        let (endpoint, _svc) = start_mock_service(1).await;
        let pinner = HttpPinner::new(HttpPinnerConfig {
            max_retries: 0,
            ..test_config(endpoint)
        })
        .unwrap();
        let err = pinner.pin("bafy1", 2.0).await.unwrap_err();
        assert!(matches!(err, PinError::Rejected { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_pin_does_not_retry_client_errors() {
        let (endpoint, _svc) = start_mock_service(0).await;
        let pinner = HttpPinner::new(test_config(endpoint)).unwrap();

        let err = pinner.pin("forbidden", 1.0).await.unwrap_err();
        assert!(matches!(err, PinError::Rejected { status: 403, .. }));
    }

    #[tokio::test]
    async fn test_unpin_is_idempotent() {
        let (endpoint, svc) = start_mock_service(0).await;
        let pinner = HttpPinner::new(test_config(endpoint)).unwrap();

        pinner.pin("bafy1", 1.0).await.unwrap();
        pinner.unpin("bafy1").await.unwrap();
        pinner.unpin("bafy1").await.unwrap();
        assert!(svc.pins.lock().unwrap().is_empty());
    }
}
