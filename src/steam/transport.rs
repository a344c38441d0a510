//! HTTP transport for the Steam Web API with retry and exponential backoff

use crate::config::{RetryPolicy, SteamSettings};
use crate::error::{MatchmakingError, Result};
use crate::metrics::MetricsCollector;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::sleep;
use tracing::{debug, error, warn};

/// Pooled HTTP client that retries transient upstream failures
#[derive(Clone)]
pub struct SteamTransport {
    http: reqwest::Client,
    retry: RetryPolicy,
    metrics: Option<Arc<MetricsCollector>>,
}

/// Outcome of a single attempt
enum Attempt<T> {
    Done(T),
    Retry(String),
}

impl SteamTransport {
    /// Build the transport with connection pooling and request timeout
    pub fn new(settings: &SteamSettings, retry: RetryPolicy) -> Result<Self> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(settings.max_idle_per_host)
            .timeout(std::time::Duration::from_secs(
                settings.request_timeout_seconds,
            ))
            .user_agent(concat!("playmate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MatchmakingError::ConfigurationError {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            retry,
            metrics: None,
        })
    }

    /// Attach a metrics collector
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// GET `url` and decode the JSON body, retrying retryable failures
    ///
    /// `endpoint` is a short label used in logs, metrics and errors; it never
    /// contains query parameters so the API key stays out of both.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.try_get(endpoint, url, query).await? {
                Attempt::Done(value) => return Ok(value),
                Attempt::Retry(reason) => {
                    if attempt >= self.retry.max_attempts {
                        error!(
                            "Request to {} failed after {} attempts: {}",
                            endpoint, attempt, reason
                        );
                        return Err(MatchmakingError::UpstreamUnavailable {
                            endpoint: endpoint.to_string(),
                            message: format!(
                                "Max attempts exceeded ({}): {}",
                                attempt, reason
                            ),
                        }
                        .into());
                    }

                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        "Request to {} attempt {} failed: {}. Retrying in {:?}",
                        endpoint, attempt, reason, delay
                    );
                    if let Some(metrics) = &self.metrics {
                        metrics.record_upstream_retry(endpoint);
                    }

                    sleep(delay).await;
                }
            }
        }
    }

    /// Single request attempt
    async fn try_get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Attempt<T>> {
        let start = Instant::now();
        let response = self.http.get(url).query(query).send().await;

        let response = match response {
            Ok(response) => response,
            Err(e) if e.is_timeout() || e.is_connect() || e.is_request() => {
                self.record(endpoint, "network_error", start);
                return Ok(Attempt::Retry(format!("network error: {}", e)));
            }
            Err(e) => {
                self.record(endpoint, "network_error", start);
                return Err(MatchmakingError::UpstreamUnavailable {
                    endpoint: endpoint.to_string(),
                    message: e.to_string(),
                }
                .into());
            }
        };

        let status = response.status();
        self.record(endpoint, status.as_str(), start);

        if status.is_success() {
            let body = response
                .bytes()
                .await
                .map_err(|e| MatchmakingError::UpstreamUnavailable {
                    endpoint: endpoint.to_string(),
                    message: format!("Failed to read response body: {}", e),
                })?;

            let value = serde_json::from_slice(&body).map_err(|e| {
                MatchmakingError::UpstreamUnavailable {
                    endpoint: endpoint.to_string(),
                    message: format!("Malformed response body: {}", e),
                }
            })?;

            debug!("Request to {} succeeded in {:?}", endpoint, start.elapsed());
            return Ok(Attempt::Done(value));
        }

        if RetryPolicy::is_retryable_status(status.as_u16()) {
            return Ok(Attempt::Retry(format!("HTTP {}", status.as_u16())));
        }

        Err(MatchmakingError::UpstreamUnavailable {
            endpoint: endpoint.to_string(),
            message: format!("HTTP {}", status.as_u16()),
        }
        .into())
    }

    fn record(&self, endpoint: &str, status: &str, start: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics.record_upstream_request(endpoint, status, start.elapsed());
        }
    }
}
