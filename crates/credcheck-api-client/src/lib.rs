//! Resilient HTTP client for the credential verification service.
//!
//! [`ApiClient`] wraps a [`Transport`] with a uniform response envelope
//! ([`NormalizedResponse`]), a per-call deadline and a bounded retry policy
//! that only ever repeats read-only calls. Domain methods (verify, history,
//! stats, report download) live in [`api`]; the mapping of verification
//! responses into outcomes lives in [`verification`].

pub mod api;
pub mod response;
pub mod transport;
pub mod verification;

use std::sync::Arc;
use std::time::Duration;

use credcheck_core::RequestConfig;
use reqwest::Method;

pub use response::{extract_message, NormalizedResponse};
pub use transport::{HttpRequest, HttpResponse, RequestBody, ReqwestTransport, Transport, TransportError};
pub use verification::{VerificationClient, Verifier, VerifyError, VerifyMetadata, VerifyReference};

/// Retry budget for idempotent calls.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): `base_delay * attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(300),
        }
    }
}

/// Per-call overrides.
#[derive(Clone, Debug, Default)]
pub struct CallOptions {
    pub query: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl CallOptions {
    pub fn with_query(query: &[(&str, String)]) -> Self {
        Self {
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            timeout: None,
        }
    }
}

/// Methods that are safe to repeat.
pub fn is_idempotent(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// HTTP client for the verification API.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, config: &RequestConfig) -> Self {
        Self {
            transport,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout,
            retry: RetryPolicy {
                max_retries: config.max_retries,
                base_delay: config.retry_base_delay,
            },
        }
    }

    /// Client over a real HTTP transport.
    pub fn from_config(config: &RequestConfig) -> anyhow::Result<Self> {
        let transport = ReqwestTransport::new()?;
        Ok(Self::new(Arc::new(transport), config))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Perform one logical call. Never returns an error: transport failures
    /// and non-2xx responses come back as `success = false`.
    ///
    /// GET/HEAD/OPTIONS are retried on transport failure (a timeout counts),
    /// up to `max_retries` times with a linearly growing delay. Any HTTP
    /// response, 5xx included, is a service answer and is returned as is.
    /// Every other method is sent exactly once.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        options: CallOptions,
    ) -> NormalizedResponse {
        let timeout = options.timeout.unwrap_or(self.timeout);
        let retryable_method = is_idempotent(&method);
        let request = HttpRequest {
            method,
            url: self.build_url(path),
            query: options.query,
            body,
            timeout,
        };

        let mut attempt: u32 = 0;
        loop {
            let result = match tokio::time::timeout(timeout, self.transport.send(request.clone()))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout(timeout)),
            };

            if retryable_method && result.is_err() && attempt < self.retry.max_retries {
                attempt += 1;
                let delay = self.retry.delay_for(attempt);
                tracing::warn!(
                    method = %request.method,
                    url = %request.url,
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Request failed, retrying"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            return match result {
                Ok(response) => {
                    let normalized = NormalizedResponse::from_response(response);
                    if !normalized.success {
                        tracing::debug!(
                            method = %request.method,
                            url = %request.url,
                            status = normalized.status,
                            message = %normalized.message,
                            "Request returned non-success status"
                        );
                    }
                    normalized
                }
                Err(error) => {
                    tracing::warn!(
                        method = %request.method,
                        url = %request.url,
                        attempts = attempt + 1,
                        error = %error,
                        "Request failed"
                    );
                    NormalizedResponse::from_transport_error(&error)
                }
            };
        }
    }

    /// GET with optional query parameters.
    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> NormalizedResponse {
        self.call(
            Method::GET,
            path,
            RequestBody::Empty,
            CallOptions::with_query(query),
        )
        .await
    }

    /// POST a JSON body.
    pub async fn post_json<B: serde::Serialize>(&self, path: &str, body: &B) -> NormalizedResponse {
        match serde_json::to_value(body) {
            Ok(value) => {
                self.call(
                    Method::POST,
                    path,
                    RequestBody::Json(value),
                    CallOptions::default(),
                )
                .await
            }
            Err(e) => NormalizedResponse::from_transport_error(&TransportError::Network(format!(
                "Failed to encode request body: {}",
                e
            ))),
        }
    }

    pub async fn delete(&self, path: &str) -> NormalizedResponse {
        self.call(
            Method::DELETE,
            path,
            RequestBody::Empty,
            CallOptions::default(),
        )
        .await
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use serde_json::json;

    fn network_down() -> Result<HttpResponse, TransportError> {
        Err(TransportError::Network("connection refused".to_string()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_call_retries_twice_with_linear_backoff() {
        let transport = Arc::new(MockTransport::always(network_down()));
        let client = client(transport.clone());

        let response = client.get("/verification/stats/", &[]).await;

        assert!(!response.success);
        assert_eq!(response.status, 0);
        assert_eq!(response.message, "Network error: connection refused");
        assert_eq!(transport.call_count(), 3);

        let times = transport.call_times();
        assert!(times[1] - times[0] >= Duration::from_millis(300));
        assert!(times[2] - times[1] >= Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_call_is_attempted_once() {
        let transport = Arc::new(MockTransport::always(network_down()));
        let client = client(transport.clone());

        let response = client
            .post_json("/verification/verify/", &json!({"certificate_url": "x"}))
            .await;

        assert!(!response.success);
        assert_eq!(transport.call_count(), 1);

        let response = client.delete("/verification/42/").await;
        assert!(!response.success);
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_call_recovers_after_transient_failure() {
        let transport = Arc::new(MockTransport::scripted(
            vec![
                network_down(),
                Err(TransportError::Timeout(Duration::from_secs(15))),
            ],
            Ok(json_response(200, json!({"total": 7}))),
        ));
        let client = client(transport.clone());

        let response = client.get("/verification/stats/", &[]).await;

        assert!(response.success);
        assert_eq!(response.data["total"], 7);
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_errors_are_not_retried() {
        let transport = Arc::new(MockTransport::always(Ok(json_response(
            503,
            json!({"detail": "busy"}),
        ))));
        let client = client(transport.clone());

        let response = client.get("/verification/stats/", &[]).await;

        assert!(!response.success);
        assert!(!response.is_transport_failure());
        assert_eq!(response.status, 503);
        assert_eq!(response.message, "busy");
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_errors_are_not_retried() {
        let transport = Arc::new(MockTransport::always(Ok(json_response(
            404,
            json!({"detail": "Not found."}),
        ))));
        let client = client(transport.clone());

        let response = client.get("/verification/report/9/", &[]).await;

        assert!(!response.success);
        assert_eq!(response.status, 404);
        assert_eq!(response.message, "Not found.");
        assert_eq!(transport.call_count(), 1);
    }

    struct HangingTransport;

    #[async_trait::async_trait]
    impl Transport for HangingTransport {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_is_a_transport_failure() {
        let client = ApiClient::new(Arc::new(HangingTransport), &RequestConfig::default());

        let started = tokio::time::Instant::now();
        let response = client
            .call(
                Method::POST,
                "/verification/verify/",
                RequestBody::Empty,
                CallOptions {
                    timeout: Some(Duration::from_secs(2)),
                    ..Default::default()
                },
            )
            .await;

        assert!(response.is_transport_failure());
        assert!(response.message.contains("timed out"));
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_query_parameters_are_forwarded() {
        let transport = Arc::new(MockTransport::always(Ok(json_response(200, json!([])))));
        let client = client(transport.clone());

        client
            .get("/verification/history/", &[("limit", "10".to_string())])
            .await;

        let request = transport.last_request().unwrap();
        assert_eq!(request.url, "http://localhost:8000/verification/history/");
        assert_eq!(request.query, vec![("limit".to_string(), "10".to_string())]);
        assert_eq!(request.timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_idempotent_methods() {
        assert!(is_idempotent(&Method::GET));
        assert!(is_idempotent(&Method::HEAD));
        assert!(is_idempotent(&Method::OPTIONS));
        assert!(!is_idempotent(&Method::POST));
        assert!(!is_idempotent(&Method::DELETE));
        assert!(!is_idempotent(&Method::PUT));
    }
}
