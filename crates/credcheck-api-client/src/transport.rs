//! Raw request/response primitive under the resilient client.
//!
//! [`Transport`] performs exactly one exchange and reports network problems
//! as [`TransportError`]. Status codes are not interpreted here.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Method};

#[derive(Clone, Debug)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
}

#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// [`Transport`] backed by a shared `reqwest::Client`.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .timeout(request.timeout);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
        };

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(request.timeout)
            } else {
                TransportError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(request.timeout)
            } else {
                TransportError::Network(e.to_string())
            }
        })?;

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reqwest_transport_passes_status_and_body_through() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/verification/stats/")
            .with_status(503)
            .with_header("content-type", "application/json")
            .with_body(r#"{"detail":"maintenance"}"#)
            .create_async()
            .await;

        let transport = ReqwestTransport::new().unwrap();
        let response = transport
            .send(HttpRequest {
                method: Method::GET,
                url: format!("{}/verification/stats/", server.url()),
                query: vec![],
                body: RequestBody::Empty,
                timeout: Duration::from_secs(5),
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, 503);
        assert!(!response.is_success());
        assert_eq!(response.content_type.as_deref(), Some("application/json"));
        assert_eq!(&response.body[..], br#"{"detail":"maintenance"}"#);
    }

    #[tokio::test]
    async fn test_reqwest_transport_reports_connection_failure() {
        let transport = ReqwestTransport::new().unwrap();
        let err = transport
            .send(HttpRequest {
                method: Method::GET,
                url: "http://127.0.0.1:1/unreachable".to_string(),
                query: vec![],
                body: RequestBody::Empty,
                timeout: Duration::from_secs(5),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Network(_)));
    }
}
