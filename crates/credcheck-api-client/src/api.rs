//! Domain methods for the verification API.
//!
//! Reads (history, stats, report download) go through the retrying GET path;
//! verify and delete are single-attempt writes.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{ApiClient, NormalizedResponse};

pub const VERIFY_PATH: &str = "/verification/verify/";

/// Body of `POST /verification/verify/`. Metadata keys are flattened next to
/// `certificate_url`.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyRequest {
    pub certificate_url: String,
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Raw verification service answer. Only `status` is mandatory; the other
/// fields fall back to absent when null or of an unexpected type.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyResponse {
    pub status: String,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub hash_match: Option<bool>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub confidence: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub institution: Option<String>,
    #[serde(default, alias = "degree_type", deserialize_with = "lenient_string")]
    pub credential_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub issue_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string_list")]
    pub recommendations: Vec<String>,
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Decimal fields often arrive as strings ("35.00").
fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_string_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

impl ApiClient {
    /// Submit a certificate URL for verification.
    pub async fn verify_certificate(&self, request: &VerifyRequest) -> NormalizedResponse {
        self.post_json(VERIFY_PATH, request).await
    }

    /// Page through previous verifications.
    pub async fn verification_history(&self, limit: u32, offset: u32) -> NormalizedResponse {
        self.get(
            "/verification/history/",
            &[("limit", limit.to_string()), ("offset", offset.to_string())],
        )
        .await
    }

    pub async fn verification_stats(&self) -> NormalizedResponse {
        self.get("/verification/stats/", &[]).await
    }

    /// Download the service-rendered report. The document is in `body`.
    pub async fn download_report(&self, verification_id: &str) -> NormalizedResponse {
        self.get(
            &format!(
                "/verification/report/{}/",
                urlencoding::encode(verification_id)
            ),
            &[],
        )
        .await
    }

    pub async fn delete_verification(&self, verification_id: &str) -> NormalizedResponse {
        self.delete(&format!(
            "/verification/{}/",
            urlencoding::encode(verification_id)
        ))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use crate::{HttpResponse, RequestBody};
    use bytes::Bytes;
    use reqwest::Method;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_history_query() {
        let transport = Arc::new(MockTransport::always(Ok(json_response(
            200,
            json!({"results": [], "count": 0}),
        ))));
        let api = client(transport.clone());

        let response = api.verification_history(25, 50).await;

        assert!(response.success);
        let request = transport.last_request().unwrap();
        assert_eq!(request.method, Method::GET);
        assert!(request.url.ends_with("/verification/history/"));
        assert_eq!(
            request.query,
            vec![
                ("limit".to_string(), "25".to_string()),
                ("offset".to_string(), "50".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_report_download_keeps_binary_body() {
        let pdf = Bytes::from_static(b"%PDF-1.7 binary");
        let transport = Arc::new(MockTransport::always(Ok(HttpResponse {
            status: 200,
            content_type: Some("application/pdf".to_string()),
            body: pdf.clone(),
        })));
        let api = client(transport.clone());

        let response = api.download_report("abc/1").await;

        assert!(response.success);
        assert_eq!(response.body, pdf);
        assert!(transport
            .last_request()
            .unwrap()
            .url
            .ends_with("/verification/report/abc%2F1/"));
    }

    #[test]
    fn test_verify_response_tolerates_null_and_string_fields() {
        let response: VerifyResponse = serde_json::from_value(json!({
            "status": "REJECTED",
            "hash_match": null,
            "confidence": "35.00",
            "institution": 42,
            "issue_date": {"year": 2020},
            "recommendations": null
        }))
        .unwrap();

        assert_eq!(response.status, "REJECTED");
        assert_eq!(response.hash_match, None);
        assert_eq!(response.confidence, Some(35.0));
        assert_eq!(response.institution.as_deref(), Some("42"));
        assert!(response.issue_date.is_none());
        assert!(response.recommendations.is_empty());

        let response: VerifyResponse = serde_json::from_value(json!({
            "status": "VERIFIED",
            "confidence": "n/a",
            "recommendations": ["Keep the original", 7]
        }))
        .unwrap();
        assert_eq!(response.confidence, None);
        assert_eq!(response.recommendations, vec!["Keep the original"]);
    }

    #[test]
    fn test_verify_response_requires_string_status() {
        assert!(serde_json::from_value::<VerifyResponse>(json!({"status": null})).is_err());
        assert!(serde_json::from_value::<VerifyResponse>(json!({"status": 1})).is_err());
        assert!(serde_json::from_value::<VerifyResponse>(json!("VERIFIED")).is_err());
    }

    #[tokio::test]
    async fn test_verify_request_flattens_metadata() {
        let transport = Arc::new(MockTransport::always(Ok(json_response(
            200,
            json!({"status": "VERIFIED", "hash_match": true}),
        ))));
        let api = client(transport.clone());

        let mut metadata = serde_json::Map::new();
        metadata.insert("source".to_string(), json!("cloudinary"));
        api.verify_certificate(&VerifyRequest {
            certificate_url: "https://cdn.example.com/c.png".to_string(),
            metadata,
        })
        .await;

        let request = transport.last_request().unwrap();
        assert_eq!(request.method, Method::POST);
        match request.body {
            RequestBody::Json(body) => assert_eq!(
                body,
                json!({"certificate_url": "https://cdn.example.com/c.png", "source": "cloudinary"})
            ),
            RequestBody::Empty => panic!("expected a JSON body"),
        }
    }

    #[tokio::test]
    async fn test_delete_uses_delete_method() {
        let transport = Arc::new(MockTransport::always(Ok(HttpResponse {
            status: 204,
            content_type: None,
            body: Bytes::new(),
        })));
        let api = client(transport.clone());

        let response = api.delete_verification("17").await;

        assert!(response.success);
        assert_eq!(response.status, 204);
        assert_eq!(transport.last_request().unwrap().method, Method::DELETE);
    }
}
