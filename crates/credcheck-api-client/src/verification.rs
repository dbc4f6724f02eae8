//! Verification client: turns a verification service answer into a
//! [`VerificationOutcome`].
//!
//! "The service ran and found no match" is an `Invalid` outcome. "The service
//! could not be reached or answered garbage" is a [`VerifyError`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use credcheck_core::{AssetRef, ErrorKind, VerificationOutcome, VerificationStatus};
use serde_json::{Map, Value};

use crate::api::{VerifyRequest, VerifyResponse};
use crate::ApiClient;

const VERIFIED_STATUS: &str = "VERIFIED";
const EXACT_MATCH_CONFIDENCE: f64 = 100.0;

const POSITIVE_RECOMMENDATIONS: [&str; 4] = [
    "Certificate appears to be authentic and verified",
    "Digital signature matches our database records",
    "Institution credentials have been confirmed",
    "This certificate can be trusted for official purposes",
];

const NEGATIVE_RECOMMENDATIONS: [&str; 4] = [
    "Certificate could not be verified against our database",
    "Please ensure the image is clear and complete",
    "Contact the issuing institution for verification assistance",
    "Consider re-uploading with better image quality",
];

/// What to verify: an uploaded asset or a URL supplied by the user.
#[derive(Debug, Clone)]
pub enum VerifyReference {
    Asset {
        asset: AssetRef,
        original_filename: String,
    },
    Url(String),
}

impl VerifyReference {
    pub fn url(&self) -> &str {
        match self {
            VerifyReference::Asset { asset, .. } => &asset.url,
            VerifyReference::Url(url) => url,
        }
    }

    /// Caller metadata sent alongside the URL.
    pub fn metadata(&self) -> VerifyMetadata {
        match self {
            VerifyReference::Asset {
                asset,
                original_filename,
            } => VerifyMetadata {
                source: Some("cloudinary".to_string()),
                original_filename: Some(original_filename.clone()),
                public_id: Some(asset.public_id.clone()),
                timestamp: Some(Utc::now()),
            },
            VerifyReference::Url(_) => VerifyMetadata::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VerifyMetadata {
    pub source: Option<String>,
    pub original_filename: Option<String>,
    pub public_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl VerifyMetadata {
    fn into_map(self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(source) = self.source {
            map.insert("source".to_string(), Value::String(source));
        }
        if let Some(name) = self.original_filename {
            map.insert("original_filename".to_string(), Value::String(name));
        }
        if let Some(public_id) = self.public_id {
            map.insert("public_id".to_string(), Value::String(public_id));
        }
        if let Some(ts) = self.timestamp {
            map.insert("timestamp".to_string(), Value::String(ts.to_rfc3339()));
        }
        map
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VerifyError {
    #[error("Verification service unreachable: {0}")]
    Transport(String),

    #[error("Verification service error ({status}): {message}")]
    Service { status: u16, message: String },

    #[error("Malformed verification response: {0}")]
    Malformed(String),
}

impl VerifyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VerifyError::Transport(_) => ErrorKind::TransportFailure,
            VerifyError::Service { .. } | VerifyError::Malformed(_) => ErrorKind::ServiceFailure,
        }
    }
}

/// Anything that can verify a reference. Implemented by [`VerificationClient`].
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, reference: &VerifyReference)
        -> Result<VerificationOutcome, VerifyError>;
}

#[derive(Clone, Debug)]
pub struct VerificationClient {
    api: ApiClient,
}

impl VerificationClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }
}

#[async_trait]
impl Verifier for VerificationClient {
    async fn verify(
        &self,
        reference: &VerifyReference,
    ) -> Result<VerificationOutcome, VerifyError> {
        let request = VerifyRequest {
            certificate_url: reference.url().to_string(),
            metadata: reference.metadata().into_map(),
        };

        let response = self.api.verify_certificate(&request).await;

        if response.is_transport_failure() {
            return Err(VerifyError::Transport(response.message));
        }
        if !response.success {
            return Err(VerifyError::Service {
                status: response.status,
                message: response.message,
            });
        }

        let parsed: VerifyResponse = response
            .json()
            .map_err(|e| VerifyError::Malformed(e.to_string()))?;

        let outcome = outcome_from_response(parsed, Utc::now());
        tracing::debug!(
            url = %request.certificate_url,
            status = ?outcome.status,
            confidence = ?outcome.confidence,
            "Verification completed"
        );
        Ok(outcome)
    }
}

/// Map a raw service answer into an outcome.
///
/// Confidence is 100 on an exact hash match, otherwise the service's own
/// score clamped to 0..=100, otherwise absent. Descriptive fields are never
/// invented.
pub fn outcome_from_response(response: VerifyResponse, now: DateTime<Utc>) -> VerificationOutcome {
    let status = if response.status == VERIFIED_STATUS {
        VerificationStatus::Verified
    } else {
        VerificationStatus::Invalid
    };

    let confidence = if response.hash_match == Some(true) {
        Some(EXACT_MATCH_CONFIDENCE)
    } else {
        response
            .confidence
            .filter(|c| c.is_finite())
            .map(|c| c.clamp(0.0, 100.0))
    };

    let recommendations = if response.recommendations.is_empty() {
        default_recommendations(status)
    } else {
        response.recommendations
    };

    VerificationOutcome {
        status,
        confidence,
        institution: non_blank(response.institution),
        credential_type: non_blank(response.credential_type),
        issue_date: non_blank(response.issue_date),
        details: non_blank(response.message)
            .unwrap_or_else(|| "Verification complete".to_string()),
        recommendations,
        verified_at: now,
    }
}

pub fn default_recommendations(status: VerificationStatus) -> Vec<String> {
    let list: &[&str] = match status {
        VerificationStatus::Verified => &POSITIVE_RECOMMENDATIONS,
        VerificationStatus::Invalid => &NEGATIVE_RECOMMENDATIONS,
    };
    list.iter().map(|s| s.to_string()).collect()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
