use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Verified,
    Invalid,
}

/// Normalized answer of the verification service for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub status: VerificationStatus,
    /// 0-100. Absent when the service gave neither an exact match nor a score.
    pub confidence: Option<f64>,
    pub institution: Option<String>,
    pub credential_type: Option<String>,
    pub issue_date: Option<String>,
    pub details: String,
    pub recommendations: Vec<String>,
    pub verified_at: DateTime<Utc>,
}

/// Why a candidate ended in `Rejected`, `UploadFailed` or `VerifyFailed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub kind: ErrorKind,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl FailureRecord {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            occurred_at: Utc::now(),
        }
    }
}
