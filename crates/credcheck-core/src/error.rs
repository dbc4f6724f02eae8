//! Error types module
//!
//! Failures in the pipeline fall into a small taxonomy. Each component keeps
//! its own typed error (rejection reasons, upload and verify errors) and maps
//! it onto an [`ErrorKind`] so the orchestrator and the reporter can reason
//! about failures uniformly.

use serde::{Deserialize, Serialize};

use crate::models::CandidateState;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected outcomes like validation rejections
    Debug,
    /// Warning level - for remote failures that end a single item
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Classification of everything that can end a candidate's pipeline early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Input refused locally; no network call was attempted.
    ValidationRejection,
    /// Network error or deadline exceeded.
    TransportFailure,
    /// A remote collaborator answered with a non-2xx status or an unusable payload.
    ServiceFailure,
    /// The verification service ran and found no match. A valid negative outcome.
    VerificationMismatch,
}

impl ErrorKind {
    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            ErrorKind::ValidationRejection => "VALIDATION_REJECTION",
            ErrorKind::TransportFailure => "TRANSPORT_FAILURE",
            ErrorKind::ServiceFailure => "SERVICE_FAILURE",
            ErrorKind::VerificationMismatch => "VERIFICATION_MISMATCH",
        }
    }

    /// Whether repeating the same request could succeed.
    ///
    /// Only read calls are ever repeated automatically; for everything else
    /// this is a hint to the user that re-submission may help.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ErrorKind::TransportFailure | ErrorKind::ServiceFailure
        )
    }

    pub fn log_level(&self) -> LogLevel {
        match self {
            ErrorKind::ValidationRejection | ErrorKind::VerificationMismatch => LogLevel::Debug,
            ErrorKind::TransportFailure | ErrorKind::ServiceFailure => LogLevel::Warn,
        }
    }
}

/// Refused state change. The candidate is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Illegal state transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: CandidateState,
    pub to: CandidateState,
}
