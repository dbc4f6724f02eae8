//! Credcheck Core Library
//!
//! This crate provides the domain model (candidates, verification outcomes,
//! preview handles), error taxonomy and configuration shared by every
//! credcheck component.

pub mod config;
pub mod error;
pub mod models;
pub mod preview;

// Re-export commonly used types
pub use config::{BatchConfig, Config, RequestConfig, UploadConfig, ValidationConfig};
pub use error::{ErrorKind, LogLevel, TransitionError};
pub use models::{
    AssetRef, Candidate, CandidateId, CandidateSnapshot, CandidateState, FailureRecord, LocalFile,
    Origin, VerificationOutcome, VerificationStatus,
};
pub use preview::{PreviewHandle, PreviewRegistry};
