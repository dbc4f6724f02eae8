//! Credcheck Processing Library
//!
//! This crate turns raw inputs into candidates ([`validator`]), drives a batch
//! of candidates through upload and verification with a bounded worker pool
//! ([`orchestrator`]) and renders finished candidates as exportable reports
//! ([`report`]).

pub mod orchestrator;
pub mod report;
pub mod validator;

// Re-export commonly used types
pub use orchestrator::{BatchEvent, BatchSummary, Orchestrator, ResubmitError, SubmitRejection};
pub use report::{export, report_file_name, to_report, ReportError, ResultSet, VerificationReport};
pub use validator::{
    content_type_for_filename, expected_content_types, CandidateValidator, RejectionReason,
};
