//! Exportable verification reports.

use chrono::{DateTime, Utc};
use credcheck_core::{CandidateSnapshot, CandidateState, VerificationStatus};
use serde::Serialize;

const UPLOAD_FAILED_RECOMMENDATIONS: [&str; 3] = [
    "Please try uploading the image again",
    "Ensure you have a stable internet connection",
    "Check if the file is not corrupted",
];

const REJECTED_RECOMMENDATIONS: [&str; 2] = [
    "Upload a JPG, PNG or PDF file within the size limit",
    "Check that URLs start with http:// or https://",
];

const VERIFY_FAILED_RECOMMENDATIONS: [&str; 2] = [
    "The verification service could not be reached, try again later",
    "Resubmit the certificate once the service is available",
];

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Candidate is not finished (state: {0})")]
    NotTerminal(CandidateState),

    #[error("Candidate in state {0} carries neither an outcome nor a failure")]
    MissingResult(CandidateState),

    #[error("Failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Report for one finished candidate. Field order is the export order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationReport {
    pub file_name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub verified_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_date: Option<String>,
    pub details: String,
    pub recommendations: Vec<String>,
}

fn status_label(status: VerificationStatus) -> &'static str {
    match status {
        VerificationStatus::Verified => "verified",
        VerificationStatus::Invalid => "invalid",
    }
}

fn failure_recommendations(state: CandidateState) -> Vec<String> {
    let list: &[&str] = match state {
        CandidateState::UploadFailed => &UPLOAD_FAILED_RECOMMENDATIONS,
        CandidateState::Rejected => &REJECTED_RECOMMENDATIONS,
        _ => &VERIFY_FAILED_RECOMMENDATIONS,
    };
    list.iter().map(|s| s.to_string()).collect()
}

/// Build the report for a terminal candidate.
pub fn to_report(candidate: &CandidateSnapshot) -> Result<VerificationReport, ReportError> {
    if !candidate.state.is_terminal() {
        return Err(ReportError::NotTerminal(candidate.state));
    }

    if let Some(outcome) = &candidate.outcome {
        return Ok(VerificationReport {
            file_name: candidate.display_name.clone(),
            status: status_label(outcome.status).to_string(),
            confidence: outcome.confidence,
            verified_at: outcome.verified_at,
            institution: outcome.institution.clone(),
            credential_type: outcome.credential_type.clone(),
            issue_date: outcome.issue_date.clone(),
            details: outcome.details.clone(),
            recommendations: outcome.recommendations.clone(),
        });
    }

    let failure = candidate
        .failure
        .as_ref()
        .ok_or(ReportError::MissingResult(candidate.state))?;

    Ok(VerificationReport {
        file_name: candidate.display_name.clone(),
        status: candidate.state.as_str().to_string(),
        confidence: None,
        verified_at: failure.occurred_at,
        institution: None,
        credential_type: None,
        issue_date: None,
        details: failure.message.clone(),
        recommendations: failure_recommendations(candidate.state),
    })
}

/// Pretty-printed JSON. The same report always encodes to the same bytes.
pub fn export(report: &VerificationReport) -> Result<Vec<u8>, ReportError> {
    Ok(serde_json::to_vec_pretty(report)?)
}

pub fn report_file_name(report: &VerificationReport) -> String {
    format!("verification-report-{}.json", report.file_name)
}

/// Reports for a whole batch, in batch order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
    pub total: usize,
    pub verified: usize,
    pub invalid: usize,
    pub failed: usize,
    pub reports: Vec<VerificationReport>,
}

impl ResultSet {
    /// Collect reports for the terminal snapshots; others are skipped.
    pub fn from_snapshots<'a>(snapshots: impl IntoIterator<Item = &'a CandidateSnapshot>) -> Self {
        let mut set = ResultSet::default();
        for snapshot in snapshots {
            let Ok(report) = to_report(snapshot) else {
                continue;
            };
            match snapshot.state {
                CandidateState::Verified => set.verified += 1,
                CandidateState::Invalid => set.invalid += 1,
                _ => set.failed += 1,
            }
            set.reports.push(report);
        }
        set.total = set.reports.len();
        set
    }

    pub fn export(&self) -> Result<Vec<u8>, ReportError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}
