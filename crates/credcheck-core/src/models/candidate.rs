use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TransitionError;
use crate::models::outcome::{FailureRecord, VerificationOutcome, VerificationStatus};
use crate::preview::PreviewHandle;

/// Opaque identifier assigned at intake, stable for the candidate's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(Uuid);

impl CandidateId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CandidateId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for CandidateId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A file picked by the user. `size` is the declared size; `data` holds the bytes.
#[derive(Debug, Clone)]
pub struct LocalFile {
    pub name: String,
    pub size: u64,
    pub content_type: String,
    pub data: Bytes,
}

impl LocalFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            name: name.into(),
            size: data.len() as u64,
            content_type: content_type.into(),
            data,
        }
    }

    /// A file known only by its size on disk. Used for inputs too large to
    /// load; validation rejects them before the missing bytes matter.
    pub fn unread(name: impl Into<String>, content_type: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            content_type: content_type.into(),
            data: Bytes::new(),
        }
    }

    pub fn is_image(&self) -> bool {
        self.content_type.to_lowercase().starts_with("image/")
    }
}

#[derive(Debug, Clone)]
pub enum Origin {
    LocalFile(LocalFile),
    RemoteUrl(String),
}

impl Origin {
    /// Name shown in reports: the file name, or the last URL path segment.
    pub fn display_name(&self) -> String {
        match self {
            Origin::LocalFile(file) => file.name.clone(),
            Origin::RemoteUrl(url) => {
                let without_query = url.split(['?', '#']).next().unwrap_or(url);
                match without_query.rsplit('/').next() {
                    Some(segment) if !segment.is_empty() && !segment.contains(':') => {
                        segment.to_string()
                    }
                    _ => "URL Certificate".to_string(),
                }
            }
        }
    }

    pub fn is_local_file(&self) -> bool {
        matches!(self, Origin::LocalFile(_))
    }
}

/// Lifecycle of a candidate.
///
/// ```text
/// Pending -> Validating -> Rejected
///                       -> Uploading -> UploadFailed
///                                    -> Uploaded -> Verifying
///                       -> Verifying (remote URLs)
/// Verifying -> Verified | Invalid | VerifyFailed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateState {
    Pending,
    Validating,
    Rejected,
    Uploading,
    UploadFailed,
    Uploaded,
    Verifying,
    Verified,
    Invalid,
    VerifyFailed,
}

impl CandidateState {
    pub const ALL: [CandidateState; 10] = [
        CandidateState::Pending,
        CandidateState::Validating,
        CandidateState::Rejected,
        CandidateState::Uploading,
        CandidateState::UploadFailed,
        CandidateState::Uploaded,
        CandidateState::Verifying,
        CandidateState::Verified,
        CandidateState::Invalid,
        CandidateState::VerifyFailed,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CandidateState::Rejected
                | CandidateState::UploadFailed
                | CandidateState::Verified
                | CandidateState::Invalid
                | CandidateState::VerifyFailed
        )
    }

    pub fn can_transition_to(&self, next: CandidateState) -> bool {
        use CandidateState::*;
        matches!(
            (self, next),
            (Pending, Validating)
                | (Validating, Rejected | Uploading | Verifying)
                | (Uploading, UploadFailed | Uploaded)
                | (Uploaded, Verifying)
                | (Verifying, Verified | Invalid | VerifyFailed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateState::Pending => "pending",
            CandidateState::Validating => "validating",
            CandidateState::Rejected => "rejected",
            CandidateState::Uploading => "uploading",
            CandidateState::UploadFailed => "upload_failed",
            CandidateState::Uploaded => "uploaded",
            CandidateState::Verifying => "verifying",
            CandidateState::Verified => "verified",
            CandidateState::Invalid => "invalid",
            CandidateState::VerifyFailed => "verify_failed",
        }
    }
}

impl fmt::Display for CandidateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable location of an uploaded asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRef {
    pub url: String,
    pub public_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl AssetRef {
    pub fn new(url: impl Into<String>, public_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            public_id: public_id.into(),
            format: None,
            bytes: None,
            width: None,
            height: None,
            resource_type: None,
            created_at: None,
        }
    }
}

/// One user-submitted item moving through validate -> upload -> verify.
///
/// All mutation goes through methods that enforce the forward-only state
/// lattice. A refused change returns [`TransitionError`] and leaves the
/// candidate untouched.
#[derive(Debug)]
pub struct Candidate {
    id: CandidateId,
    origin: Origin,
    state: CandidateState,
    progress: Option<u8>,
    asset_ref: Option<AssetRef>,
    outcome: Option<VerificationOutcome>,
    failure: Option<FailureRecord>,
    preview: Option<PreviewHandle>,
}

impl Candidate {
    pub fn new(origin: Origin) -> Self {
        Self {
            id: CandidateId::new(),
            origin,
            state: CandidateState::Pending,
            progress: None,
            asset_ref: None,
            outcome: None,
            failure: None,
            preview: None,
        }
    }

    pub fn id(&self) -> CandidateId {
        self.id
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn state(&self) -> CandidateState {
        self.state
    }

    /// Last upload percentage. Frozen once the upload stage is over.
    pub fn progress(&self) -> Option<u8> {
        self.progress
    }

    pub fn asset_ref(&self) -> Option<&AssetRef> {
        self.asset_ref.as_ref()
    }

    pub fn outcome(&self) -> Option<&VerificationOutcome> {
        self.outcome.as_ref()
    }

    pub fn failure(&self) -> Option<&FailureRecord> {
        self.failure.as_ref()
    }

    pub fn preview(&self) -> Option<&PreviewHandle> {
        self.preview.as_ref()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Move to `next` if the lattice allows it.
    ///
    /// Remote URLs never enter the upload stage and local files never skip it.
    pub fn advance(&mut self, next: CandidateState) -> Result<(), TransitionError> {
        let refused = TransitionError {
            from: self.state,
            to: next,
        };
        if !self.state.can_transition_to(next) {
            return Err(refused);
        }
        match (&self.origin, self.state, next) {
            (Origin::RemoteUrl(_), _, CandidateState::Uploading) => return Err(refused),
            (Origin::LocalFile(_), CandidateState::Validating, CandidateState::Verifying) => {
                return Err(refused)
            }
            _ => {}
        }
        if next == CandidateState::Uploading {
            self.progress = Some(0);
        }
        self.state = next;
        Ok(())
    }

    /// Record upload progress. Ignored outside `Uploading` and for values that
    /// would not move the bar forward. Returns whether the value was taken.
    pub fn record_progress(&mut self, percent: u8) -> bool {
        if self.state != CandidateState::Uploading || percent > 100 {
            return false;
        }
        match self.progress {
            Some(current) if percent <= current => false,
            _ => {
                self.progress = Some(percent);
                true
            }
        }
    }

    pub fn mark_uploaded(&mut self, asset: AssetRef) -> Result<(), TransitionError> {
        self.advance(CandidateState::Uploaded)?;
        self.asset_ref = Some(asset);
        Ok(())
    }

    /// Attach a verification outcome and move to `Verified` or `Invalid`.
    pub fn complete(&mut self, outcome: VerificationOutcome) -> Result<(), TransitionError> {
        let next = match outcome.status {
            VerificationStatus::Verified => CandidateState::Verified,
            VerificationStatus::Invalid => CandidateState::Invalid,
        };
        self.advance(next)?;
        self.outcome = Some(outcome);
        Ok(())
    }

    /// End the pipeline in one of the failure states.
    pub fn fail(
        &mut self,
        next: CandidateState,
        failure: FailureRecord,
    ) -> Result<(), TransitionError> {
        if !matches!(
            next,
            CandidateState::Rejected | CandidateState::UploadFailed | CandidateState::VerifyFailed
        ) {
            return Err(TransitionError {
                from: self.state,
                to: next,
            });
        }
        self.advance(next)?;
        self.failure = Some(failure);
        Ok(())
    }

    pub fn attach_preview(&mut self, handle: PreviewHandle) {
        self.preview = Some(handle);
    }

    /// Revoke the preview handle now. Returns whether one was held.
    pub fn release_preview(&mut self) -> bool {
        self.preview.take().is_some()
    }

    pub fn snapshot(&self) -> CandidateSnapshot {
        let (content_type, byte_size, url) = match &self.origin {
            Origin::LocalFile(file) => (Some(file.content_type.clone()), Some(file.size), None),
            Origin::RemoteUrl(url) => (None, None, Some(url.clone())),
        };
        CandidateSnapshot {
            id: self.id,
            display_name: self.origin.display_name(),
            content_type,
            byte_size,
            url,
            state: self.state,
            progress: self.progress,
            asset_ref: self.asset_ref.clone(),
            outcome: self.outcome.clone(),
            failure: self.failure.clone(),
            preview_url: self.preview.as_ref().map(|p| p.url()),
        }
    }
}

/// Read-only copy of a candidate for reporting and display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateSnapshot {
    pub id: CandidateId,
    pub display_name: String,
    pub content_type: Option<String>,
    pub byte_size: Option<u64>,
    pub url: Option<String>,
    pub state: CandidateState,
    pub progress: Option<u8>,
    pub asset_ref: Option<AssetRef>,
    pub outcome: Option<VerificationOutcome>,
    pub failure: Option<FailureRecord>,
    pub preview_url: Option<String>,
}
