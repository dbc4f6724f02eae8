//! Asset store abstraction trait

use async_trait::async_trait;
use credcheck_core::{AssetRef, ErrorKind, LocalFile};
use thiserror::Error;

use crate::progress::ProgressReporter;

/// Upload operation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UploadError {
    #[error("Network error during upload: {0}")]
    Transport(String),

    #[error("Upload failed with status: {status}")]
    Service { status: u16, message: String },

    #[error("Malformed upload response: {0}")]
    Malformed(String),

    #[error("Only local files can be uploaded")]
    NotUploadable,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl UploadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UploadError::Transport(_) => ErrorKind::TransportFailure,
            UploadError::Service { .. } | UploadError::Malformed(_) | UploadError::Config(_) => {
                ErrorKind::ServiceFailure
            }
            UploadError::NotUploadable => ErrorKind::ValidationRejection,
        }
    }
}

/// Result type for upload operations
pub type UploadResult<T> = Result<T, UploadError>;

/// Remote asset store.
///
/// Implementations send `file` once (no retries) and report byte progress
/// through `progress` as data is handed to the network.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn upload(&self, file: &LocalFile, progress: &ProgressReporter)
        -> UploadResult<AssetRef>;
}
