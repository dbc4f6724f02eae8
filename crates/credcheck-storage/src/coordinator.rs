use std::sync::Arc;

use credcheck_core::{AssetRef, CandidateId, Origin};
use tokio::sync::mpsc::UnboundedSender;

use crate::progress::ProgressReporter;
use crate::traits::{AssetStore, UploadError, UploadResult};

/// Drives a single upload against an [`AssetStore`].
///
/// Progress goes out on `progress` as strictly increasing percentages. The
/// first value is 0 and, when the upload succeeds, the last value sent before
/// this returns is 100. Failures are not retried.
#[derive(Clone)]
pub struct UploadCoordinator {
    store: Arc<dyn AssetStore>,
}

impl UploadCoordinator {
    pub fn new(store: Arc<dyn AssetStore>) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self, origin, progress), fields(candidate_id = %candidate_id))]
    pub async fn upload(
        &self,
        candidate_id: CandidateId,
        origin: &Origin,
        progress: UnboundedSender<u8>,
    ) -> UploadResult<AssetRef> {
        let file = match origin {
            Origin::LocalFile(file) => file,
            Origin::RemoteUrl(_) => return Err(UploadError::NotUploadable),
        };

        let reporter = ProgressReporter::new(progress);
        reporter.report(0);

        match self.store.upload(file, &reporter).await {
            Ok(asset) => {
                reporter.finish();
                tracing::info!(public_id = %asset.public_id, "Upload complete");
                Ok(asset)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    last_progress = ?reporter.last(),
                    "Upload failed"
                );
                Err(e)
            }
        }
    }
}
