//! Batch orchestration.
//!
//! The [`Orchestrator`] owns every candidate of a batch. Workers never hold a
//! candidate themselves: they hold its id, run the network stages without the
//! lock, and re-acquire the lock to apply each result. A candidate that was
//! removed in the meantime is simply not found, so its late result is dropped.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use credcheck_api_client::{Verifier, VerifyReference};
use credcheck_core::{
    AssetRef, BatchConfig, Candidate, CandidateId, CandidateSnapshot, CandidateState,
    FailureRecord, Origin, PreviewRegistry,
};
use credcheck_storage::{UploadCoordinator, UploadError};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, Mutex, Semaphore};
use tokio::task::JoinSet;

use crate::validator::{CandidateValidator, RejectionReason};

const EVENT_CAPACITY: usize = 256;

/// Submission refused at validation. The candidate stays in the batch as
/// `Rejected` under `id`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Candidate {id} rejected: {reason}")]
pub struct SubmitRejection {
    pub id: CandidateId,
    pub reason: RejectionReason,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResubmitError {
    #[error("Candidate not found: {0}")]
    NotFound(CandidateId),

    #[error("Candidate {id} is still {state}")]
    NotTerminal {
        id: CandidateId,
        state: CandidateState,
    },

    #[error(transparent)]
    Rejected(#[from] SubmitRejection),
}

/// Aggregate counts over the batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub verified: usize,
    pub invalid: usize,
    pub rejected: usize,
    pub upload_failed: usize,
    pub verify_failed: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub is_running: bool,
}

impl BatchSummary {
    pub fn completed(&self) -> usize {
        self.verified + self.invalid + self.rejected + self.upload_failed + self.verify_failed
    }
}

/// Change notifications published to [`Orchestrator::subscribe`] receivers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BatchEvent {
    Submitted {
        id: CandidateId,
        state: CandidateState,
    },
    StateChanged {
        id: CandidateId,
        from: CandidateState,
        to: CandidateState,
    },
    Progress {
        id: CandidateId,
        percent: u8,
    },
    Removed {
        id: CandidateId,
    },
    Cleared,
    RunFinished {
        summary: BatchSummary,
    },
}

#[derive(Default)]
struct BatchState {
    candidates: Vec<Candidate>,
    // Live upload progress, keyed by candidate; only present while uploading.
    progress: HashMap<CandidateId, u8>,
    in_flight: HashSet<CandidateId>,
    active_runs: usize,
}

impl BatchState {
    fn find_mut(&mut self, id: CandidateId) -> Option<&mut Candidate> {
        self.candidates.iter_mut().find(|c| c.id() == id)
    }

    fn find(&self, id: CandidateId) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id() == id)
    }

    fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary {
            total: self.candidates.len(),
            is_running: self.active_runs > 0,
            ..Default::default()
        };
        for candidate in &self.candidates {
            match candidate.state() {
                CandidateState::Pending | CandidateState::Validating => summary.pending += 1,
                CandidateState::Uploading
                | CandidateState::Uploaded
                | CandidateState::Verifying => summary.in_progress += 1,
                CandidateState::Verified => summary.verified += 1,
                CandidateState::Invalid => summary.invalid += 1,
                CandidateState::Rejected => summary.rejected += 1,
                CandidateState::UploadFailed => summary.upload_failed += 1,
                CandidateState::VerifyFailed => summary.verify_failed += 1,
            }
        }
        summary
    }
}

struct Inner {
    validator: CandidateValidator,
    uploader: Option<UploadCoordinator>,
    verifier: Arc<dyn Verifier>,
    max_concurrency: usize,
    state: Mutex<BatchState>,
    events: broadcast::Sender<BatchEvent>,
}

/// Owns a batch of candidates and drives each through
/// validate, upload (local files only) and verify.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// `uploader` may be `None` when no asset store is configured; local
    /// files then end in `UploadFailed` while URLs still verify.
    pub fn new(
        validator: CandidateValidator,
        uploader: Option<UploadCoordinator>,
        verifier: Arc<dyn Verifier>,
        config: &BatchConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                validator,
                uploader,
                verifier,
                max_concurrency: config.max_concurrency.max(1),
                state: Mutex::new(BatchState::default()),
                events,
            }),
        }
    }

    pub fn previews(&self) -> &PreviewRegistry {
        self.inner.validator.previews()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.inner.events.subscribe()
    }

    fn emit(&self, event: BatchEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    /// Validate `origin` and add it to the batch.
    ///
    /// Rejected inputs are kept (as `Rejected`) so they show up in results;
    /// the error carries their id.
    pub async fn submit(&self, origin: Origin) -> Result<CandidateId, SubmitRejection> {
        let (candidate, reason) = self.inner.validator.admit(origin);
        let id = candidate.id();
        let state = candidate.state();

        self.inner.state.lock().await.candidates.push(candidate);
        self.emit(BatchEvent::Submitted { id, state });

        match reason {
            Some(reason) => Err(SubmitRejection { id, reason }),
            None => {
                tracing::debug!(candidate_id = %id, "Candidate accepted");
                Ok(id)
            }
        }
    }

    /// Replace a terminal candidate with a fresh one built from the same
    /// origin. The old candidate and its preview are released.
    pub async fn resubmit(&self, id: CandidateId) -> Result<CandidateId, ResubmitError> {
        // Terminal check and removal share one lock.
        let old = {
            let mut state = self.inner.state.lock().await;
            let pos = state
                .candidates
                .iter()
                .position(|c| c.id() == id)
                .ok_or(ResubmitError::NotFound(id))?;
            let candidate = &state.candidates[pos];
            if !candidate.is_terminal() {
                return Err(ResubmitError::NotTerminal {
                    id,
                    state: candidate.state(),
                });
            }
            state.progress.remove(&id);
            state.candidates.remove(pos)
        };
        let origin = old.origin().clone();
        drop(old);
        self.emit(BatchEvent::Removed { id });

        let new_id = self.submit(origin).await?;
        tracing::info!(old_id = %id, new_id = %new_id, "Candidate resubmitted");
        Ok(new_id)
    }

    /// Drop a candidate and release its preview now. An in-flight worker
    /// keeps running but its result is discarded.
    pub async fn remove(&self, id: CandidateId) -> bool {
        let removed = {
            let mut state = self.inner.state.lock().await;
            let Some(pos) = state.candidates.iter().position(|c| c.id() == id) else {
                return false;
            };
            state.progress.remove(&id);
            state.candidates.remove(pos)
        };
        drop(removed);
        self.emit(BatchEvent::Removed { id });
        true
    }

    /// Destroy the batch, releasing every preview handle.
    pub async fn clear(&self) -> usize {
        let removed: Vec<Candidate> = {
            let mut state = self.inner.state.lock().await;
            state.progress.clear();
            std::mem::take(&mut state.candidates)
        };
        let count = removed.len();
        drop(removed);
        self.emit(BatchEvent::Cleared);
        tracing::info!(count, "Batch cleared");
        count
    }

    /// Live upload percentage, present only while the candidate is uploading.
    pub async fn progress(&self, id: CandidateId) -> Option<u8> {
        self.inner.state.lock().await.progress.get(&id).copied()
    }

    pub async fn summary(&self) -> BatchSummary {
        self.inner.state.lock().await.summary()
    }

    pub async fn snapshot(&self, id: CandidateId) -> Option<CandidateSnapshot> {
        self.inner.state.lock().await.find(id).map(Candidate::snapshot)
    }

    /// Every candidate, in submission order.
    pub async fn candidates(&self) -> Vec<CandidateSnapshot> {
        let state = self.inner.state.lock().await;
        state.candidates.iter().map(Candidate::snapshot).collect()
    }

    /// Terminal candidates, in submission order.
    pub async fn results(&self) -> Vec<CandidateSnapshot> {
        let state = self.inner.state.lock().await;
        state
            .candidates
            .iter()
            .filter(|c| c.is_terminal())
            .map(Candidate::snapshot)
            .collect()
    }

    /// Process every accepted candidate that is not already running.
    ///
    /// At most `max_concurrency` candidates are in flight at once. Resolves
    /// once each dispatched candidate is terminal or removed.
    pub async fn run(&self) -> BatchSummary {
        let dispatch: Vec<CandidateId> = {
            let mut state = self.inner.state.lock().await;
            state.active_runs += 1;
            let ids: Vec<CandidateId> = state
                .candidates
                .iter()
                .filter(|c| c.state() == CandidateState::Validating)
                .map(Candidate::id)
                .filter(|id| !state.in_flight.contains(id))
                .collect();
            state.in_flight.extend(ids.iter().copied());
            ids
        };

        tracing::info!(
            candidates = dispatch.len(),
            max_concurrency = self.inner.max_concurrency,
            "Batch run started"
        );

        let semaphore = Arc::new(Semaphore::new(self.inner.max_concurrency));
        let mut workers = JoinSet::new();
        for id in dispatch.iter().copied() {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let this = self.clone();
            workers.spawn(async move {
                let _permit = permit;
                this.process(id).await;
            });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Candidate worker aborted");
            }
        }

        let summary = {
            let mut state = self.inner.state.lock().await;
            for id in &dispatch {
                state.in_flight.remove(id);
            }
            state.active_runs -= 1;
            state.summary()
        };

        tracing::info!(
            verified = summary.verified,
            invalid = summary.invalid,
            rejected = summary.rejected,
            upload_failed = summary.upload_failed,
            verify_failed = summary.verify_failed,
            "Batch run finished"
        );
        self.emit(BatchEvent::RunFinished { summary });
        summary
    }

    #[tracing::instrument(skip(self), fields(candidate_id = %id))]
    async fn process(&self, id: CandidateId) {
        let origin = {
            let mut state = self.inner.state.lock().await;
            let Some(candidate) = state.find_mut(id) else {
                return;
            };
            let origin = candidate.origin().clone();
            let next = if origin.is_local_file() {
                CandidateState::Uploading
            } else {
                CandidateState::Verifying
            };
            if let Err(e) = candidate.advance(next) {
                tracing::warn!(error = %e, "Candidate not dispatchable");
                return;
            }
            self.emit(BatchEvent::StateChanged {
                id,
                from: CandidateState::Validating,
                to: next,
            });
            if next == CandidateState::Uploading {
                state.progress.insert(id, 0);
                self.emit(BatchEvent::Progress { id, percent: 0 });
            }
            origin
        };

        let reference = match &origin {
            Origin::LocalFile(file) => match self.upload(id, &origin).await {
                Some(asset) => VerifyReference::Asset {
                    asset,
                    original_filename: file.name.clone(),
                },
                None => return,
            },
            Origin::RemoteUrl(url) => VerifyReference::Url(url.clone()),
        };

        let result = self.inner.verifier.verify(&reference).await;

        let mut state = self.inner.state.lock().await;
        let Some(candidate) = state.find_mut(id) else {
            tracing::debug!("Candidate removed during verification, discarding result");
            return;
        };
        let applied = match result {
            Ok(outcome) => candidate.complete(outcome),
            Err(e) => {
                tracing::warn!(error = %e, kind = e.kind().error_code(), "Verification failed");
                candidate.fail(
                    CandidateState::VerifyFailed,
                    FailureRecord::new(e.kind(), e.to_string()),
                )
            }
        };
        match applied {
            Ok(()) => self.emit(BatchEvent::StateChanged {
                id,
                from: CandidateState::Verifying,
                to: candidate.state(),
            }),
            Err(e) => tracing::error!(error = %e, "Could not record verification result"),
        }
    }

    /// Upload stage. On success the candidate is left in `Verifying` and the
    /// asset is returned; on failure (or removal) returns `None`.
    async fn upload(&self, id: CandidateId, origin: &Origin) -> Option<AssetRef> {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let result = match &self.inner.uploader {
            Some(uploader) => {
                let upload = uploader.upload(id, origin, tx);
                tokio::pin!(upload);
                let result = loop {
                    tokio::select! {
                        Some(percent) = rx.recv() => self.record_progress(id, percent).await,
                        result = &mut upload => break result,
                    }
                };
                while let Ok(percent) = rx.try_recv() {
                    self.record_progress(id, percent).await;
                }
                result
            }
            None => Err(UploadError::Config("no asset store configured".to_string())),
        };

        let mut state = self.inner.state.lock().await;
        state.progress.remove(&id);
        let Some(candidate) = state.find_mut(id) else {
            tracing::debug!("Candidate removed during upload, discarding result");
            return None;
        };

        match result {
            Ok(asset) => {
                if let Err(e) = candidate.mark_uploaded(asset.clone()) {
                    tracing::error!(error = %e, "Could not record upload result");
                    return None;
                }
                self.emit(BatchEvent::StateChanged {
                    id,
                    from: CandidateState::Uploading,
                    to: CandidateState::Uploaded,
                });
                if let Err(e) = candidate.advance(CandidateState::Verifying) {
                    tracing::error!(error = %e, "Could not start verification");
                    return None;
                }
                self.emit(BatchEvent::StateChanged {
                    id,
                    from: CandidateState::Uploaded,
                    to: CandidateState::Verifying,
                });
                Some(asset)
            }
            Err(e) => {
                match candidate.fail(
                    CandidateState::UploadFailed,
                    FailureRecord::new(e.kind(), e.to_string()),
                ) {
                    Ok(()) => self.emit(BatchEvent::StateChanged {
                        id,
                        from: CandidateState::Uploading,
                        to: CandidateState::UploadFailed,
                    }),
                    Err(te) => tracing::error!(error = %te, "Could not record upload failure"),
                }
                None
            }
        }
    }

    async fn record_progress(&self, id: CandidateId, percent: u8) {
        let mut state = self.inner.state.lock().await;
        let accepted = state
            .find_mut(id)
            .is_some_and(|candidate| candidate.record_progress(percent));
        if accepted {
            state.progress.insert(id, percent);
            self.emit(BatchEvent::Progress { id, percent });
        }
    }
}
