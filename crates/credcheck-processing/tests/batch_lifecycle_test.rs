#[path = "helpers/mod.rs"]
mod helpers;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use credcheck_api_client::{Verifier, VerifyError, VerifyReference};
use credcheck_core::{
    CandidateState, Origin, PreviewRegistry, VerificationOutcome, VerificationStatus,
};
use credcheck_processing::{ResultSet, SubmitRejection};
use helpers::{build_orchestrator, local_file, upload_ok_body};
use tokio::sync::Notify;

/// Holds every verification until released.
struct GatedVerifier {
    gate: Notify,
    entered: AtomicUsize,
}

impl GatedVerifier {
    fn new() -> Self {
        Self {
            gate: Notify::new(),
            entered: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Verifier for GatedVerifier {
    async fn verify(
        &self,
        _reference: &VerifyReference,
    ) -> Result<VerificationOutcome, VerifyError> {
        let released = self.gate.notified();
        self.entered.fetch_add(1, Ordering::SeqCst);
        released.await;
        Ok(VerificationOutcome {
            status: VerificationStatus::Invalid,
            confidence: None,
            institution: None,
            credential_type: None,
            issue_date: None,
            details: "Verification complete".to_string(),
            recommendations: vec!["Contact the issuing institution".to_string()],
            verified_at: Utc::now(),
        })
    }
}

async fn wait_for_entries(verifier: &GatedVerifier, count: usize) {
    for _ in 0..500 {
        if verifier.entered.load(Ordering::SeqCst) >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("verification never started");
}

#[tokio::test]
async fn test_removed_candidate_late_result_is_ignored() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1_1/demo/upload")
        .with_status(200)
        .with_body(upload_ok_body("certificates/cert_b"))
        .create_async()
        .await;

    let previews = PreviewRegistry::new();
    let verifier = Arc::new(GatedVerifier::new());
    let orch = build_orchestrator(Some(&server.url()), verifier.clone(), previews.clone());

    let id = orch
        .submit(local_file("diploma.png", "image/png", 2048))
        .await
        .unwrap();
    assert_eq!(previews.live_count(), 1);

    let runner = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.run().await })
    };

    wait_for_entries(&verifier, 1).await;
    assert_eq!(
        orch.snapshot(id).await.unwrap().state,
        CandidateState::Verifying
    );
    assert!(orch.summary().await.is_running);

    assert!(orch.remove(id).await);
    assert_eq!(previews.live_count(), 0);

    verifier.gate.notify_waiters();
    let summary = runner.await.unwrap();

    assert_eq!(summary.total, 0);
    assert!(!summary.is_running);
    assert!(orch.snapshot(id).await.is_none());
    assert!(orch.results().await.is_empty());
}

#[tokio::test]
async fn test_clear_releases_every_preview() {
    let previews = PreviewRegistry::new();
    let orch = build_orchestrator(None, Arc::new(GatedVerifier::new()), previews.clone());

    for i in 0..3 {
        orch.submit(local_file(&format!("scan-{i}.jpg"), "image/jpeg", 512))
            .await
            .unwrap();
    }
    orch.submit(local_file("transcript.pdf", "application/pdf", 512))
        .await
        .unwrap();
    let rejected: SubmitRejection = orch
        .submit(local_file("scan.gif", "image/gif", 512))
        .await
        .unwrap_err();

    assert_eq!(previews.live_count(), 3);
    let snapshot = orch.snapshot(rejected.id).await.unwrap();
    assert!(snapshot.preview_url.is_none());

    let first = orch.candidates().await.remove(0);
    let preview_url = first.preview_url.unwrap();
    assert!(previews
        .resolve(&preview_url)
        .unwrap()
        .starts_with("data:image/jpeg;base64,"));

    assert_eq!(orch.clear().await, 5);
    assert_eq!(previews.live_count(), 0);
    assert!(previews.resolve(&preview_url).is_none());
}

#[tokio::test]
async fn test_resubmit_after_upload_failure() {
    let mut server = mockito::Server::new_async().await;
    let failing = server
        .mock("POST", "/v1_1/demo/upload")
        .with_status(502)
        .expect(1)
        .create_async()
        .await;

    let previews = PreviewRegistry::new();
    let verifier = Arc::new(GatedVerifier::new());
    let orch = build_orchestrator(Some(&server.url()), verifier.clone(), previews.clone());

    let id = orch
        .submit(local_file("diploma.png", "image/png", 1024))
        .await
        .unwrap();
    orch.run().await;
    failing.assert_async().await;
    assert_eq!(
        orch.snapshot(id).await.unwrap().state,
        CandidateState::UploadFailed
    );

    failing.remove_async().await;
    server
        .mock("POST", "/v1_1/demo/upload")
        .with_status(200)
        .with_body(upload_ok_body("certificates/cert_c"))
        .create_async()
        .await;

    let retried = orch.resubmit(id).await.unwrap();
    let runner = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.run().await })
    };
    wait_for_entries(&verifier, 1).await;
    verifier.gate.notify_waiters();
    let summary = runner.await.unwrap();

    assert_eq!(summary.total, 1);
    assert_eq!(summary.invalid, 1);
    assert!(orch.snapshot(id).await.is_none());
    assert_eq!(
        orch.snapshot(retried).await.unwrap().state,
        CandidateState::Invalid
    );
    assert_eq!(previews.live_count(), 1);
}

#[tokio::test]
async fn test_result_set_preserves_batch_order() {
    let verifier = Arc::new(GatedVerifier::new());
    let orch = build_orchestrator(None, verifier.clone(), PreviewRegistry::new());

    orch.submit(Origin::RemoteUrl("https://example.com/first.pdf".to_string()))
        .await
        .unwrap();
    orch.submit(Origin::RemoteUrl("ftp://example.com/second.pdf".to_string()))
        .await
        .unwrap_err();
    orch.submit(Origin::RemoteUrl("https://example.com/third.pdf".to_string()))
        .await
        .unwrap();

    let runner = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.run().await })
    };
    wait_for_entries(&verifier, 2).await;
    verifier.gate.notify_waiters();
    runner.await.unwrap();

    let set = ResultSet::from_snapshots(&orch.results().await);
    let names: Vec<&str> = set.reports.iter().map(|r| r.file_name.as_str()).collect();
    assert_eq!(names, vec!["first.pdf", "second.pdf", "third.pdf"]);
    assert_eq!(set.invalid, 2);
    assert_eq!(set.failed, 1);
}
