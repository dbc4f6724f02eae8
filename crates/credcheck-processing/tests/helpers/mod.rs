//! Pipeline fixtures: an orchestrator wired to a real `ApiClient` over a
//! recording in-memory transport, and optionally to a real HTTP asset store.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use credcheck_api_client::{
    ApiClient, HttpRequest, HttpResponse, RequestBody, Transport, TransportError,
    VerificationClient, Verifier,
};
use credcheck_core::{
    BatchConfig, LocalFile, Origin, PreviewRegistry, RequestConfig, UploadConfig,
    ValidationConfig,
};
use credcheck_processing::{CandidateValidator, Orchestrator};
use credcheck_storage::{CloudAssetStore, UploadCoordinator};
use serde_json::{json, Value};

type Responder = Box<dyn Fn(&Value) -> HttpResponse + Send + Sync>;

/// Verification service stand-in. Answers from the JSON request body and
/// records every request it sees.
pub struct RecordingTransport {
    responder: Responder,
    requests: Mutex<Vec<HttpRequest>>,
}

impl RecordingTransport {
    pub fn new(responder: impl Fn(&Value) -> HttpResponse + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Request bodies, in arrival order.
    pub fn bodies(&self) -> Vec<Value> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| match &r.body {
                RequestBody::Json(v) => v.clone(),
                RequestBody::Empty => Value::Null,
            })
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let body = match &request.body {
            RequestBody::Json(v) => v.clone(),
            RequestBody::Empty => Value::Null,
        };
        self.requests.lock().unwrap().push(request);
        Ok((self.responder)(&body))
    }
}

pub fn json_response(status: u16, body: Value) -> HttpResponse {
    HttpResponse {
        status,
        content_type: Some("application/json".to_string()),
        body: Bytes::from(body.to_string()),
    }
}

/// Service that verifies everything by exact hash match.
pub fn always_verified(_: &Value) -> HttpResponse {
    json_response(200, json!({"status": "VERIFIED", "hash_match": true}))
}

pub struct TestPipeline {
    pub orchestrator: Orchestrator,
    pub transport: Arc<RecordingTransport>,
    pub previews: PreviewRegistry,
}

/// Build a pipeline. `upload_base_url` points the asset store at a mock
/// server; `None` leaves uploads unconfigured.
pub fn setup_test_pipeline(
    upload_base_url: Option<&str>,
    transport: RecordingTransport,
) -> TestPipeline {
    let transport = Arc::new(transport);
    let api = ApiClient::new(transport.clone(), &RequestConfig::default());
    let previews = PreviewRegistry::new();
    let orchestrator = build_orchestrator(
        upload_base_url,
        Arc::new(VerificationClient::new(api)),
        previews.clone(),
    );

    TestPipeline {
        orchestrator,
        transport,
        previews,
    }
}

pub fn build_orchestrator(
    upload_base_url: Option<&str>,
    verifier: Arc<dyn Verifier>,
    previews: PreviewRegistry,
) -> Orchestrator {
    let uploader = upload_base_url.map(|base_url| {
        let config = UploadConfig {
            base_url: base_url.to_string(),
            cloud_name: Some("demo".to_string()),
            chunk_size: 1024 * 1024,
            timeout: Duration::from_secs(10),
            ..UploadConfig::default()
        };
        let store = CloudAssetStore::new(&config).expect("upload config is complete");
        UploadCoordinator::new(Arc::new(store))
    });

    Orchestrator::new(
        CandidateValidator::new(&ValidationConfig::default(), previews),
        uploader,
        verifier,
        &BatchConfig { max_concurrency: 4 },
    )
}

pub fn local_file(name: &str, content_type: &str, size: usize) -> Origin {
    Origin::LocalFile(LocalFile::new(
        name,
        content_type,
        Bytes::from(vec![0x5A; size]),
    ))
}

/// Successful upload body as the asset store returns it.
pub fn upload_ok_body(public_id: &str) -> String {
    json!({
        "secure_url": format!("https://res.example.com/demo/{}.jpg", public_id),
        "public_id": public_id,
        "format": "jpg",
        "bytes": 2097152,
        "resource_type": "image",
        "created_at": "2026-01-01T00:00:00Z"
    })
    .to_string()
}
