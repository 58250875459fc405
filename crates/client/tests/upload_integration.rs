//! Integration tests for the attachment upload path.

use std::sync::Arc;
use std::time::Duration;

use chatwire_client::testing::{
    MockAttachmentUploader, MockCredentialRefresher, MockOfflineQueue, MockRequestDecoder,
    MockRequestEncoder, MockTransport,
};
use chatwire_client::{
    ApiClient, ApiClientConfig, Attachment, ClientError, ClientResult, UploadError, UploadedFile,
};
use chatwire_common::assert_eventually;
use parking_lot::Mutex;

struct Harness {
    client: ApiClient,
    uploader: Arc<MockAttachmentUploader>,
    offline: Arc<MockOfflineQueue>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn harness() -> Harness {
    init_tracing();
    let uploader = Arc::new(MockAttachmentUploader::new());
    let offline = Arc::new(MockOfflineQueue::new());

    let client = ApiClient::builder()
        .config(ApiClientConfig::builder().no_backoff().build().expect("valid config"))
        .encoder(Arc::new(MockRequestEncoder::new()))
        .decoder(Arc::new(MockRequestDecoder::new()))
        .transport(Arc::new(MockTransport::new()))
        .uploader(uploader.clone())
        .credential_refresher(Arc::new(MockCredentialRefresher::immediate()))
        .offline_queue(offline.clone())
        .build()
        .expect("client should assemble");

    Harness { client, uploader, offline }
}

fn attachment() -> Attachment {
    Attachment::new("photo.jpg", "image/jpeg", vec![0xFF, 0xD8, 0xFF])
}

type ResultSlot = Arc<Mutex<Option<ClientResult<UploadedFile>>>>;

fn upload(h: &Harness, attachment: Attachment, progress: Arc<Mutex<Vec<f64>>>) -> ResultSlot {
    let result: ResultSlot = Arc::new(Mutex::new(None));
    let captured = result.clone();
    h.client.upload_attachment(
        attachment,
        move |fraction| progress.lock().push(fraction),
        move |r| {
            *captured.lock() = Some(r);
        },
    );
    result
}

/// Validates a successful upload completes with the remote file reference
/// and forwards every progress report verbatim.
#[tokio::test(flavor = "multi_thread")]
async fn test_upload_succeeds_and_reports_progress() {
    let h = harness();
    h.uploader.set_progress_steps(vec![0.25, 0.5, 1.0]);

    let progress = Arc::new(Mutex::new(Vec::new()));
    let result = upload(&h, attachment(), progress.clone());

    assert_eventually!(Duration::from_secs(2), result.lock().is_some());
    let file = result.lock().take().expect("completed").expect("should succeed");
    assert_eq!(file.remote_url.as_str(), "https://cdn.example.com/uploads/file");
    assert_eq!(*progress.lock(), vec![0.25, 0.5, 1.0]);
    assert_eq!(h.uploader.calls(), 1);
}

/// Validates connectivity losses during upload are retried under the same
/// ceiling as requests.
#[tokio::test(flavor = "multi_thread")]
async fn test_upload_retries_connectivity_losses() {
    let h = harness();
    for _ in 0..3 {
        h.uploader.push_result(Err(UploadError::ConnectivityLost("socket closed".into())));
    }

    let result = upload(&h, attachment(), Arc::new(Mutex::new(Vec::new())));

    assert_eventually!(Duration::from_secs(2), result.lock().is_some());
    assert!(result.lock().take().expect("completed").is_ok());
    assert_eq!(h.uploader.calls(), 4);
}

/// Validates the upload retry ceiling: four connection losses surface the
/// failure without touching the offline queue.
#[tokio::test(flavor = "multi_thread")]
async fn test_upload_budget_exhausted_surfaces_failure() {
    let h = harness();
    for _ in 0..4 {
        h.uploader.push_result(Err(UploadError::ConnectivityLost("socket closed".into())));
    }

    let result = upload(&h, attachment(), Arc::new(Mutex::new(Vec::new())));

    assert_eventually!(Duration::from_secs(2), result.lock().is_some());
    match result.lock().take().expect("completed") {
        Err(ClientError::ConnectivityLost { attempts, .. }) => assert_eq!(attempts, 4),
        other => panic!("expected connectivity error, got {other:?}"),
    }
    assert_eq!(h.uploader.calls(), 4);
    assert!(h.offline.enqueued().is_empty(), "failed uploads are never offline-queued");
}

/// Validates any non-connectivity upload failure is terminal after a single
/// attempt.
#[tokio::test(flavor = "multi_thread")]
async fn test_upload_other_failure_is_terminal() {
    let h = harness();
    h.uploader.push_result(Err(UploadError::Other("payload too large".into())));

    let result = upload(&h, attachment(), Arc::new(Mutex::new(Vec::new())));

    assert_eventually!(Duration::from_secs(2), result.lock().is_some());
    assert!(matches!(
        result.lock().take().expect("completed"),
        Err(ClientError::Upload { .. })
    ));
    assert_eq!(h.uploader.calls(), 1);
}

/// Validates uploads are gated like regular-lane traffic: parked during
/// recovery mode and resumed on exit.
#[tokio::test(flavor = "multi_thread")]
async fn test_upload_parks_during_recovery_mode() {
    let h = harness();
    h.client.enter_recovery_mode();

    let result = upload(&h, attachment(), Arc::new(Mutex::new(Vec::new())));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.uploader.calls(), 0, "upload should be parked");
    assert!(result.lock().is_none());

    h.client.exit_recovery_mode();
    assert_eventually!(Duration::from_secs(2), result.lock().is_some());
    assert!(result.lock().take().expect("completed").is_ok());
    assert_eq!(h.uploader.calls(), 1);
}
