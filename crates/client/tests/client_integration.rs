//! Integration tests for the regular dispatch lane and the retry policy.

use std::sync::Arc;
use std::time::Duration;

use chatwire_client::testing::{
    MockAttachmentUploader, MockCredentialRefresher, MockOfflineQueue, MockRequestDecoder,
    MockRequestEncoder, MockTransport,
};
use chatwire_client::{
    ApiClient, ApiClientConfig, ClientError, ClientResult, DecodeError, EncodeError, Endpoint,
};
use chatwire_common::assert_eventually;
use parking_lot::Mutex;
use serde::Deserialize;

struct Harness {
    client: ApiClient,
    encoder: Arc<MockRequestEncoder>,
    decoder: Arc<MockRequestDecoder>,
    transport: Arc<MockTransport>,
    refresher: Arc<MockCredentialRefresher>,
    offline: Arc<MockOfflineQueue>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn harness() -> Harness {
    init_tracing();
    let encoder = Arc::new(MockRequestEncoder::new());
    let decoder = Arc::new(MockRequestDecoder::new());
    let transport = Arc::new(MockTransport::new());
    let refresher = Arc::new(MockCredentialRefresher::immediate());
    let offline = Arc::new(MockOfflineQueue::new());

    let client = ApiClient::builder()
        .config(ApiClientConfig::builder().no_backoff().build().expect("valid config"))
        .encoder(encoder.clone())
        .decoder(decoder.clone())
        .transport(transport.clone())
        .uploader(Arc::new(MockAttachmentUploader::new()))
        .credential_refresher(refresher.clone())
        .offline_queue(offline.clone())
        .build()
        .expect("client should assemble");

    Harness { client, encoder, decoder, transport, refresher, offline }
}

type ResultSlot<T> = Arc<Mutex<Option<ClientResult<T>>>>;

fn slot<T>() -> ResultSlot<T> {
    Arc::new(Mutex::new(None))
}

/// Validates a successful request completes with the decoded, deserialized
/// payload.
///
/// Assertions:
/// - The completion receives the typed payload.
/// - The submitted endpoint reached the encoder unchanged.
#[tokio::test(flavor = "multi_thread")]
async fn test_success_delivers_decoded_payload() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct TestUser {
        name: String,
    }

    let h = harness();
    h.decoder.set_fallback(Ok(br#"{"name":"ana"}"#.to_vec()));

    let result = slot::<TestUser>();
    let captured = result.clone();
    let endpoint = Endpoint::get("users/ana");
    h.client.request::<TestUser, _>(endpoint.clone(), move |r| {
        *captured.lock() = Some(r);
    });

    assert_eventually!(Duration::from_secs(2), result.lock().is_some());
    let user = result.lock().take().expect("completed").expect("should succeed");
    assert_eq!(user, TestUser { name: "ana".into() });
    assert_eq!(h.encoder.recorded(), vec![endpoint]);
    assert_eq!(h.transport.calls(), 1);
}

/// Validates regular-lane operations run concurrently: two submissions both
/// reach the decoder before either completes.
#[tokio::test(flavor = "multi_thread")]
async fn test_regular_operations_run_concurrently() {
    let h = harness();
    h.decoder.set_delay(Duration::from_millis(50));

    let first = slot::<Vec<u8>>();
    let captured = first.clone();
    h.client.request_raw(Endpoint::get("sync/channels"), move |r| {
        *captured.lock() = Some(r);
    });
    let second = slot::<Vec<u8>>();
    let captured = second.clone();
    h.client.request_raw(Endpoint::get("sync/messages"), move |r| {
        *captured.lock() = Some(r);
    });

    // Both decodes start while both operations are still pending.
    assert_eventually!(Duration::from_secs(2), h.decoder.calls() == 2);
    assert!(first.lock().is_none() || second.lock().is_none());

    assert_eventually!(Duration::from_secs(2), first.lock().is_some() && second.lock().is_some());
    assert!(first.lock().take().expect("completed").is_ok());
    assert!(second.lock().take().expect("completed").is_ok());
}

/// Validates connectivity failures are retried in place and a later success
/// completes the original call.
///
/// Assertions:
/// - Three connection losses followed by a success yield four attempts.
/// - The completion sees only the final success.
/// - Nothing is offline-queued.
#[tokio::test(flavor = "multi_thread")]
async fn test_connectivity_failures_retry_in_place() {
    let h = harness();
    for _ in 0..3 {
        h.decoder.push_result(Err(DecodeError::ConnectivityLost("socket closed".into())));
    }

    let result = slot::<Vec<u8>>();
    let captured = result.clone();
    h.client.request_raw(Endpoint::get("sync"), move |r| {
        *captured.lock() = Some(r);
    });

    assert_eventually!(Duration::from_secs(2), result.lock().is_some());
    assert!(result.lock().take().expect("completed").is_ok());
    assert_eq!(h.decoder.calls(), 4);
    assert!(h.offline.enqueued().is_empty());
}

/// Validates the connectivity retry ceiling: after the budget is exhausted
/// the endpoint is offline-queued and the failure surfaces.
///
/// Assertions:
/// - Exactly four attempts are made (initial plus three retries).
/// - The terminal error reports the attempt count.
/// - The endpoint reaches the offline-queue hook exactly once.
#[tokio::test(flavor = "multi_thread")]
async fn test_connectivity_budget_exhausted_offline_queues() {
    let h = harness();
    h.decoder.set_fallback(Err(DecodeError::ConnectivityLost("no route to host".into())));

    let result = slot::<Vec<u8>>();
    let captured = result.clone();
    let endpoint = Endpoint::get("sync");
    h.client.request_raw(endpoint.clone(), move |r| {
        *captured.lock() = Some(r);
    });

    assert_eventually!(Duration::from_secs(2), result.lock().is_some());
    match result.lock().take().expect("completed") {
        Err(ClientError::ConnectivityLost { attempts, .. }) => assert_eq!(attempts, 4),
        other => panic!("expected connectivity error, got {other:?}"),
    }
    assert_eq!(h.decoder.calls(), 4);
    assert_eq!(h.offline.enqueued(), vec![endpoint]);
    assert_eq!(h.client.diagnostics().offline_queued(), 1);
}

/// Validates a structured server rejection completes immediately without
/// any retry.
#[tokio::test(flavor = "multi_thread")]
async fn test_server_error_completes_without_retry() {
    let h = harness();
    h.decoder.push_result(Err(DecodeError::Server { code: 60, message: "cooldown".into() }));

    let result = slot::<Vec<u8>>();
    let captured = result.clone();
    h.client.request_raw(Endpoint::get("messages"), move |r| {
        *captured.lock() = Some(r);
    });

    assert_eventually!(Duration::from_secs(2), result.lock().is_some());
    match result.lock().take().expect("completed") {
        Err(ClientError::Server { code, .. }) => assert_eq!(code, 60),
        other => panic!("expected server error, got {other:?}"),
    }
    assert_eq!(h.decoder.calls(), 1);
}

/// Validates the single silent retry of the encode step while a credential
/// is not yet available.
///
/// Assertions:
/// - One waiting failure followed by a successful encode is invisible to
///   the caller.
/// - The encoder ran exactly twice and the transport exactly once.
#[tokio::test(flavor = "multi_thread")]
async fn test_encode_waiting_is_retried_once() {
    let h = harness();
    h.encoder.push_result(Err(EncodeError::WaitingForCredential));

    let result = slot::<Vec<u8>>();
    let captured = result.clone();
    h.client.request_raw(Endpoint::get("sync"), move |r| {
        *captured.lock() = Some(r);
    });

    assert_eventually!(Duration::from_secs(2), result.lock().is_some());
    assert!(result.lock().take().expect("completed").is_ok());
    assert_eq!(h.encoder.calls(), 2);
    assert_eq!(h.transport.calls(), 1);
}

/// Validates a second consecutive waiting failure in the encode step is
/// terminal: no transport call is made.
#[tokio::test(flavor = "multi_thread")]
async fn test_encode_waiting_twice_is_terminal() {
    let h = harness();
    h.encoder.push_result(Err(EncodeError::WaitingForCredential));
    h.encoder.push_result(Err(EncodeError::WaitingForCredential));

    let result = slot::<Vec<u8>>();
    let captured = result.clone();
    h.client.request_raw(Endpoint::get("sync"), move |r| {
        *captured.lock() = Some(r);
    });

    assert_eventually!(Duration::from_secs(2), result.lock().is_some());
    assert!(matches!(
        result.lock().take().expect("completed"),
        Err(ClientError::CredentialUnavailable)
    ));
    assert_eq!(h.encoder.calls(), 2);
    assert_eq!(h.transport.calls(), 0);
}

/// Validates unmanaged requests surface an expired credential as a terminal
/// failure instead of triggering a refresh.
#[tokio::test(flavor = "multi_thread")]
async fn test_unmanaged_expired_credential_is_terminal() {
    let h = harness();
    h.decoder.push_result(Err(DecodeError::CredentialExpired));

    let result = slot::<Vec<u8>>();
    let captured = result.clone();
    h.client.unmanaged_request_raw(Endpoint::post("auth/guest", serde_json::json!({})), move |r| {
        *captured.lock() = Some(r);
    });

    assert_eventually!(Duration::from_secs(2), result.lock().is_some());
    assert!(matches!(
        result.lock().take().expect("completed"),
        Err(ClientError::CredentialExpired)
    ));
    assert_eq!(h.refresher.calls(), 0);
    assert_eq!(h.decoder.calls(), 1);
}

/// Validates unmanaged requests bypass mode gating entirely.
#[tokio::test(flavor = "multi_thread")]
async fn test_unmanaged_bypasses_mode_gating() {
    let h = harness();
    h.client.enter_recovery_mode();
    h.client.enter_token_fetch_mode();

    let result = slot::<Vec<u8>>();
    let captured = result.clone();
    h.client.unmanaged_request_raw(Endpoint::get("auth/token").without_credential(), move |r| {
        *captured.lock() = Some(r);
    });

    assert_eventually!(Duration::from_secs(2), result.lock().is_some());
    assert!(result.lock().take().expect("completed").is_ok());
    assert_eq!(h.decoder.calls(), 1);
}

/// Validates token-fetch mode parks the regular lane and exiting it resumes
/// the parked operation.
#[tokio::test(flavor = "multi_thread")]
async fn test_token_fetch_mode_parks_regular_lane() {
    let h = harness();
    h.client.enter_token_fetch_mode();

    let result = slot::<Vec<u8>>();
    let captured = result.clone();
    h.client.request_raw(Endpoint::get("sync"), move |r| {
        *captured.lock() = Some(r);
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.encoder.calls(), 0, "regular lane should be parked");
    assert!(result.lock().is_none());

    h.client.exit_token_fetch_mode();
    assert_eventually!(Duration::from_secs(2), result.lock().is_some());
    assert!(result.lock().take().expect("completed").is_ok());
    assert_eq!(h.encoder.calls(), 1);
}

/// Validates a flush drops parked operations silently: the completion is
/// never invoked and nothing is offline-queued.
#[tokio::test(flavor = "multi_thread")]
async fn test_flush_drops_parked_operations_silently() {
    let h = harness();
    h.client.enter_recovery_mode();

    let result = slot::<Vec<u8>>();
    let captured = result.clone();
    h.client.request_raw(Endpoint::get("sync"), move |r| {
        *captured.lock() = Some(r);
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    h.client.flush_requests_queue();
    h.client.exit_recovery_mode();

    assert_eventually!(Duration::from_secs(2), h.client.diagnostics().flushed_operations() == 1);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(result.lock().is_none(), "flushed completion must never fire");
    assert_eq!(h.encoder.calls(), 0);
    assert!(h.offline.enqueued().is_empty());
}

/// Validates an operation already executing survives a flush and completes
/// normally.
#[tokio::test(flavor = "multi_thread")]
async fn test_in_flight_operation_survives_flush() {
    let h = harness();
    h.decoder.set_delay(Duration::from_millis(100));

    let result = slot::<Vec<u8>>();
    let captured = result.clone();
    h.client.request_raw(Endpoint::get("sync"), move |r| {
        *captured.lock() = Some(r);
    });

    assert_eventually!(Duration::from_secs(2), h.decoder.calls() == 1);
    h.client.flush_requests_queue();

    assert_eventually!(Duration::from_secs(2), result.lock().is_some());
    assert!(result.lock().take().expect("completed").is_ok());
    assert_eq!(h.client.diagnostics().flushed_operations(), 0);
}

/// Validates connectivity failures and credential refreshes are budgeted
/// independently: a refresh in the middle does not consume connectivity
/// retries, and prior connectivity failures do not cap the refresh path.
#[tokio::test(flavor = "multi_thread")]
async fn test_connectivity_and_refresh_budgets_are_independent() {
    let h = harness();
    h.decoder.push_result(Err(DecodeError::ConnectivityLost("socket closed".into())));
    h.decoder.push_result(Err(DecodeError::CredentialExpired));
    h.decoder.push_result(Err(DecodeError::ConnectivityLost("socket closed".into())));

    let result = slot::<Vec<u8>>();
    let captured = result.clone();
    h.client.request_raw(Endpoint::get("sync"), move |r| {
        *captured.lock() = Some(r);
    });

    assert_eventually!(Duration::from_secs(2), result.lock().is_some());
    assert!(result.lock().take().expect("completed").is_ok());
    assert_eq!(h.decoder.calls(), 4);
    assert_eq!(h.refresher.calls(), 1);
}
