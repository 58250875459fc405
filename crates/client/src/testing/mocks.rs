//! Mock implementations of the engine's collaborator traits.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use url::Url;

use crate::codec::{DecodeError, EncodeError, RequestDecoder, RequestEncoder};
use crate::dispatch::OfflineQueue;
use crate::endpoint::Endpoint;
use crate::refresh::CredentialRefresher;
use crate::transport::{HttpRequest, Transport, TransportOutcome};
use crate::uploader::{Attachment, AttachmentUploader, ProgressCallback, UploadError, UploadedFile};

fn placeholder_request(endpoint: &Endpoint) -> HttpRequest {
    let base = Url::parse("https://chat.example.com/").expect("valid base url");
    let url = base.join(&endpoint.path).unwrap_or(base);
    HttpRequest { url, method: endpoint.method, headers: Vec::new(), body: None }
}

/// Scripted [`RequestEncoder`] that records every endpoint it encodes.
///
/// Results are played back from a queue; once the queue is empty every call
/// succeeds with a placeholder request, so the encode step stays out of the
/// way in tests that target the decode-side policy.
#[derive(Default)]
pub struct MockRequestEncoder {
    script: Mutex<VecDeque<Result<HttpRequest, EncodeError>>>,
    recorded: Mutex<Vec<Endpoint>>,
    calls: AtomicU32,
}

impl MockRequestEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result for the next unscripted call.
    pub fn push_result(&self, result: Result<HttpRequest, EncodeError>) {
        self.script.lock().push_back(result);
    }

    /// Endpoints encoded so far, in call order.
    pub fn recorded(&self) -> Vec<Endpoint> {
        self.recorded.lock().clone()
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RequestEncoder for MockRequestEncoder {
    async fn encode(&self, endpoint: &Endpoint) -> Result<HttpRequest, EncodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.recorded.lock().push(endpoint.clone());
        match self.script.lock().pop_front() {
            Some(result) => result,
            None => Ok(placeholder_request(endpoint)),
        }
    }
}

/// Scripted [`RequestDecoder`].
///
/// Plays back queued results first, then repeats the fallback (`Ok("{}")`
/// unless overridden). An optional per-call delay keeps an operation
/// in flight long enough for a test to race a flush or mode change
/// against it.
pub struct MockRequestDecoder {
    script: Mutex<VecDeque<Result<Vec<u8>, DecodeError>>>,
    fallback: Mutex<Result<Vec<u8>, DecodeError>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicU32,
}

impl MockRequestDecoder {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Ok(b"{}".to_vec())),
            delay: Mutex::new(None),
            calls: AtomicU32::new(0),
        }
    }

    /// Queue the result for the next unscripted call.
    pub fn push_result(&self, result: Result<Vec<u8>, DecodeError>) {
        self.script.lock().push_back(result);
    }

    /// Replace the result repeated once the script is exhausted.
    pub fn set_fallback(&self, result: Result<Vec<u8>, DecodeError>) {
        *self.fallback.lock() = result;
    }

    /// Delay every decode by the given duration.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockRequestDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RequestDecoder for MockRequestDecoder {
    async fn decode(&self, _outcome: TransportOutcome) -> Result<Vec<u8>, DecodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.script.lock().pop_front() {
            Some(result) => result,
            None => self.fallback.lock().clone(),
        }
    }
}

/// Recording [`Transport`] returning a fixed outcome.
#[derive(Default)]
pub struct MockTransport {
    outcome: Mutex<TransportOutcome>,
    recorded: Mutex<Vec<HttpRequest>>,
    calls: AtomicU32,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the outcome returned by every call.
    pub fn set_outcome(&self, outcome: TransportOutcome) {
        *self.outcome.lock() = outcome;
    }

    /// Requests executed so far, in call order.
    pub fn recorded(&self) -> Vec<HttpRequest> {
        self.recorded.lock().clone()
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: HttpRequest) -> TransportOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.recorded.lock().push(request);
        self.outcome.lock().clone()
    }
}

/// Scripted [`CredentialRefresher`].
///
/// In `immediate` mode every refresh resolves at once. In `manual` mode the
/// refresh parks until the test calls [`complete_refresh`]
/// (Self::complete_refresh), which lets a test hold the regular lane frozen
/// mid-episode and observe the engine's behavior in that window.
pub struct MockCredentialRefresher {
    gate: Option<Semaphore>,
    calls: AtomicU32,
}

impl MockCredentialRefresher {
    /// Refreshes resolve immediately.
    pub fn immediate() -> Self {
        Self { gate: None, calls: AtomicU32::new(0) }
    }

    /// Refreshes park until [`complete_refresh`](Self::complete_refresh).
    pub fn manual() -> Self {
        Self { gate: Some(Semaphore::new(0)), calls: AtomicU32::new(0) }
    }

    /// Release one parked refresh.
    pub fn complete_refresh(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialRefresher for MockCredentialRefresher {
    async fn refresh(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let permit = gate.acquire().await.expect("refresher gate closed");
            permit.forget();
        }
    }
}

/// Recording [`OfflineQueue`].
#[derive(Default)]
pub struct MockOfflineQueue {
    recorded: Mutex<Vec<Endpoint>>,
}

impl MockOfflineQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Endpoints handed over for later replay, in call order.
    pub fn enqueued(&self) -> Vec<Endpoint> {
        self.recorded.lock().clone()
    }
}

#[async_trait]
impl OfflineQueue for MockOfflineQueue {
    async fn enqueue(&self, endpoint: Endpoint) {
        self.recorded.lock().push(endpoint);
    }
}

/// Scripted [`AttachmentUploader`] reporting canned progress fractions.
pub struct MockAttachmentUploader {
    script: Mutex<VecDeque<Result<UploadedFile, UploadError>>>,
    progress_steps: Mutex<Vec<f64>>,
    recorded: Mutex<Vec<Attachment>>,
    calls: AtomicU32,
}

impl MockAttachmentUploader {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            progress_steps: Mutex::new(Vec::new()),
            recorded: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
        }
    }

    /// Queue the result for the next unscripted call.
    pub fn push_result(&self, result: Result<UploadedFile, UploadError>) {
        self.script.lock().push_back(result);
    }

    /// Progress fractions reported on every attempt, in order.
    pub fn set_progress_steps(&self, steps: Vec<f64>) {
        *self.progress_steps.lock() = steps;
    }

    /// Attachments uploaded so far, in call order.
    pub fn recorded(&self) -> Vec<Attachment> {
        self.recorded.lock().clone()
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockAttachmentUploader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AttachmentUploader for MockAttachmentUploader {
    async fn upload(
        &self,
        attachment: Attachment,
        progress: ProgressCallback,
    ) -> Result<UploadedFile, UploadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.recorded.lock().push(attachment);
        let steps = self.progress_steps.lock().clone();
        for step in steps {
            progress(step);
        }
        match self.script.lock().pop_front() {
            Some(result) => result,
            None => Ok(UploadedFile {
                remote_url: Url::parse("https://cdn.example.com/uploads/file")
                    .expect("valid url"),
                thumbnail_url: None,
            }),
        }
    }
}
