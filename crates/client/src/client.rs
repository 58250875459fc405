//! The API client facade and the operation state machine it drives.
//!
//! Callers submit endpoints through one of three entry points:
//!
//! - [`ApiClient::request`] — regular lane: unbounded concurrency, full
//!   retry, credential-refresh, and recovery-mode gating.
//! - [`ApiClient::recovery_request`] — serial recovery lane, FIFO across
//!   retries; submitting outside recovery mode raises a non-fatal
//!   diagnostic but still executes.
//! - [`ApiClient::unmanaged_request`] — bypasses all coordination; only the
//!   connectivity retry ceiling applies.
//!
//! Every submission becomes an operation serviced by its own task. The
//! driver loop runs encode → transport → decode, then consults the retry
//! policy: connectivity loss retries in place up to the configured ceiling
//! (then offline-queues and surfaces the failure), an expired credential
//! freezes the regular lane behind a shared refresh episode and retries
//! without consuming the connectivity budget, and server rejections
//! complete immediately. Callers observe exactly one terminal result; no
//! intermediate retry, mode transition, or refresh is ever visible.

use std::sync::Arc;

use chatwire_common::{ClientError, ClientResult};
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use crate::codec::{DecodeError, EncodeError, RequestDecoder, RequestEncoder};
use crate::config::{ApiClientConfig, ConfigError};
use crate::diagnostics::ClientDiagnostics;
use crate::dispatch::{FlushState, OfflineQueue, SerialLane};
use crate::endpoint::Endpoint;
use crate::modes::{ModeController, ModeState};
use crate::operation::{Completion, Lane, Operation};
use crate::refresh::{CredentialRefresher, RefreshCoordinator};
use crate::transport::{HttpRequest, Transport};
use crate::uploader::{Attachment, AttachmentUploader, ProgressCallback, UploadError, UploadedFile};

/// Public entry point of the request-execution engine.
///
/// Cheap to clone; all clones share the same lanes, mode state, and
/// diagnostics.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ApiClientConfig,
    encoder: Arc<dyn RequestEncoder>,
    decoder: Arc<dyn RequestDecoder>,
    transport: Arc<dyn Transport>,
    uploader: Arc<dyn AttachmentUploader>,
    offline_queue: Arc<dyn OfflineQueue>,
    modes: ModeController,
    refresh: RefreshCoordinator,
    flush: FlushState,
    recovery_lane: SerialLane,
    diagnostics: Arc<ClientDiagnostics>,
}

impl ApiClient {
    /// Create a client builder.
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Submit a regular-lane request; the completion receives the decoded
    /// payload deserialized into `T`.
    pub fn request<T, F>(&self, endpoint: Endpoint, completion: F)
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(ClientResult<T>) + Send + 'static,
    {
        self.submit(endpoint, Lane::Regular, Self::typed(completion));
    }

    /// Submit a regular-lane request completing with raw payload bytes.
    pub fn request_raw<F>(&self, endpoint: Endpoint, completion: F)
    where
        F: FnOnce(ClientResult<Vec<u8>>) + Send + 'static,
    {
        self.submit(endpoint, Lane::Regular, Completion::new(completion));
    }

    /// Submit a recovery-lane request. Recovery requests execute strictly
    /// serially in submission order; submitting one while recovery mode is
    /// off raises a non-fatal diagnostic but still executes the request.
    pub fn recovery_request<T, F>(&self, endpoint: Endpoint, completion: F)
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(ClientResult<T>) + Send + 'static,
    {
        self.submit(endpoint, Lane::Recovery, Self::typed(completion));
    }

    /// Raw-bytes variant of [`recovery_request`](Self::recovery_request).
    pub fn recovery_request_raw<F>(&self, endpoint: Endpoint, completion: F)
    where
        F: FnOnce(ClientResult<Vec<u8>>) + Send + 'static,
    {
        self.submit(endpoint, Lane::Recovery, Completion::new(completion));
    }

    /// Submit a request that bypasses recovery and credential-refresh
    /// coordination. Connectivity retries still apply; an expired
    /// credential is surfaced as a terminal failure.
    pub fn unmanaged_request<T, F>(&self, endpoint: Endpoint, completion: F)
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(ClientResult<T>) + Send + 'static,
    {
        self.submit(endpoint, Lane::Unmanaged, Self::typed(completion));
    }

    /// Raw-bytes variant of [`unmanaged_request`](Self::unmanaged_request).
    pub fn unmanaged_request_raw<F>(&self, endpoint: Endpoint, completion: F)
    where
        F: FnOnce(ClientResult<Vec<u8>>) + Send + 'static,
    {
        self.submit(endpoint, Lane::Unmanaged, Completion::new(completion));
    }

    /// Upload an attachment. Connectivity loss is retried under the same
    /// ceiling as requests; any other failure is terminal after one
    /// attempt. Progress callbacks are forwarded verbatim per attempt.
    pub fn upload_attachment<P, F>(&self, attachment: Attachment, progress: P, completion: F)
    where
        P: Fn(f64) + Send + Sync + 'static,
        F: FnOnce(ClientResult<UploadedFile>) + Send + 'static,
    {
        let inner = self.inner.clone();
        let submit_epoch = inner.flush.epoch();
        let progress: ProgressCallback = Arc::new(progress);
        tokio::spawn(async move {
            inner.run_upload(attachment, progress, Box::new(completion), submit_epoch).await;
        });
    }

    /// Enter recovery mode: park the regular lane and open the serial
    /// recovery lane.
    pub fn enter_recovery_mode(&self) {
        self.inner.modes.enter_recovery();
    }

    /// Exit recovery mode: resume every parked regular-lane operation.
    pub fn exit_recovery_mode(&self) {
        self.inner.modes.exit_recovery();
    }

    /// Signal that credentials are being refreshed out of band; parks the
    /// regular lane without starting a refresh episode.
    pub fn enter_token_fetch_mode(&self) {
        self.inner.modes.enter_token_fetch();
    }

    /// End out-of-band credential refresh; resumes the regular lane.
    pub fn exit_token_fetch_mode(&self) {
        self.inner.modes.exit_token_fetch();
    }

    /// Drop every parked operation silently: completions are never invoked
    /// and nothing is offline-queued. Operations already executing finish
    /// normally.
    pub fn flush_requests_queue(&self) {
        self.inner.flush.flush();
        debug!("request queues flushed");
    }

    /// Snapshot of the mode flags.
    pub fn mode_state(&self) -> ModeState {
        self.inner.modes.snapshot()
    }

    /// Observable engine counters.
    pub fn diagnostics(&self) -> Arc<ClientDiagnostics> {
        self.inner.diagnostics.clone()
    }

    fn typed<T, F>(completion: F) -> Completion
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(ClientResult<T>) + Send + 'static,
    {
        Completion::new(move |result: ClientResult<Vec<u8>>| {
            completion(result.and_then(|bytes| {
                serde_json::from_slice::<T>(&bytes).map_err(ClientError::Deserialize)
            }));
        })
    }

    fn submit(&self, endpoint: Endpoint, lane: Lane, completion: Completion) {
        let inner = self.inner.clone();

        if lane == Lane::Recovery && !inner.modes.snapshot().recovery_active {
            inner.diagnostics.note_recovery_misuse();
            error!(path = %endpoint.path, "recovery request submitted outside recovery mode");
        }

        // Epoch and ticket are taken synchronously so flush coverage and
        // recovery-lane ordering both reflect submission order.
        let submit_epoch = inner.flush.epoch();
        let ticket =
            if lane == Lane::Recovery { Some(inner.recovery_lane.ticket()) } else { None };
        let operation = Operation::new(endpoint, lane, completion);

        tokio::spawn(async move {
            match ticket {
                Some(ticket) => inner.run_recovery(operation, ticket, submit_epoch).await,
                None => inner.run_concurrent(operation, submit_epoch).await,
            }
        });
    }
}

impl ClientInner {
    async fn run_concurrent(&self, operation: Operation, submit_epoch: u64) {
        if operation.lane == Lane::Regular {
            self.wait_for_regular_clearance().await;
            if self.flush.flushed_since(submit_epoch) {
                debug!(id = %operation.id, "operation flushed before dispatch");
                self.diagnostics.note_flushed();
                operation.completion.discard();
                return;
            }
        }
        self.drive(operation).await;
    }

    async fn run_recovery(&self, operation: Operation, ticket: u64, submit_epoch: u64) {
        self.recovery_lane.wait_turn(ticket).await;
        // The guard advances the lane on drop, so a completion that panics
        // inside `drive` still hands the lane to the next ticket.
        let _turn = self.recovery_lane.advance_on_drop();
        if self.flush.flushed_since(submit_epoch) {
            debug!(id = %operation.id, "recovery operation flushed before dispatch");
            self.diagnostics.note_flushed();
            operation.completion.discard();
            return;
        }
        self.drive(operation).await;
    }

    /// Run one operation's state machine to a terminal state.
    async fn drive(&self, mut operation: Operation) {
        loop {
            let request = match self.encode_with_single_wait_retry(&operation.endpoint).await {
                Ok(request) => request,
                Err(EncodeError::WaitingForCredential) => {
                    warn!(id = %operation.id, "credential still unavailable after encode retry");
                    operation.completion.invoke(Err(ClientError::CredentialUnavailable));
                    return;
                }
                Err(e) => {
                    operation
                        .completion
                        .invoke(Err(ClientError::Encode { message: e.to_string() }));
                    return;
                }
            };

            debug!(id = %operation.id, path = %operation.endpoint.path, "executing request");
            let outcome = self.transport.execute(request).await;

            match self.decoder.decode(outcome).await {
                Ok(bytes) => {
                    operation.completion.invoke(Ok(bytes));
                    return;
                }
                Err(DecodeError::ConnectivityLost(message)) => {
                    operation.connectivity_failures += 1;
                    let attempts = operation.connectivity_failures;
                    if attempts > self.config.max_connectivity_retries {
                        warn!(id = %operation.id, attempts, "connectivity retry budget exhausted");
                        if operation.lane == Lane::Regular {
                            self.offline_queue.enqueue(operation.endpoint.clone()).await;
                            self.diagnostics.note_offline_queued();
                        }
                        operation
                            .completion
                            .invoke(Err(ClientError::ConnectivityLost { attempts, message }));
                        return;
                    }
                    let delay = self.config.connectivity_backoff.calculate_delay(attempts - 1);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    warn!(id = %operation.id, attempt = attempts, "connection lost, retrying");
                    // A retry attempt honors the same gates as fresh
                    // dispatch: an open refresh episode or active mode parks
                    // the operation before it re-encodes.
                    if operation.lane == Lane::Regular {
                        let park_epoch = self.flush.epoch();
                        self.wait_for_regular_clearance().await;
                        if self.flush.flushed_since(park_epoch) {
                            debug!(id = %operation.id, "operation flushed while awaiting retry clearance");
                            self.diagnostics.note_flushed();
                            operation.completion.discard();
                            return;
                        }
                    }
                }
                Err(DecodeError::CredentialExpired) => {
                    if operation.lane == Lane::Unmanaged {
                        operation.completion.invoke(Err(ClientError::CredentialExpired));
                        return;
                    }
                    operation.refreshes += 1;
                    if let Some(cap) = self.config.max_credential_refreshes {
                        if operation.refreshes > cap {
                            warn!(id = %operation.id, refreshes = cap, "refresh ceiling reached");
                            operation.completion.invoke(Err(
                                ClientError::TooManyCredentialRefreshes { refreshes: cap },
                            ));
                            return;
                        }
                    }
                    // The operation is parked from here until the episode
                    // completes; a flush during that window drops it.
                    let park_epoch = self.flush.epoch();
                    self.refresh.refresh_and_wait().await;
                    if operation.lane == Lane::Regular {
                        self.wait_for_regular_clearance().await;
                    }
                    if self.flush.flushed_since(park_epoch) {
                        debug!(id = %operation.id, "operation flushed while awaiting refresh");
                        self.diagnostics.note_flushed();
                        operation.completion.discard();
                        return;
                    }
                }
                Err(DecodeError::Server { code, message }) => {
                    operation.completion.invoke(Err(ClientError::Server { code, message }));
                    return;
                }
                Err(DecodeError::Other(message)) => {
                    operation.completion.invoke(Err(ClientError::Response { message }));
                    return;
                }
            }
        }
    }

    /// Encode the endpoint, silently re-running the encode step exactly
    /// once when a credential or session id is not yet available.
    async fn encode_with_single_wait_retry(
        &self,
        endpoint: &Endpoint,
    ) -> Result<HttpRequest, EncodeError> {
        match self.encoder.encode(endpoint).await {
            Err(EncodeError::WaitingForCredential) => {
                debug!(path = %endpoint.path, "credential not ready, re-running encode once");
                self.encoder.encode(endpoint).await
            }
            result => result,
        }
    }

    /// Park until the regular lane is clear: no recovery mode, no
    /// token-fetch mode, no outstanding refresh episode.
    async fn wait_for_regular_clearance(&self) {
        loop {
            let mode_changed = self.modes.changed();
            let refresh_done = self.refresh.completed();
            if !self.modes.snapshot().blocks_regular() && !self.refresh.is_refreshing() {
                return;
            }
            tokio::select! {
                _ = mode_changed => {}
                _ = refresh_done => {}
            }
        }
    }

    async fn run_upload(
        &self,
        attachment: Attachment,
        progress: ProgressCallback,
        completion: Box<dyn FnOnce(ClientResult<UploadedFile>) + Send>,
        submit_epoch: u64,
    ) {
        self.wait_for_regular_clearance().await;
        if self.flush.flushed_since(submit_epoch) {
            debug!(attachment = %attachment.id, "upload flushed before dispatch");
            self.diagnostics.note_flushed();
            return;
        }

        let mut failures = 0u32;
        loop {
            match self.uploader.upload(attachment.clone(), progress.clone()).await {
                Ok(file) => {
                    completion(Ok(file));
                    return;
                }
                Err(UploadError::ConnectivityLost(message)) => {
                    failures += 1;
                    if failures > self.config.max_connectivity_retries {
                        warn!(attachment = %attachment.id, attempts = failures, "upload retry budget exhausted");
                        completion(Err(ClientError::ConnectivityLost {
                            attempts: failures,
                            message,
                        }));
                        return;
                    }
                    let delay = self.config.connectivity_backoff.calculate_delay(failures - 1);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    warn!(attachment = %attachment.id, attempt = failures, "connection lost during upload, retrying");
                    // Upload retries park under the regular-lane gate too.
                    let park_epoch = self.flush.epoch();
                    self.wait_for_regular_clearance().await;
                    if self.flush.flushed_since(park_epoch) {
                        debug!(attachment = %attachment.id, "upload flushed while awaiting retry clearance");
                        self.diagnostics.note_flushed();
                        return;
                    }
                }
                Err(UploadError::Other(message)) => {
                    completion(Err(ClientError::Upload { message }));
                    return;
                }
            }
        }
    }
}

/// Builder wiring the engine's collaborators together.
#[derive(Default)]
pub struct ApiClientBuilder {
    config: Option<ApiClientConfig>,
    encoder: Option<Arc<dyn RequestEncoder>>,
    decoder: Option<Arc<dyn RequestDecoder>>,
    transport: Option<Arc<dyn Transport>>,
    uploader: Option<Arc<dyn AttachmentUploader>>,
    credential_refresher: Option<Arc<dyn CredentialRefresher>>,
    offline_queue: Option<Arc<dyn OfflineQueue>>,
}

impl ApiClientBuilder {
    /// Set the engine configuration (defaults applied otherwise).
    #[must_use]
    pub fn config(mut self, config: ApiClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the request encoder.
    #[must_use]
    pub fn encoder(mut self, encoder: Arc<dyn RequestEncoder>) -> Self {
        self.encoder = Some(encoder);
        self
    }

    /// Set the request decoder.
    #[must_use]
    pub fn decoder(mut self, decoder: Arc<dyn RequestDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Set the transport.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the attachment uploader.
    #[must_use]
    pub fn uploader(mut self, uploader: Arc<dyn AttachmentUploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    /// Set the credential-refresh hook.
    #[must_use]
    pub fn credential_refresher(mut self, refresher: Arc<dyn CredentialRefresher>) -> Self {
        self.credential_refresher = Some(refresher);
        self
    }

    /// Set the offline-queue hook.
    #[must_use]
    pub fn offline_queue(mut self, offline_queue: Arc<dyn OfflineQueue>) -> Self {
        self.offline_queue = Some(offline_queue);
        self
    }

    /// Validate the configuration and assemble the client.
    pub fn build(self) -> Result<ApiClient, ConfigError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let encoder = self.encoder.ok_or(ConfigError::MissingCollaborator("encoder"))?;
        let decoder = self.decoder.ok_or(ConfigError::MissingCollaborator("decoder"))?;
        let transport = self.transport.ok_or(ConfigError::MissingCollaborator("transport"))?;
        let uploader = self.uploader.ok_or(ConfigError::MissingCollaborator("uploader"))?;
        let refresher = self
            .credential_refresher
            .ok_or(ConfigError::MissingCollaborator("credential_refresher"))?;
        let offline_queue =
            self.offline_queue.ok_or(ConfigError::MissingCollaborator("offline_queue"))?;

        let diagnostics = Arc::new(ClientDiagnostics::default());
        let refresh = RefreshCoordinator::new(refresher, diagnostics.clone());

        Ok(ApiClient {
            inner: Arc::new(ClientInner {
                config,
                encoder,
                decoder,
                transport,
                uploader,
                offline_queue,
                modes: ModeController::new(),
                refresh,
                flush: FlushState::default(),
                recovery_lane: SerialLane::new(),
                diagnostics,
            }),
        })
    }
}
