//! Resilient request-execution engine for a chat backend.
//!
//! `chatwire-client` sits between a chat SDK's feature layer and the
//! network. Callers describe logical calls as [`Endpoint`] values and submit
//! them through the [`ApiClient`] facade; the engine owns everything between
//! submission and completion:
//!
//! - **Lanes** — a concurrent regular lane, a strictly serial FIFO recovery
//!   lane for post-reconnection state reconciliation, and an unmanaged
//!   escape hatch that bypasses coordination.
//! - **Retry policy** — bounded in-place retries on connectivity loss (then
//!   offline-queueing), shared credential-refresh episodes on expired
//!   credentials, immediate completion on server rejections.
//! - **Modes** — recovery mode and token-fetch mode each park the regular
//!   lane until exited; `flush_requests_queue` silently drops everything
//!   parked.
//!
//! The network itself lives behind the [`Transport`], [`RequestEncoder`],
//! [`RequestDecoder`], and [`AttachmentUploader`] seams; [`ReqwestTransport`]
//! is the production transport, and [`testing`] provides scripted mocks for
//! all of them.

#![forbid(unsafe_code)]

mod client;
mod codec;
mod config;
mod diagnostics;
mod dispatch;
mod endpoint;
mod modes;
mod operation;
mod refresh;
pub mod testing;
mod transport;
mod uploader;

pub use chatwire_common::{BackoffStrategy, ClientError, ClientResult};

pub use client::{ApiClient, ApiClientBuilder};
pub use codec::{DecodeError, EncodeError, RequestDecoder, RequestEncoder};
pub use config::{ApiClientConfig, ApiClientConfigBuilder, ConfigError};
pub use diagnostics::ClientDiagnostics;
pub use dispatch::OfflineQueue;
pub use endpoint::{Endpoint, HttpMethod};
pub use modes::ModeState;
pub use operation::Lane;
pub use refresh::CredentialRefresher;
pub use transport::{
    HttpRequest, ReqwestTransport, Transport, TransportError, TransportOutcome,
};
pub use uploader::{
    Attachment, AttachmentUploader, ProgressCallback, UploadError, UploadedFile,
};
