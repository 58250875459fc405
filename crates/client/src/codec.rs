//! Request encoder/decoder seams.
//!
//! Both halves of the codec are consumed interfaces: the engine drives them
//! but does not define their wire formats. The encoder turns an [`Endpoint`]
//! plus live credential/session state into a transport-ready request — and
//! may report that a credential is not yet available, which the engine
//! retries exactly once, silently. The decoder turns a raw transport outcome
//! into payload bytes or one of four classified failures that drive the
//! retry policy.

use async_trait::async_trait;
use thiserror::Error;

use crate::endpoint::Endpoint;
use crate::transport::{HttpRequest, TransportOutcome};

/// Failure produced by the request encoder.
#[derive(Debug, Clone, Error)]
pub enum EncodeError {
    /// A credential or session id the endpoint requires is not yet
    /// available. The engine re-runs the encode step once before surfacing
    /// this to the caller.
    #[error("waiting for a credential or session id")]
    WaitingForCredential,
    /// The endpoint could not be turned into a valid request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Classified failure produced by the request decoder.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    /// Connectivity was lost; the attempt may be retried.
    #[error("connection lost: {0}")]
    ConnectivityLost(String),
    /// The credential attached to the request is stale.
    #[error("credential expired")]
    CredentialExpired,
    /// The backend rejected the request with a structured payload.
    #[error("server error {code}: {message}")]
    Server {
        /// Backend-assigned error code.
        code: i32,
        /// Human-readable backend message.
        message: String,
    },
    /// Any other failure; never retried.
    #[error("{0}")]
    Other(String),
}

/// Turns an endpoint plus live credential/session state into a
/// transport-ready request.
#[async_trait]
pub trait RequestEncoder: Send + Sync {
    /// Encode the endpoint. May suspend while waiting on credential or
    /// session availability before giving up with
    /// [`EncodeError::WaitingForCredential`].
    async fn encode(&self, endpoint: &Endpoint) -> Result<HttpRequest, EncodeError>;
}

/// Turns a raw transport outcome into payload bytes or a classified error.
#[async_trait]
pub trait RequestDecoder: Send + Sync {
    /// Decode one transport outcome.
    async fn decode(&self, outcome: TransportOutcome) -> Result<Vec<u8>, DecodeError>;
}
