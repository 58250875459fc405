//! Terminal error taxonomy for the request-execution engine.
//!
//! Every failure a caller can observe through a completion is a
//! [`ClientError`]. The engine itself distinguishes four classes of decoder
//! outcomes (connectivity lost, credential expired, server rejection, other)
//! plus encode-side failures; intermediate retry failures never escape the
//! engine, so a completion sees exactly one terminal value.
//!
//! Module-specific errors (encode, decode, upload) live next to their trait
//! seams in `chatwire-client` and convert into `ClientError` at the point
//! where an operation reaches a terminal state.

use thiserror::Error;

/// Severity level attached to every error for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Expected condition, no action required.
    Info,
    /// Degraded but recoverable (transient network trouble, stale token).
    Warning,
    /// Failure requiring attention.
    Error,
    /// System integrity at risk.
    Critical,
}

/// Standard interface for classifying errors by their characteristics.
///
/// The engine consults `is_retryable` when deciding whether a failed attempt
/// may run again; severity feeds log levels and diagnostics.
pub trait ErrorClassification {
    /// Whether re-running the failed operation can reasonably succeed.
    fn is_retryable(&self) -> bool;

    /// How serious this error is.
    fn severity(&self) -> ErrorSeverity;

    /// Whether this error requires immediate attention.
    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }
}

/// Result alias used across the Chatwire crates.
pub type ClientResult<T> = Result<T, ClientError>;

/// Terminal failure surfaced to a caller's completion.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request encoder failed to produce a transport request.
    #[error("request could not be encoded: {message}")]
    Encode {
        /// Encoder-provided description of the failure.
        message: String,
    },

    /// The encoder reported twice in a row that a credential or session id
    /// was not yet available.
    #[error("credential or session id still unavailable after waiting")]
    CredentialUnavailable,

    /// Connectivity was lost and the retry budget is exhausted.
    #[error("connection lost after {attempts} attempts: {message}")]
    ConnectivityLost {
        /// Total attempts made, including the first one.
        attempts: u32,
        /// Transport-provided description of the last failure.
        message: String,
    },

    /// The credential expired and the refresh ceiling was reached.
    ///
    /// Only produced when a refresh cap is configured; by default expired
    /// credentials are refreshed indefinitely and never become terminal.
    #[error("credential still expired after {refreshes} refresh attempts")]
    TooManyCredentialRefreshes {
        /// Number of refresh episodes this operation waited through.
        refreshes: u32,
    },

    /// The credential expired on a lane that does not participate in
    /// refresh coordination (unmanaged requests).
    #[error("credential expired")]
    CredentialExpired,

    /// The backend rejected the request with a structured error payload.
    #[error("server rejected the request (code {code}): {message}")]
    Server {
        /// Backend-assigned error code.
        code: i32,
        /// Human-readable backend message.
        message: String,
    },

    /// Any other decoder-classified failure. Never retried.
    #[error("request failed: {message}")]
    Response {
        /// Decoder-provided description.
        message: String,
    },

    /// The decoded payload could not be deserialized into the caller's type.
    #[error("failed to deserialize response payload")]
    Deserialize(#[source] serde_json::Error),

    /// An attachment upload failed with a non-connectivity error.
    #[error("attachment upload failed: {message}")]
    Upload {
        /// Uploader-provided description.
        message: String,
    },
}

impl ErrorClassification for ClientError {
    fn is_retryable(&self) -> bool {
        match self {
            // Terminal forms of retryable conditions: the budget is spent,
            // so the operation itself must not run again, but a fresh
            // submission of the same endpoint may succeed.
            Self::ConnectivityLost { .. }
            | Self::TooManyCredentialRefreshes { .. }
            | Self::CredentialExpired
            | Self::CredentialUnavailable => true,
            Self::Encode { .. }
            | Self::Server { .. }
            | Self::Response { .. }
            | Self::Deserialize(_)
            | Self::Upload { .. } => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::ConnectivityLost { .. }
            | Self::CredentialExpired
            | Self::CredentialUnavailable
            | Self::TooManyCredentialRefreshes { .. } => ErrorSeverity::Warning,
            Self::Encode { .. }
            | Self::Server { .. }
            | Self::Response { .. }
            | Self::Deserialize(_)
            | Self::Upload { .. } => ErrorSeverity::Error,
        }
    }
}
