//! Shared building blocks for the Chatwire crates.
//!
//! This crate carries the pieces the client engine and its callers both need:
//!
//! - [`error`]: the terminal error taxonomy surfaced by the request engine,
//!   plus the [`ErrorClassification`] trait used to drive retry decisions.
//! - [`backoff`]: delay strategies applied between connectivity retries.
//! - [`testing`]: small async helpers for integration tests.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod backoff;
pub mod error;
pub mod testing;

pub use backoff::BackoffStrategy;
pub use error::{ClientError, ClientResult, ErrorClassification, ErrorSeverity};
