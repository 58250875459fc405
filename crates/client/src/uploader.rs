//! Attachment upload seam.
//!
//! Uploads go to a CDN through an external uploader but share the engine's
//! connectivity retry policy: connection loss is retried up to the same
//! ceiling as regular requests, any other failure is terminal after one
//! attempt. Progress callbacks are forwarded verbatim — each attempt
//! reports its own progress stream, the engine neither deduplicates nor
//! rescales them.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

/// Binary payload to upload.
#[derive(Debug, Clone)]
pub struct Attachment {
    /// Client-side identity of the attachment.
    pub id: Uuid,
    /// File name reported to the CDN.
    pub file_name: String,
    /// MIME type of the payload.
    pub mime_type: String,
    /// Raw payload bytes.
    pub data: Vec<u8>,
}

impl Attachment {
    /// Create an attachment with a fresh id.
    pub fn new(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        Self { id: Uuid::new_v4(), file_name: file_name.into(), mime_type: mime_type.into(), data }
    }
}

/// Remote reference returned by a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Location of the uploaded payload.
    pub remote_url: Url,
    /// CDN-provided thumbnail, when the payload is an image or video.
    pub thumbnail_url: Option<Url>,
}

/// Upload failure, classified for the retry policy.
#[derive(Debug, Clone, Error)]
pub enum UploadError {
    /// Connectivity was lost mid-upload; the attempt may be retried.
    #[error("connection lost during upload: {0}")]
    ConnectivityLost(String),
    /// Any other failure; terminal after the first attempt.
    #[error("upload failed: {0}")]
    Other(String),
}

/// Per-attempt progress callback, called with a fraction in `0.0..=1.0`.
pub type ProgressCallback = Arc<dyn Fn(f64) + Send + Sync>;

/// External uploader (CDN client).
#[async_trait]
pub trait AttachmentUploader: Send + Sync {
    /// Upload the attachment, reporting progress through the callback.
    async fn upload(
        &self,
        attachment: Attachment,
        progress: ProgressCallback,
    ) -> Result<UploadedFile, UploadError>;
}
