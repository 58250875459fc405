//! Scripted collaborators for exercising the engine without a network.
//!
//! Every engine seam has a mock here: mocks record what the engine handed
//! them and play back scripted results, so tests can drive any retry or
//! coordination path deterministically.

mod mocks;

pub use mocks::{
    MockAttachmentUploader, MockCredentialRefresher, MockOfflineQueue, MockRequestDecoder,
    MockRequestEncoder, MockTransport,
};
