//! One in-flight or queued unit of work.
//!
//! An [`Operation`] owns its endpoint, its completion, and its retry
//! bookkeeping. It is serviced by exactly one task at a time; counters are
//! plain fields because no other task ever touches them. The completion is
//! a one-shot: the type system guarantees it fires at most once, and the
//! engine guarantees every non-flushed operation fires it exactly once.

use chatwire_common::ClientResult;
use uuid::Uuid;

use crate::endpoint::Endpoint;

/// Dispatch lane an operation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    /// Concurrent lane with full retry, credential-refresh, and recovery
    /// gating.
    Regular,
    /// Serial, order-preserving lane used while the client reconciles state
    /// after a reconnection.
    Recovery,
    /// Bypasses recovery and credential-refresh coordination; still subject
    /// to the connectivity retry ceiling.
    Unmanaged,
}

/// One-shot completion guard around the caller's callback.
///
/// Consuming methods make double invocation unrepresentable; `discard`
/// covers the flush path, where a parked operation is dropped without ever
/// notifying the caller.
pub(crate) struct Completion {
    callback: Box<dyn FnOnce(ClientResult<Vec<u8>>) + Send>,
}

impl Completion {
    pub(crate) fn new<F>(callback: F) -> Self
    where
        F: FnOnce(ClientResult<Vec<u8>>) + Send + 'static,
    {
        Self { callback: Box::new(callback) }
    }

    /// Invoke the caller's callback with the terminal result.
    pub(crate) fn invoke(self, result: ClientResult<Vec<u8>>) {
        (self.callback)(result);
    }

    /// Drop the callback without invoking it (flush path).
    pub(crate) fn discard(self) {}
}

/// A submitted logical call plus its retry/completion bookkeeping.
pub(crate) struct Operation {
    pub(crate) id: Uuid,
    pub(crate) endpoint: Endpoint,
    pub(crate) lane: Lane,
    pub(crate) completion: Completion,
    /// Failed attempts counted against the connectivity retry budget.
    pub(crate) connectivity_failures: u32,
    /// Credential-refresh episodes this operation has waited through.
    /// Tracked separately: refresh retries never consume the connectivity
    /// budget.
    pub(crate) refreshes: u32,
}

impl Operation {
    pub(crate) fn new(endpoint: Endpoint, lane: Lane, completion: Completion) -> Self {
        Self {
            id: Uuid::new_v4(),
            endpoint,
            lane,
            completion,
            connectivity_failures: 0,
            refreshes: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the one-shot completion guard.

    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    /// Validates the completion fires the callback exactly once when invoked.
    #[test]
    fn test_completion_invokes_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let completion = Completion::new(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        completion.invoke(Ok(Vec::new()));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    /// Validates discarding a completion never runs the callback.
    #[test]
    fn test_completion_discard_is_silent() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let completion = Completion::new(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        completion.discard();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    /// Validates fresh operations start with zeroed retry bookkeeping.
    #[test]
    fn test_new_operation_counters() {
        let op = Operation::new(
            Endpoint::get("sync"),
            Lane::Regular,
            Completion::new(|_| {}),
        );

        assert_eq!(op.connectivity_failures, 0);
        assert_eq!(op.refreshes, 0);
        assert_eq!(op.lane, Lane::Regular);
    }
}
