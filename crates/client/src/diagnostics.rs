//! Observable engine counters.
//!
//! Lightweight atomics exposed through [`ApiClient::diagnostics`]
//! (crate::ApiClient::diagnostics) so callers and tests can observe
//! correctness signals — most importantly the non-fatal assertion raised
//! when a recovery request is submitted outside recovery mode.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters describing engine activity. All reads are monotonic snapshots.
#[derive(Debug, Default)]
pub struct ClientDiagnostics {
    recovery_misuse: AtomicU64,
    refresh_episodes: AtomicU64,
    offline_queued: AtomicU64,
    flushed_operations: AtomicU64,
}

impl ClientDiagnostics {
    /// Times a recovery request was submitted while recovery mode was off.
    pub fn recovery_misuse(&self) -> u64 {
        self.recovery_misuse.load(Ordering::SeqCst)
    }

    /// Distinct credential-refresh episodes started.
    pub fn refresh_episodes(&self) -> u64 {
        self.refresh_episodes.load(Ordering::SeqCst)
    }

    /// Operations handed to the offline-queue hook after exhausting the
    /// connectivity retry budget.
    pub fn offline_queued(&self) -> u64 {
        self.offline_queued.load(Ordering::SeqCst)
    }

    /// Parked operations dropped by a flush without completing.
    pub fn flushed_operations(&self) -> u64 {
        self.flushed_operations.load(Ordering::SeqCst)
    }

    pub(crate) fn note_recovery_misuse(&self) {
        self.recovery_misuse.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn note_refresh_episode(&self) {
        self.refresh_episodes.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn note_offline_queued(&self) {
        self.offline_queued.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn note_flushed(&self) {
        self.flushed_operations.fetch_add(1, Ordering::SeqCst);
    }
}
