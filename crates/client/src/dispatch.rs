//! Dispatch-lane primitives: flush epochs and the serial recovery lane.
//!
//! The regular lane needs no queue structure of its own — every operation
//! runs on its own task and parks on the mode/refresh gates. What the lanes
//! share is the flush epoch: a counter bumped by `flush_requests_queue`.
//! Every park point captures the epoch before waiting and compares it after
//! waking; a mismatch means the operation was parked when a flush happened
//! and must be dropped silently, completion never invoked. Operations
//! inside an encode/transport/decode cycle never check the epoch, so
//! in-flight calls always finish normally.
//!
//! The recovery lane is a ticket queue: tickets are taken synchronously at
//! submission, so FIFO order reflects submission order even if the tasks
//! are scheduled out of order, and a ticket is only advanced once its
//! operation reaches a terminal state — retries and all.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::endpoint::Endpoint;

/// External hook that persists a failed call for later replay.
#[async_trait]
pub trait OfflineQueue: Send + Sync {
    /// Record the endpoint for later replay. Fire-and-forget: the engine
    /// does not observe the result.
    async fn enqueue(&self, endpoint: Endpoint);
}

/// Monotonic flush epoch shared by both lanes.
#[derive(Debug, Default)]
pub(crate) struct FlushState {
    epoch: AtomicU64,
}

impl FlushState {
    /// Current epoch, captured before entering a park point.
    pub(crate) fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Bump the epoch, invalidating every currently-parked operation.
    pub(crate) fn flush(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Whether a flush happened since the epoch was captured.
    pub(crate) fn flushed_since(&self, captured: u64) -> bool {
        self.epoch() != captured
    }
}

/// Strictly serial FIFO lane.
///
/// At most one ticket is being served at any time; `advance` hands the lane
/// to the next ticket in submission order.
pub(crate) struct SerialLane {
    next_ticket: AtomicU64,
    now_serving: AtomicU64,
    advanced: Notify,
}

impl SerialLane {
    pub(crate) fn new() -> Self {
        Self {
            next_ticket: AtomicU64::new(0),
            now_serving: AtomicU64::new(0),
            advanced: Notify::new(),
        }
    }

    /// Take the next ticket. Must be called synchronously at submission so
    /// ticket order equals submission order.
    pub(crate) fn ticket(&self) -> u64 {
        self.next_ticket.fetch_add(1, Ordering::SeqCst)
    }

    /// Wait until the ticket is being served.
    pub(crate) async fn wait_turn(&self, ticket: u64) {
        loop {
            let advanced = self.advanced.notified();
            if self.now_serving.load(Ordering::SeqCst) == ticket {
                return;
            }
            advanced.await;
        }
    }

    /// Finish serving the current ticket and wake the next holder. Must be
    /// called exactly once per ticket, including for flushed operations.
    pub(crate) fn advance(&self) {
        self.now_serving.fetch_add(1, Ordering::SeqCst);
        self.advanced.notify_waiters();
    }

    /// Guard form of [`advance`](Self::advance): the lane moves on when the
    /// guard drops, so a panicking operation cannot wedge later tickets.
    pub(crate) fn advance_on_drop(&self) -> TurnGuard<'_> {
        TurnGuard { lane: self }
    }
}

pub(crate) struct TurnGuard<'a> {
    lane: &'a SerialLane,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        self.lane.advance();
    }
}
