//! Process-wide client mode state.
//!
//! Two independent flags, transitioned under a single critical section:
//! `recovery_active` parks the regular lane while the client replays missed
//! work over the serial recovery lane, and `token_fetch_active` parks the
//! regular lane while the caller refreshes credentials out of band (their
//! unmanaged credential traffic keeps flowing). Waiters are woken on every
//! transition and re-check the snapshot, so lost wakeups are impossible.

use parking_lot::Mutex;
use tokio::sync::futures::Notified;
use tokio::sync::Notify;
use tracing::info;

/// Snapshot of the mode flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeState {
    /// The client is replaying missed work; regular dispatch is parked.
    pub recovery_active: bool,
    /// The caller is refreshing credentials out of band; regular dispatch
    /// is parked.
    pub token_fetch_active: bool,
}

impl ModeState {
    /// Whether regular-lane operations may currently dispatch.
    pub fn blocks_regular(&self) -> bool {
        self.recovery_active || self.token_fetch_active
    }
}

/// Single-writer state machine over the mode flags.
pub(crate) struct ModeController {
    state: Mutex<ModeState>,
    changed: Notify,
}

impl ModeController {
    pub(crate) fn new() -> Self {
        Self { state: Mutex::new(ModeState::default()), changed: Notify::new() }
    }

    pub(crate) fn snapshot(&self) -> ModeState {
        *self.state.lock()
    }

    /// Future resolving on the next mode transition. Must be created before
    /// re-checking the snapshot to avoid missing a wakeup.
    pub(crate) fn changed(&self) -> Notified<'_> {
        self.changed.notified()
    }

    pub(crate) fn enter_recovery(&self) {
        self.transition(|state| state.recovery_active = true, "recovery mode entered");
    }

    pub(crate) fn exit_recovery(&self) {
        self.transition(|state| state.recovery_active = false, "recovery mode exited");
    }

    pub(crate) fn enter_token_fetch(&self) {
        self.transition(|state| state.token_fetch_active = true, "token fetch mode entered");
    }

    pub(crate) fn exit_token_fetch(&self) {
        self.transition(|state| state.token_fetch_active = false, "token fetch mode exited");
    }

    fn transition(&self, apply: impl FnOnce(&mut ModeState), message: &str) {
        {
            let mut state = self.state.lock();
            apply(&mut state);
        }
        info!("{message}");
        self.changed.notify_waiters();
    }
}
