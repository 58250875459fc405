//! Shared credential-refresh episodes.
//!
//! When an operation comes back with an expired credential, the whole
//! regular lane freezes and exactly one refresh runs, no matter how many
//! operations hit the stale credential simultaneously: the first caller
//! becomes the episode leader and invokes the external refresher, every
//! later arrival attaches to the in-flight episode and waits for the same
//! completion.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::futures::Notified;
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::diagnostics::ClientDiagnostics;

/// External hook that obtains a fresh credential.
///
/// `refresh` resolves once the new credential is in place and requests may
/// be encoded again. The engine invokes it at most once per concurrent
/// episode.
#[async_trait]
pub trait CredentialRefresher: Send + Sync {
    /// Obtain a fresh credential.
    async fn refresh(&self);
}

/// Join-or-start latch around the refresher hook.
pub(crate) struct RefreshCoordinator {
    refresher: Arc<dyn CredentialRefresher>,
    diagnostics: Arc<ClientDiagnostics>,
    in_progress: Mutex<bool>,
    done: Notify,
}

impl RefreshCoordinator {
    pub(crate) fn new(
        refresher: Arc<dyn CredentialRefresher>,
        diagnostics: Arc<ClientDiagnostics>,
    ) -> Self {
        Self { refresher, diagnostics, in_progress: Mutex::new(false), done: Notify::new() }
    }

    /// Whether a refresh episode is currently outstanding. While true, no
    /// new regular-lane encode attempt may start.
    pub(crate) fn is_refreshing(&self) -> bool {
        *self.in_progress.lock()
    }

    /// Future resolving when the current episode completes. Must be created
    /// before re-checking `is_refreshing` to avoid missing a wakeup.
    pub(crate) fn completed(&self) -> Notified<'_> {
        self.done.notified()
    }

    /// Start a refresh episode, or attach to the one already in flight.
    /// Resolves once the episode completes.
    pub(crate) async fn refresh_and_wait(&self) {
        let is_leader = {
            let mut in_progress = self.in_progress.lock();
            if *in_progress {
                false
            } else {
                *in_progress = true;
                true
            }
        };

        if is_leader {
            self.diagnostics.note_refresh_episode();
            info!("credential expired, starting refresh episode");
            self.refresher.refresh().await;
            *self.in_progress.lock() = false;
            self.done.notify_waiters();
            debug!("refresh episode completed");
        } else {
            debug!("attaching to in-flight refresh episode");
            loop {
                let completed = self.done.notified();
                if !self.is_refreshing() {
                    return;
                }
                completed.await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for episode sharing.

    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;

    struct CountingRefresher {
        calls: AtomicU32,
    }

    #[async_trait]
    impl CredentialRefresher for CountingRefresher {
        async fn refresh(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Validates concurrent callers share a single refresh episode.
    ///
    /// Assertions:
    /// - The refresher hook runs once despite three concurrent waiters.
    /// - All waiters resolve after the episode completes.
    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_callers_share_one_episode() {
        let refresher = Arc::new(CountingRefresher { calls: AtomicU32::new(0) });
        let coordinator = Arc::new(RefreshCoordinator::new(
            refresher.clone(),
            Arc::new(ClientDiagnostics::default()),
        ));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let coordinator = coordinator.clone();
            handles.push(tokio::spawn(async move {
                coordinator.refresh_and_wait().await;
            }));
        }
        for handle in handles {
            handle.await.expect("waiter should resolve");
        }

        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
        assert!(!coordinator.is_refreshing());
    }

    /// Validates sequential expirations start distinct episodes.
    #[tokio::test(flavor = "multi_thread")]
    async fn test_sequential_episodes_are_distinct() {
        let refresher = Arc::new(CountingRefresher { calls: AtomicU32::new(0) });
        let diagnostics = Arc::new(ClientDiagnostics::default());
        let coordinator = RefreshCoordinator::new(refresher.clone(), diagnostics.clone());

        coordinator.refresh_and_wait().await;
        coordinator.refresh_and_wait().await;

        assert_eq!(refresher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(diagnostics.refresh_episodes(), 2);
    }
}
