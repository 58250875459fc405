//! Async helpers shared by the test suites.

#![allow(clippy::missing_panics_doc)]

use std::future::Future;
use std::time::Duration;

/// Poll an async condition until it returns true or the timeout elapses.
pub async fn poll_until<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = std::time::Instant::now();

    while start.elapsed() < timeout {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    false
}

/// Assert that a condition eventually becomes true within a timeout.
#[macro_export]
macro_rules! assert_eventually {
    ($timeout:expr, $cond:expr) => {{
        let timeout_duration = $timeout;
        let became_true =
            $crate::testing::poll_until(timeout_duration, || async { $cond }).await;
        assert!(became_true, "Condition did not become true within {:?}", timeout_duration);
    }};
}
