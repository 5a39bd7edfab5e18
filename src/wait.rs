//! Bounded polling.
//!
//! Page-side conditions such as "the renderer global exists" have no event to
//! wait on, so they are checked repeatedly until they hold or a deadline
//! passes. The deadline covers the whole loop, including a check that never
//! returns.

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::trace;

use crate::error::Result;

// ============================================================================
// Polling
// ============================================================================

/// Runs `check` every `interval` until it yields `true` or `limit` elapses.
///
/// Returns `Ok(true)` once the condition holds and `Ok(false)` when the
/// deadline passes first. Connection errors abort polling; any other check
/// error counts as "not yet".
///
/// # Errors
///
/// Returns the check's error if it is a connection error.
pub async fn poll_until<F, Fut>(limit: Duration, interval: Duration, mut check: F) -> Result<bool>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let polling = async {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match check().await {
                Ok(true) => {
                    trace!(attempt, "Condition met");
                    return Ok(true);
                }
                Ok(false) => {}
                Err(e) if e.is_connection_error() => return Err(e),
                Err(e) => trace!(attempt, error = %e, "Check failed, retrying"),
            }
            sleep(interval).await;
        }
    };

    match timeout(limit, polling).await {
        Ok(result) => result,
        Err(_) => Ok(false),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    use crate::error::Error;

    #[tokio::test]
    async fn test_condition_met_after_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let met = poll_until(Duration::from_secs(2), Duration::from_millis(1), || {
            let counter = Arc::clone(&counter);
            async move { Ok(counter.fetch_add(1, Ordering::SeqCst) >= 2) }
        })
        .await
        .expect("poll");

        assert!(met);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_deadline_is_honoured() {
        let started = Instant::now();
        let met = poll_until(Duration::from_millis(50), Duration::from_millis(5), || async {
            Ok(false)
        })
        .await
        .expect("poll");

        assert!(!met);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_hanging_check_is_bounded() {
        let met = poll_until(Duration::from_millis(30), Duration::from_millis(5), || async {
            std::future::pending::<Result<bool>>().await
        })
        .await
        .expect("poll");

        assert!(!met);
    }

    #[tokio::test]
    async fn test_script_errors_are_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let met = poll_until(Duration::from_secs(2), Duration::from_millis(1), || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(Error::script_error("Execution context was destroyed"))
                } else {
                    Ok(true)
                }
            }
        })
        .await
        .expect("poll");

        assert!(met);
    }

    #[tokio::test]
    async fn test_connection_errors_abort() {
        let err = poll_until(Duration::from_secs(2), Duration::from_millis(1), || async {
            Err::<bool, _>(Error::ConnectionClosed)
        })
        .await
        .unwrap_err();

        assert!(err.is_connection_error());
    }
}
