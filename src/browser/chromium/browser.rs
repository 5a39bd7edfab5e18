//! Running Chromium instance.
//!
//! A [`ChromiumBrowser`] owns:
//! - One browser process (child process)
//! - One DevTools WebSocket connection
//! - One temporary user-data directory
//!
//! Dropping it without [`EngineHandle::close`] still kills the process.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::browser::{EngineHandle, PageHandle};
use crate::driver::process::ProcessGuard;
use crate::error::{Error, Result};
use crate::identifiers::{CdpSessionId, TargetId};
use crate::protocol::{BrowserCommand, Command, Request, TargetCommand};
use crate::transport::Connection;

use super::ChromiumPage;

// ============================================================================
// Constants
// ============================================================================

/// Time allowed for a graceful `Browser.close`.
const GRACEFUL_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================================
// ChromiumBrowser
// ============================================================================

/// Handle to a running Chromium process.
pub struct ChromiumBrowser {
    /// Browser-level DevTools connection.
    connection: Connection,
    /// Protected process handle, taken on close.
    process: Mutex<Option<ProcessGuard>>,
    /// Profile directory, removed on close.
    user_data_dir: Mutex<Option<TempDir>>,
    /// Process ID for logging.
    pid: u32,
    /// Set once close has started.
    closed: AtomicBool,
}

// ============================================================================
// ChromiumBrowser - Display
// ============================================================================

impl fmt::Debug for ChromiumBrowser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChromiumBrowser")
            .field("pid", &self.pid)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ChromiumBrowser - Constructor
// ============================================================================

impl ChromiumBrowser {
    /// Creates a browser handle.
    pub(crate) fn new(
        connection: Connection,
        process: ProcessGuard,
        user_data_dir: TempDir,
    ) -> Self {
        let pid = process.pid();
        debug!(pid, profile = %user_data_dir.path().display(), "Browser handle created");

        Self {
            connection,
            process: Mutex::new(Some(process)),
            user_data_dir: Mutex::new(Some(user_data_dir)),
            pid,
            closed: AtomicBool::new(false),
        }
    }
}

// ============================================================================
// ChromiumBrowser - Accessors
// ============================================================================

impl ChromiumBrowser {
    /// Returns the browser process ID.
    #[inline]
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Returns `true` once the browser has been closed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

// ============================================================================
// ChromiumBrowser - EngineHandle
// ============================================================================

#[async_trait]
impl EngineHandle for ChromiumBrowser {
    async fn new_page(&self) -> Result<Arc<dyn PageHandle>> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        let created = self
            .connection
            .execute(
                None,
                Command::Target(TargetCommand::CreateTarget {
                    url: "about:blank".to_string(),
                }),
            )
            .await?;
        let target_id = created
            .get("targetId")
            .and_then(|v| v.as_str())
            .map(TargetId::new)
            .ok_or_else(|| Error::protocol("Expected targetId in createTarget response"))?;

        let attached = self
            .connection
            .execute(
                None,
                Command::Target(TargetCommand::AttachToTarget {
                    target_id: target_id.clone(),
                    flatten: true,
                }),
            )
            .await?;
        let session_id = attached
            .get("sessionId")
            .and_then(|v| v.as_str())
            .map(CdpSessionId::new)
            .ok_or_else(|| Error::protocol("Expected sessionId in attachToTarget response"))?;

        let page = ChromiumPage::attach(self.connection.clone(), target_id, session_id).await?;
        Ok(Arc::new(page))
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        debug!(pid = self.pid, "Closing browser");

        let request = Request::new(Command::Browser(BrowserCommand::Close));
        if let Err(e) = self
            .connection
            .send_with_timeout(request, GRACEFUL_CLOSE_TIMEOUT)
            .await
        {
            // The browser usually drops the socket before answering.
            debug!(pid = self.pid, error = %e, "Browser.close did not complete cleanly");
        }
        self.connection.shutdown();

        let process = self.process.lock().take();
        if let Some(process) = process {
            process.kill().await;
        }

        let user_data_dir = self.user_data_dir.lock().take();
        if let Some(dir) = user_data_dir
            && let Err(e) = dir.close()
        {
            debug!(pid = self.pid, error = %e, "Failed to remove user data dir");
        }

        info!(pid = self.pid, "Browser closed");
        Ok(())
    }

    fn close_on_drop(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.connection.shutdown();
        // Dropping the guard sends the kill signal.
        drop(self.process.lock().take());
    }
}

impl Drop for ChromiumBrowser {
    fn drop(&mut self) {
        self.close_on_drop();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::ChromiumBrowser;

    #[test]
    fn test_browser_is_debug() {
        fn assert_debug<T: std::fmt::Debug>() {}
        assert_debug::<ChromiumBrowser>();
    }

    #[test]
    fn test_browser_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ChromiumBrowser>();
    }
}
