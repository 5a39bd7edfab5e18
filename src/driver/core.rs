//! Chromium launcher.
//!
//! [`ChromiumLauncher`] turns a [`BrowserSelection`] into a running
//! [`ChromiumBrowser`]:
//!
//! 1. Resolve the executable (explicit path, then `PATH`, then well-known
//!    install locations)
//! 2. Create a temporary user-data directory
//! 3. Spawn the process with `--remote-debugging-port=0`
//! 4. Read the `DevTools listening on ws://...` line from stderr
//! 5. Connect the WebSocket
//!
//! # Example
//!
//! ```no_run
//! use mermaid_headless::browser::BrowserLauncher;
//! use mermaid_headless::driver::{BrowserSelection, ChromiumLauncher, LaunchOptions};
//!
//! # async fn example() -> mermaid_headless::Result<()> {
//! let launcher = ChromiumLauncher::new(LaunchOptions::new().with_no_sandbox());
//! let engine = launcher.launch(&"chromium:chrome".parse::<BrowserSelection>()?).await?;
//! engine.close().await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, trace};

use crate::browser::{BrowserLauncher, ChromiumBrowser, EngineHandle};
use crate::error::{Error, Result};
use crate::transport::Connection;

use super::options::LaunchOptions;
use super::process::ProcessGuard;
use super::selection::{BrowserChannel, BrowserSelection, EngineKind};

// ============================================================================
// Constants
// ============================================================================

/// Environment variable naming an explicit browser executable.
pub const BROWSER_ENV_VAR: &str = "MERMAID_HEADLESS_BROWSER";

/// Prefix of the stderr line announcing the DevTools endpoint.
const DEVTOOLS_LINE_PREFIX: &str = "DevTools listening on ";

// ============================================================================
// ChromiumLauncher
// ============================================================================

/// Launches headless Chromium-family browsers.
#[derive(Debug, Clone, Default)]
pub struct ChromiumLauncher {
    /// Process options.
    options: LaunchOptions,
}

impl ChromiumLauncher {
    /// Creates a launcher with the given options.
    #[inline]
    #[must_use]
    pub fn new(options: LaunchOptions) -> Self {
        Self { options }
    }

    /// Creates a launcher honouring [`BROWSER_ENV_VAR`].
    #[must_use]
    pub fn from_env() -> Self {
        let mut options = LaunchOptions::new();
        if let Some(path) = env::var_os(BROWSER_ENV_VAR).filter(|v| !v.is_empty()) {
            debug!(path = ?path, "Using browser from environment");
            options = options.with_executable(PathBuf::from(path));
        }
        Self::new(options)
    }

    /// Returns the launch options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &LaunchOptions {
        &self.options
    }

    /// Finds the executable for a selection.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedBrowser`] for non-Chromium engines
    /// - [`Error::BrowserNotFound`] if no candidate exists
    pub fn resolve_executable(&self, selection: &BrowserSelection) -> Result<PathBuf> {
        let channel = match selection.engine {
            EngineKind::Chromium => selection
                .effective_channel()
                .unwrap_or(BrowserChannel::Chromium),
            EngineKind::Firefox | EngineKind::Webkit => {
                return Err(Error::unsupported_browser(
                    selection.engine.as_str(),
                    "only Chromium-family browsers speak the DevTools protocol",
                ));
            }
        };

        if let Some(path) = &self.options.executable {
            if path.is_file() {
                return Ok(path.clone());
            }
            return Err(Error::BrowserNotFound {
                channel: channel.to_string(),
                searched: path.display().to_string(),
            });
        }

        for name in channel.executable_names() {
            if let Ok(path) = which::which(name) {
                return Ok(path);
            }
        }

        for candidate in channel.well_known_paths() {
            let path = Path::new(candidate);
            if path.is_file() {
                return Ok(path.to_path_buf());
            }
        }

        let searched = channel
            .executable_names()
            .iter()
            .chain(channel.well_known_paths())
            .copied()
            .collect::<Vec<_>>()
            .join(", ");

        Err(Error::BrowserNotFound {
            channel: channel.to_string(),
            searched,
        })
    }
}

// ============================================================================
// ChromiumLauncher - BrowserLauncher
// ============================================================================

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self, selection: &BrowserSelection) -> Result<Box<dyn EngineHandle>> {
        self.options.validate()?;
        let executable = self.resolve_executable(selection)?;

        let user_data_dir = tempfile::Builder::new()
            .prefix("mermaid-headless-")
            .tempdir()
            .map_err(|e| Error::launch_failed(format!("Failed to create profile dir: {e}")))?;

        let mut cmd = Command::new(&executable);
        cmd.args(self.options.to_args())
            .arg(format!("--user-data-dir={}", user_data_dir.path().display()))
            .arg("about:blank")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(Error::process_launch_failed)?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::launch_failed("Browser stderr was not captured"))?;
        let process = ProcessGuard::new(child);
        info!(
            pid = process.pid(),
            selection = %selection,
            path = %executable.display(),
            "Browser process spawned"
        );

        let limit = self.options.launch_timeout;
        let mut lines = BufReader::new(stderr).lines();
        let ws_url = timeout(limit, read_devtools_url(&mut lines))
            .await
            .map_err(|_| {
                Error::launch_failed(format!(
                    "DevTools endpoint not announced within {}ms",
                    limit.as_millis()
                ))
            })??;
        debug!(url = %ws_url, "DevTools endpoint announced");

        // Keep draining stderr so the browser never blocks on a full pipe.
        tokio::spawn(async move {
            while let Ok(Some(line)) = lines.next_line().await {
                trace!(target: "mermaid_headless::browser_stderr", "{line}");
            }
        });

        let connection = Connection::connect(&ws_url)
            .await
            .map_err(|e| Error::launch_failed(format!("Failed to connect to {ws_url}: {e}")))?;

        Ok(Box::new(ChromiumBrowser::new(connection, process, user_data_dir)))
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Reads stderr lines until the DevTools endpoint is announced.
async fn read_devtools_url<R>(lines: &mut tokio::io::Lines<BufReader<R>>) -> Result<String>
where
    R: AsyncRead + Unpin,
{
    while let Some(line) = lines.next_line().await? {
        trace!("{line}");
        if let Some(url) = parse_devtools_line(&line) {
            return Ok(url);
        }
    }
    Err(Error::launch_failed(
        "Browser exited before announcing its DevTools endpoint",
    ))
}

/// Extracts the WebSocket URL from a `DevTools listening on` line.
fn parse_devtools_line(line: &str) -> Option<String> {
    line.trim()
        .strip_prefix(DEVTOOLS_LINE_PREFIX)
        .map(str::trim)
        .filter(|url| url.starts_with("ws://") || url.starts_with("wss://"))
        .map(str::to_string)
}

// ============================================================================
// Tests
// ============================================================================
