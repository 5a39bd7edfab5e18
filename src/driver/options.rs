//! Chromium command-line options.
//!
//! Provides a type-safe interface for configuring how the browser process is
//! started.
//!
//! # Example
//!
//! ```ignore
//! use mermaid_headless::driver::LaunchOptions;
//!
//! let options = LaunchOptions::new()
//!     .with_window_size(1280, 1024)
//!     .with_arg("--disable-gpu");
//!
//! let args = options.to_args();
//! // ["--headless=new", "--window-size=1280,1024", ..., "--disable-gpu"]
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default time allowed for the DevTools endpoint to come up.
const DEFAULT_LAUNCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Flags that keep a headless instance quiet and self-contained.
const BASE_ARGS: &[&str] = &[
    "--remote-debugging-port=0",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-background-networking",
    "--disable-component-update",
    "--disable-default-apps",
    "--disable-extensions",
    "--disable-sync",
    "--metrics-recording-only",
    "--mute-audio",
    "--hide-scrollbars",
];

// ============================================================================
// LaunchOptions
// ============================================================================

/// Browser process configuration options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Run without a GUI.
    pub headless: bool,

    /// Window dimensions in pixels (width, height).
    pub window_size: Option<(u32, u32)>,

    /// Disable the Chromium sandbox (needed in some containers).
    pub no_sandbox: bool,

    /// Explicit executable, bypassing channel lookup.
    pub executable: Option<PathBuf>,

    /// Additional custom command-line arguments.
    pub extra_args: Vec<String>,

    /// Time allowed for the DevTools endpoint to come up.
    pub launch_timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl LaunchOptions {
    /// Creates headless options with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            headless: true,
            window_size: None,
            no_sandbox: false,
            executable: None,
            extra_args: Vec::new(),
            launch_timeout: DEFAULT_LAUNCH_TIMEOUT,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl LaunchOptions {
    /// Shows the browser window. Intended for debugging only.
    #[inline]
    #[must_use]
    pub fn with_headed(mut self) -> Self {
        self.headless = false;
        self
    }

    /// Sets window size in pixels.
    #[inline]
    #[must_use]
    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window_size = Some((width, height));
        self
    }

    /// Disables the sandbox.
    #[inline]
    #[must_use]
    pub fn with_no_sandbox(mut self) -> Self {
        self.no_sandbox = true;
        self
    }

    /// Uses an explicit executable.
    #[inline]
    #[must_use]
    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    /// Adds a custom command-line argument.
    #[inline]
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    /// Adds multiple custom command-line arguments.
    #[inline]
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the launch timeout.
    #[inline]
    #[must_use]
    pub fn with_launch_timeout(mut self, timeout: Duration) -> Self {
        self.launch_timeout = timeout;
        self
    }
}

// ============================================================================
// Conversion Methods
// ============================================================================

impl LaunchOptions {
    /// Converts options to command-line arguments.
    ///
    /// The user-data directory and the initial URL are appended by the
    /// launcher.
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(BASE_ARGS.len() + 4 + self.extra_args.len());

        if self.headless {
            args.push("--headless=new".to_string());
        }

        args.extend(BASE_ARGS.iter().map(|s| (*s).to_string()));

        if let Some((width, height)) = self.window_size {
            args.push(format!("--window-size={width},{height}"));
        }

        if self.no_sandbox {
            args.push("--no-sandbox".to_string());
        }

        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// Validates the options configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if validation fails.
    pub fn validate(&self) -> Result<()> {
        if let Some((width, height)) = self.window_size
            && (width == 0 || height == 0)
        {
            return Err(Error::config("Window dimensions must be greater than zero"));
        }
        if self.launch_timeout.is_zero() {
            return Err(Error::config("Launch timeout must be greater than zero"));
        }
        if self.extra_args.iter().any(|a| a.starts_with("--remote-debugging-")) {
            return Err(Error::config("Remote debugging flags are managed by the launcher"));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
