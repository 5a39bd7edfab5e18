//! Browser process management.
//!
//! This module finds, configures and starts the browser the sessions drive.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ChromiumLauncher`] | [`BrowserLauncher`](crate::browser::BrowserLauncher) for Chromium-family browsers |
//! | [`LaunchOptions`] | Command-line options |
//! | [`BrowserSelection`] | Engine + channel pair |
//!
//! # Example
//!
//! ```no_run
//! use mermaid_headless::browser::BrowserLauncher;
//! use mermaid_headless::driver::{BrowserSelection, ChromiumLauncher};
//!
//! # async fn example() -> mermaid_headless::Result<()> {
//! let engine = ChromiumLauncher::from_env()
//!     .launch(&BrowserSelection::chromium())
//!     .await?;
//! let page = engine.new_page().await?;
//! # let _ = page;
//! engine.close().await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Chromium launcher.
pub mod core;

/// Browser command-line options.
pub mod options;

/// Child process guard.
pub(crate) mod process;

/// Engine and channel selection.
pub mod selection;

// ============================================================================
// Re-exports
// ============================================================================

pub use core::{BROWSER_ENV_VAR, ChromiumLauncher};
pub use options::LaunchOptions;
pub use selection::{BrowserChannel, BrowserSelection, EngineKind};
