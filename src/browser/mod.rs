//! Browser engine seam.
//!
//! The session and renderer drive a browser only through the traits in this
//! module, so the real Chromium backend and test doubles are interchangeable:
//!
//! | Trait | Description |
//! |-------|-------------|
//! | [`BrowserLauncher`] | Starts an engine for a [`BrowserSelection`] |
//! | [`EngineHandle`] | A running engine process; opens pages, closes once |
//! | [`PageHandle`] | One page: interception, navigation, script, screenshots |
//! | [`RequestInterceptor`] | Answers every request a page issues |
//!
//! # Example
//!
//! ```no_run
//! use mermaid_headless::browser::{BrowserLauncher, LoadState};
//! use mermaid_headless::driver::{BrowserSelection, ChromiumLauncher};
//!
//! # async fn example() -> mermaid_headless::Result<()> {
//! let launcher = ChromiumLauncher::from_env();
//! let engine = launcher.launch(&BrowserSelection::chromium()).await?;
//! let page = engine.new_page().await?;
//!
//! page.wait_for_load_state(LoadState::DomContentLoaded, std::time::Duration::from_secs(5))
//!     .await?;
//! engine.close().await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Chromium implementation over the DevTools protocol.
pub mod chromium;

/// Network interception types.
pub mod network;

/// Screenshot cropping.
pub mod screenshot;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::driver::BrowserSelection;
use crate::error::Result;

// ============================================================================
// Re-exports
// ============================================================================

pub use chromium::{ChromiumBrowser, ChromiumPage};
pub use network::{Fulfillment, InterceptedRequest, RequestInterceptor};

// ============================================================================
// LoadState
// ============================================================================

/// Page load milestones that can be awaited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadState {
    /// The DOM has been parsed.
    DomContentLoaded,
    /// No network activity for a short quiet period.
    NetworkIdle,
}

impl LoadState {
    /// Lifecycle event name reported by the engine.
    #[inline]
    #[must_use]
    pub const fn event_name(self) -> &'static str {
        match self {
            Self::DomContentLoaded => "DOMContentLoaded",
            Self::NetworkIdle => "networkIdle",
        }
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_name())
    }
}

// ============================================================================
// NavigationResponse
// ============================================================================

/// Main-document response of a navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationResponse {
    /// Final document URL.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
}

impl NavigationResponse {
    /// Returns `true` for 2xx status codes.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// ============================================================================
// ElementBox
// ============================================================================

/// Document-relative bounding box of an element, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementBox {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
    /// Device pixels per CSS pixel.
    pub scale: f64,
}

impl ElementBox {
    /// Returns `true` if the box has no visible area.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Starts browser engines.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Launches a headless engine for the given selection.
    ///
    /// # Errors
    ///
    /// Launch failures and unsupported selections.
    async fn launch(&self, selection: &BrowserSelection) -> Result<Box<dyn EngineHandle>>;
}

/// A running browser engine.
#[async_trait]
pub trait EngineHandle: Send + Sync {
    /// Opens a new blank page.
    async fn new_page(&self) -> Result<Arc<dyn PageHandle>>;

    /// Shuts the engine down. Further calls are no-ops.
    async fn close(&self) -> Result<()>;

    /// Best-effort synchronous shutdown, used when a handle is dropped
    /// without [`close`](Self::close) having been awaited.
    fn close_on_drop(&self) {}
}

/// A single browser page.
#[async_trait]
pub trait PageHandle: Send + Sync {
    /// Routes every request the page issues through `interceptor`.
    ///
    /// Must be called before the first navigation.
    async fn install_interceptor(&self, interceptor: Arc<dyn RequestInterceptor>) -> Result<()>;

    /// Navigates and waits for `wait_until`.
    ///
    /// Returns `None` when the navigation produced no document response.
    async fn goto(
        &self,
        url: &str,
        wait_until: LoadState,
        timeout: Duration,
    ) -> Result<Option<NavigationResponse>>;

    /// Waits until the current document reached `state`.
    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> Result<()>;

    /// Evaluates an expression, awaiting promises, and returns its JSON value.
    async fn evaluate(&self, expression: &str) -> Result<Value>;

    /// Calls a page function with one JSON argument and returns its JSON value.
    async fn call_function(&self, function: &str, arg: &Value) -> Result<Value>;

    /// Returns the bounding box of the first element matching `selector`.
    async fn element_box(&self, selector: &str) -> Result<Option<ElementBox>>;

    /// Captures a PNG of the given region.
    async fn screenshot_clip(&self, clip: &ElementBox) -> Result<Vec<u8>>;
}

// ============================================================================
// Helpers
// ============================================================================

/// Builds `(function)(arg)` with the argument JSON-encoded.
///
/// # Errors
///
/// Returns [`crate::Error::Json`] if the argument cannot be encoded.
pub(crate) fn call_expression(function: &str, arg: &Value) -> Result<String> {
    Ok(format!("({function})({})", serde_json::to_string(arg)?))
}

// ============================================================================
// Tests
// ============================================================================
