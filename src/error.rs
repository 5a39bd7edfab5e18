//! Error types for mermaid-headless.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use mermaid_headless::{Error, Result};
//!
//! async fn example(session: &BrowserSession, renderer: &DiagramRenderer) -> Result<()> {
//!     match renderer.render_markup(session, "graph TD; A-->B;").await {
//!         Ok(diagram) => println!("{} bytes of svg", diagram.svg().len()),
//!         Err(e) if e.is_render_failure() => eprintln!("diagram did not render: {e}"),
//!         Err(e) => return Err(e),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Argument | [`Error::InvalidArgument`], [`Error::Config`] |
//! | Launch | [`Error::LaunchFailed`], [`Error::BrowserNotFound`], [`Error::UnsupportedBrowser`] |
//! | Navigation | [`Error::NoNavigationResponse`], [`Error::NavigationStatus`], [`Error::NavigationFailed`] |
//! | Readiness | [`Error::ReadinessTimeout`] |
//! | Render | [`Error::ElementNotFound`], [`Error::RenderFailed`], [`Error::ScriptError`] |
//! | Lifecycle | [`Error::NotReady`] |
//! | Relay | [`Error::Relay`] |
//! | File | [`Error::FileConflict`] |
//! | Transport | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::RequestTimeout`], [`Error::Protocol`], [`Error::Timeout`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::ChannelClosed`] |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::io::Error as IoError;
use std::path::PathBuf;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::CommandId;
use crate::session::SessionState;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// ErrorKind
// ============================================================================

/// Coarse failure category, for callers that branch on cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Empty markup, missing collaborator, invalid configuration.
    InvalidArgument,
    /// Browser engine failed to start or page failed to open.
    LaunchFailure,
    /// No page response or non-success status during bootstrap.
    NavigationFailure,
    /// The page never signalled renderer readiness.
    ReadinessTimeout,
    /// The rendered element or SVG was not produced.
    RenderFailure,
    /// Operation attempted on a session that is not `Ready`.
    NotReady,
    /// The in-process HTTP relay call failed.
    RelayFailure,
    /// Target exists, source missing, or source equals target.
    FileConflict,
    /// DevTools transport or protocol failure.
    Transport,
    /// Underlying I/O or serialization failure.
    External,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidArgument => "invalid argument",
            Self::LaunchFailure => "launch failure",
            Self::NavigationFailure => "navigation failure",
            Self::ReadinessTimeout => "readiness timeout",
            Self::RenderFailure => "render failure",
            Self::NotReady => "not ready",
            Self::RelayFailure => "relay failure",
            Self::FileConflict => "file conflict",
            Self::Transport => "transport",
            Self::External => "external",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Argument Errors
    // ========================================================================
    /// Invalid argument supplied by the caller.
    ///
    /// Returned for empty markup or a missing required collaborator.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    /// Configuration error.
    ///
    /// Returned when session, render or launch configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Launch Errors
    // ========================================================================
    /// Failed to launch the browser or open its page.
    #[error("Failed to launch browser: {message}")]
    LaunchFailed {
        /// Description of the launch failure.
        message: String,
    },

    /// No browser executable found for the requested channel.
    #[error("Browser not found for channel '{channel}' (searched: {searched})")]
    BrowserNotFound {
        /// Channel that was requested.
        channel: String,
        /// Candidates that were tried.
        searched: String,
    },

    /// Engine/channel combination this crate cannot drive.
    #[error("Unsupported browser: {engine} ({reason})")]
    UnsupportedBrowser {
        /// Engine name.
        engine: String,
        /// Why the engine cannot be launched.
        reason: String,
    },

    // ========================================================================
    // Navigation Errors
    // ========================================================================
    /// Bootstrap navigation produced no response.
    #[error("No response for navigation to {url}")]
    NoNavigationResponse {
        /// Navigation target.
        url: String,
    },

    /// Bootstrap navigation returned a non-success status.
    #[error("Navigation to {url} returned status {status}")]
    NavigationStatus {
        /// Navigation target.
        url: String,
        /// HTTP status code received.
        status: u16,
    },

    /// Navigation was aborted by the engine.
    #[error("Navigation to {url} failed: {message}")]
    NavigationFailed {
        /// Navigation target.
        url: String,
        /// Engine-supplied reason.
        message: String,
    },

    // ========================================================================
    // Readiness Errors
    // ========================================================================
    /// The readiness condition never became true.
    #[error("Renderer not ready after {timeout_ms}ms: {condition}")]
    ReadinessTimeout {
        /// Expression that was polled.
        condition: String,
        /// Milliseconds waited before giving up.
        timeout_ms: u64,
    },

    // ========================================================================
    // Render Errors
    // ========================================================================
    /// Rendered element not found in the DOM.
    #[error("Element not found: selector={selector}")]
    ElementNotFound {
        /// CSS selector that matched nothing.
        selector: String,
    },

    /// The render function returned something other than SVG markup.
    #[error("Render failed: {message}")]
    RenderFailed {
        /// Description of the failure.
        message: String,
    },

    /// JavaScript evaluation threw inside the page.
    #[error("Script error: {message}")]
    ScriptError {
        /// Exception text reported by the engine.
        message: String,
    },

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// Operation requires a `Ready` session.
    #[error("Session not ready (state: {state})")]
    NotReady {
        /// State the session was in.
        state: SessionState,
    },

    // ========================================================================
    // Relay Errors
    // ========================================================================
    /// The in-process HTTP relay call failed.
    #[error("Relay failed for {url}: {message}")]
    Relay {
        /// URL being relayed.
        url: String,
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // File Errors
    // ========================================================================
    /// File precondition violated before writing.
    #[error("File conflict at {path}: {reason}")]
    FileConflict {
        /// Offending path.
        path: PathBuf,
        /// Which precondition failed.
        reason: String,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// WebSocket connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// WebSocket connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    /// DevTools command timed out.
    #[error("Command {command_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The command that timed out.
        command_id: CommandId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Protocol violation or error response.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// Operation timeout.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a launch failure.
    #[inline]
    pub fn launch_failed(message: impl Into<String>) -> Self {
        Self::LaunchFailed {
            message: message.into(),
        }
    }

    /// Creates a launch failure from a process spawn error.
    #[inline]
    pub fn process_launch_failed(err: IoError) -> Self {
        Self::LaunchFailed {
            message: err.to_string(),
        }
    }

    /// Creates an unsupported browser error.
    #[inline]
    pub fn unsupported_browser(engine: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedBrowser {
            engine: engine.into(),
            reason: reason.into(),
        }
    }

    /// Creates a missing navigation response error.
    #[inline]
    pub fn no_navigation_response(url: impl Into<String>) -> Self {
        Self::NoNavigationResponse { url: url.into() }
    }

    /// Creates a navigation status error.
    #[inline]
    pub fn navigation_status(url: impl Into<String>, status: u16) -> Self {
        Self::NavigationStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a navigation failed error.
    #[inline]
    pub fn navigation_failed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NavigationFailed {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a readiness timeout error.
    #[inline]
    pub fn readiness_timeout(condition: impl Into<String>, timeout_ms: u64) -> Self {
        Self::ReadinessTimeout {
            condition: condition.into(),
            timeout_ms,
        }
    }

    /// Creates an element not found error.
    #[inline]
    pub fn element_not_found(selector: impl Into<String>) -> Self {
        Self::ElementNotFound {
            selector: selector.into(),
        }
    }

    /// Creates a render failed error.
    #[inline]
    pub fn render_failed(message: impl Into<String>) -> Self {
        Self::RenderFailed {
            message: message.into(),
        }
    }

    /// Creates a script error.
    #[inline]
    pub fn script_error(message: impl Into<String>) -> Self {
        Self::ScriptError {
            message: message.into(),
        }
    }

    /// Creates a not ready error.
    #[inline]
    pub fn not_ready(state: SessionState) -> Self {
        Self::NotReady { state }
    }

    /// Creates a relay error.
    #[inline]
    pub fn relay(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Relay {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a file conflict error.
    #[inline]
    pub fn file_conflict(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::FileConflict {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(command_id: CommandId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            command_id,
            timeout_ms,
        }
    }
}

// ============================================================================
// Error Classification
// ============================================================================

impl Error {
    /// Returns the failure category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } | Self::Config { .. } => ErrorKind::InvalidArgument,
            Self::LaunchFailed { .. }
            | Self::BrowserNotFound { .. }
            | Self::UnsupportedBrowser { .. } => ErrorKind::LaunchFailure,
            Self::NoNavigationResponse { .. }
            | Self::NavigationStatus { .. }
            | Self::NavigationFailed { .. } => ErrorKind::NavigationFailure,
            Self::ReadinessTimeout { .. } => ErrorKind::ReadinessTimeout,
            Self::ElementNotFound { .. } | Self::RenderFailed { .. } | Self::ScriptError { .. } => {
                ErrorKind::RenderFailure
            }
            Self::NotReady { .. } => ErrorKind::NotReady,
            Self::Relay { .. } => ErrorKind::RelayFailure,
            Self::FileConflict { .. } => ErrorKind::FileConflict,
            Self::Connection { .. }
            | Self::ConnectionClosed
            | Self::RequestTimeout { .. }
            | Self::Protocol { .. }
            | Self::Timeout { .. }
            | Self::WebSocket(_)
            | Self::ChannelClosed(_) => ErrorKind::Transport,
            Self::Io(_) | Self::Json(_) => ErrorKind::External,
        }
    }

    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ReadinessTimeout { .. } | Self::Timeout { .. } | Self::RequestTimeout { .. }
        )
    }

    /// Returns `true` if the browser failed to start.
    #[inline]
    #[must_use]
    pub fn is_launch_failure(&self) -> bool {
        self.kind() == ErrorKind::LaunchFailure
    }

    /// Returns `true` if bootstrap navigation failed.
    #[inline]
    #[must_use]
    pub fn is_navigation_failure(&self) -> bool {
        self.kind() == ErrorKind::NavigationFailure
    }

    /// Returns `true` if the diagram did not render.
    #[inline]
    #[must_use]
    pub fn is_render_failure(&self) -> bool {
        self.kind() == ErrorKind::RenderFailure
    }

    /// Returns `true` if a file precondition failed.
    #[inline]
    #[must_use]
    pub fn is_file_conflict(&self) -> bool {
        self.kind() == ErrorKind::FileConflict
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::ConnectionClosed | Self::WebSocket(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind as IoErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::navigation_status("http://mermaid.localhost/index.html", 500);
        assert_eq!(
            err.to_string(),
            "Navigation to http://mermaid.localhost/index.html returned status 500"
        );
    }

    #[test]
    fn test_not_ready_display_names_state() {
        let err = Error::not_ready(SessionState::Disposed);
        assert_eq!(err.to_string(), "Session not ready (state: disposed)");
        assert_eq!(err.kind(), ErrorKind::NotReady);
    }

    #[test]
    fn test_kinds_are_distinct_per_category() {
        assert_eq!(Error::invalid_argument("x").kind(), ErrorKind::InvalidArgument);
        assert_eq!(Error::launch_failed("x").kind(), ErrorKind::LaunchFailure);
        assert_eq!(
            Error::unsupported_browser("firefox", "no devtools").kind(),
            ErrorKind::LaunchFailure
        );
        assert_eq!(Error::no_navigation_response("u").kind(), ErrorKind::NavigationFailure);
        assert_eq!(Error::readiness_timeout("c", 10).kind(), ErrorKind::ReadinessTimeout);
        assert_eq!(Error::element_not_found("#x").kind(), ErrorKind::RenderFailure);
        assert_eq!(Error::relay("u", "down").kind(), ErrorKind::RelayFailure);
        assert_eq!(Error::file_conflict("/tmp/a", "exists").kind(), ErrorKind::FileConflict);
        assert_eq!(Error::ConnectionClosed.kind(), ErrorKind::Transport);
    }

    #[test]
    fn test_is_timeout() {
        assert!(Error::readiness_timeout("typeof mermaid", 100).is_timeout());
        assert!(Error::timeout("load", 100).is_timeout());
        assert!(!Error::connection("test").is_timeout());
    }

    #[test]
    fn test_predicates() {
        assert!(Error::element_not_found("#container").is_render_failure());
        assert!(Error::script_error("boom").is_render_failure());
        assert!(Error::navigation_failed("u", "net::ERR").is_navigation_failure());
        assert!(Error::file_conflict("out.svg", "exists").is_file_conflict());
        assert!(Error::launch_failed("spawn").is_launch_failure());
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(!Error::config("x").is_connection_error());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(IoErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.kind(), ErrorKind::External);
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
