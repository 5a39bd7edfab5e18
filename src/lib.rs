//! Mermaid Headless - render Mermaid diagrams to SVG and PNG.
//!
//! Diagrams are rendered by the real Mermaid JavaScript library inside a
//! headless Chromium page. The page never touches the network: every request
//! it makes is intercepted and either relayed to an in-process HTTP server or
//! rejected.
//!
//! # Architecture
//!
//! - **Session**: one browser engine and one page, bootstrapped against a
//!   virtual origin (`http://mermaid.localhost`) and disposed exactly once
//! - **Router**: ordered route table deciding relay or reject per request
//! - **Renderer**: calls the page's render function and screenshots the result
//! - **Sink**: writes results to files that must not exist yet
//!
//! The browser is driven over the Chrome DevTools Protocol on a single
//! WebSocket per engine, with commands correlated to responses by id.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use mermaid_headless::{
//!     BrowserSession, ChromiumLauncher, DiagramRenderer, DiagramResultSink,
//!     HttpRelayFactory, LocalFile, Result,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Static files (index.html, mermaid.min.js) served on 127.0.0.1:8080
//!     let relay = HttpRelayFactory::new("http://mermaid.localhost", "http://127.0.0.1:8080")?;
//!
//!     let session = BrowserSession::builder()
//!         .launcher(Arc::new(ChromiumLauncher::from_env()))
//!         .relay_factory(Arc::new(relay))
//!         .selection("chromium".parse()?)
//!         .build()
//!         .await?;
//!
//!     let diagram = DiagramRenderer::new()
//!         .render_markup(&session, "graph TD; A-->B;")
//!         .await;
//!     session.dispose().await;
//!
//!     DiagramResultSink::new().write_to_file(&diagram?, &LocalFile::new("out.svg"))?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`session`] | [`BrowserSession`] lifecycle and bootstrap |
//! | [`routing`] | Route table and [`RequestRouter`] |
//! | [`relay`] | HTTP relay to the in-process server |
//! | [`renderer`] | [`DiagramRenderer`] and results |
//! | [`sink`] | File output |
//! | [`browser`] | Engine/page abstraction and the Chromium backend |
//! | [`driver`] | Browser selection and launching |
//! | [`config`] | Session and render configuration |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`protocol`] | DevTools message types (internal) |
//! | [`transport`] | DevTools WebSocket connection (internal) |

// ============================================================================
// Modules
// ============================================================================

/// Engine and page abstraction.
///
/// - [`EngineHandle`](browser::EngineHandle) - a running browser
/// - [`PageHandle`](browser::PageHandle) - its single page
/// - [`ChromiumBrowser`] / [`ChromiumPage`] - DevTools implementation
pub mod browser;

/// Session and render configuration.
pub mod config;

/// Browser selection and launching.
///
/// Use [`ChromiumLauncher`] to start a local Chromium-family browser.
pub mod driver;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// DevTools protocol message types.
///
/// Internal module defining command/response/event structures.
pub mod protocol;

/// HTTP relay to the in-process server.
pub mod relay;

/// Diagram rendering.
pub mod renderer;

/// Request routing.
pub mod routing;

/// Browser session lifecycle.
pub mod session;

/// File output.
pub mod sink;

/// DevTools WebSocket transport.
///
/// Internal module handling the connection and its event loop.
pub mod transport;

/// Bounded polling.
pub mod wait;

#[cfg(test)]
mod testing;

// ============================================================================
// Re-exports
// ============================================================================

// Browser types
pub use browser::{
    BrowserLauncher, ChromiumBrowser, ChromiumPage, ElementBox, EngineHandle, Fulfillment,
    InterceptedRequest, LoadState, NavigationResponse, PageHandle, RequestInterceptor,
};

// Configuration
pub use config::{RenderConfig, SessionConfig};

// Driver types
pub use driver::{BrowserChannel, BrowserSelection, ChromiumLauncher, EngineKind, LaunchOptions};

// Error types
pub use error::{Error, ErrorKind, Result};

// Identifier types
pub use identifiers::SessionId;

// Relay
pub use relay::{
    HttpRelay, HttpRelayClient, HttpRelayFactory, RelayClientFactory, RelayRequest, RelayResponse,
};

// Rendering
pub use renderer::{DiagramRenderer, DiagramRequest, RenderedDiagram, render_once};

// Routing
pub use routing::{RequestRouter, RouteKind, RouteRule, RouteTable, RouterStats};

// Session
pub use session::{BrowserSession, SessionBuilder, SessionState};

// Output
pub use sink::{DiagramResultSink, FileTarget, LocalFile, derive_target};
