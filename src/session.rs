//! Browser-mediated rendering session.
//!
//! A [`BrowserSession`] owns one browser engine and exactly one page. It
//! installs the request router before the first navigation, drives the page
//! through the bootstrap sequence and releases the engine exactly once.
//!
//! # Lifecycle
//!
//! ```text
//! Created ──► Bootstrapping ──► Ready ──► Disposed
//!                   │                        ▲
//!                   └────── failure ─────────┘
//! ```
//!
//! # Bootstrap sequence
//!
//! 1. Launch the engine and open the page
//! 2. Install the route table
//! 3. Navigate to the bootstrap URL, waiting for network idle
//! 4. Require a successful document response
//! 5. Wait for `DOMContentLoaded`, then network idle again
//! 6. Poll the readiness expression within its bound
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mermaid_headless::{BrowserSession, ChromiumLauncher, HttpRelayFactory};
//!
//! # async fn example() -> mermaid_headless::Result<()> {
//! let relay = HttpRelayFactory::new("http://mermaid.localhost", "http://127.0.0.1:8080")?;
//! let session = BrowserSession::builder()
//!     .launcher(Arc::new(ChromiumLauncher::from_env()))
//!     .relay_factory(Arc::new(relay))
//!     .selection("chromium".parse()?)
//!     .build()
//!     .await?;
//!
//! // ... render ...
//!
//! session.dispose().await;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use tracing::{debug, info, warn};

use crate::browser::{BrowserLauncher, EngineHandle, LoadState, PageHandle};
use crate::config::SessionConfig;
use crate::driver::BrowserSelection;
use crate::error::{Error, ErrorKind, Result};
use crate::identifiers::SessionId;
use crate::relay::RelayClientFactory;
use crate::routing::{RequestRouter, RouteTable, RouterStats};
use crate::wait::poll_until;

// ============================================================================
// SessionState
// ============================================================================

/// Lifecycle state of a [`BrowserSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Engine and page acquired, nothing loaded yet.
    Created,
    /// Bootstrap navigation and readiness wait in progress.
    Bootstrapping,
    /// Renderer is usable.
    Ready,
    /// Engine released. Terminal.
    Disposed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Bootstrapping => "bootstrapping",
            Self::Ready => "ready",
            Self::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

// ============================================================================
// BrowserSession
// ============================================================================

/// One headless browser page with its routes installed.
///
/// Render calls on the same session are serialised. Use several sessions for
/// concurrent rendering; they share nothing.
pub struct BrowserSession {
    /// Log identifier.
    id: SessionId,
    /// Current lifecycle state.
    state: Mutex<SessionState>,
    /// Engine handle, taken exactly once on dispose.
    engine: Mutex<Option<Box<dyn EngineHandle>>>,
    /// The session's only page.
    page: Arc<dyn PageHandle>,
    /// Router installed on the page.
    router: RequestRouter,
    /// Serialises page operations of render calls.
    render_lock: AsyncMutex<()>,
    /// Browser the session runs.
    selection: BrowserSelection,
    /// Bootstrap configuration.
    config: SessionConfig,
}

// ============================================================================
// BrowserSession - Display
// ============================================================================

impl fmt::Debug for BrowserSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowserSession")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("selection", &self.selection)
            .field("bootstrap_url", &self.config.bootstrap_url)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// BrowserSession - Creation
// ============================================================================

impl BrowserSession {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Launches a browser, bootstraps its page and returns a `Ready` session.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::InvalidArgument`] for an invalid configuration
    /// - [`ErrorKind::LaunchFailure`] if the engine or page cannot be started
    /// - [`ErrorKind::NavigationFailure`] for a missing or unsuccessful
    ///   bootstrap response
    /// - [`Error::ReadinessTimeout`] if the page never becomes ready
    ///
    /// The engine is released before any error is returned.
    pub async fn create(
        launcher: &dyn BrowserLauncher,
        relay_factory: Arc<dyn RelayClientFactory>,
        selection: BrowserSelection,
        config: SessionConfig,
    ) -> Result<Self> {
        config.validate()?;
        let bootstrap_url = config.bootstrap()?;
        let table = RouteTable::for_bootstrap(&bootstrap_url)?;

        let id = SessionId::generate();
        info!(session_id = %id, selection = %selection, url = %bootstrap_url, "Creating session");

        let engine = launcher.launch(&selection).await.map_err(as_launch_failure)?;

        let page = match engine.new_page().await {
            Ok(page) => page,
            Err(e) => {
                if let Err(close_err) = engine.close().await {
                    warn!(session_id = %id, error = %close_err, "Failed to close engine");
                }
                return Err(as_launch_failure(e));
            }
        };

        let session = Self {
            id,
            state: Mutex::new(SessionState::Created),
            engine: Mutex::new(Some(engine)),
            page,
            router: RequestRouter::new(table, relay_factory),
            render_lock: AsyncMutex::new(()),
            selection,
            config,
        };

        match session.bootstrap().await {
            Ok(()) => {
                session.set_state(SessionState::Ready);
                info!(session_id = %session.id, "Session ready");
                Ok(session)
            }
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "Bootstrap failed");
                session.dispose().await;
                Err(e)
            }
        }
    }

    /// Runs the bootstrap sequence.
    async fn bootstrap(&self) -> Result<()> {
        self.set_state(SessionState::Bootstrapping);
        let url = self.config.bootstrap_url.as_str();

        // Routes go in before the first request can leave the page.
        self.page
            .install_interceptor(Arc::new(self.router.clone()))
            .await
            .map_err(as_launch_failure)?;

        let response = self
            .page
            .goto(url, LoadState::NetworkIdle, self.config.navigation_timeout)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NavigationFailure => e,
                _ => Error::navigation_failed(url, e.to_string()),
            })?
            .ok_or_else(|| Error::no_navigation_response(url))?;

        if !response.is_success() {
            return Err(Error::navigation_status(url, response.status));
        }
        debug!(session_id = %self.id, status = response.status, "Bootstrap document loaded");

        self.page
            .wait_for_load_state(LoadState::DomContentLoaded, self.config.load_state_timeout)
            .await?;
        self.page
            .wait_for_load_state(LoadState::NetworkIdle, self.config.load_state_timeout)
            .await?;

        let expression = self.config.readiness_expression.as_str();
        let page = &self.page;
        let ready = poll_until(
            self.config.readiness_timeout,
            self.config.poll_interval,
            || async move { page.evaluate(expression).await.map(|v| is_truthy(&v)) },
        )
        .await?;

        if !ready {
            return Err(Error::readiness_timeout(
                expression,
                self.config.readiness_timeout.as_millis() as u64,
            ));
        }

        Ok(())
    }
}

// ============================================================================
// BrowserSession - Accessors
// ============================================================================

impl BrowserSession {
    /// Returns the session id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Returns `true` while renders are allowed.
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state() == SessionState::Ready
    }

    /// Returns the browser selection.
    #[inline]
    #[must_use]
    pub fn selection(&self) -> &BrowserSelection {
        &self.selection
    }

    /// Returns the bootstrap configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the router counters.
    #[inline]
    #[must_use]
    pub fn router_stats(&self) -> Arc<RouterStats> {
        self.router.stats()
    }
}

// ============================================================================
// BrowserSession - Rendering Access
// ============================================================================

impl BrowserSession {
    /// Waits for exclusive use of the page.
    pub(crate) async fn lock_page(&self) -> AsyncMutexGuard<'_, ()> {
        self.render_lock.lock().await
    }

    /// Returns the page if the session is `Ready`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotReady`] in any other state.
    pub(crate) fn ready_page(&self) -> Result<Arc<dyn PageHandle>> {
        match self.state() {
            SessionState::Ready => Ok(Arc::clone(&self.page)),
            state => Err(Error::not_ready(state)),
        }
    }
}

// ============================================================================
// BrowserSession - Lifecycle
// ============================================================================

impl BrowserSession {
    /// Releases the browser engine.
    ///
    /// Safe to call repeatedly; only the first call closes the engine. Close
    /// failures are logged, never returned.
    pub async fn dispose(&self) {
        let engine = {
            let mut state = self.state.lock();
            *state = SessionState::Disposed;
            self.engine.lock().take()
        };

        let Some(engine) = engine else {
            return;
        };

        debug!(session_id = %self.id, "Disposing session");
        if let Err(e) = engine.close().await {
            warn!(session_id = %self.id, error = %e, "Engine close failed");
        }
        info!(session_id = %self.id, "Session disposed");
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock() = state;
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Some(engine) = self.engine.get_mut().take() {
            warn!(session_id = %self.id, "Session dropped without dispose");
            engine.close_on_drop();
        }
    }
}

// ============================================================================
// SessionBuilder
// ============================================================================

/// Fluent builder for [`BrowserSession`].
///
/// Launcher, relay factory and selection are required.
#[derive(Default)]
pub struct SessionBuilder {
    launcher: Option<Arc<dyn BrowserLauncher>>,
    relay_factory: Option<Arc<dyn RelayClientFactory>>,
    selection: Option<BrowserSelection>,
    config: SessionConfig,
}

impl SessionBuilder {
    /// Creates an empty builder.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the engine launcher.
    #[must_use]
    pub fn launcher(mut self, launcher: Arc<dyn BrowserLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Sets the relay client factory.
    #[must_use]
    pub fn relay_factory(mut self, factory: Arc<dyn RelayClientFactory>) -> Self {
        self.relay_factory = Some(factory);
        self
    }

    /// Sets the browser selection.
    #[must_use]
    pub fn selection(mut self, selection: BrowserSelection) -> Self {
        self.selection = Some(selection);
        self
    }

    /// Replaces the session configuration.
    #[must_use]
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Creates the session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if a required part is missing, or
    /// any error of [`BrowserSession::create`].
    pub async fn build(self) -> Result<BrowserSession> {
        let launcher = self
            .launcher
            .ok_or_else(|| Error::invalid_argument("A browser launcher is required"))?;
        let relay_factory = self
            .relay_factory
            .ok_or_else(|| Error::invalid_argument("A relay client factory is required"))?;
        let selection = self
            .selection
            .ok_or_else(|| Error::invalid_argument("A browser selection is required"))?;

        BrowserSession::create(launcher.as_ref(), relay_factory, selection, self.config).await
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Keeps launch-class errors, wraps everything else as a launch failure.
fn as_launch_failure(e: Error) -> Error {
    if e.is_launch_failure() {
        e
    } else {
        Error::launch_failed(e.to_string())
    }
}

/// JavaScript truthiness of a JSON value.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// ============================================================================
// Tests
// ============================================================================
