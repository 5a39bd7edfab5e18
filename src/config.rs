//! Session and render configuration.
//!
//! | Type | Controls |
//! |------|----------|
//! | [`SessionConfig`] | Bootstrap URL, readiness check, timeouts |
//! | [`RenderConfig`] | Page render function, container selector, render timeout |
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use mermaid_headless::config::SessionConfig;
//!
//! let config = SessionConfig::new()
//!     .with_bootstrap_url("http://diagrams.localhost/index.html")
//!     .with_readiness_timeout(Duration::from_secs(10));
//! assert!(config.validate().is_ok());
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default bootstrap document on the virtual origin.
pub const DEFAULT_BOOTSTRAP_URL: &str = "http://mermaid.localhost/index.html";

/// Default readiness check.
pub const DEFAULT_READINESS_EXPRESSION: &str =
    "typeof window.mermaid !== 'undefined' && typeof window.renderDiagram === 'function'";

/// Default page render function.
pub const DEFAULT_RENDER_FUNCTION: &str = "window.renderDiagram";

/// Default selector of the element holding the rendered diagram.
pub const DEFAULT_CONTAINER_SELECTOR: &str = "#container";

const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_LOAD_STATE_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// SessionConfig
// ============================================================================

/// How a session bootstraps its page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Bootstrap document. Its origin is the virtual origin.
    pub bootstrap_url: String,

    /// Expression that is truthy once the page renderer is usable.
    pub readiness_expression: String,

    /// Bound on readiness polling.
    pub readiness_timeout: Duration,

    /// Delay between readiness checks.
    pub poll_interval: Duration,

    /// Bound on the bootstrap navigation.
    pub navigation_timeout: Duration,

    /// Bound on each load-state wait.
    pub load_state_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bootstrap_url: DEFAULT_BOOTSTRAP_URL.to_string(),
            readiness_expression: DEFAULT_READINESS_EXPRESSION.to_string(),
            readiness_timeout: DEFAULT_READINESS_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
            load_state_timeout: DEFAULT_LOAD_STATE_TIMEOUT,
        }
    }

    /// Sets the bootstrap URL.
    #[inline]
    #[must_use]
    pub fn with_bootstrap_url(mut self, url: impl Into<String>) -> Self {
        self.bootstrap_url = url.into();
        self
    }

    /// Sets the readiness expression.
    #[inline]
    #[must_use]
    pub fn with_readiness_expression(mut self, expression: impl Into<String>) -> Self {
        self.readiness_expression = expression.into();
        self
    }

    /// Sets the readiness timeout.
    #[inline]
    #[must_use]
    pub fn with_readiness_timeout(mut self, timeout: Duration) -> Self {
        self.readiness_timeout = timeout;
        self
    }

    /// Sets the readiness poll interval.
    #[inline]
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the navigation timeout.
    #[inline]
    #[must_use]
    pub fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    /// Sets the load-state timeout.
    #[inline]
    #[must_use]
    pub fn with_load_state_timeout(mut self, timeout: Duration) -> Self {
        self.load_state_timeout = timeout;
        self
    }

    /// Parses the bootstrap URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if it is not an absolute HTTP(S) URL.
    pub fn bootstrap(&self) -> Result<Url> {
        let url = Url::parse(&self.bootstrap_url).map_err(|e| {
            Error::config(format!("Invalid bootstrap URL '{}': {e}", self.bootstrap_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") || !url.has_host() {
            return Err(Error::config(format!(
                "Bootstrap URL '{}' must be an http(s) URL with a host",
                self.bootstrap_url
            )));
        }
        Ok(url)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if validation fails.
    pub fn validate(&self) -> Result<()> {
        self.bootstrap()?;

        if self.readiness_expression.trim().is_empty() {
            return Err(Error::config("Readiness expression must not be empty"));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::config("Poll interval must be greater than zero"));
        }
        for (name, value) in [
            ("Readiness timeout", self.readiness_timeout),
            ("Navigation timeout", self.navigation_timeout),
            ("Load-state timeout", self.load_state_timeout),
        ] {
            if value.is_zero() {
                return Err(Error::config(format!("{name} must be greater than zero")));
            }
        }
        Ok(())
    }
}

// ============================================================================
// RenderConfig
// ============================================================================

/// How a diagram is rendered inside a ready page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    /// Page function taking the markup and resolving to SVG text.
    pub render_function: String,

    /// Selector of the element the function renders into.
    pub container_selector: String,

    /// Bound on one render call, screenshot included.
    pub render_timeout: Duration,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            render_function: DEFAULT_RENDER_FUNCTION.to_string(),
            container_selector: DEFAULT_CONTAINER_SELECTOR.to_string(),
            render_timeout: DEFAULT_RENDER_TIMEOUT,
        }
    }

    /// Sets the render function.
    #[inline]
    #[must_use]
    pub fn with_render_function(mut self, function: impl Into<String>) -> Self {
        self.render_function = function.into();
        self
    }

    /// Sets the container selector.
    #[inline]
    #[must_use]
    pub fn with_container_selector(mut self, selector: impl Into<String>) -> Self {
        self.container_selector = selector.into();
        self
    }

    /// Sets the render timeout.
    #[inline]
    #[must_use]
    pub fn with_render_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout = timeout;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if validation fails.
    pub fn validate(&self) -> Result<()> {
        if self.render_function.trim().is_empty() {
            return Err(Error::config("Render function must not be empty"));
        }
        if self.container_selector.trim().is_empty() {
            return Err(Error::config("Container selector must not be empty"));
        }
        if self.render_timeout.is_zero() {
            return Err(Error::config("Render timeout must be greater than zero"));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_defaults_are_valid() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.bootstrap().expect("url").host_str(),
            Some("mermaid.localhost")
        );
    }

    #[test]
    fn test_session_builder_chain() {
        let config = SessionConfig::new()
            .with_bootstrap_url("http://v.localhost/boot.html")
            .with_readiness_expression("window.ready === true")
            .with_readiness_timeout(Duration::from_secs(5))
            .with_poll_interval(Duration::from_millis(20));

        assert_eq!(config.bootstrap_url, "http://v.localhost/boot.html");
        assert_eq!(config.readiness_expression, "window.ready === true");
        assert_eq!(config.readiness_timeout, Duration::from_secs(5));
        assert_eq!(config.poll_interval, Duration::from_millis(20));
    }

    #[test]
    fn test_session_rejects_bad_bootstrap() {
        for url in ["not a url", "file:///tmp/index.html", "data:text/html,hi"] {
            let err = SessionConfig::new().with_bootstrap_url(url).validate().unwrap_err();
            assert!(matches!(err, Error::Config { .. }), "{url}");
        }
    }

    #[test]
    fn test_session_rejects_zero_durations() {
        assert!(SessionConfig::new().with_poll_interval(Duration::ZERO).validate().is_err());
        assert!(SessionConfig::new().with_readiness_timeout(Duration::ZERO).validate().is_err());
        assert!(SessionConfig::new().with_load_state_timeout(Duration::ZERO).validate().is_err());
    }

    #[test]
    fn test_render_defaults_are_valid() {
        let config = RenderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.render_function, DEFAULT_RENDER_FUNCTION);
        assert_eq!(config.container_selector, DEFAULT_CONTAINER_SELECTOR);
    }

    #[test]
    fn test_render_rejects_empty_selector() {
        let err = RenderConfig::new().with_container_selector(" ").validate().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
