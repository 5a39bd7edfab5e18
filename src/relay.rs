//! HTTP relay to the in-process server.
//!
//! The router never lets the page talk to the network. Requests for the
//! virtual origin are instead re-issued against a real server through an
//! [`HttpRelayClient`], obtained per request from a [`RelayClientFactory`].
//!
//! | Type | Description |
//! |------|-------------|
//! | [`RelayRequest`] / [`RelayResponse`] | Transport-neutral request/response |
//! | [`HttpRelayClient`] | Sends one request |
//! | [`RelayClientFactory`] | Hands out clients |
//! | [`HttpRelay`] / [`HttpRelayFactory`] | `reqwest` implementation |
//!
//! # Example
//!
//! ```no_run
//! use mermaid_headless::relay::{HttpRelayFactory, RelayClientFactory, RelayRequest};
//!
//! # async fn example() -> mermaid_headless::Result<()> {
//! let factory = HttpRelayFactory::new("http://mermaid.localhost", "http://127.0.0.1:8080")?;
//! let client = factory.create_client()?;
//! let response = client
//!     .send(RelayRequest::get("http://mermaid.localhost/index.html"))
//!     .await?;
//! assert_eq!(response.status, 200);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use tracing::{debug, trace};
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default per-request timeout.
const DEFAULT_RELAY_TIMEOUT: Duration = Duration::from_secs(30);

/// Headers that describe a single connection and are never forwarded.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "content-length",
    "host",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Returns `true` for headers that must not be forwarded.
#[inline]
#[must_use]
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

// ============================================================================
// RelayRequest / RelayResponse
// ============================================================================

/// A request to relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayRequest {
    /// HTTP method.
    pub method: String,
    /// Virtual-origin URL as seen by the page.
    pub url: String,
    /// Request headers.
    pub headers: Vec<(String, String)>,
    /// Request body.
    pub body: Option<Vec<u8>>,
}

impl RelayRequest {
    /// Creates a bodiless GET request.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }
}

/// A relayed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: Vec<u8>,
}

impl RelayResponse {
    /// Returns the first header with the given name (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the `Content-Type` header.
    #[inline]
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Sends relayed requests to the in-process server.
#[async_trait]
pub trait HttpRelayClient: Send + Sync {
    /// Sends one request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Relay`] if the server cannot be reached.
    async fn send(&self, request: RelayRequest) -> Result<RelayResponse>;
}

/// Creates relay clients.
pub trait RelayClientFactory: Send + Sync {
    /// Returns a client bound to the in-process server.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Relay`] if no client can be created.
    fn create_client(&self) -> Result<Box<dyn HttpRelayClient>>;
}

// ============================================================================
// HttpRelay
// ============================================================================

/// `reqwest` relay client that maps the virtual origin onto a real base URL.
#[derive(Clone)]
pub struct HttpRelay {
    /// Shared HTTP client.
    client: Client,
    /// Origin the page believes it talks to.
    virtual_origin: Url,
    /// Where requests actually go.
    base_url: Url,
}

impl fmt::Debug for HttpRelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRelay")
            .field("virtual_origin", &self.virtual_origin.as_str())
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpRelay {
    /// Maps a virtual-origin URL onto the base URL.
    ///
    /// `http://mermaid.localhost/js/app.js?v=1` with base
    /// `http://127.0.0.1:8080/static` becomes
    /// `http://127.0.0.1:8080/static/js/app.js?v=1`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Relay`] if the URL is invalid or foreign.
    pub fn rewrite_url(&self, url: &str) -> Result<Url> {
        let parsed = Url::parse(url).map_err(|e| Error::relay(url, e.to_string()))?;

        if parsed.origin() != self.virtual_origin.origin() {
            return Err(Error::relay(url, "URL is outside the virtual origin"));
        }

        let mut target = self.base_url.clone();
        let base_path = self.base_url.path().trim_end_matches('/');
        target.set_path(&format!("{base_path}{}", parsed.path()));
        target.set_query(parsed.query());
        target.set_fragment(None);
        Ok(target)
    }
}

#[async_trait]
impl HttpRelayClient for HttpRelay {
    async fn send(&self, request: RelayRequest) -> Result<RelayResponse> {
        let target = self.rewrite_url(&request.url)?;
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| Error::relay(&request.url, format!("Invalid method: {e}")))?;

        trace!(method = %method, from = %request.url, to = %target, "Relaying request");

        let mut builder = self.client.request(method, target);
        for (name, value) in &request.headers {
            if !is_hop_by_hop(name) {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::relay(&request.url, e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::relay(&request.url, e.to_string()))?
            .to_vec();

        debug!(url = %request.url, status, bytes = body.len(), "Relayed request");

        Ok(RelayResponse {
            status,
            headers,
            body,
        })
    }
}

// ============================================================================
// HttpRelayFactory
// ============================================================================

/// Hands out [`HttpRelay`] clients sharing one connection pool.
#[derive(Debug, Clone)]
pub struct HttpRelayFactory {
    /// Prototype client.
    relay: HttpRelay,
}

impl HttpRelayFactory {
    /// Creates a factory with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for unparsable URLs.
    pub fn new(virtual_origin: &str, base_url: &str) -> Result<Self> {
        Self::with_timeout(virtual_origin, base_url, DEFAULT_RELAY_TIMEOUT)
    }

    /// Creates a factory with an explicit per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for unparsable URLs or a client build failure.
    pub fn with_timeout(virtual_origin: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        let virtual_origin = Url::parse(virtual_origin)
            .map_err(|e| Error::config(format!("Invalid virtual origin '{virtual_origin}': {e}")))?;
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::config(format!("Invalid relay base URL '{base_url}': {e}")))?;

        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            relay: HttpRelay {
                client,
                virtual_origin,
                base_url,
            },
        })
    }
}

impl RelayClientFactory for HttpRelayFactory {
    fn create_client(&self) -> Result<Box<dyn HttpRelayClient>> {
        Ok(Box::new(self.relay.clone()))
    }
}

// ============================================================================
// Tests
// ============================================================================
