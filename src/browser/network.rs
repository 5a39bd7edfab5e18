//! Network interception types.
//!
//! Every outbound request a page issues is paused and handed to a
//! [`RequestInterceptor`], which must answer it with a [`Fulfillment`].
//!
//! # Example
//!
//! ```ignore
//! use mermaid_headless::browser::{Fulfillment, InterceptedRequest, RequestInterceptor};
//!
//! struct DenyAll;
//!
//! #[async_trait::async_trait]
//! impl RequestInterceptor for DenyAll {
//!     async fn intercept(&self, _request: InterceptedRequest) -> Fulfillment {
//!         Fulfillment::not_found()
//!     }
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;

// ============================================================================
// InterceptedRequest
// ============================================================================

/// An outbound request paused before it left the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedRequest {
    /// Request URL.
    pub url: String,

    /// HTTP method (GET, POST, etc.).
    pub method: String,

    /// Request headers in arrival order.
    pub headers: Vec<(String, String)>,

    /// Request body, if any.
    pub body: Option<Vec<u8>>,

    /// Resource type (`Document`, `Script`, `XHR`, ...).
    pub resource_type: String,
}

impl InterceptedRequest {
    /// Creates a bodiless GET request.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            headers: Vec::new(),
            body: None,
            resource_type: "Other".to_string(),
        }
    }

    /// Sets the resource type.
    #[inline]
    #[must_use]
    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = resource_type.into();
        self
    }

    /// Adds a header.
    #[inline]
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Returns the first header with the given name (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

// ============================================================================
// Fulfillment
// ============================================================================

/// The answer given to a paused request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fulfillment {
    /// HTTP status code.
    pub status: u16,

    /// Response headers.
    pub headers: Vec<(String, String)>,

    /// Response body.
    pub body: Vec<u8>,
}

// ============================================================================
// Fulfillment - Constructors
// ============================================================================

impl Fulfillment {
    /// Creates a fulfillment with the given status and body.
    #[inline]
    #[must_use]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// 404 with an empty body.
    #[inline]
    #[must_use]
    pub fn not_found() -> Self {
        Self::new(404, Vec::new())
    }

    /// Plain-text error response.
    #[must_use]
    pub fn error(status: u16, reason: impl Into<String>) -> Self {
        Self::new(status, reason.into().into_bytes())
            .with_header("Content-Type", "text/plain; charset=utf-8")
    }

    /// Adds a response header.
    #[inline]
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

// ============================================================================
// Fulfillment - Accessors
// ============================================================================

impl Fulfillment {
    /// Returns `true` for 2xx status codes.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns the first header with the given name (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

// ============================================================================
// RequestInterceptor
// ============================================================================

/// Answers paused requests.
///
/// Implementations must never leave a request unanswered: failures are
/// expressed as error statuses, not as Rust errors.
#[async_trait]
pub trait RequestInterceptor: Send + Sync {
    /// Produces the response for one paused request.
    async fn intercept(&self, request: InterceptedRequest) -> Fulfillment;
}

// ============================================================================
// Tests
// ============================================================================
