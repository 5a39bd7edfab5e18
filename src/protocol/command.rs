//! Command definitions organized by DevTools domain.
//!
//! Commands follow the `Domain.method` naming of the Chrome DevTools Protocol.
//!
//! # Command Domains
//!
//! | Domain | Commands |
//! |--------|----------|
//! | `Target` | Create, attach, close page targets |
//! | `Page` | Lifecycle events, navigation, screenshots |
//! | `Runtime` | JavaScript evaluation |
//! | `Network` | Response tracking |
//! | `Fetch` | Request interception and fulfillment |
//! | `Browser` | Shutdown, version |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::identifiers::{InterceptId, TargetId};

// ============================================================================
// Command Wrapper
// ============================================================================

/// All protocol commands organized by domain.
///
/// This enum wraps domain-specific command enums for unified serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Command {
    /// Target domain commands.
    Target(TargetCommand),
    /// Page domain commands.
    Page(PageCommand),
    /// Runtime domain commands.
    Runtime(RuntimeCommand),
    /// Network domain commands.
    Network(NetworkCommand),
    /// Fetch domain commands.
    Fetch(FetchCommand),
    /// Browser domain commands.
    Browser(BrowserCommand),
}

impl Command {
    /// Returns the `Domain.method` name of this command.
    #[must_use]
    pub fn method(&self) -> String {
        serde_json::to_value(self)
            .ok()
            .and_then(|v| v.get("method").and_then(|m| m.as_str()).map(str::to_string))
            .unwrap_or_default()
    }
}

// ============================================================================
// Target Commands
// ============================================================================

/// Target domain commands for page lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum TargetCommand {
    /// Create a new page target.
    #[serde(rename = "Target.createTarget")]
    CreateTarget {
        /// Initial URL.
        url: String,
    },

    /// Attach to a target, returning a session id.
    #[serde(rename = "Target.attachToTarget")]
    AttachToTarget {
        /// Target to attach to.
        #[serde(rename = "targetId")]
        target_id: TargetId,
        /// Use flat session mode (commands carry `sessionId`).
        flatten: bool,
    },
}

// ============================================================================
// Page Commands
// ============================================================================

/// Page domain commands for navigation and capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum PageCommand {
    /// Enable page events.
    #[serde(rename = "Page.enable")]
    Enable,

    /// Toggle `Page.lifecycleEvent` notifications.
    #[serde(rename = "Page.setLifecycleEventsEnabled")]
    SetLifecycleEventsEnabled {
        /// Whether lifecycle events are emitted.
        enabled: bool,
    },

    /// Navigate the main frame.
    #[serde(rename = "Page.navigate")]
    Navigate {
        /// URL to navigate to.
        url: String,
    },

    /// Get the frame tree (main frame id).
    #[serde(rename = "Page.getFrameTree")]
    GetFrameTree,

    /// Capture a screenshot.
    #[serde(rename = "Page.captureScreenshot")]
    CaptureScreenshot {
        /// Image format (`png` or `jpeg`).
        format: String,
        /// Capture content outside the viewport.
        #[serde(rename = "captureBeyondViewport")]
        capture_beyond_viewport: bool,
        /// Capture from the compositor surface.
        #[serde(rename = "fromSurface")]
        from_surface: bool,
    },
}

// ============================================================================
// Runtime Commands
// ============================================================================

/// Runtime domain commands for JavaScript execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum RuntimeCommand {
    /// Enable runtime events (console, exceptions).
    #[serde(rename = "Runtime.enable")]
    Enable,

    /// Evaluate an expression in the page's main world.
    #[serde(rename = "Runtime.evaluate")]
    Evaluate {
        /// Expression source.
        expression: String,
        /// Serialize the result by value.
        #[serde(rename = "returnByValue")]
        return_by_value: bool,
        /// Await the result if it is a promise.
        #[serde(rename = "awaitPromise")]
        await_promise: bool,
    },
}

// ============================================================================
// Network Commands
// ============================================================================

/// Network domain commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum NetworkCommand {
    /// Enable network events.
    #[serde(rename = "Network.enable")]
    Enable,
}

// ============================================================================
// Fetch Commands
// ============================================================================

/// URL pattern for `Fetch.enable`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestPattern {
    /// Wildcard pattern (`*` matches everything).
    #[serde(rename = "urlPattern")]
    pub url_pattern: String,
    /// Interception stage.
    #[serde(rename = "requestStage")]
    pub request_stage: String,
}

impl RequestPattern {
    /// Pattern pausing every request before it is sent.
    #[inline]
    #[must_use]
    pub fn all_requests() -> Self {
        Self {
            url_pattern: "*".to_string(),
            request_stage: "Request".to_string(),
        }
    }
}

/// A single response header entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
    /// Header name.
    pub name: String,
    /// Header value.
    pub value: String,
}

/// Fetch domain commands for request interception.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum FetchCommand {
    /// Pause requests matching the patterns.
    #[serde(rename = "Fetch.enable")]
    Enable {
        /// Patterns to intercept.
        patterns: Vec<RequestPattern>,
    },

    /// Answer a paused request with a synthetic response.
    #[serde(rename = "Fetch.fulfillRequest")]
    FulfillRequest {
        /// Paused request.
        #[serde(rename = "requestId")]
        request_id: InterceptId,
        /// HTTP status code.
        #[serde(rename = "responseCode")]
        response_code: u16,
        /// Response headers.
        #[serde(rename = "responseHeaders")]
        response_headers: Vec<HeaderEntry>,
        /// Base64-encoded body.
        #[serde(skip_serializing_if = "Option::is_none")]
        body: Option<String>,
    },
}

// ============================================================================
// Browser Commands
// ============================================================================

/// Browser domain commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum BrowserCommand {
    /// Close the browser gracefully.
    #[serde(rename = "Browser.close")]
    Close,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_navigate_serialization() {
        let command = Command::Page(PageCommand::Navigate {
            url: "http://mermaid.localhost/index.html".to_string(),
        });
        let value = serde_json::to_value(&command).expect("serialize");
        assert_eq!(value["method"], "Page.navigate");
        assert_eq!(value["params"]["url"], "http://mermaid.localhost/index.html");
    }

    #[test]
    fn test_unit_command_has_method_only() {
        let value = serde_json::to_value(Command::Page(PageCommand::Enable)).expect("serialize");
        assert_eq!(value["method"], "Page.enable");
    }

    #[test]
    fn test_fulfill_request_field_names() {
        let command = Command::Fetch(FetchCommand::FulfillRequest {
            request_id: InterceptId::new("interception-1"),
            response_code: 404,
            response_headers: vec![HeaderEntry {
                name: "content-type".into(),
                value: "text/plain".into(),
            }],
            body: None,
        });

        let value = serde_json::to_value(&command).expect("serialize");
        assert_eq!(
            value,
            json!({
                "method": "Fetch.fulfillRequest",
                "params": {
                    "requestId": "interception-1",
                    "responseCode": 404,
                    "responseHeaders": [{"name": "content-type", "value": "text/plain"}]
                }
            })
        );
    }

    #[test]
    fn test_evaluate_field_names() {
        let command = Command::Runtime(RuntimeCommand::Evaluate {
            expression: "1 + 1".into(),
            return_by_value: true,
            await_promise: true,
        });
        let value = serde_json::to_value(&command).expect("serialize");
        assert_eq!(value["params"]["returnByValue"], true);
        assert_eq!(value["params"]["awaitPromise"], true);
    }

    #[test]
    fn test_command_method_name() {
        let command = Command::Fetch(FetchCommand::Enable {
            patterns: vec![RequestPattern::all_requests()],
        });
        assert_eq!(command.method(), "Fetch.enable");
    }
}
