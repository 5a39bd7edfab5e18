//! Event message types.
//!
//! Events are notifications the browser pushes without a command id.
//!
//! # Event Types
//!
//! | Domain | Events |
//! |--------|--------|
//! | `Page` | `lifecycleEvent` |
//! | `Fetch` | `requestPaused` |
//! | `Network` | `responseReceived` |
//! | `Runtime` | `consoleAPICalled`, `exceptionThrown` |
//! | `Target` | `detachedFromTarget` |

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::Value;

use crate::identifiers::{CdpSessionId, FrameId, InterceptId};

// ============================================================================
// Event
// ============================================================================

/// An event notification from the browser.
///
/// # Format
///
/// ```json
/// {
///   "method": "Domain.eventName",
///   "sessionId": "B1C2...",
///   "params": { ... }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    /// Event name in `Domain.eventName` format.
    pub method: String,

    /// Event-specific data.
    #[serde(default)]
    pub params: Value,

    /// Session the event was raised in.
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<CdpSessionId>,
}

impl Event {
    /// Returns the domain name from the method.
    #[inline]
    #[must_use]
    pub fn domain(&self) -> &str {
        self.method.split('.').next().unwrap_or_default()
    }

    /// Returns `true` if the event belongs to the given session.
    #[inline]
    #[must_use]
    pub fn is_for(&self, session_id: &CdpSessionId) -> bool {
        self.session_id.as_ref() == Some(session_id)
    }

    /// Parses the event into a typed variant.
    #[must_use]
    pub fn parse(&self) -> ParsedEvent {
        let params = &self.params;
        match self.method.as_str() {
            "Page.lifecycleEvent" => ParsedEvent::Lifecycle {
                frame_id: FrameId::new(str_field(params, "frameId")),
                loader_id: str_field(params, "loaderId"),
                name: str_field(params, "name"),
            },

            "Fetch.requestPaused" => {
                let request = params.get("request").unwrap_or(&Value::Null);
                ParsedEvent::RequestPaused {
                    request_id: InterceptId::new(str_field(params, "requestId")),
                    url: str_field(request, "url"),
                    method: request
                        .get("method")
                        .and_then(|v| v.as_str())
                        .unwrap_or("GET")
                        .to_string(),
                    headers: request
                        .get("headers")
                        .and_then(|v| v.as_object())
                        .map(|obj| {
                            obj.iter()
                                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                                .collect()
                        })
                        .unwrap_or_default(),
                    post_data: request
                        .get("postData")
                        .and_then(|v| v.as_str())
                        .map(str::to_string),
                    resource_type: params
                        .get("resourceType")
                        .and_then(|v| v.as_str())
                        .unwrap_or("Other")
                        .to_string(),
                }
            }

            "Network.responseReceived" => {
                let response = params.get("response").unwrap_or(&Value::Null);
                ParsedEvent::ResponseReceived {
                    frame_id: FrameId::new(str_field(params, "frameId")),
                    loader_id: str_field(params, "loaderId"),
                    resource_type: str_field(params, "type"),
                    url: str_field(response, "url"),
                    status: response
                        .get("status")
                        .and_then(|v| v.as_u64())
                        .unwrap_or(0) as u16,
                }
            }

            "Runtime.consoleAPICalled" => ParsedEvent::Console {
                level: str_field(params, "type"),
                text: params
                    .get("args")
                    .and_then(|v| v.as_array())
                    .map(|args| {
                        args.iter()
                            .map(|arg| match arg.get("value") {
                                Some(Value::String(s)) => s.clone(),
                                Some(other) => other.to_string(),
                                None => str_field(arg, "description"),
                            })
                            .collect::<Vec<_>>()
                            .join(" ")
                    })
                    .unwrap_or_default(),
            },

            "Runtime.exceptionThrown" => {
                let details = params.get("exceptionDetails").unwrap_or(&Value::Null);
                let description = details
                    .get("exception")
                    .and_then(|e| e.get("description"))
                    .and_then(|v| v.as_str());
                ParsedEvent::Exception {
                    text: description
                        .map(str::to_string)
                        .unwrap_or_else(|| str_field(details, "text")),
                }
            }

            "Target.detachedFromTarget" => ParsedEvent::Detached {
                session_id: CdpSessionId::new(str_field(params, "sessionId")),
            },

            _ => ParsedEvent::Unknown {
                method: self.method.clone(),
                params: self.params.clone(),
            },
        }
    }
}

/// Reads a string field, defaulting to empty.
fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

// ============================================================================
// ParsedEvent
// ============================================================================

/// Parsed event types for type-safe handling.
#[derive(Debug, Clone)]
pub enum ParsedEvent {
    /// Page lifecycle milestone (`init`, `DOMContentLoaded`, `load`, `networkIdle`, ...).
    Lifecycle {
        /// Frame the milestone belongs to.
        frame_id: FrameId,
        /// Loader (navigation) id.
        loader_id: String,
        /// Milestone name.
        name: String,
    },

    /// A request paused by `Fetch` interception.
    RequestPaused {
        /// Paused request id.
        request_id: InterceptId,
        /// Request URL.
        url: String,
        /// HTTP method.
        method: String,
        /// Request headers.
        headers: Vec<(String, String)>,
        /// Request body, if any.
        post_data: Option<String>,
        /// Resource type (`Document`, `Script`, ...).
        resource_type: String,
    },

    /// Response headers received for a request.
    ResponseReceived {
        /// Frame that issued the request.
        frame_id: FrameId,
        /// Loader (navigation) id.
        loader_id: String,
        /// Resource type.
        resource_type: String,
        /// Response URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// `console.*` call inside the page.
    Console {
        /// Console level (`log`, `warning`, `error`, ...).
        level: String,
        /// Joined argument text.
        text: String,
    },

    /// Uncaught exception inside the page.
    Exception {
        /// Exception description.
        text: String,
    },

    /// Target session detached (page closed or crashed).
    Detached {
        /// Session that detached.
        session_id: CdpSessionId,
    },

    /// Unknown event type.
    Unknown {
        /// Event method.
        method: String,
        /// Event params.
        params: Value,
    },
}

// ============================================================================
// Tests
// ============================================================================
