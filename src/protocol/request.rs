//! Request and Response message types.
//!
//! Defines the message format for DevTools commands and their responses.
//! With flat sessions, commands aimed at a page carry its `sessionId`;
//! browser-level commands omit it.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::{CdpSessionId, CommandId};

use super::Command;

// ============================================================================
// Request
// ============================================================================

/// A command request sent to the browser.
///
/// # Format
///
/// ```json
/// {
///   "id": 7,
///   "sessionId": "B1C2...",
///   "method": "Runtime.evaluate",
///   "params": { ... }
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Unique identifier for request/response correlation.
    pub id: CommandId,

    /// Attached session, or `None` for browser-level commands.
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<CdpSessionId>,

    /// Command with method and params.
    #[serde(flatten)]
    pub command: Command,
}

impl Request {
    /// Creates a browser-level request with auto-generated ID.
    #[inline]
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            id: CommandId::next(),
            session_id: None,
            command,
        }
    }

    /// Creates a request routed to an attached session.
    #[inline]
    #[must_use]
    pub fn for_session(session_id: CdpSessionId, command: Command) -> Self {
        Self {
            id: CommandId::next(),
            session_id: Some(session_id),
            command,
        }
    }
}

// ============================================================================
// Response
// ============================================================================

/// Error payload of a failed command.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseError {
    /// Numeric error code.
    pub code: i64,
    /// Error message.
    pub message: String,
    /// Optional detail.
    #[serde(default)]
    pub data: Option<String>,
}

/// A response from the browser.
///
/// # Format
///
/// Success:
/// ```json
/// { "id": 7, "result": { ... } }
/// ```
///
/// Error:
/// ```json
/// { "id": 7, "error": { "code": -32000, "message": "..." } }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    /// Matches the command `id`.
    pub id: CommandId,

    /// Result data (if success).
    #[serde(default)]
    pub result: Option<Value>,

    /// Error payload (if error).
    #[serde(default)]
    pub error: Option<ResponseError>,

    /// Session the response belongs to.
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<CdpSessionId>,
}

impl Response {
    /// Returns `true` if this is a success response.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Extracts the result value, returning error if response was error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the response was an error.
    pub fn into_result(self) -> Result<Value> {
        match self.error {
            None => Ok(self.result.unwrap_or(Value::Null)),
            Some(error) => {
                let message = match error.data {
                    Some(data) => format!("{} ({}): {}", error.message, error.code, data),
                    None => format!("{} ({})", error.message, error.code),
                };
                Err(Error::protocol(message))
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{PageCommand, RuntimeCommand};

    #[test]
    fn test_browser_request_omits_session() {
        let request = Request::new(Command::Page(PageCommand::Enable));
        let json = serde_json::to_string(&request).expect("serialize");

        assert!(json.contains("\"method\":\"Page.enable\""));
        assert!(!json.contains("sessionId"));
    }

    #[test]
    fn test_session_request_carries_session() {
        let request = Request::for_session(
            CdpSessionId::new("S1"),
            Command::Runtime(RuntimeCommand::Enable),
        );
        let value = serde_json::to_value(&request).expect("serialize");

        assert_eq!(value["sessionId"], "S1");
        assert_eq!(value["method"], "Runtime.enable");
        assert!(value["id"].as_u64().is_some());
    }

    #[test]
    fn test_success_response() {
        let response: Response =
            serde_json::from_str(r#"{"id": 3, "result": {"targetId": "T1"}}"#).expect("parse");
        assert!(response.is_success());
        assert_eq!(response.into_result().expect("result")["targetId"], "T1");
    }

    #[test]
    fn test_error_response_into_result() {
        let response: Response = serde_json::from_str(
            r#"{"id": 4, "error": {"code": -32000, "message": "No node with given id"}}"#,
        )
        .expect("parse");

        assert!(!response.is_success());
        let err = response.into_result().unwrap_err();
        assert!(err.to_string().contains("No node with given id"));
    }

    #[test]
    fn test_event_is_not_a_response() {
        let parsed = serde_json::from_str::<Response>(
            r#"{"method": "Page.lifecycleEvent", "params": {}}"#,
        );
        assert!(parsed.is_err());
    }
}
