//! Type-safe identifiers.
//!
//! Newtype wrappers prevent mixing DevTools command ids, target ids, attached
//! session ids, paused-request ids and rendering session ids at compile time.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// CommandId
// ============================================================================

/// Global counter for DevTools command ids.
static NEXT_COMMAND_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier correlating a DevTools command with its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(u64);

impl CommandId {
    /// Allocates the next command id (monotonic, never zero).
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_COMMAND_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wraps a raw id.
    #[inline]
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// String Identifiers
// ============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw id string.
            #[inline]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the id as a string slice.
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// DevTools target id (one per page).
    TargetId
);

string_id!(
    /// Flat-mode DevTools session id obtained by attaching to a target.
    CdpSessionId
);

string_id!(
    /// Id of a request paused by `Fetch` interception.
    InterceptId
);

string_id!(
    /// DevTools frame id.
    FrameId
);

// ============================================================================
// SessionId
// ============================================================================

/// Identifier of a [`BrowserSession`](crate::BrowserSession), used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a fresh random session id.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_ids_are_monotonic() {
        let a = CommandId::next();
        let b = CommandId::next();
        assert!(b > a);
        assert_ne!(a.as_u64(), 0);
    }

    #[test]
    fn test_command_id_serializes_as_number() {
        let id = CommandId::from_raw(42);
        assert_eq!(serde_json::to_string(&id).expect("serialize"), "42");
    }

    #[test]
    fn test_string_id_roundtrip() {
        let id: TargetId = serde_json::from_str("\"ABC123\"").expect("parse");
        assert_eq!(id.as_str(), "ABC123");
        assert_eq!(id.to_string(), "ABC123");
    }

    #[test]
    fn test_session_ids_unique() {
        assert_ne!(SessionId::generate(), SessionId::generate());
    }
}
