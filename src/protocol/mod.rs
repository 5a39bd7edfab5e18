//! DevTools protocol message types.
//!
//! This module defines the message format spoken over the browser's
//! remote-debugging WebSocket.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Local → Browser | Command request |
//! | `Response` | Browser → Local | Command response (same `id`) |
//! | `Event` | Browser → Local | Notification (no `id`) |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Command definitions by domain |
//! | `event` | Event types |
//! | `request` | Request and Response types |

// ============================================================================
// Submodules
// ============================================================================

/// Command definitions organized by domain.
pub mod command;

/// Event message types.
pub mod event;

/// Request and Response message types.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{
    BrowserCommand, Command, FetchCommand, HeaderEntry, NetworkCommand, PageCommand,
    RequestPattern, RuntimeCommand, TargetCommand,
};
pub use event::{Event, ParsedEvent};
pub use request::{Request, Response, ResponseError};
