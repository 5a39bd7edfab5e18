//! WebSocket transport layer.
//!
//! This module handles communication between the local end (Rust) and the
//! browser's remote-debugging endpoint via WebSocket.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Session (Rust) │                              │  Chromium       │
//! │                 │         WebSocket            │  (headless)     │
//! │  Connection     │─────────────────────────────►│                 │
//! │                 │  ws://127.0.0.1:PORT/devtools│  DevTools       │
//! │                 │◄─────────────────────────────│  server         │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. Launch the browser with `--remote-debugging-port=0`
//! 2. Read the `DevTools listening on ws://...` line from its stderr
//! 3. `Connection::connect` - open the WebSocket, spawn the event loop
//! 4. Send commands, receive responses and events
//! 5. `Connection::shutdown` - close the socket, fail pending requests

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection and event loop.
pub mod connection;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, DevToolsStream};
