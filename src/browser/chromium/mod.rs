//! Chromium backend over the DevTools protocol.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ChromiumBrowser`] | Browser process + connection ([`EngineHandle`](super::EngineHandle)) |
//! | [`ChromiumPage`] | Attached page ([`PageHandle`](super::PageHandle)) |
//!
//! Pages are created with `Target.createTarget` and attached in flat mode, so
//! every page command travels over the browser's single WebSocket tagged
//! with the page's `sessionId`.

// ============================================================================
// Submodules
// ============================================================================

/// Running browser process.
pub mod browser;

/// Attached page.
pub mod page;

// ============================================================================
// Re-exports
// ============================================================================

pub use browser::ChromiumBrowser;
pub use page::ChromiumPage;
