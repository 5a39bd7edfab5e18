//! Browser engine and channel selection.
//!
//! A selection is parsed from strings such as `"chromium"`,
//! `"chromium:chrome-beta"` or `"chromium:msedge"`.
//!
//! | Channel | Binary |
//! |---------|--------|
//! | `chromium` | Chromium |
//! | `chrome` | Google Chrome stable |
//! | `chrome-beta` | Google Chrome beta |
//! | `chrome-dev` | Google Chrome dev |
//! | `chrome-canary` | Google Chrome canary |
//! | `msedge` | Microsoft Edge |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

// ============================================================================
// EngineKind
// ============================================================================

/// Browser engine family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EngineKind {
    /// Chromium-based browsers.
    #[default]
    Chromium,
    /// Gecko (Firefox).
    Firefox,
    /// WebKit.
    Webkit,
}

impl EngineKind {
    /// Lowercase engine name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chromium => "chromium",
            Self::Firefox => "firefox",
            Self::Webkit => "webkit",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chromium" => Ok(Self::Chromium),
            "firefox" => Ok(Self::Firefox),
            "webkit" => Ok(Self::Webkit),
            other => Err(Error::invalid_argument(format!("Unknown browser engine '{other}'"))),
        }
    }
}

// ============================================================================
// BrowserChannel
// ============================================================================

/// Installed browser distribution to launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrowserChannel {
    /// Open-source Chromium build.
    Chromium,
    /// Google Chrome stable.
    Chrome,
    /// Google Chrome beta.
    ChromeBeta,
    /// Google Chrome dev.
    ChromeDev,
    /// Google Chrome canary.
    ChromeCanary,
    /// Microsoft Edge.
    MsEdge,
}

impl BrowserChannel {
    /// Channel name as accepted by [`FromStr`].
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chromium => "chromium",
            Self::Chrome => "chrome",
            Self::ChromeBeta => "chrome-beta",
            Self::ChromeDev => "chrome-dev",
            Self::ChromeCanary => "chrome-canary",
            Self::MsEdge => "msedge",
        }
    }

    /// Engine family the channel belongs to.
    #[inline]
    #[must_use]
    pub const fn engine(self) -> EngineKind {
        EngineKind::Chromium
    }

    /// Executable names searched on `PATH`, most specific first.
    #[must_use]
    pub const fn executable_names(self) -> &'static [&'static str] {
        match self {
            Self::Chromium => &["chromium", "chromium-browser", "headless_shell"],
            Self::Chrome => &["google-chrome", "google-chrome-stable", "chrome"],
            Self::ChromeBeta => &["google-chrome-beta"],
            Self::ChromeDev => &["google-chrome-unstable", "google-chrome-dev"],
            Self::ChromeCanary => &["google-chrome-canary"],
            Self::MsEdge => &["microsoft-edge", "microsoft-edge-stable", "msedge"],
        }
    }

    /// Well-known absolute install locations.
    #[must_use]
    pub const fn well_known_paths(self) -> &'static [&'static str] {
        match self {
            Self::Chromium => &[
                "/usr/bin/chromium",
                "/usr/bin/chromium-browser",
                "/snap/bin/chromium",
                "/Applications/Chromium.app/Contents/MacOS/Chromium",
                r"C:\Program Files\Chromium\Application\chrome.exe",
            ],
            Self::Chrome => &[
                "/opt/google/chrome/chrome",
                "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
                r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            ],
            Self::ChromeBeta => &[
                "/opt/google/chrome-beta/chrome",
                "/Applications/Google Chrome Beta.app/Contents/MacOS/Google Chrome Beta",
                r"C:\Program Files\Google\Chrome Beta\Application\chrome.exe",
            ],
            Self::ChromeDev => &[
                "/opt/google/chrome-unstable/chrome",
                "/Applications/Google Chrome Dev.app/Contents/MacOS/Google Chrome Dev",
                r"C:\Program Files\Google\Chrome Dev\Application\chrome.exe",
            ],
            Self::ChromeCanary => &[
                "/Applications/Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
            ],
            Self::MsEdge => &[
                "/opt/microsoft/msedge/msedge",
                "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
                r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
            ],
        }
    }
}

impl fmt::Display for BrowserChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BrowserChannel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chromium" => Ok(Self::Chromium),
            "chrome" | "chrome-stable" => Ok(Self::Chrome),
            "chrome-beta" => Ok(Self::ChromeBeta),
            "chrome-dev" => Ok(Self::ChromeDev),
            "chrome-canary" => Ok(Self::ChromeCanary),
            "msedge" | "edge" => Ok(Self::MsEdge),
            other => Err(Error::invalid_argument(format!("Unknown browser channel '{other}'"))),
        }
    }
}

// ============================================================================
// BrowserSelection
// ============================================================================

/// Engine plus optional channel.
///
/// Without a channel the engine's default distribution is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BrowserSelection {
    /// Engine family.
    pub engine: EngineKind,
    /// Distribution to launch.
    pub channel: Option<BrowserChannel>,
}

impl BrowserSelection {
    /// Creates a selection.
    #[inline]
    #[must_use]
    pub const fn new(engine: EngineKind, channel: Option<BrowserChannel>) -> Self {
        Self { engine, channel }
    }

    /// Plain Chromium.
    #[inline]
    #[must_use]
    pub const fn chromium() -> Self {
        Self::new(EngineKind::Chromium, None)
    }

    /// Chromium engine with a specific channel.
    #[inline]
    #[must_use]
    pub const fn channel(channel: BrowserChannel) -> Self {
        Self::new(channel.engine(), Some(channel))
    }

    /// Channel to launch, defaulting to Chromium for the Chromium engine.
    #[inline]
    #[must_use]
    pub fn effective_channel(&self) -> Option<BrowserChannel> {
        match self.engine {
            EngineKind::Chromium => Some(self.channel.unwrap_or(BrowserChannel::Chromium)),
            EngineKind::Firefox | EngineKind::Webkit => self.channel,
        }
    }
}

impl fmt::Display for BrowserSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.channel {
            Some(channel) => write!(f, "{}:{}", self.engine, channel),
            None => write!(f, "{}", self.engine),
        }
    }
}

impl FromStr for BrowserSelection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::invalid_argument("Browser selection must not be empty"));
        }

        match s.split_once(':') {
            Some((engine, channel)) => Ok(Self::new(engine.parse()?, Some(channel.parse()?))),
            None => match s.parse::<EngineKind>() {
                Ok(engine) => Ok(Self::new(engine, None)),
                // A bare channel such as "msedge" implies its engine.
                Err(_) => Ok(Self::channel(s.parse()?)),
            },
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
