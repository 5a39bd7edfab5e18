//! Request routing for intercepted page traffic.
//!
//! A [`RouteTable`] is an ordered list of [`RouteRule`]s anchored at the
//! session's virtual origin. The [`RequestRouter`] resolves every request the
//! page issues against it:
//!
//! | Kind | Pattern | Action |
//! |------|---------|--------|
//! | `ExactBootstrap` | the bootstrap URL | relay |
//! | `AssetWildcard` | `{origin}/**/*.{js,mjs}` | relay |
//! | `Reject` | everything else | 404, empty body |
//!
//! Rules are tried in registration order and the first match wins. Requests
//! for any other origin are always rejected, so nothing the page asks for
//! ever leaves the process.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};
use url::Url;

use crate::browser::{Fulfillment, InterceptedRequest, RequestInterceptor};
use crate::error::{Error, Result};
use crate::relay::{RelayClientFactory, RelayRequest, is_hop_by_hop};

// ============================================================================
// Constants
// ============================================================================

/// Script asset glob, relative to the virtual origin.
const ASSET_GLOB_SUFFIX: &str = "/**/*.{js,mjs}";

/// Status used when the relay itself fails.
const RELAY_FAILURE_STATUS: u16 = 502;

// ============================================================================
// RouteKind
// ============================================================================

/// What to do with a matched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteKind {
    /// The bootstrap document; relayed.
    ExactBootstrap,
    /// Script assets under the virtual origin; relayed.
    AssetWildcard,
    /// Answered with 404 and no body.
    Reject,
}

impl RouteKind {
    /// Returns `true` if matched requests are relayed.
    #[inline]
    #[must_use]
    pub const fn is_relayed(self) -> bool {
        matches!(self, Self::ExactBootstrap | Self::AssetWildcard)
    }
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ExactBootstrap => "exact-bootstrap",
            Self::AssetWildcard => "asset-wildcard",
            Self::Reject => "reject",
        };
        f.write_str(name)
    }
}

// ============================================================================
// RouteRule
// ============================================================================

/// A pattern bound to a [`RouteKind`].
///
/// Patterns are globs: `**` crosses path segments, `*` and `?` stay within
/// one, `{a,b}` is an alternation and `\` escapes the next character.
/// Query and fragment are ignored.
#[derive(Debug, Clone)]
pub struct RouteRule {
    /// Glob as registered.
    pattern: String,
    /// Action for matches.
    kind: RouteKind,
    /// Compiled, anchored glob.
    matcher: Regex,
}

impl RouteRule {
    /// Compiles a rule.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for malformed globs.
    pub fn new(pattern: impl Into<String>, kind: RouteKind) -> Result<Self> {
        let pattern = pattern.into();
        let matcher = Regex::new(&glob_to_regex(&pattern)?)
            .map_err(|e| Error::config(format!("Invalid route pattern '{pattern}': {e}")))?;
        Ok(Self {
            pattern,
            kind,
            matcher,
        })
    }

    /// Returns the glob.
    #[inline]
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns the kind.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> RouteKind {
        self.kind
    }

    /// Returns `true` if the (query-stripped) URL matches.
    #[inline]
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        self.matcher.is_match(url)
    }
}

/// Translates a glob into an anchored regular expression.
fn glob_to_regex(glob: &str) -> Result<String> {
    let mut out = String::with_capacity(glob.len() * 2 + 2);
    out.push('^');

    let chars: Vec<char> = glob.chars().collect();
    let mut i = 0;
    let mut in_group = false;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    // "**/" matches zero or more whole segments.
                    out.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    out.push_str(".*");
                    i += 2;
                }
                continue;
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '{' if !in_group => {
                in_group = true;
                out.push_str("(?:");
            }
            '}' if in_group => {
                in_group = false;
                out.push(')');
            }
            ',' if in_group => out.push('|'),
            '\\' => {
                let Some(&escaped) = chars.get(i + 1) else {
                    return Err(Error::config(format!("Dangling '\\' in route pattern '{glob}'")));
                };
                out.push_str(&regex::escape(&escaped.to_string()));
                i += 1;
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
        i += 1;
    }

    if in_group {
        return Err(Error::config(format!("Unclosed '{{' in route pattern '{glob}'")));
    }

    out.push('$');
    Ok(out)
}

// ============================================================================
// RouteTable
// ============================================================================

/// Ordered, immutable set of rules for one session.
#[derive(Debug, Clone)]
pub struct RouteTable {
    /// Origin every relayed request must belong to.
    origin: Url,
    /// Rules in registration order.
    rules: Vec<RouteRule>,
}

impl RouteTable {
    /// Builds the standard table for a bootstrap URL:
    /// `ExactBootstrap`, then `AssetWildcard`, then a catch-all `Reject`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the URL has no usable origin.
    pub fn for_bootstrap(bootstrap_url: &Url) -> Result<Self> {
        let origin = origin_of(bootstrap_url)?;
        let origin_str = escape_glob(origin.as_str().trim_end_matches('/'));

        let rules = vec![
            RouteRule::new(
                escape_glob(&strip_query(bootstrap_url)),
                RouteKind::ExactBootstrap,
            )?,
            RouteRule::new(format!("{origin_str}{ASSET_GLOB_SUFFIX}"), RouteKind::AssetWildcard)?,
            RouteRule::new("**", RouteKind::Reject)?,
        ];

        Ok(Self { origin, rules })
    }

    /// Builds a table from explicit rules.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the origin is unusable.
    pub fn with_rules(origin: &Url, rules: Vec<RouteRule>) -> Result<Self> {
        Ok(Self {
            origin: origin_of(origin)?,
            rules,
        })
    }

    /// Returns the rules in registration order.
    #[inline]
    #[must_use]
    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// Returns the virtual origin.
    #[inline]
    #[must_use]
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Resolves a URL to the kind of the first matching rule.
    ///
    /// Unparsable URLs, foreign origins and unmatched URLs resolve to
    /// [`RouteKind::Reject`].
    #[must_use]
    pub fn resolve(&self, url: &str) -> RouteKind {
        let Ok(parsed) = Url::parse(url) else {
            return RouteKind::Reject;
        };
        if parsed.origin() != self.origin.origin() {
            return RouteKind::Reject;
        }

        let target = strip_query(&parsed);
        self.rules
            .iter()
            .find(|rule| rule.matches(&target))
            .map_or(RouteKind::Reject, RouteRule::kind)
    }
}

/// Returns the scheme://host:port origin of a URL.
fn origin_of(url: &Url) -> Result<Url> {
    if !url.has_host() || !matches!(url.scheme(), "http" | "https") {
        return Err(Error::config(format!("'{url}' has no HTTP origin")));
    }
    Url::parse(&url.origin().ascii_serialization())
        .map_err(|e| Error::config(format!("Invalid origin for '{url}': {e}")))
}

/// URL without query and fragment.
fn strip_query(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.to_string()
}

/// Escapes glob metacharacters so the string matches only itself.
fn escape_glob(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '*' | '?' | '{' | '}' | ',' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// ============================================================================
// RouterStats
// ============================================================================

/// Counters kept by a [`RequestRouter`].
#[derive(Debug, Default)]
pub struct RouterStats {
    relayed: AtomicU64,
    rejected: AtomicU64,
    relay_failed: AtomicU64,
}

impl RouterStats {
    /// Requests answered from the relay.
    #[inline]
    #[must_use]
    pub fn relayed(&self) -> u64 {
        self.relayed.load(Ordering::Relaxed)
    }

    /// Requests answered with 404.
    #[inline]
    #[must_use]
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Requests answered with a relay-failure status.
    #[inline]
    #[must_use]
    pub fn relay_failed(&self) -> u64 {
        self.relay_failed.load(Ordering::Relaxed)
    }
}

// ============================================================================
// RequestRouter
// ============================================================================

/// Relays or rejects every intercepted request.
#[derive(Clone)]
pub struct RequestRouter {
    /// Rules for this session.
    table: Arc<RouteTable>,
    /// Relay client source.
    relay_factory: Arc<dyn RelayClientFactory>,
    /// Counters.
    stats: Arc<RouterStats>,
}

impl fmt::Debug for RequestRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestRouter")
            .field("table", &self.table)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl RequestRouter {
    /// Creates a router.
    #[must_use]
    pub fn new(table: RouteTable, relay_factory: Arc<dyn RelayClientFactory>) -> Self {
        Self {
            table: Arc::new(table),
            relay_factory,
            stats: Arc::new(RouterStats::default()),
        }
    }

    /// Returns the route table.
    #[inline]
    #[must_use]
    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Returns the shared counters.
    #[inline]
    #[must_use]
    pub fn stats(&self) -> Arc<RouterStats> {
        Arc::clone(&self.stats)
    }

    /// Relays one request, converting any failure into a 502.
    async fn relay(&self, request: InterceptedRequest) -> Fulfillment {
        let url = request.url.clone();

        let result = match self.relay_factory.create_client() {
            Ok(client) => {
                client
                    .send(RelayRequest {
                        method: request.method,
                        url: request.url,
                        headers: request.headers,
                        body: request.body,
                    })
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(response) => {
                self.stats.relayed.fetch_add(1, Ordering::Relaxed);
                debug!(url = %url, status = response.status, "Relayed");

                let headers = response
                    .headers
                    .into_iter()
                    .filter(|(name, _)| !is_hop_by_hop(name))
                    .collect();
                Fulfillment {
                    status: response.status,
                    headers,
                    body: response.body,
                }
            }
            Err(e) => {
                self.stats.relay_failed.fetch_add(1, Ordering::Relaxed);
                warn!(url = %url, error = %e, "Relay failed");
                Fulfillment::error(RELAY_FAILURE_STATUS, format!("relay failed: {e}"))
            }
        }
    }
}

#[async_trait]
impl RequestInterceptor for RequestRouter {
    async fn intercept(&self, request: InterceptedRequest) -> Fulfillment {
        let kind = self.table.resolve(&request.url);

        if kind.is_relayed() {
            return self.relay(request).await;
        }

        self.stats.rejected.fetch_add(1, Ordering::Relaxed);
        debug!(url = %request.url, method = %request.method, "Rejected request");
        Fulfillment::not_found()
    }
}

// ============================================================================
// Tests
// ============================================================================
