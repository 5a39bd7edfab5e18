//! Deterministic in-memory browser and server used by unit tests.
//!
//! | Stub | Stands in for |
//! |------|---------------|
//! | [`StubLauncher`] | Chromium launcher |
//! | `StubEngine` | running browser |
//! | [`StubPage`] | page: bootstrap fetches, readiness, render, screenshot |
//! | [`StubRelayFactory`] | in-process HTTP server |
//!
//! The stub page issues its bootstrap traffic through whatever interceptor is
//! installed, exactly as a real page would, so routing and relay behaviour is
//! exercised end to end.

use std::hash::{Hash, Hasher};
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use parking_lot::Mutex;
use rustc_hash::FxHasher;
use serde_json::Value;

use crate::browser::{
    BrowserLauncher, ElementBox, EngineHandle, Fulfillment, InterceptedRequest, LoadState,
    NavigationResponse, PageHandle, RequestInterceptor,
};
use crate::config::SessionConfig;
use crate::driver::{BrowserSelection, EngineKind};
use crate::error::{Error, Result};
use crate::relay::{HttpRelayClient, RelayClientFactory, RelayRequest, RelayResponse};

/// Virtual origin used by the stubs.
pub(crate) const STUB_ORIGIN: &str = "http://mermaid.localhost";

/// Foreign script the bootstrap document "references".
pub(crate) const FOREIGN_SCRIPT: &str = "https://cdn.jsdelivr.net/npm/mermaid@11/dist/mermaid.min.js";

/// Session configuration with short bounds.
pub(crate) fn fast_config() -> SessionConfig {
    SessionConfig::new()
        .with_readiness_timeout(Duration::from_secs(2))
        .with_poll_interval(Duration::from_millis(5))
        .with_navigation_timeout(Duration::from_secs(2))
        .with_load_state_timeout(Duration::from_secs(2))
}

fn fingerprint(markup: &str) -> u64 {
    let mut hasher = FxHasher::default();
    markup.hash(&mut hasher);
    hasher.finish()
}

// ============================================================================
// StubBehavior
// ============================================================================

/// Knobs for the stub browser.
#[derive(Debug, Clone)]
pub(crate) struct StubBehavior {
    pub fail_launch: bool,
    pub fail_new_page: bool,
    pub no_navigation_response: bool,
    /// Readiness check turns truthy on this poll; `None` never.
    pub ready_after_polls: Option<u32>,
    pub missing_container: bool,
    /// Replaces the render function's result.
    pub render_output: Option<Value>,
    pub render_delay: Duration,
    pub fail_close: bool,
}

impl Default for StubBehavior {
    fn default() -> Self {
        Self {
            fail_launch: false,
            fail_new_page: false,
            no_navigation_response: false,
            ready_after_polls: Some(1),
            missing_container: false,
            render_output: None,
            render_delay: Duration::ZERO,
            fail_close: false,
        }
    }
}

impl StubBehavior {
    pub(crate) fn never_ready() -> Self {
        Self {
            ready_after_polls: None,
            ..Self::default()
        }
    }

    pub(crate) fn ready_after(polls: u32) -> Self {
        Self {
            ready_after_polls: Some(polls),
            ..Self::default()
        }
    }
}

// ============================================================================
// StubLauncher
// ============================================================================

/// Launcher handing out [`StubPage`]s and counting engine releases.
#[derive(Default)]
pub(crate) struct StubLauncher {
    behavior: StubBehavior,
    launches: AtomicU32,
    closes: Arc<AtomicU32>,
    drop_closes: Arc<AtomicU32>,
    pages: Arc<Mutex<Vec<Arc<StubPage>>>>,
}

impl StubLauncher {
    pub(crate) fn new(behavior: StubBehavior) -> Self {
        Self {
            behavior,
            ..Self::default()
        }
    }

    pub(crate) fn launch_count(&self) -> u32 {
        self.launches.load(Ordering::SeqCst)
    }

    pub(crate) fn close_count(&self) -> u32 {
        self.closes.load(Ordering::SeqCst)
    }

    pub(crate) fn drop_close_count(&self) -> u32 {
        self.drop_closes.load(Ordering::SeqCst)
    }

    pub(crate) fn last_page(&self) -> Option<Arc<StubPage>> {
        self.pages.lock().last().cloned()
    }
}

#[async_trait]
impl BrowserLauncher for StubLauncher {
    async fn launch(&self, selection: &BrowserSelection) -> Result<Box<dyn EngineHandle>> {
        self.launches.fetch_add(1, Ordering::SeqCst);

        if selection.engine != EngineKind::Chromium {
            return Err(Error::unsupported_browser(
                selection.engine.to_string(),
                "stub drives chromium only",
            ));
        }
        if self.behavior.fail_launch {
            return Err(Error::launch_failed("stub launch refused"));
        }

        Ok(Box::new(StubEngine {
            behavior: self.behavior.clone(),
            closed: AtomicBool::new(false),
            closes: Arc::clone(&self.closes),
            drop_closes: Arc::clone(&self.drop_closes),
            pages: Arc::clone(&self.pages),
        }))
    }
}

// ============================================================================
// StubEngine
// ============================================================================

struct StubEngine {
    behavior: StubBehavior,
    closed: AtomicBool,
    closes: Arc<AtomicU32>,
    drop_closes: Arc<AtomicU32>,
    pages: Arc<Mutex<Vec<Arc<StubPage>>>>,
}

#[async_trait]
impl EngineHandle for StubEngine {
    async fn new_page(&self) -> Result<Arc<dyn PageHandle>> {
        if self.behavior.fail_new_page {
            return Err(Error::protocol("Target.createTarget failed"));
        }
        let page = Arc::new(StubPage::new(self.behavior.clone()));
        self.pages.lock().push(Arc::clone(&page));
        Ok(page)
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.behavior.fail_close {
            return Err(Error::ConnectionClosed);
        }
        Ok(())
    }

    fn close_on_drop(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.drop_closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

// ============================================================================
// StubPage
// ============================================================================

/// Page that fetches through its interceptor and renders deterministically.
pub(crate) struct StubPage {
    behavior: StubBehavior,
    interceptor: Mutex<Option<Arc<dyn RequestInterceptor>>>,
    interceptor_at_goto: AtomicBool,
    fetches: Mutex<Vec<(String, Fulfillment)>>,
    polls: AtomicU32,
    rendered: Mutex<Option<String>>,
    active_renders: AtomicU32,
    max_concurrent_renders: AtomicU32,
}

impl StubPage {
    fn new(behavior: StubBehavior) -> Self {
        Self {
            behavior,
            interceptor: Mutex::new(None),
            interceptor_at_goto: AtomicBool::new(false),
            fetches: Mutex::new(Vec::new()),
            polls: AtomicU32::new(0),
            rendered: Mutex::new(None),
            active_renders: AtomicU32::new(0),
            max_concurrent_renders: AtomicU32::new(0),
        }
    }

    pub(crate) fn interceptor_installed_before_goto(&self) -> bool {
        self.interceptor_at_goto.load(Ordering::SeqCst)
    }

    pub(crate) fn readiness_polls(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_concurrent_renders(&self) -> u32 {
        self.max_concurrent_renders.load(Ordering::SeqCst)
    }

    /// Fulfillments of requests outside the relayed routes.
    pub(crate) fn rejected_fulfillments(&self) -> Vec<Fulfillment> {
        self.fetches
            .lock()
            .iter()
            .filter(|(url, _)| url.starts_with("https://") || url.ends_with(".ico"))
            .map(|(_, f)| f.clone())
            .collect()
    }

    async fn fetch(&self, request: InterceptedRequest) -> Fulfillment {
        let interceptor = self.interceptor.lock().clone();
        let url = request.url.clone();
        // A page without routes would hit the network; model that as a 404.
        let fulfillment = match interceptor {
            Some(interceptor) => interceptor.intercept(request).await,
            None => Fulfillment::not_found(),
        };
        self.fetches.lock().push((url, fulfillment.clone()));
        fulfillment
    }
}

#[async_trait]
impl PageHandle for StubPage {
    async fn install_interceptor(&self, interceptor: Arc<dyn RequestInterceptor>) -> Result<()> {
        *self.interceptor.lock() = Some(interceptor);
        Ok(())
    }

    async fn goto(
        &self,
        url: &str,
        _wait_until: LoadState,
        _timeout: Duration,
    ) -> Result<Option<NavigationResponse>> {
        self.interceptor_at_goto
            .store(self.interceptor.lock().is_some(), Ordering::SeqCst);

        let document = self
            .fetch(InterceptedRequest::get(url).with_resource_type("Document"))
            .await;

        if document.is_success() {
            for asset in [
                format!("{STUB_ORIGIN}/mermaid.min.js"),
                format!("{STUB_ORIGIN}/js/render.mjs"),
                format!("{STUB_ORIGIN}/favicon.ico"),
                FOREIGN_SCRIPT.to_string(),
            ] {
                self.fetch(InterceptedRequest::get(asset).with_resource_type("Script"))
                    .await;
            }
        }

        if self.behavior.no_navigation_response {
            return Ok(None);
        }
        Ok(Some(NavigationResponse {
            url: url.to_string(),
            status: document.status,
        }))
    }

    async fn wait_for_load_state(&self, _state: LoadState, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    async fn evaluate(&self, _expression: &str) -> Result<Value> {
        let polls = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        let ready = self.behavior.ready_after_polls.is_some_and(|n| polls >= n);
        Ok(Value::Bool(ready))
    }

    async fn call_function(&self, _function: &str, arg: &Value) -> Result<Value> {
        let active = self.active_renders.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent_renders.fetch_max(active, Ordering::SeqCst);

        if !self.behavior.render_delay.is_zero() {
            tokio::time::sleep(self.behavior.render_delay).await;
        }
        self.active_renders.fetch_sub(1, Ordering::SeqCst);

        let markup = arg
            .as_str()
            .ok_or_else(|| Error::script_error("renderDiagram expects a string"))?;
        *self.rendered.lock() = Some(markup.to_string());

        if let Some(output) = &self.behavior.render_output {
            return Ok(output.clone());
        }
        Ok(Value::String(format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" data-fingerprint="{:016x}"><text>{}</text></svg>"#,
            fingerprint(markup),
            markup.len()
        )))
    }

    async fn element_box(&self, _selector: &str) -> Result<Option<ElementBox>> {
        if self.behavior.missing_container {
            return Ok(None);
        }
        let rendered = self.rendered.lock().clone();
        Ok(rendered.map(|markup| ElementBox {
            x: 8.0,
            y: 8.0,
            width: 40.0 + (fingerprint(&markup) % 40) as f64,
            height: 24.0,
            scale: 1.0,
        }))
    }

    async fn screenshot_clip(&self, clip: &ElementBox) -> Result<Vec<u8>> {
        let seed = self
            .rendered
            .lock()
            .as_deref()
            .map(fingerprint)
            .unwrap_or_default();
        let [r, g, b, ..] = seed.to_le_bytes();
        let image = RgbaImage::from_pixel(
            (clip.width * clip.scale) as u32,
            (clip.height * clip.scale) as u32,
            Rgba([r, g, b, 255]),
        );

        let mut png = Vec::new();
        DynamicImage::ImageRgba8(image)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| Error::script_error(e.to_string()))?;
        Ok(png)
    }
}

// ============================================================================
// StubRelayFactory
// ============================================================================

/// In-memory server for the virtual origin.
#[derive(Default)]
pub(crate) struct StubRelayFactory {
    seen: Arc<Mutex<Vec<String>>>,
    bootstrap_status: Option<u16>,
    unreachable: bool,
}

impl StubRelayFactory {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_bootstrap_status(mut self, status: u16) -> Self {
        self.bootstrap_status = Some(status);
        self
    }

    pub(crate) fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// URLs that reached the server.
    pub(crate) fn seen(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.seen)
    }
}

impl RelayClientFactory for StubRelayFactory {
    fn create_client(&self) -> Result<Box<dyn HttpRelayClient>> {
        Ok(Box::new(StubRelayClient {
            seen: Arc::clone(&self.seen),
            bootstrap_status: self.bootstrap_status.unwrap_or(200),
            unreachable: self.unreachable,
        }))
    }
}

struct StubRelayClient {
    seen: Arc<Mutex<Vec<String>>>,
    bootstrap_status: u16,
    unreachable: bool,
}

#[async_trait]
impl HttpRelayClient for StubRelayClient {
    async fn send(&self, request: RelayRequest) -> Result<RelayResponse> {
        if self.unreachable {
            return Err(Error::relay(&request.url, "Connection refused"));
        }
        self.seen.lock().push(request.url.clone());

        let (status, content_type, body) = if request.url.ends_with(".html") {
            (
                self.bootstrap_status,
                "text/html",
                "<html><body><div id=\"container\"></div></body></html>",
            )
        } else {
            (200, "application/javascript", "window.mermaid = {};")
        };

        Ok(RelayResponse {
            status,
            headers: vec![
                ("Content-Type".to_string(), content_type.to_string()),
                ("Connection".to_string(), "keep-alive".to_string()),
            ],
            body: body.as_bytes().to_vec(),
        })
    }
}
