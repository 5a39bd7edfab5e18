//! Diagram rendering inside a ready session.
//!
//! [`DiagramRenderer`] turns markup into a [`RenderedDiagram`]: the page's
//! render function produces the SVG text and the container element is
//! screenshotted as PNG.
//!
//! # Example
//!
//! ```ignore
//! let renderer = DiagramRenderer::new();
//! let diagram = renderer.render_markup(&session, "graph TD; A-->B;").await?;
//! assert!(diagram.svg().contains("<svg"));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::io::Cursor;

use image::ImageReader;
use serde_json::Value;
use tokio::time::timeout;
use tracing::{debug, instrument};

use crate::config::RenderConfig;
use crate::error::{Error, Result};
use crate::session::{BrowserSession, SessionBuilder};

// ============================================================================
// DiagramRequest
// ============================================================================

/// Markup to render. Never blank.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiagramRequest {
    markup: String,
}

impl DiagramRequest {
    /// Creates a request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for empty or whitespace-only markup.
    pub fn new(markup: impl Into<String>) -> Result<Self> {
        let markup = markup.into();
        if markup.trim().is_empty() {
            return Err(Error::invalid_argument("Diagram markup must not be empty"));
        }
        Ok(Self { markup })
    }

    /// Returns the markup.
    #[inline]
    #[must_use]
    pub fn markup(&self) -> &str {
        &self.markup
    }
}

// ============================================================================
// RenderedDiagram
// ============================================================================

/// SVG text and PNG screenshot of one diagram.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RenderedDiagram {
    svg: String,
    png: Vec<u8>,
}

impl fmt::Debug for RenderedDiagram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderedDiagram")
            .field("svg_len", &self.svg.len())
            .field("png_len", &self.png.len())
            .finish()
    }
}

impl RenderedDiagram {
    /// Creates a result from its parts.
    #[inline]
    #[must_use]
    pub fn new(svg: impl Into<String>, png: impl Into<Vec<u8>>) -> Self {
        Self {
            svg: svg.into(),
            png: png.into(),
        }
    }

    /// Returns the SVG text.
    #[inline]
    #[must_use]
    pub fn svg(&self) -> &str {
        &self.svg
    }

    /// Returns the PNG bytes.
    #[inline]
    #[must_use]
    pub fn png(&self) -> &[u8] {
        &self.png
    }

    /// Returns the PNG's pixel dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RenderFailed`] if the bytes are not a readable image.
    pub fn png_dimensions(&self) -> Result<(u32, u32)> {
        ImageReader::with_format(Cursor::new(&self.png), image::ImageFormat::Png)
            .into_dimensions()
            .map_err(|e| Error::render_failed(format!("Unreadable PNG: {e}")))
    }
}

// ============================================================================
// DiagramRenderer
// ============================================================================

/// Renders diagrams through a session's page.
#[derive(Debug, Clone, Default)]
pub struct DiagramRenderer {
    config: RenderConfig,
}

impl DiagramRenderer {
    /// Creates a renderer with the default configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a renderer with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid.
    pub fn with_config(config: RenderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Returns the render configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Renders raw markup.
    ///
    /// # Errors
    ///
    /// See [`render`](Self::render); blank markup is an
    /// [`Error::InvalidArgument`].
    pub async fn render_markup(
        &self,
        session: &BrowserSession,
        markup: &str,
    ) -> Result<RenderedDiagram> {
        let request = DiagramRequest::new(markup)?;
        self.render(session, &request).await
    }

    /// Renders one diagram.
    ///
    /// Calls on the same session run one at a time.
    ///
    /// # Errors
    ///
    /// - [`Error::NotReady`] unless the session is `Ready`
    /// - [`Error::RenderFailed`] if the page did not produce SVG
    /// - [`Error::ElementNotFound`] if the container is missing
    /// - [`Error::Timeout`] if the render exceeds its bound
    #[instrument(level = "debug", skip_all, fields(session_id = %session.id()))]
    pub async fn render(
        &self,
        session: &BrowserSession,
        request: &DiagramRequest,
    ) -> Result<RenderedDiagram> {
        let _page_guard = session.lock_page().await;
        let page = session.ready_page()?;

        let limit = self.config.render_timeout;
        let rendering = async {
            let markup = Value::String(request.markup().to_string());
            let svg = match page.call_function(&self.config.render_function, &markup).await? {
                Value::String(svg) if svg.contains("<svg") => svg,
                Value::String(_) => {
                    return Err(Error::render_failed("Render function output has no <svg> element"));
                }
                other => {
                    return Err(Error::render_failed(format!(
                        "Render function returned {} instead of a string",
                        json_type(&other)
                    )));
                }
            };

            let selector = self.config.container_selector.as_str();
            let clip = page
                .element_box(selector)
                .await?
                .ok_or_else(|| Error::element_not_found(selector))?;
            let png = page.screenshot_clip(&clip).await?;

            Ok::<_, Error>(RenderedDiagram::new(svg, png))
        };

        let diagram = timeout(limit, rendering)
            .await
            .map_err(|_| Error::timeout("render diagram", limit.as_millis() as u64))??;

        debug!(
            svg_bytes = diagram.svg.len(),
            png_bytes = diagram.png.len(),
            "Diagram rendered"
        );
        Ok(diagram)
    }
}

// ============================================================================
// One-shot rendering
// ============================================================================

/// Creates a session, renders one diagram and disposes the session.
///
/// The session is disposed on every path, including render failures.
///
/// # Errors
///
/// Any error of [`SessionBuilder::build`] or [`DiagramRenderer::render`].
pub async fn render_once(
    builder: SessionBuilder,
    renderer: &DiagramRenderer,
    request: &DiagramRequest,
) -> Result<RenderedDiagram> {
    let session = builder.build().await?;
    let result = renderer.render(&session, request).await;
    session.dispose().await;
    result
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use crate::driver::BrowserSelection;
    use crate::error::ErrorKind;
    use crate::session::SessionState;
    use crate::testing::{StubBehavior, StubLauncher, StubRelayFactory, fast_config};

    const MARKUP: &str = "graph TD; A-->B;";

    fn builder(launcher: Arc<StubLauncher>) -> SessionBuilder {
        BrowserSession::builder()
            .launcher(launcher)
            .relay_factory(Arc::new(StubRelayFactory::new()))
            .selection(BrowserSelection::chromium())
            .config(fast_config())
    }

    async fn ready_session(behavior: StubBehavior) -> (Arc<StubLauncher>, BrowserSession) {
        let launcher = Arc::new(StubLauncher::new(behavior));
        let session = builder(Arc::clone(&launcher)).build().await.expect("session");
        (launcher, session)
    }

    #[test]
    fn test_request_rejects_blank_markup() {
        for markup in ["", "   ", "\n\t"] {
            let err = DiagramRequest::new(markup).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }
        assert_eq!(DiagramRequest::new(MARKUP).expect("request").markup(), MARKUP);
    }

    #[test]
    fn test_invalid_render_config() {
        let err = DiagramRenderer::with_config(RenderConfig::new().with_render_function(""))
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn test_end_to_end_render() {
        let (_launcher, session) = ready_session(StubBehavior::default()).await;

        let diagram = DiagramRenderer::new()
            .render_markup(&session, MARKUP)
            .await
            .expect("render");

        assert!(diagram.svg().contains("<svg"));
        assert!(!diagram.png().is_empty());
        let (width, height) = diagram.png_dimensions().expect("png");
        assert!(width > 0 && height > 0);
        session.dispose().await;
    }

    #[tokio::test]
    async fn test_identical_markup_renders_identically_across_sessions() {
        let renderer = DiagramRenderer::new();
        let (_a, first) = ready_session(StubBehavior::default()).await;
        let (_b, second) = ready_session(StubBehavior::default()).await;

        let one = renderer.render_markup(&first, MARKUP).await.expect("first");
        let two = renderer.render_markup(&second, MARKUP).await.expect("second");

        assert_eq!(one, two);
        first.dispose().await;
        second.dispose().await;
    }

    #[tokio::test]
    async fn test_render_after_dispose_is_not_ready() {
        let (_launcher, session) = ready_session(StubBehavior::default()).await;
        session.dispose().await;

        let err = DiagramRenderer::new()
            .render_markup(&session, MARKUP)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotReady { state: SessionState::Disposed }));
    }

    #[tokio::test]
    async fn test_blank_markup_rejected_before_page_access() {
        let (launcher, session) = ready_session(StubBehavior::default()).await;

        let err = DiagramRenderer::new().render_markup(&session, "  ").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(launcher.last_page().expect("page").max_concurrent_renders(), 0);
        session.dispose().await;
    }

    #[tokio::test]
    async fn test_missing_container() {
        let (_launcher, session) = ready_session(StubBehavior {
            missing_container: true,
            ..Default::default()
        })
        .await;

        let err = DiagramRenderer::new()
            .render_markup(&session, MARKUP)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ElementNotFound { .. }));
        assert!(err.is_render_failure());
        session.dispose().await;
    }

    #[tokio::test]
    async fn test_non_string_result_is_render_failure() {
        let (_launcher, session) = ready_session(StubBehavior {
            render_output: Some(json!({"svg": "<svg/>"})),
            ..Default::default()
        })
        .await;

        let err = DiagramRenderer::new()
            .render_markup(&session, MARKUP)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RenderFailed { .. }));
        assert!(err.to_string().contains("an object"));
        session.dispose().await;
    }

    #[tokio::test]
    async fn test_output_without_svg_is_render_failure() {
        let (_launcher, session) = ready_session(StubBehavior {
            render_output: Some(json!("Syntax error in graph")),
            ..Default::default()
        })
        .await;

        let err = DiagramRenderer::new()
            .render_markup(&session, MARKUP)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RenderFailed { .. }));
        session.dispose().await;
    }

    #[tokio::test]
    async fn test_render_timeout() {
        let (_launcher, session) = ready_session(StubBehavior {
            render_delay: Duration::from_secs(5),
            ..Default::default()
        })
        .await;

        let renderer = DiagramRenderer::with_config(
            RenderConfig::new().with_render_timeout(Duration::from_millis(50)),
        )
        .expect("renderer");
        let err = renderer.render_markup(&session, MARKUP).await.unwrap_err();
        assert!(err.is_timeout());
        session.dispose().await;
    }

    #[tokio::test]
    async fn test_renders_on_one_session_are_serialised() {
        let (launcher, session) = ready_session(StubBehavior {
            render_delay: Duration::from_millis(20),
            ..Default::default()
        })
        .await;
        let renderer = DiagramRenderer::new();

        let (a, b, c) = tokio::join!(
            renderer.render_markup(&session, "graph TD; A-->B;"),
            renderer.render_markup(&session, "graph TD; B-->C;"),
            renderer.render_markup(&session, "graph TD; C-->D;"),
        );

        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(launcher.last_page().expect("page").max_concurrent_renders(), 1);
        session.dispose().await;
    }

    #[tokio::test]
    async fn test_render_once_disposes_on_success() {
        let launcher = Arc::new(StubLauncher::new(StubBehavior::default()));
        let request = DiagramRequest::new(MARKUP).expect("request");

        let diagram = render_once(builder(Arc::clone(&launcher)), &DiagramRenderer::new(), &request)
            .await
            .expect("render");

        assert!(diagram.svg().contains("<svg"));
        assert_eq!(launcher.close_count(), 1);
    }

    #[tokio::test]
    async fn test_render_once_disposes_on_failure() {
        let launcher = Arc::new(StubLauncher::new(StubBehavior {
            missing_container: true,
            ..Default::default()
        }));
        let request = DiagramRequest::new(MARKUP).expect("request");

        let err = render_once(builder(Arc::clone(&launcher)), &DiagramRenderer::new(), &request)
            .await
            .unwrap_err();

        assert!(err.is_render_failure());
        assert_eq!(launcher.close_count(), 1);
        assert_eq!(launcher.drop_close_count(), 0);
    }

    #[test]
    fn test_png_dimensions_rejects_garbage() {
        let diagram = RenderedDiagram::new("<svg/>", vec![1, 2, 3]);
        assert!(diagram.png_dimensions().is_err());
    }
}
