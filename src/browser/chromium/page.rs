//! Chromium page driven over a flat DevTools session.
//!
//! Each [`ChromiumPage`] owns one attached target and a background task that
//! consumes the session's events:
//!
//! | Event | Handling |
//! |-------|----------|
//! | `Page.lifecycleEvent` | Updates the main frame's lifecycle snapshot |
//! | `Network.responseReceived` | Records main-frame document responses per loader |
//! | `Fetch.requestPaused` | Runs the interceptor, always fulfills |
//! | `Runtime.consoleAPICalled` | Forwarded to `tracing` |
//! | `Runtime.exceptionThrown` | Forwarded to `tracing` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, trace, warn};

use crate::browser::network::{Fulfillment, InterceptedRequest, RequestInterceptor};
use crate::browser::screenshot::crop_png;
use crate::browser::{ElementBox, LoadState, NavigationResponse, PageHandle, call_expression};
use crate::error::{Error, Result};
use crate::identifiers::{CdpSessionId, FrameId, InterceptId, TargetId};
use crate::protocol::{
    Command, Event, FetchCommand, HeaderEntry, NetworkCommand, PageCommand, ParsedEvent,
    RequestPattern, RuntimeCommand,
};
use crate::transport::Connection;

// ============================================================================
// Types
// ============================================================================

/// Lifecycle milestones reached by the current main-frame document.
#[derive(Debug, Clone, Default)]
struct LifecycleSnapshot {
    /// Loader of the current document.
    loader_id: String,
    /// Milestone names seen for that loader.
    events: FxHashSet<String>,
}

impl LifecycleSnapshot {
    fn reached(&self, name: &str) -> bool {
        self.events.contains(name)
    }
}

/// State shared between the page handle and its event task.
struct PageState {
    /// Main frame of the page.
    main_frame: FrameId,
    /// Lifecycle of the current main-frame document.
    lifecycle: watch::Sender<LifecycleSnapshot>,
    /// Main-frame document responses keyed by loader id.
    documents: Mutex<FxHashMap<String, NavigationResponse>>,
    /// Installed interceptor.
    interceptor: RwLock<Option<Arc<dyn RequestInterceptor>>>,
}

// ============================================================================
// ChromiumPage
// ============================================================================

/// A page attached through a flat DevTools session.
pub struct ChromiumPage {
    /// Shared browser connection.
    connection: Connection,
    /// Target backing this page.
    target_id: TargetId,
    /// Flat session id for this page's commands.
    session_id: CdpSessionId,
    /// State shared with the event task.
    state: Arc<PageState>,
}

// ============================================================================
// ChromiumPage - Display
// ============================================================================

impl fmt::Debug for ChromiumPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChromiumPage")
            .field("target_id", &self.target_id)
            .field("session_id", &self.session_id)
            .field("main_frame", &self.state.main_frame)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ChromiumPage - Constructor
// ============================================================================

impl ChromiumPage {
    /// Wires up an attached session: starts the event task and enables the
    /// `Page`, `Network` and `Runtime` domains.
    ///
    /// # Errors
    ///
    /// Returns an error if any domain cannot be enabled.
    pub(crate) async fn attach(
        connection: Connection,
        target_id: TargetId,
        session_id: CdpSessionId,
    ) -> Result<Self> {
        // Subscribe before enabling anything so no event is missed.
        let events = connection.subscribe();

        connection
            .execute(Some(&session_id), Command::Page(PageCommand::Enable))
            .await?;
        connection
            .execute(
                Some(&session_id),
                Command::Page(PageCommand::SetLifecycleEventsEnabled { enabled: true }),
            )
            .await?;

        let frame_tree = connection
            .execute(Some(&session_id), Command::Page(PageCommand::GetFrameTree))
            .await?;
        let main_frame = frame_tree
            .pointer("/frameTree/frame/id")
            .and_then(Value::as_str)
            .map(FrameId::new)
            .ok_or_else(|| Error::protocol("Page.getFrameTree returned no main frame"))?;

        let (lifecycle, _) = watch::channel(LifecycleSnapshot::default());
        let state = Arc::new(PageState {
            main_frame,
            lifecycle,
            documents: Mutex::new(FxHashMap::default()),
            interceptor: RwLock::new(None),
        });

        tokio::spawn(run_event_task(
            connection.clone(),
            session_id.clone(),
            Arc::clone(&state),
            events,
        ));

        connection
            .execute(Some(&session_id), Command::Network(NetworkCommand::Enable))
            .await?;
        connection
            .execute(Some(&session_id), Command::Runtime(RuntimeCommand::Enable))
            .await?;

        debug!(target_id = %target_id, session_id = %session_id, "Page attached");

        Ok(Self {
            connection,
            target_id,
            session_id,
            state,
        })
    }
}

// ============================================================================
// ChromiumPage - Accessors
// ============================================================================

impl ChromiumPage {
    /// Returns the target id.
    #[inline]
    #[must_use]
    pub fn target_id(&self) -> &TargetId {
        &self.target_id
    }

    /// Returns the DevTools session id.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> &CdpSessionId {
        &self.session_id
    }
}

// ============================================================================
// ChromiumPage - Internal
// ============================================================================

impl ChromiumPage {
    /// Sends a command on this page's session.
    async fn execute(&self, command: Command) -> Result<Value> {
        self.connection.execute(Some(&self.session_id), command).await
    }

    /// Waits until the lifecycle snapshot satisfies `predicate` or `deadline`
    /// passes. `limit` is the budget reported on timeout.
    async fn wait_lifecycle(
        &self,
        operation: String,
        deadline: Instant,
        limit: Duration,
        predicate: impl FnMut(&LifecycleSnapshot) -> bool,
    ) -> Result<()> {
        let mut rx = self.state.lifecycle.subscribe();
        match timeout_at(deadline, rx.wait_for(predicate)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => Err(Error::timeout(operation, limit.as_millis() as u64)),
        }
    }
}

// ============================================================================
// ChromiumPage - PageHandle
// ============================================================================

#[async_trait]
impl PageHandle for ChromiumPage {
    async fn install_interceptor(&self, interceptor: Arc<dyn RequestInterceptor>) -> Result<()> {
        *self.state.interceptor.write() = Some(interceptor);

        self.execute(Command::Fetch(FetchCommand::Enable {
            patterns: vec![RequestPattern::all_requests()],
        }))
        .await?;

        debug!(session_id = %self.session_id, "Request interception enabled");
        Ok(())
    }

    async fn goto(
        &self,
        url: &str,
        wait_until: LoadState,
        limit: Duration,
    ) -> Result<Option<NavigationResponse>> {
        debug!(url = %url, session_id = %self.session_id, "Navigating");

        // One budget covers both the navigate command and the lifecycle wait.
        let deadline = Instant::now() + limit;
        let result = timeout_at(
            deadline,
            self.execute(Command::Page(PageCommand::Navigate {
                url: url.to_string(),
            })),
        )
        .await
        .map_err(|_| Error::timeout(format!("navigation to {url}"), limit.as_millis() as u64))??;

        if let Some(error_text) = result.get("errorText").and_then(Value::as_str)
            && !error_text.is_empty()
        {
            return Err(Error::navigation_failed(url, error_text));
        }

        let Some(loader_id) = result.get("loaderId").and_then(Value::as_str) else {
            // Same-document navigation: no new document, no response.
            return Ok(None);
        };
        let loader_id = loader_id.to_string();

        let name = wait_until.event_name();
        self.wait_lifecycle(
            format!("{name} after navigating to {url}"),
            deadline,
            limit,
            |s| s.loader_id == loader_id && s.reached(name),
        )
        .await?;

        let response = self.state.documents.lock().remove(&loader_id);
        debug!(url = %url, status = ?response.as_ref().map(|r| r.status), "Navigation settled");
        Ok(response)
    }

    async fn wait_for_load_state(&self, state: LoadState, limit: Duration) -> Result<()> {
        let name = state.event_name();
        self.wait_lifecycle(
            format!("load state {name}"),
            Instant::now() + limit,
            limit,
            |s| s.reached(name),
        )
        .await
    }

    async fn evaluate(&self, expression: &str) -> Result<Value> {
        let result = self
            .execute(Command::Runtime(RuntimeCommand::Evaluate {
                expression: expression.to_string(),
                return_by_value: true,
                await_promise: true,
            }))
            .await?;

        if let Some(details) = result.get("exceptionDetails") {
            let message = details
                .pointer("/exception/description")
                .and_then(Value::as_str)
                .or_else(|| details.get("text").and_then(Value::as_str))
                .unwrap_or("Uncaught exception");
            return Err(Error::script_error(message));
        }

        Ok(result
            .pointer("/result/value")
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn call_function(&self, function: &str, arg: &Value) -> Result<Value> {
        self.evaluate(&call_expression(function, arg)?).await
    }

    async fn element_box(&self, selector: &str) -> Result<Option<ElementBox>> {
        let selector_json = serde_json::to_string(selector)?;
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({selector_json});
                if (!el) return null;
                const r = el.getBoundingClientRect();
                return {{
                    x: r.left + window.scrollX,
                    y: r.top + window.scrollY,
                    width: r.width,
                    height: r.height,
                    scale: window.devicePixelRatio || 1
                }};
            }})()"#
        );

        let value = self.evaluate(&script).await?;
        if value.is_null() {
            return Ok(None);
        }

        let field = |key: &str| value.get(key).and_then(Value::as_f64).unwrap_or(0.0);
        Ok(Some(ElementBox {
            x: field("x"),
            y: field("y"),
            width: field("width"),
            height: field("height"),
            scale: field("scale"),
        }))
    }

    async fn screenshot_clip(&self, clip: &ElementBox) -> Result<Vec<u8>> {
        let result = self
            .execute(Command::Page(PageCommand::CaptureScreenshot {
                format: "png".to_string(),
                capture_beyond_viewport: true,
                from_surface: true,
            }))
            .await?;

        let data = result
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::script_error("Screenshot response missing data field"))?;

        let full_page = Base64Standard
            .decode(data)
            .map_err(|e| Error::script_error(format!("Failed to decode base64: {e}")))?;

        crop_png(&full_page, clip)
    }
}

// ============================================================================
// Event Task
// ============================================================================

/// Consumes session events until the connection closes or the target detaches.
async fn run_event_task(
    connection: Connection,
    session_id: CdpSessionId,
    state: Arc<PageState>,
    mut events: mpsc::UnboundedReceiver<Event>,
) {
    while let Some(event) = events.recv().await {
        let parsed = event.parse();

        // Detach notifications arrive on the browser session.
        if let ParsedEvent::Detached { session_id: detached } = &parsed
            && *detached == session_id
        {
            debug!(session_id = %session_id, "Target detached");
            break;
        }

        if !event.is_for(&session_id) {
            continue;
        }

        match parsed {
            ParsedEvent::Lifecycle {
                frame_id,
                loader_id,
                name,
            } => {
                if frame_id != state.main_frame {
                    continue;
                }
                trace!(loader_id = %loader_id, name = %name, "Lifecycle event");
                if state.lifecycle.borrow().loader_id != loader_id {
                    // A new document committed: older responses can no longer be claimed.
                    state.documents.lock().retain(|loader, _| *loader == loader_id);
                }
                state.lifecycle.send_modify(|snapshot| {
                    if snapshot.loader_id != loader_id {
                        snapshot.loader_id = loader_id;
                        snapshot.events.clear();
                    }
                    if name != "init" {
                        snapshot.events.insert(name);
                    }
                });
            }

            ParsedEvent::ResponseReceived {
                frame_id,
                loader_id,
                resource_type,
                url,
                status,
            } => {
                if resource_type == "Document" && frame_id == state.main_frame {
                    state
                        .documents
                        .lock()
                        .insert(loader_id, NavigationResponse { url, status });
                }
            }

            ParsedEvent::RequestPaused {
                request_id,
                url,
                method,
                headers,
                post_data,
                resource_type,
            } => {
                let request = InterceptedRequest {
                    url,
                    method,
                    headers,
                    body: post_data.map(String::into_bytes),
                    resource_type,
                };
                let interceptor = state.interceptor.read().clone();
                tokio::spawn(answer_paused_request(
                    connection.clone(),
                    session_id.clone(),
                    request_id,
                    request,
                    interceptor,
                ));
            }

            ParsedEvent::Console { level, text } => match level.as_str() {
                "error" | "warning" | "assert" => warn!(level = %level, "Page console: {text}"),
                _ => debug!(level = %level, "Page console: {text}"),
            },

            ParsedEvent::Exception { text } => {
                warn!(session_id = %session_id, "Uncaught page exception: {text}");
            }

            ParsedEvent::Detached { .. } | ParsedEvent::Unknown { .. } => {}
        }
    }

    debug!(session_id = %session_id, "Page event task finished");
}

/// Runs the interceptor for one paused request and fulfills it.
///
/// The interceptor runs in its own task so that a panic still produces a
/// response.
async fn answer_paused_request(
    connection: Connection,
    session_id: CdpSessionId,
    request_id: InterceptId,
    request: InterceptedRequest,
    interceptor: Option<Arc<dyn RequestInterceptor>>,
) {
    let url = request.url.clone();

    let fulfillment = match interceptor {
        Some(interceptor) => {
            match tokio::spawn(async move { interceptor.intercept(request).await }).await {
                Ok(fulfillment) => fulfillment,
                Err(e) => {
                    warn!(url = %url, error = %e, "Interceptor task failed");
                    Fulfillment::error(500, "request interceptor failed")
                }
            }
        }
        None => Fulfillment::not_found(),
    };

    trace!(url = %url, status = fulfillment.status, "Fulfilling paused request");

    let command = Command::Fetch(FetchCommand::FulfillRequest {
        request_id,
        response_code: fulfillment.status,
        response_headers: fulfillment
            .headers
            .into_iter()
            .map(|(name, value)| HeaderEntry { name, value })
            .collect(),
        body: Some(Base64Standard.encode(&fulfillment.body)),
    });

    if let Err(e) = connection.execute(Some(&session_id), command).await {
        warn!(url = %url, error = %e, "Failed to fulfill paused request");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use futures_util::{SinkExt, StreamExt};
    use serde_json::json;
    use tokio::net::TcpListener;
    use tokio::time::sleep;
    use tokio_tungstenite::tungstenite::Message;

    const SESSION: &str = "S";
    const MAIN_FRAME: &str = "F";
    const BOOTSTRAP: &str = "http://mermaid.localhost/index.html";

    /// Fake DevTools endpoint serving one page session.
    ///
    /// `Page.navigate` answers after `navigate_delay` with loader `L1` and then
    /// replays `after_navigate`. Every `Fetch.fulfillRequest` is forwarded to
    /// the returned receiver.
    struct FakeDevTools {
        url: String,
        push: mpsc::UnboundedSender<Value>,
        fulfilled: mpsc::UnboundedReceiver<Value>,
    }

    impl FakeDevTools {
        async fn start(navigate_delay: Duration, after_navigate: Vec<Value>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
            let addr = listener.local_addr().expect("addr");
            let (push, mut push_rx) = mpsc::unbounded_channel::<Value>();
            let (fulfilled_tx, fulfilled) = mpsc::unbounded_channel();

            tokio::spawn(async move {
                let (stream, _) = listener.accept().await.expect("accept");
                let mut ws = tokio_tungstenite::accept_async(stream)
                    .await
                    .expect("handshake");

                loop {
                    tokio::select! {
                        incoming = ws.next() => {
                            let Some(Ok(Message::Text(text))) = incoming else { break };
                            let request: Value = serde_json::from_str(&text).expect("json");
                            let result = match request["method"].as_str().unwrap_or_default() {
                                "Page.getFrameTree" => {
                                    json!({"frameTree": {"frame": {"id": MAIN_FRAME}}})
                                }
                                "Page.navigate" => {
                                    sleep(navigate_delay).await;
                                    json!({"frameId": MAIN_FRAME, "loaderId": "L1"})
                                }
                                "Fetch.fulfillRequest" => {
                                    let _ = fulfilled_tx.send(request["params"].clone());
                                    json!({})
                                }
                                _ => json!({}),
                            };
                            let reply = json!({"id": request["id"], "result": result});
                            ws.send(Message::Text(reply.to_string().into())).await.expect("reply");

                            if request["method"] == "Page.navigate" {
                                for event in &after_navigate {
                                    ws.send(Message::Text(event.to_string().into()))
                                        .await
                                        .expect("event");
                                }
                            }
                        }
                        Some(event) = push_rx.recv() => {
                            ws.send(Message::Text(event.to_string().into())).await.expect("push");
                        }
                    }
                }
            });

            Self {
                url: format!("ws://{addr}"),
                push,
                fulfilled,
            }
        }

        async fn attach(&self) -> ChromiumPage {
            let connection = Connection::connect(&self.url).await.expect("connect");
            ChromiumPage::attach(connection, TargetId::new("T"), CdpSessionId::new(SESSION))
                .await
                .expect("attach")
        }

        fn pause(&self, request_id: &str) {
            let event = json!({
                "method": "Fetch.requestPaused",
                "sessionId": SESSION,
                "params": {
                    "requestId": request_id,
                    "resourceType": "Document",
                    "request": {"url": BOOTSTRAP, "method": "GET", "headers": {}}
                }
            });
            self.push.send(event).expect("push");
        }

        async fn next_fulfillment(&mut self) -> Value {
            timeout_at(Instant::now() + Duration::from_secs(5), self.fulfilled.recv())
                .await
                .expect("fulfillment in time")
                .expect("server alive")
        }

        async fn assert_no_more_fulfillments(&mut self) {
            let extra = timeout_at(
                Instant::now() + Duration::from_millis(150),
                self.fulfilled.recv(),
            )
            .await;
            assert!(extra.is_err(), "unexpected fulfillment: {extra:?}");
        }
    }

    fn session_event(method: &str, params: Value) -> Value {
        json!({"method": method, "sessionId": SESSION, "params": params})
    }

    fn document_response(frame_id: &str, loader_id: &str, status: u16) -> Value {
        session_event(
            "Network.responseReceived",
            json!({
                "frameId": frame_id,
                "loaderId": loader_id,
                "type": "Document",
                "response": {"url": BOOTSTRAP, "status": status}
            }),
        )
    }

    fn lifecycle(loader_id: &str, name: &str) -> Value {
        session_event(
            "Page.lifecycleEvent",
            json!({"frameId": MAIN_FRAME, "loaderId": loader_id, "name": name}),
        )
    }

    struct StatusInterceptor(u16);

    #[async_trait]
    impl RequestInterceptor for StatusInterceptor {
        async fn intercept(&self, _request: InterceptedRequest) -> Fulfillment {
            Fulfillment::new(self.0, b"ok".to_vec())
        }
    }

    struct PanickingInterceptor;

    #[async_trait]
    impl RequestInterceptor for PanickingInterceptor {
        async fn intercept(&self, request: InterceptedRequest) -> Fulfillment {
            panic!("interceptor exploded on {}", request.url);
        }
    }

    #[test]
    fn test_lifecycle_snapshot_reached() {
        let mut snapshot = LifecycleSnapshot::default();
        assert!(!snapshot.reached("load"));
        snapshot.events.insert("load".to_string());
        assert!(snapshot.reached("load"));
    }

    #[test]
    fn test_page_is_debug() {
        fn assert_debug<T: std::fmt::Debug>() {}
        assert_debug::<ChromiumPage>();
    }

    #[test]
    fn test_page_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ChromiumPage>();
    }

    #[tokio::test]
    async fn test_each_paused_request_is_fulfilled_once_by_interceptor() {
        let mut devtools = FakeDevTools::start(Duration::ZERO, Vec::new()).await;
        let page = devtools.attach().await;
        page.install_interceptor(Arc::new(StatusInterceptor(201)))
            .await
            .expect("install");

        devtools.pause("R1");
        devtools.pause("R2");

        let mut answered = Vec::new();
        for _ in 0..2 {
            let params = devtools.next_fulfillment().await;
            assert_eq!(params["responseCode"], 201);
            assert_eq!(params["body"], Base64Standard.encode(b"ok"));
            answered.push(params["requestId"].as_str().unwrap_or_default().to_string());
        }
        answered.sort();
        assert_eq!(answered, ["R1", "R2"]);
        devtools.assert_no_more_fulfillments().await;
    }

    #[tokio::test]
    async fn test_panicking_interceptor_answers_500() {
        let mut devtools = FakeDevTools::start(Duration::ZERO, Vec::new()).await;
        let page = devtools.attach().await;
        page.install_interceptor(Arc::new(PanickingInterceptor))
            .await
            .expect("install");

        devtools.pause("R1");

        let params = devtools.next_fulfillment().await;
        assert_eq!(params["requestId"], "R1");
        assert_eq!(params["responseCode"], 500);
        devtools.assert_no_more_fulfillments().await;
    }

    #[tokio::test]
    async fn test_paused_request_without_interceptor_answers_404() {
        let mut devtools = FakeDevTools::start(Duration::ZERO, Vec::new()).await;
        let _page = devtools.attach().await;

        devtools.pause("R1");

        let params = devtools.next_fulfillment().await;
        assert_eq!(params["requestId"], "R1");
        assert_eq!(params["responseCode"], 404);
        assert_eq!(params["body"], "");
        devtools.assert_no_more_fulfillments().await;
    }

    #[tokio::test]
    async fn test_goto_reports_main_frame_document_only() {
        let devtools = FakeDevTools::start(
            Duration::ZERO,
            vec![
                document_response(MAIN_FRAME, "L1", 200),
                document_response("child", "L1", 404),
                document_response("child", "L-child", 200),
                lifecycle("L1", "init"),
                lifecycle("L1", "DOMContentLoaded"),
            ],
        )
        .await;
        let page = devtools.attach().await;

        let response = page
            .goto(BOOTSTRAP, LoadState::DomContentLoaded, Duration::from_secs(5))
            .await
            .expect("goto")
            .expect("document response");

        assert_eq!(response.status, 200);
        assert!(page.state.documents.lock().is_empty());
    }

    #[tokio::test]
    async fn test_new_document_discards_unclaimed_responses() {
        let devtools = FakeDevTools::start(Duration::ZERO, Vec::new()).await;
        let page = devtools.attach().await;

        devtools.push.send(document_response(MAIN_FRAME, "L0", 200)).expect("push");
        devtools.push.send(lifecycle("L0", "init")).expect("push");
        devtools.push.send(document_response(MAIN_FRAME, "L9", 200)).expect("push");
        devtools.push.send(lifecycle("L9", "init")).expect("push");

        page.wait_lifecycle(
            "loader L9".to_string(),
            Instant::now() + Duration::from_secs(5),
            Duration::from_secs(5),
            |s| s.loader_id == "L9",
        )
        .await
        .expect("lifecycle");

        let documents = page.state.documents.lock();
        assert_eq!(documents.len(), 1);
        assert!(documents.contains_key("L9"));
    }

    #[tokio::test]
    async fn test_goto_shares_one_deadline_between_navigate_and_lifecycle() {
        // Navigate eats most of the budget and the document never loads.
        let devtools = FakeDevTools::start(
            Duration::from_millis(300),
            vec![lifecycle("L1", "init")],
        )
        .await;
        let page = devtools.attach().await;

        let started = Instant::now();
        let err = page
            .goto(BOOTSTRAP, LoadState::NetworkIdle, Duration::from_millis(400))
            .await
            .err()
            .expect("document never idles");

        assert!(err.is_timeout(), "{err:?}");
        assert!(started.elapsed() < Duration::from_millis(650));
    }
}
