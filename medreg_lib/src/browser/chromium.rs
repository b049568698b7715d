//! Headless Chromium backend over the DevTools protocol.
//!
//! Scripts run in an isolated world created per call for the target frame, so
//! the same code path serves the top-level document and embedded frames.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::browser::{Browser, BrowserConfig, BrowserConfigBuilder};
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, InsertTextParams,
};
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent, EventResponseReceived,
    GetResponseBodyParams, RequestId,
};
use chromiumoxide::cdp::browser_protocol::page::{
    CreateIsolatedWorldParams, FrameId, FrameTree, GetFrameTreeParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::keys;
use chromiumoxide::listeners::EventStream;
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{
    script, AutomationError, BrowserRuntime, BrowserSession, CapturedResponse, ElementHandle,
    FrameInfo, LaunchOptions, ResponseRule, RuntimeUnavailable,
};
use crate::document::Anchor;
use crate::selector::Matcher;
use crate::settings::Settings;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const CDP_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const WORLD_NAME: &str = "medreg";

static SESSION_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn protocol(e: impl std::fmt::Display) -> AutomationError {
    AutomationError::Protocol(e.to_string())
}

/// Gives `fut` at most `budget` to finish.
async fn within<T>(
    budget: Duration,
    fut: impl Future<Output = Result<T, AutomationError>>,
) -> Result<T, AutomationError> {
    match tokio::time::timeout(budget, fut).await {
        Ok(result) => result,
        Err(_) => Err(AutomationError::Timeout(budget)),
    }
}

/// Launches a local Chrome/Chromium per search call.
pub struct ChromiumRuntime {
    settings: Settings,
}

impl ChromiumRuntime {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    fn config_builder(&self, options: &LaunchOptions) -> BrowserConfigBuilder {
        let mut builder = BrowserConfig::builder()
            .request_timeout(CDP_REQUEST_TIMEOUT)
            .window_size(1366, 900)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-features=IsolateOrigins,site-per-process")
            .arg("--disable-notifications")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox")
            .arg("--mute-audio");
        if let Some(path) = &self.settings.chrome_path {
            builder = builder.chrome_executable(path.clone());
        }
        if self.settings.headful {
            builder = builder.with_head();
        }
        if let Some(lang) = &options.language {
            builder = builder.arg(format!("--lang={}", lang));
        }
        builder
    }
}

#[async_trait]
impl BrowserRuntime for ChromiumRuntime {
    fn check_available(&self) -> Result<(), RuntimeUnavailable> {
        if let Some(path) = &self.settings.chrome_path {
            if !path.exists() {
                return Err(RuntimeUnavailable {
                    detail: format!("MEDREG_CHROME_PATH points to {}, which does not exist", path.display()),
                    remediation: "Fix MEDREG_CHROME_PATH or unset it to auto-detect Chrome/Chromium."
                        .to_string(),
                });
            }
        }
        self.config_builder(&LaunchOptions::default())
            .build()
            .map(|_| ())
            .map_err(|e| RuntimeUnavailable {
                detail: e,
                remediation: "Install Google Chrome or Chromium, or set MEDREG_CHROME_PATH to its executable."
                    .to_string(),
            })
    }

    async fn launch(
        &self,
        options: &LaunchOptions,
    ) -> Result<Box<dyn BrowserSession>, AutomationError> {
        let user_data_dir = std::env::temp_dir().join(format!(
            "medreg_chrome_{}_{}",
            std::process::id(),
            SESSION_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::create_dir_all(&user_data_dir).map_err(|e| {
            AutomationError::Launch(format!("cannot create {}: {}", user_data_dir.display(), e))
        })?;

        let config = self
            .config_builder(options)
            .user_data_dir(user_data_dir.clone())
            .build()
            .map_err(AutomationError::Launch)?;

        info!("Launching headless browser");
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AutomationError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {:?}", e);
                }
            }
        });

        let mut session = ChromiumSession {
            browser,
            handler,
            page: None,
            user_data_dir: Some(user_data_dir),
            capture: None,
            next_handle: 0,
            step_timeout: options.step_timeout,
            closed: false,
        };
        let page = session
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| AutomationError::Launch(e.to_string()))?;
        session.page = Some(page);
        Ok(Box::new(session))
    }
}

struct ResponseCapture {
    rule: ResponseRule,
    sent: EventStream<EventRequestWillBeSent>,
    received: EventStream<EventResponseReceived>,
    finished: EventStream<EventLoadingFinished>,
    failed: EventStream<EventLoadingFailed>,
}

struct ChromiumSession {
    browser: Browser,
    handler: JoinHandle<()>,
    page: Option<Page>,
    user_data_dir: Option<PathBuf>,
    capture: Option<ResponseCapture>,
    next_handle: usize,
    step_timeout: Duration,
    closed: bool,
}

impl ChromiumSession {
    fn page(&self) -> Result<&Page, AutomationError> {
        self.page
            .as_ref()
            .ok_or_else(|| AutomationError::Protocol("page is not open".to_string()))
    }

    /// Runs `expression` in an isolated world of `frame_id`, both round-trips
    /// together bounded by `budget`.
    async fn evaluate(
        &self,
        frame_id: &str,
        expression: String,
        budget: Duration,
    ) -> Result<Value, AutomationError> {
        within(budget, self.evaluate_unbounded(frame_id, expression)).await
    }

    async fn evaluate_unbounded(
        &self,
        frame_id: &str,
        expression: String,
    ) -> Result<Value, AutomationError> {
        let page = self.page()?;
        let world = CreateIsolatedWorldParams::builder()
            .frame_id(FrameId::new(frame_id))
            .world_name(WORLD_NAME)
            .build()
            .map_err(AutomationError::Protocol)?;
        let context = page.execute(world).await.map_err(protocol)?;

        let params = EvaluateParams::builder()
            .expression(expression)
            .context_id(context.result.execution_context_id.clone())
            .return_by_value(true)
            .await_promise(true)
            .build()
            .map_err(AutomationError::Protocol)?;
        let evaluated = page.execute(params).await.map_err(protocol)?;
        if let Some(ex) = &evaluated.result.exception_details {
            return Err(AutomationError::Protocol(ex.text.clone()));
        }
        Ok(evaluated.result.result.value.clone().unwrap_or(Value::Null))
    }

    async fn run_on(&self, element: &ElementHandle, js: String) -> Result<(), AutomationError> {
        match self.evaluate(&element.frame_id, js, self.step_timeout).await? {
            Value::Bool(true) => Ok(()),
            _ => Err(AutomationError::Protocol(format!(
                "element {} is no longer attached",
                element.token
            ))),
        }
    }

    async fn dispatch_key(&self, key: &str) -> Result<(), AutomationError> {
        let page = self.page()?;
        let definition = keys::get_key_definition(key)
            .ok_or_else(|| AutomationError::Protocol(format!("unsupported key '{}'", key)))?;

        let mut cmd = DispatchKeyEventParams::builder()
            .key(definition.key)
            .code(definition.code)
            .windows_virtual_key_code(definition.key_code)
            .native_virtual_key_code(definition.key_code);
        let down_type = match definition.text {
            Some(text) => {
                cmd = cmd.text(text);
                DispatchKeyEventType::KeyDown
            }
            None => DispatchKeyEventType::RawKeyDown,
        };

        let down = cmd
            .clone()
            .r#type(down_type)
            .build()
            .map_err(AutomationError::Protocol)?;
        page.execute(down).await.map_err(protocol)?;
        let up = cmd
            .r#type(DispatchKeyEventType::KeyUp)
            .build()
            .map_err(AutomationError::Protocol)?;
        page.execute(up).await.map_err(protocol)?;
        Ok(())
    }

    async fn response_body(&self, request_id: &str) -> Result<String, AutomationError> {
        let page = self.page()?;
        let resp = within(self.step_timeout, async {
            page.execute(GetResponseBodyParams::new(RequestId::new(request_id)))
                .await
                .map_err(protocol)
        })
        .await?;
        if resp.result.base64_encoded {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(resp.result.body.as_bytes())
                .map_err(protocol)?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        } else {
            Ok(resp.result.body.clone())
        }
    }

    fn cleanup_temp_dir(&mut self) {
        if let Some(path) = self.user_data_dir.take() {
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!(
                    "Failed to clean up browser profile {}: {}. Manual cleanup may be required.",
                    path.display(),
                    e
                );
            }
        }
    }
}

fn flatten_frames(tree: &FrameTree, out: &mut Vec<FrameInfo>, is_main: bool) {
    out.push(FrameInfo {
        id: tree.frame.id.inner().clone(),
        url: tree.frame.url.clone(),
        name: tree.frame.name.clone().unwrap_or_default(),
        is_main,
    });
    for child in tree.child_frames.iter().flatten() {
        flatten_frames(child, out, false);
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), AutomationError> {
        let page = self.page()?;
        debug!("Navigating to {}", url);
        match tokio::time::timeout(timeout, page.goto(url)).await {
            Err(_) => Err(AutomationError::Timeout(timeout)),
            Ok(Err(e)) => Err(AutomationError::Navigation(e.to_string())),
            Ok(Ok(_)) => Ok(()),
        }
    }

    async fn frames(&mut self) -> Result<Vec<FrameInfo>, AutomationError> {
        let page = self.page()?;
        let tree = within(self.step_timeout, async {
            page.execute(GetFrameTreeParams::default())
                .await
                .map_err(protocol)
        })
        .await?;
        let mut frames = Vec::new();
        flatten_frames(&tree.result.frame_tree, &mut frames, true);
        Ok(frames)
    }

    async fn find(
        &mut self,
        frame: &FrameInfo,
        matcher: &Matcher,
        wait: Duration,
    ) -> Result<Option<ElementHandle>, AutomationError> {
        self.next_handle += 1;
        let token = format!("h{}", self.next_handle);
        let js = script::find(matcher, &token);
        let deadline = Instant::now() + wait;
        loop {
            // One attempt always gets at least a poll interval, even when the
            // wait is already spent.
            let budget = deadline
                .saturating_duration_since(Instant::now())
                .max(POLL_INTERVAL);
            match self.evaluate(&frame.id, js.clone(), budget).await {
                Ok(Value::Bool(true)) => {
                    return Ok(Some(ElementHandle {
                        frame_id: frame.id.clone(),
                        token,
                    }))
                }
                Ok(_) => {}
                // Contexts are torn down mid-navigation; keep polling.
                Err(e) => debug!("find {} in frame {}: {}", matcher, frame.id, e),
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn fill(&mut self, element: &ElementHandle, text: &str) -> Result<(), AutomationError> {
        self.run_on(element, script::focus_and_clear(&element.token))
            .await?;
        let insert = match self.page() {
            Ok(page) => {
                within(self.step_timeout, async {
                    page.execute(InsertTextParams::new(text))
                        .await
                        .map(|_| ())
                        .map_err(protocol)
                })
                .await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = insert {
            debug!("insertText failed ({}), setting value directly", e);
            self.run_on(element, script::set_value(&element.token, text))
                .await?;
        }
        Ok(())
    }

    async fn click(&mut self, element: &ElementHandle) -> Result<(), AutomationError> {
        self.run_on(element, script::click(&element.token)).await
    }

    async fn press(&mut self, element: &ElementHandle, key: &str) -> Result<(), AutomationError> {
        self.run_on(element, script::focus(&element.token)).await?;
        match within(self.step_timeout, self.dispatch_key(key)).await {
            Ok(()) => Ok(()),
            Err(e) if key == "Enter" => {
                debug!("key dispatch failed ({}), submitting enclosing form", e);
                self.run_on(element, script::submit_form(&element.token))
                    .await
            }
            Err(e) => Err(e),
        }
    }

    async fn capture_responses(&mut self, rule: &ResponseRule) -> Result<(), AutomationError> {
        let page = self.page()?;
        let capture = within(self.step_timeout, async {
            Ok::<_, AutomationError>(ResponseCapture {
                rule: rule.clone(),
                sent: page.event_listener::<EventRequestWillBeSent>().await.map_err(protocol)?,
                received: page.event_listener::<EventResponseReceived>().await.map_err(protocol)?,
                finished: page.event_listener::<EventLoadingFinished>().await.map_err(protocol)?,
                failed: page.event_listener::<EventLoadingFailed>().await.map_err(protocol)?,
            })
        })
        .await?;
        self.capture = Some(capture);
        Ok(())
    }

    async fn next_response(&mut self, wait: Duration) -> Result<CapturedResponse, AutomationError> {
        let mut capture = self.capture.take().ok_or_else(|| {
            AutomationError::Protocol("response capture was not armed".to_string())
        })?;

        let waited = tokio::time::timeout(wait, async {
            let mut pending: HashMap<String, String> = HashMap::new();
            let mut statuses: HashMap<String, u16> = HashMap::new();
            let mut seen: HashSet<String> = HashSet::new();
            loop {
                tokio::select! {
                    Some(ev) = capture.sent.next() => {
                        if capture.rule.matches(&ev.request.url, &ev.request.method) {
                            let id = ev.request_id.inner().clone();
                            debug!("Observed {} {}", ev.request.method, ev.request.url);
                            if seen.insert(id.clone()) {
                                pending.insert(id, ev.request.url.clone());
                            }
                        }
                    }
                    Some(ev) = capture.received.next() => {
                        let id = ev.request_id.inner();
                        if pending.contains_key(id) {
                            statuses.insert(id.clone(), ev.response.status as u16);
                        }
                    }
                    Some(ev) = capture.finished.next() => {
                        let id = ev.request_id.inner();
                        if let Some(url) = pending.remove(id) {
                            let status = statuses.get(id).copied().unwrap_or(200);
                            return Ok((id.clone(), url, status));
                        }
                    }
                    Some(ev) = capture.failed.next() => {
                        if let Some(url) = pending.remove(ev.request_id.inner()) {
                            return Err(AutomationError::Protocol(format!(
                                "request to {} failed: {}", url, ev.error_text
                            )));
                        }
                    }
                    else => {
                        return Err(AutomationError::Protocol(
                            "network event streams closed".to_string(),
                        ));
                    }
                }
            }
        })
        .await;

        let (request_id, url, status) = match waited {
            Err(_) => return Err(AutomationError::Timeout(wait)),
            Ok(result) => result?,
        };
        let body = self.response_body(&request_id).await?;
        Ok(CapturedResponse { url, status, body })
    }

    async fn anchors(&mut self, frame: &FrameInfo) -> Result<Vec<Anchor>, AutomationError> {
        let value = self
            .evaluate(&frame.id, script::anchors(), self.step_timeout)
            .await?;
        let items = value.as_array().cloned().unwrap_or_default();
        Ok(items
            .iter()
            .map(|item| {
                Anchor::new(
                    item.get("text").and_then(Value::as_str).unwrap_or_default(),
                    item.get("href").and_then(Value::as_str).unwrap_or_default(),
                )
            })
            .collect())
    }

    async fn current_url(&mut self, frame: &FrameInfo) -> Result<String, AutomationError> {
        match self
            .evaluate(&frame.id, script::location().to_string(), self.step_timeout)
            .await?
        {
            Value::String(url) => Ok(url),
            other => Err(AutomationError::Protocol(format!(
                "unexpected location value: {}",
                other
            ))),
        }
    }

    async fn pause(&mut self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn close(&mut self) -> Result<(), AutomationError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.capture = None;
        self.page = None;
        let budget = self.step_timeout;
        let browser = &mut self.browser;
        let shutdown = within(budget, async {
            browser.close().await.map_err(protocol)?;
            if let Err(e) = browser.wait().await {
                warn!("Browser process did not exit cleanly: {}", e);
            }
            Ok::<(), AutomationError>(())
        })
        .await;
        self.handler.abort();
        match &shutdown {
            Ok(()) => {
                self.cleanup_temp_dir();
                info!("Browser session closed");
            }
            // The process is killed when the session is dropped; the profile
            // goes with it.
            Err(e) => warn!("Browser did not shut down cleanly: {}", e),
        }
        shutdown
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        // Browser's own drop kills the child process if close() never ran.
        self.handler.abort();
        if self.user_data_dir.is_some() {
            debug!("Removing browser profile in Drop");
            self.cleanup_temp_dir();
        }
    }
}
