//! Browser-automation abstraction.
//!
//! Adapters for client-rendered registries talk to a [`BrowserRuntime`] and the
//! [`BrowserSession`] it launches, never to a concrete driver. The chromium
//! backend is compiled with the `browser` feature; without it the runtime is
//! [`MissingRuntime`] and every browser search fails fast.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::document::Anchor;
use crate::selector::Matcher;
use crate::settings::Settings;

#[cfg(feature = "browser")]
mod chromium;
pub mod script;

#[cfg(feature = "browser")]
pub use chromium::ChromiumRuntime;

/// A document in the page: the top-level one or an embedded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    pub id: String,
    pub url: String,
    pub name: String,
    pub is_main: bool,
}

impl FrameInfo {
    /// True when the frame's URL or name contains any of `hints` (case-insensitive).
    pub fn matches_any(&self, hints: &[&str]) -> bool {
        let url = self.url.to_lowercase();
        let name = self.name.to_lowercase();
        hints.iter().any(|hint| {
            let hint = hint.to_lowercase();
            url.contains(&hint) || name.contains(&hint)
        })
    }
}

/// Opaque reference to an element located by [`BrowserSession::find`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    pub frame_id: String,
    pub token: String,
}

/// Which network responses count as "the search API answered".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseRule {
    pub url_prefix: String,
    pub method: &'static str,
}

impl ResponseRule {
    pub fn matches(&self, url: &str, method: &str) -> bool {
        url.starts_with(&self.url_prefix) && method.eq_ignore_ascii_case(self.method)
    }
}

/// Body of an intercepted response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedResponse {
    pub url: String,
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Preferred UI language passed to the browser.
    pub language: Option<String>,
    /// Upper bound for any single browser round-trip that has no deadline
    /// of its own (frame tree reads, clicks, link reads, shutdown).
    pub step_timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            language: None,
            step_timeout: Duration::from_secs(15),
        }
    }
}

/// Why no automation runtime can be used, and what the user can do about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeUnavailable {
    pub detail: String,
    pub remediation: String,
}

#[derive(thiserror::Error, Debug)]
pub enum AutomationError {
    #[error("browser launch failed: {0}")]
    Launch(String),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("browser protocol error: {0}")]
    Protocol(String),
}

/// Launches browser sessions.
#[async_trait]
pub trait BrowserRuntime: Send + Sync {
    /// Cheap, side-effect free check run before any navigation.
    fn check_available(&self) -> Result<(), RuntimeUnavailable>;

    async fn launch(
        &self,
        options: &LaunchOptions,
    ) -> Result<Box<dyn BrowserSession>, AutomationError>;
}

/// One headless browser with one page, owned by a single search call.
///
/// Operations with a `wait` or `timeout` argument finish within it; the rest
/// finish within the launch's [`LaunchOptions::step_timeout`] or fail with
/// [`AutomationError::Timeout`]. `close` must be called on every exit path;
/// implementations also clean up on drop.
#[async_trait]
pub trait BrowserSession: Send {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), AutomationError>;

    /// The top-level document followed by every embedded frame.
    async fn frames(&mut self) -> Result<Vec<FrameInfo>, AutomationError>;

    /// Waits up to `wait` for a visible element matching `matcher` in `frame`.
    async fn find(
        &mut self,
        frame: &FrameInfo,
        matcher: &Matcher,
        wait: Duration,
    ) -> Result<Option<ElementHandle>, AutomationError>;

    /// Clears the element and types `text` into it.
    async fn fill(&mut self, element: &ElementHandle, text: &str) -> Result<(), AutomationError>;

    async fn click(&mut self, element: &ElementHandle) -> Result<(), AutomationError>;

    /// Presses `key` (e.g. `"Enter"`) with the element focused.
    async fn press(&mut self, element: &ElementHandle, key: &str) -> Result<(), AutomationError>;

    /// Starts recording responses matching `rule`. Must be called before the
    /// action that triggers the request.
    async fn capture_responses(&mut self, rule: &ResponseRule) -> Result<(), AutomationError>;

    /// Waits for the first captured response.
    async fn next_response(&mut self, wait: Duration) -> Result<CapturedResponse, AutomationError>;

    /// Anchors of `frame` in document order.
    async fn anchors(&mut self, frame: &FrameInfo) -> Result<Vec<Anchor>, AutomationError>;

    /// The URL `frame` currently shows, after any redirects.
    async fn current_url(&mut self, frame: &FrameInfo) -> Result<String, AutomationError>;

    async fn pause(&mut self, duration: Duration);

    async fn close(&mut self) -> Result<(), AutomationError>;
}

/// Stand-in runtime when medreg is built without browser support.
#[derive(Debug, Default, Clone, Copy)]
pub struct MissingRuntime;

impl MissingRuntime {
    fn unavailable() -> RuntimeUnavailable {
        RuntimeUnavailable {
            detail: "medreg was built without the `browser` feature".to_string(),
            remediation: "Reinstall with `cargo install --path medreg_cli --features browser` \
                          and make sure Chrome or Chromium is installed (or set MEDREG_CHROME_PATH)."
                .to_string(),
        }
    }
}

#[async_trait]
impl BrowserRuntime for MissingRuntime {
    fn check_available(&self) -> Result<(), RuntimeUnavailable> {
        Err(Self::unavailable())
    }

    async fn launch(
        &self,
        _options: &LaunchOptions,
    ) -> Result<Box<dyn BrowserSession>, AutomationError> {
        Err(AutomationError::Launch(Self::unavailable().detail))
    }
}

/// The runtime this build supports: chromium with the `browser` feature,
/// [`MissingRuntime`] otherwise.
pub fn default_runtime(settings: &Settings) -> Arc<dyn BrowserRuntime> {
    #[cfg(feature = "browser")]
    {
        Arc::new(ChromiumRuntime::new(settings.clone()))
    }
    #[cfg(not(feature = "browser"))]
    {
        let _ = settings;
        Arc::new(MissingRuntime)
    }
}
