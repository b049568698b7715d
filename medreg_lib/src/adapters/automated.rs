//! Adapter for client-rendered registries, driven through a [`BrowserSession`].
//!
//! One call runs this sequence in a fresh session:
//!
//! 1. launch, navigate to the entry page, run any registry-specific hops
//! 2. dismiss consent banners (optional, failures ignored)
//! 3. find the frame hosting the search widget, falling back to the top level
//! 4. locate the search field, type the query, submit
//! 5. wait for the search API response or let the DOM settle
//! 6. harvest records, close the session, enrich per item
//!
//! The session is closed on every path out of steps 1-5 before any error is
//! returned.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use medreg_api::Client;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use super::{AdapterKind, Country, RegistryAdapter};
use crate::browser::{
    AutomationError, BrowserRuntime, BrowserSession, ElementHandle, FrameInfo, LaunchOptions,
    ResponseRule,
};
use crate::document::{resolve_http, Anchor};
use crate::error::SearchError;
use crate::normalize::{normalize, RawRecord};
use crate::query::SearchQuery;
use crate::selector::{Matcher, SelectorChain};
use crate::settings::Settings;
use crate::SearchResult;

/// Per-attempt bound when looking for a consent button.
pub const CONSENT_WAIT: Duration = Duration::from_millis(1500);

/// Link text fragments that mark navigation rather than results.
const BOILERPLATE: &[&str] = &[
    "cookie",
    "datenschutz",
    "privacy",
    "impressum",
    "kontakt",
    "contact",
    "login",
    "anmelden",
    "hilfe",
    "help",
    "barrierefrei",
    "sitemap",
];

/// How the registry tells us its results are ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultSignal {
    /// A JSON response from the registry's search API.
    Api(ResponseRule),
    /// No usable API; wait for the page to settle and read its links.
    DomSettle,
}

/// A harvested record plus the identifier enrichment calls are keyed on.
#[derive(Debug, Clone, Default)]
pub struct HarvestedItem {
    pub id: Option<String>,
    pub record: RawRecord,
}

/// What a client-rendered registry looks like to [`BrowserAdapter`].
#[async_trait]
pub trait BrowserRegistry: Send + Sync {
    fn country(&self) -> Country;

    /// Why this registry cannot be searched without a browser.
    fn capability_reason(&self) -> &'static str;

    fn entry_url(&self) -> String;

    /// Button matchers for cookie and consent banners, tried in order.
    fn consent_buttons(&self) -> &'static [Matcher];

    /// URL or name fragments identifying the frame that hosts the search
    /// widget. Empty when the widget lives in the top-level document.
    fn frame_hints(&self) -> &'static [&'static str];

    fn search_field(&self) -> SelectorChain;

    fn submit_control(&self) -> SelectorChain;

    fn signal(&self) -> ResultSignal;

    /// Extra navigation between the entry page and the search widget.
    async fn prepare(
        &self,
        _session: &mut dyn BrowserSession,
        _query: &SearchQuery,
    ) -> Result<(), SearchError> {
        Ok(())
    }

    /// Maps a decoded search API payload to records, at most `limit` of them.
    fn harvest_api(&self, _payload: &Value, _limit: usize) -> Vec<HarvestedItem> {
        Vec::new()
    }

    /// Registry-specific acceptance test for a DOM anchor that already passed
    /// the generic boilerplate filter.
    fn keep_anchor(&self, _anchor: &Anchor) -> bool {
        true
    }

    /// Backfills optional fields from identifier-addressed endpoints. Must not
    /// fail: problems are logged and the record is left as it was.
    async fn enrich(
        &self,
        _http: &Client,
        _id: &str,
        _page_url: &Url,
        _query: &SearchQuery,
        _result: &mut SearchResult,
    ) {
    }
}

struct Harvest {
    items: Vec<HarvestedItem>,
    page_url: Url,
}

pub struct BrowserAdapter<R> {
    registry: R,
    http: Client,
    runtime: Arc<dyn BrowserRuntime>,
    settings: Settings,
}

impl<R: BrowserRegistry> BrowserAdapter<R> {
    pub fn new(registry: R, http: Client, runtime: Arc<dyn BrowserRuntime>, settings: Settings) -> Self {
        Self {
            registry,
            http,
            runtime,
            settings,
        }
    }

    fn label(&self) -> &'static str {
        self.registry.country().label()
    }

    fn network_failure(&self, context: &str, err: AutomationError) -> SearchError {
        SearchError::NetworkFailure {
            country: self.label().to_string(),
            context: context.to_string(),
            source: Box::new(err),
        }
    }

    /// An expired browser deadline is a [`SearchError::Timeout`] at `step`;
    /// any other failure means the page did not give us `what`.
    fn step_failure(&self, step: &str, what: &str, err: AutomationError) -> SearchError {
        match err {
            AutomationError::Timeout(after) => SearchError::Timeout {
                country: self.label().to_string(),
                step: step.to_string(),
                after,
            },
            other => SearchError::extraction(self.label(), &format!("{}: {}", what, other)),
        }
    }

    async fn drive(
        &self,
        session: &mut dyn BrowserSession,
        query: &SearchQuery,
    ) -> Result<Harvest, SearchError> {
        let label = self.label();
        let entry = self.registry.entry_url();
        session
            .navigate(&entry, query.timeout())
            .await
            .map_err(|e| self.network_failure(&format!("loading {}", entry), e))?;

        self.registry.prepare(session, query).await?;
        self.dismiss_consent(session, query).await;

        let frame = self.resolve_frame(session, query).await?;
        debug!("{}: search context is frame {} ({})", label, frame.id, frame.url);

        let field = self
            .registry
            .search_field()
            .require(session, &frame, query.timeout(), label)
            .await?;
        session
            .fill(&field.element, query.text())
            .await
            .map_err(|e| {
                self.step_failure(
                    "typing into the search field",
                    "could not type into the search field",
                    e,
                )
            })?;

        let signal = self.registry.signal();
        if let ResultSignal::Api(rule) = &signal {
            session.capture_responses(rule).await.map_err(|e| {
                SearchError::extraction(label, &format!("could not observe network traffic: {}", e))
            })?;
        }

        self.submit(session, &frame, &field.element, query).await?;

        let items = match signal {
            ResultSignal::Api(_) => self.await_api(session, query).await?,
            ResultSignal::DomSettle => {
                session.pause(query.bounded(self.settings.settle)).await;
                let page_url = self.current_url(session, &frame).await?;
                let anchors = session.anchors(&frame).await.map_err(|e| {
                    self.step_failure("reading result links", "could not read result links", e)
                })?;
                let items = self.harvest_dom(&anchors, &page_url, query.limit());
                return Ok(Harvest { items, page_url });
            }
        };

        let page_url = match self.current_url(session, &frame).await {
            Ok(url) => url,
            Err(e) => {
                debug!("{}: {}; resolving against the entry page", label, e);
                Url::parse(&entry).map_err(|e| {
                    SearchError::InvalidInput(format!("bad registry URL {}: {}", entry, e))
                })?
            }
        };
        Ok(Harvest { items, page_url })
    }

    /// Clicks the first consent button that shows up. Banners are optional, so
    /// nothing here can fail the search.
    async fn dismiss_consent(&self, session: &mut dyn BrowserSession, query: &SearchQuery) {
        let Some(main) = main_frame(session).await else {
            debug!("{}: no top-level frame, skipping consent banners", self.label());
            return;
        };
        let wait = query.bounded(CONSENT_WAIT);
        for matcher in self.registry.consent_buttons() {
            match session.find(&main, matcher, wait).await {
                Ok(Some(button)) => match session.click(&button).await {
                    Ok(()) => {
                        info!("{}: dismissed consent banner via {}", self.label(), matcher);
                        return;
                    }
                    Err(e) => debug!("{}: consent click {} failed: {}", self.label(), matcher, e),
                },
                Ok(None) => {}
                Err(e) => debug!("{}: consent lookup {} failed: {}", self.label(), matcher, e),
            }
        }
    }

    /// Polls the frame tree for a document matching the registry's hints,
    /// pausing a little longer after each miss. An embedded frame wins over
    /// the top-level document when both match on the same poll. The pauses
    /// never add up to more than the query timeout; once the polls or that
    /// budget run out the top-level document is used.
    async fn resolve_frame(
        &self,
        session: &mut dyn BrowserSession,
        query: &SearchQuery,
    ) -> Result<FrameInfo, SearchError> {
        let hints = self.registry.frame_hints();
        let polls = if hints.is_empty() {
            1
        } else {
            self.settings.frame_polls.max(1)
        };
        let mut budget = query.timeout();
        let mut main = None;
        for attempt in 0..polls {
            match session.frames().await {
                Ok(frames) => {
                    if let Some(frame) = pick_frame(&frames, hints) {
                        return Ok(frame.clone());
                    }
                    if let Some(top) = frames.into_iter().find(|f| f.is_main) {
                        main = Some(top);
                    }
                }
                Err(e) => debug!("{}: frame poll {} failed: {}", self.label(), attempt + 1, e),
            }
            if attempt + 1 == polls || budget.is_zero() {
                break;
            }
            let backoff = (self.settings.frame_poll_interval * (attempt as u32 + 1)).min(budget);
            budget -= backoff;
            session.pause(backoff).await;
        }
        main.ok_or_else(|| SearchError::extraction(self.label(), "could not read the page's frame tree"))
    }

    async fn submit(
        &self,
        session: &mut dyn BrowserSession,
        frame: &FrameInfo,
        field: &ElementHandle,
        query: &SearchQuery,
    ) -> Result<(), SearchError> {
        if let Some(control) = self
            .registry
            .submit_control()
            .first_match(session, frame, query.timeout())
            .await
        {
            match session.click(&control.element).await {
                Ok(()) => return Ok(()),
                Err(e) => debug!("{}: clicking {} failed: {}", self.label(), control.matcher, e),
            }
        }
        debug!("{}: submitting with Enter", self.label());
        session
            .press(field, "Enter")
            .await
            .map_err(|e| self.step_failure("submitting the search", "could not submit the search", e))
    }

    async fn await_api(
        &self,
        session: &mut dyn BrowserSession,
        query: &SearchQuery,
    ) -> Result<Vec<HarvestedItem>, SearchError> {
        let label = self.label();
        let response = match session.next_response(query.timeout()).await {
            Ok(response) => response,
            Err(AutomationError::Timeout(after)) => {
                return Err(SearchError::Timeout {
                    country: label.to_string(),
                    step: "waiting for search results".to_string(),
                    after,
                })
            }
            Err(e) => return Err(self.network_failure("waiting for the search API", e)),
        };
        if !(200..300).contains(&response.status) {
            return Err(self.network_failure(
                "search API request",
                AutomationError::Protocol(format!("{} answered HTTP {}", response.url, response.status)),
            ));
        }
        let payload: Value = serde_json::from_str(&response.body).map_err(|e| {
            SearchError::extraction(label, &format!("search API returned undecodable data: {}", e))
        })?;
        Ok(self.registry.harvest_api(&payload, query.limit()))
    }

    async fn current_url(
        &self,
        session: &mut dyn BrowserSession,
        frame: &FrameInfo,
    ) -> Result<Url, SearchError> {
        let raw = session.current_url(frame).await.map_err(|e| {
            self.step_failure("reading the page URL", "could not read the page URL", e)
        })?;
        Url::parse(&raw).map_err(|e| {
            SearchError::extraction(self.label(), &format!("page URL '{}' is invalid: {}", raw, e))
        })
    }

    /// Keeps labelled, non-boilerplate anchors in document order. Fragment
    /// links stand for the page itself.
    fn harvest_dom(&self, anchors: &[Anchor], page_url: &Url, limit: usize) -> Vec<HarvestedItem> {
        anchors
            .iter()
            .filter(|a| !a.text.is_empty() && !a.href.is_empty())
            .filter(|a| !is_boilerplate(&a.text))
            .filter(|a| self.registry.keep_anchor(a))
            .filter_map(|a| {
                let url = if a.href.starts_with('#') {
                    page_url.clone()
                } else {
                    resolve_http(page_url, &a.href)?
                };
                Some(HarvestedItem {
                    id: None,
                    record: RawRecord {
                        product_name: Some(a.text.clone()),
                        detail_url: Some(url),
                        ..RawRecord::default()
                    },
                })
            })
            .take(limit)
            .collect()
    }
}

/// The top-level document, or `None` if the frame tree cannot be read.
pub(crate) async fn main_frame(session: &mut dyn BrowserSession) -> Option<FrameInfo> {
    match session.frames().await {
        Ok(frames) => frames.into_iter().find(|f| f.is_main),
        Err(e) => {
            debug!("frame tree unavailable: {}", e);
            None
        }
    }
}

/// The embedded frame matching `hints`, else the top-level document if it
/// matches them itself.
fn pick_frame<'a>(frames: &'a [FrameInfo], hints: &[&str]) -> Option<&'a FrameInfo> {
    frames
        .iter()
        .find(|f| !f.is_main && f.matches_any(hints))
        .or_else(|| frames.iter().find(|f| f.is_main && f.matches_any(hints)))
}

fn is_boilerplate(text: &str) -> bool {
    let text = text.to_lowercase();
    BOILERPLATE.iter().any(|b| text.contains(b))
}

#[async_trait]
impl<R: BrowserRegistry> RegistryAdapter for BrowserAdapter<R> {
    fn country(&self) -> Country {
        self.registry.country()
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::BrowserAutomation
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, SearchError> {
        let label = self.label();
        if !query.allow_browser() {
            return Err(SearchError::CapabilityRequired {
                country: label.to_string(),
                reason: self.registry.capability_reason().to_string(),
            });
        }
        self.runtime
            .check_available()
            .map_err(|u| SearchError::DependencyMissing {
                country: label.to_string(),
                detail: u.detail,
                remediation: u.remediation,
            })?;
        if query.limit() == 0 {
            return Ok(Vec::new());
        }

        let options = LaunchOptions {
            language: query.language().map(str::to_string),
            step_timeout: query.timeout(),
        };
        let mut session = self
            .runtime
            .launch(&options)
            .await
            .map_err(|e| SearchError::DependencyMissing {
                country: label.to_string(),
                detail: e.to_string(),
                remediation: "Check that Chrome or Chromium starts on this machine, \
                              or point MEDREG_CHROME_PATH at a working executable."
                    .to_string(),
            })?;

        let outcome = self.drive(session.as_mut(), query).await;
        if let Err(e) = session.close().await {
            warn!("{}: closing the browser failed: {}", label, e);
        }
        drop(session);
        let harvest = outcome?;

        let mut results = Vec::with_capacity(harvest.items.len());
        for item in harvest.items {
            let Some(mut result) = normalize(item.record) else {
                continue;
            };
            if let Some(id) = item.id.as_deref() {
                self.registry
                    .enrich(&self.http, id, &harvest.page_url, query, &mut result)
                    .await;
            }
            results.push(result);
        }
        Ok(results)
    }
}
