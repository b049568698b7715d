//! Browser-automation adapter scenarios against a scripted fake backend.
//!
//! The fake records every matcher attempt, navigation and action, so the tests
//! can assert both the outcome and exactly what the adapter tried.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use medreg_lib::adapters::automated::BrowserAdapter;
use medreg_lib::adapters::de::{self, PharmNet};
use medreg_lib::adapters::pl::Rpl;
use medreg_lib::browser::{
    AutomationError, BrowserRuntime, BrowserSession, CapturedResponse, ElementHandle, FrameInfo,
    LaunchOptions, ResponseRule, RuntimeUnavailable,
};
use medreg_lib::document::Anchor;
use medreg_lib::medreg_api::Client;
use medreg_lib::selector::Matcher;
use medreg_lib::{ErrorKind, RegistryAdapter, SearchQuery, Settings};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Clone)]
enum FakeResponse {
    Body(u16, String),
    Timeout,
}

#[derive(Clone, Default)]
struct Script {
    available: bool,
    main_url: String,
    /// Embedded frames, listed from the `reveal_on_poll`-th frame poll on.
    embedded: Vec<FrameInfo>,
    reveal_on_poll: usize,
    /// Elements that exist, keyed by frame id.
    present: Vec<(&'static str, Matcher)>,
    failing_navigation: Option<&'static str>,
    response: Option<FakeResponse>,
    anchors: Vec<Anchor>,
    stalled_anchors: bool,
    current_url: String,
}

#[derive(Debug, Default)]
struct Log {
    launches: usize,
    launch_language: Option<String>,
    launch_step_timeout: Option<Duration>,
    closes: usize,
    navigations: Vec<String>,
    attempts: Vec<String>,
    filled: Vec<String>,
    clicks: Vec<String>,
    presses: Vec<String>,
    pauses: Vec<Duration>,
    capture: Option<ResponseRule>,
    frame_polls: usize,
}

struct FakeRuntime {
    script: Script,
    log: Arc<Mutex<Log>>,
}

#[async_trait]
impl BrowserRuntime for FakeRuntime {
    fn check_available(&self) -> Result<(), RuntimeUnavailable> {
        if self.script.available {
            Ok(())
        } else {
            Err(RuntimeUnavailable {
                detail: "no chromium found".into(),
                remediation: "install chromium".into(),
            })
        }
    }

    async fn launch(
        &self,
        options: &LaunchOptions,
    ) -> Result<Box<dyn BrowserSession>, AutomationError> {
        let mut log = self.log.lock().unwrap();
        log.launches += 1;
        log.launch_language = options.language.clone();
        log.launch_step_timeout = Some(options.step_timeout);
        Ok(Box::new(FakeSession {
            script: self.script.clone(),
            log: Arc::clone(&self.log),
        }))
    }
}

struct FakeSession {
    script: Script,
    log: Arc<Mutex<Log>>,
}

impl FakeSession {
    fn main(&self) -> FrameInfo {
        FrameInfo {
            id: "main".into(),
            url: self.script.main_url.clone(),
            name: String::new(),
            is_main: true,
        }
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&mut self, url: &str, _timeout: Duration) -> Result<(), AutomationError> {
        self.log.lock().unwrap().navigations.push(url.to_string());
        if self.script.failing_navigation == Some(url) {
            return Err(AutomationError::Navigation("net::ERR_NAME_NOT_RESOLVED".into()));
        }
        Ok(())
    }

    async fn frames(&mut self) -> Result<Vec<FrameInfo>, AutomationError> {
        let polls = {
            let mut log = self.log.lock().unwrap();
            log.frame_polls += 1;
            log.frame_polls
        };
        let mut frames = vec![self.main()];
        if polls >= self.script.reveal_on_poll {
            frames.extend(self.script.embedded.iter().cloned());
        }
        Ok(frames)
    }

    async fn find(
        &mut self,
        frame: &FrameInfo,
        matcher: &Matcher,
        _wait: Duration,
    ) -> Result<Option<ElementHandle>, AutomationError> {
        self.log
            .lock()
            .unwrap()
            .attempts
            .push(format!("{}@{}", matcher, frame.id));
        let hit = self
            .script
            .present
            .iter()
            .any(|(id, m)| *id == frame.id && m == matcher);
        Ok(hit.then(|| ElementHandle {
            frame_id: frame.id.clone(),
            token: matcher.to_string(),
        }))
    }

    async fn fill(&mut self, _element: &ElementHandle, text: &str) -> Result<(), AutomationError> {
        self.log.lock().unwrap().filled.push(text.to_string());
        Ok(())
    }

    async fn click(&mut self, element: &ElementHandle) -> Result<(), AutomationError> {
        self.log.lock().unwrap().clicks.push(element.token.clone());
        Ok(())
    }

    async fn press(&mut self, element: &ElementHandle, key: &str) -> Result<(), AutomationError> {
        self.log
            .lock()
            .unwrap()
            .presses
            .push(format!("{} on {}", key, element.token));
        Ok(())
    }

    async fn capture_responses(&mut self, rule: &ResponseRule) -> Result<(), AutomationError> {
        self.log.lock().unwrap().capture = Some(rule.clone());
        Ok(())
    }

    async fn next_response(&mut self, wait: Duration) -> Result<CapturedResponse, AutomationError> {
        match self.script.response.clone() {
            Some(FakeResponse::Body(status, body)) => Ok(CapturedResponse {
                url: "captured".into(),
                status,
                body,
            }),
            Some(FakeResponse::Timeout) => Err(AutomationError::Timeout(wait)),
            None => Err(AutomationError::Protocol("nothing captured".into())),
        }
    }

    async fn anchors(&mut self, _frame: &FrameInfo) -> Result<Vec<Anchor>, AutomationError> {
        if self.script.stalled_anchors {
            return Err(AutomationError::Timeout(Duration::from_secs(2)));
        }
        Ok(self.script.anchors.clone())
    }

    async fn current_url(&mut self, _frame: &FrameInfo) -> Result<String, AutomationError> {
        Ok(self.script.current_url.clone())
    }

    async fn pause(&mut self, duration: Duration) {
        self.log.lock().unwrap().pauses.push(duration);
    }

    async fn close(&mut self) -> Result<(), AutomationError> {
        self.log.lock().unwrap().closes += 1;
        Ok(())
    }
}

fn settings() -> Settings {
    Settings {
        settle: Duration::from_millis(50),
        frame_polls: 5,
        frame_poll_interval: Duration::from_millis(10),
        ..Settings::default()
    }
}

fn browser_query(text: &str, limit: usize) -> SearchQuery {
    SearchQuery::builder(text)
        .with_browser(true)
        .with_timeout(2.0)
        .with_limit(limit)
        .build()
        .unwrap()
}

fn pl_adapter(base: &str, script: Script) -> (BrowserAdapter<Rpl>, Arc<Mutex<Log>>) {
    let log = Arc::new(Mutex::new(Log::default()));
    let runtime = FakeRuntime {
        script,
        log: Arc::clone(&log),
    };
    let adapter = BrowserAdapter::new(
        Rpl::with_base_url(base),
        Client::new().unwrap(),
        Arc::new(runtime),
        settings(),
    );
    (adapter, log)
}

fn pl_script(base: &str, response: Option<FakeResponse>) -> Script {
    Script {
        available: true,
        main_url: format!("{}/rpl/search/public", base),
        present: vec![
            ("main", Matcher::Css("input[formcontrolname='query']")),
            ("main", Matcher::Css("button[type='submit']")),
        ],
        response,
        current_url: format!("{}/rpl/search/public", base),
        ..Script::default()
    }
}

fn search_payload() -> String {
    json!({
        "content": [
            {
                "id": 101,
                "tradeName": "Tamiflu",
                "activeSubstances": [{"name": "Oseltamivirum"}],
                "pharmaceuticalForm": "kapsułki twarde",
                "strength": "75 mg"
            },
            {
                "id": 102,
                "tradeName": "Ebilfumin",
                "activeSubstances": ["Oseltamivirum"],
                "mahName": "Actavis Group PTC ehf."
            },
            {
                "fullName": "Oseltamivir Import Równoległy"
            }
        ]
    })
    .to_string()
}

#[tokio::test]
async fn browser_registry_without_permission_never_launches() {
    let (adapter, log) = pl_adapter("http://127.0.0.1:9", pl_script("http://127.0.0.1:9", None));
    let query = SearchQuery::builder("ibuprofen").build().unwrap();

    let err = adapter.search(&query).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CapabilityRequired);
    assert!(err.to_string().contains("--browser"));
    let log = log.lock().unwrap();
    assert_eq!(log.launches, 0);
    assert!(log.navigations.is_empty());
}

#[tokio::test]
async fn missing_runtime_is_reported_before_navigation() {
    let mut script = pl_script("http://127.0.0.1:9", None);
    script.available = false;
    let (adapter, log) = pl_adapter("http://127.0.0.1:9", script);

    let err = adapter.search(&browser_query("oseltamivir", 5)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DependencyMissing);
    assert!(err.to_string().contains("install chromium"));
    assert_eq!(log.lock().unwrap().launches, 0);
}

#[tokio::test]
async fn zero_limit_skips_the_browser() {
    let (adapter, log) = pl_adapter("http://127.0.0.1:9", pl_script("http://127.0.0.1:9", None));

    let results = adapter.search(&browser_query("oseltamivir", 0)).await.unwrap();

    assert!(results.is_empty());
    assert_eq!(log.lock().unwrap().launches, 0);
}

#[tokio::test]
async fn api_results_are_harvested_and_enriched_per_item() {
    let server = MockServer::start().await;
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/api/rpl/medicinal-products/101"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "marketingAuthorisationHolder": "Roche Registration GmbH"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/rpl/medicinal-products/101/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"documentType": "Charakterystyka produktu leczniczego", "downloadUrl": "/api/rpl/documents/spc-101.pdf"},
            {"documentType": "Ulotka", "downloadUrl": "/api/rpl/documents/pil-101.pdf"},
            {"documentType": "Etykieta", "downloadUrl": "/api/rpl/documents/label-101.pdf"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/rpl/medicinal-products/102"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/rpl/medicinal-products/102/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let script = pl_script(&base, Some(FakeResponse::Body(200, search_payload())));
    let (adapter, log) = pl_adapter(&base, script);
    let query = SearchQuery::builder("oseltamivir")
        .with_browser(true)
        .with_timeout(5.0)
        .with_language(Some("pl"))
        .build()
        .unwrap();

    let results = adapter.search(&query).await.unwrap();

    assert_eq!(results.len(), 3);
    let tamiflu = &results[0];
    assert_eq!(tamiflu.product_name, "Tamiflu");
    assert_eq!(tamiflu.inn.as_deref(), Some("Oseltamivirum"));
    assert_eq!(tamiflu.form.as_deref(), Some("kapsułki twarde"));
    assert_eq!(tamiflu.strength.as_deref(), Some("75 mg"));
    assert_eq!(
        tamiflu.marketing_authorization_holder.as_deref(),
        Some("Roche Registration GmbH")
    );
    assert_eq!(
        tamiflu.detail_url.as_ref().unwrap().as_str(),
        format!("{}/rpl/search/public/details/101", base)
    );
    assert_eq!(
        tamiflu.spc_url.as_ref().unwrap().as_str(),
        format!("{}/api/rpl/documents/spc-101.pdf", base)
    );
    assert_eq!(
        tamiflu.pil_url.as_ref().unwrap().as_str(),
        format!("{}/api/rpl/documents/pil-101.pdf", base)
    );

    // Both enrichment calls failed; the record keeps its search fields.
    let ebilfumin = &results[1];
    assert_eq!(
        ebilfumin.marketing_authorization_holder.as_deref(),
        Some("Actavis Group PTC ehf.")
    );
    assert_eq!(ebilfumin.spc_url, None);
    assert_eq!(ebilfumin.pil_url, None);

    let import = &results[2];
    assert_eq!(import.product_name, "Oseltamivir Import Równoległy");
    assert_eq!(import.detail_url, None);

    let log = log.lock().unwrap();
    assert_eq!(log.launches, 1);
    assert_eq!(log.closes, 1);
    assert_eq!(log.launch_language.as_deref(), Some("pl"));
    assert_eq!(log.launch_step_timeout, Some(Duration::from_secs(5)));
    assert_eq!(log.navigations, vec![format!("{}/rpl/search/public", base)]);
    assert_eq!(log.filled, vec!["oseltamivir".to_string()]);
    assert_eq!(log.clicks, vec!["css(button[type='submit'])".to_string()]);
    assert!(log.presses.is_empty());
    let rule = log.capture.as_ref().unwrap();
    assert_eq!(rule.method, "POST");
    assert_eq!(
        rule.url_prefix,
        format!("{}/api/rpl/public/medicinal-products/search", base)
    );
}

#[tokio::test]
async fn chain_stops_at_the_first_matching_strategy() {
    let mut script = pl_script("http://127.0.0.1:9", Some(FakeResponse::Body(200, "{}".into())));
    script.present = vec![
        ("main", Matcher::Placeholder("szukaj")),
        ("main", Matcher::FirstInput),
    ];
    let (adapter, log) = pl_adapter("http://127.0.0.1:9", script);

    let results = adapter.search(&browser_query("oseltamivir", 5)).await.unwrap();
    assert!(results.is_empty());

    let log = log.lock().unwrap();
    let field_attempts: Vec<&str> = log
        .attempts
        .iter()
        .map(String::as_str)
        .filter(|a| a.starts_with("css(input") || a.starts_with("placeholder") || a.starts_with("first-input"))
        .collect();
    assert_eq!(
        field_attempts,
        vec![
            "css(input[formcontrolname='query'])@main",
            "placeholder(wyszukaj)@main",
            "placeholder(szukaj)@main",
        ]
    );
}

#[tokio::test]
async fn enter_is_pressed_when_no_submit_control_exists() {
    let mut script = pl_script("http://127.0.0.1:9", Some(FakeResponse::Body(200, "{}".into())));
    script.present = vec![("main", Matcher::Css("input[formcontrolname='query']"))];
    let (adapter, log) = pl_adapter("http://127.0.0.1:9", script);

    adapter.search(&browser_query("oseltamivir", 5)).await.unwrap();

    let log = log.lock().unwrap();
    assert!(log.clicks.is_empty());
    assert_eq!(
        log.presses,
        vec!["Enter on css(input[formcontrolname='query'])".to_string()]
    );
}

#[tokio::test]
async fn consent_dismissal_stops_after_first_click() {
    let mut script = pl_script("http://127.0.0.1:9", Some(FakeResponse::Body(200, "{}".into())));
    script.present.push(("main", Matcher::ButtonText("Zaakceptuj")));
    let (adapter, log) = pl_adapter("http://127.0.0.1:9", script);

    adapter.search(&browser_query("oseltamivir", 5)).await.unwrap();

    let log = log.lock().unwrap();
    assert_eq!(log.clicks[0], "button-text(Zaakceptuj)");
    assert!(!log.attempts.iter().any(|a| a == "button-text(Accept)@main"));
}

#[tokio::test]
async fn exhausted_field_chain_fails_and_closes() {
    let mut script = pl_script("http://127.0.0.1:9", None);
    script.present.clear();
    let (adapter, log) = pl_adapter("http://127.0.0.1:9", script);

    let err = adapter.search(&browser_query("oseltamivir", 5)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ExtractionFailure);
    assert!(err.to_string().contains("could not locate the search field"), "{}", err);
    assert_eq!(log.lock().unwrap().closes, 1);
}

#[tokio::test]
async fn result_wait_timeout_fails_and_closes() {
    let script = pl_script("http://127.0.0.1:9", Some(FakeResponse::Timeout));
    let (adapter, log) = pl_adapter("http://127.0.0.1:9", script);

    let err = adapter.search(&browser_query("oseltamivir", 5)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(err.to_string().contains("waiting for search results"), "{}", err);
    let log = log.lock().unwrap();
    assert_eq!(log.launches, 1);
    assert_eq!(log.closes, 1);
}

#[tokio::test]
async fn entry_navigation_failure_is_a_network_failure() {
    let mut script = pl_script("http://127.0.0.1:9", None);
    script.failing_navigation = Some("http://127.0.0.1:9/rpl/search/public");
    let (adapter, log) = pl_adapter("http://127.0.0.1:9", script);

    let err = adapter.search(&browser_query("oseltamivir", 5)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NetworkFailure);
    let log = log.lock().unwrap();
    assert_eq!(log.closes, 1);
    assert!(log.attempts.is_empty());
}

#[tokio::test]
async fn undecodable_api_body_is_an_extraction_failure() {
    let script = pl_script(
        "http://127.0.0.1:9",
        Some(FakeResponse::Body(200, "<html>maintenance</html>".into())),
    );
    let (adapter, log) = pl_adapter("http://127.0.0.1:9", script);

    let err = adapter.search(&browser_query("oseltamivir", 5)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ExtractionFailure);
    assert_eq!(log.lock().unwrap().closes, 1);
}

#[tokio::test]
async fn api_error_status_is_a_network_failure() {
    let script = pl_script("http://127.0.0.1:9", Some(FakeResponse::Body(502, String::new())));
    let (adapter, _log) = pl_adapter("http://127.0.0.1:9", script);

    let err = adapter.search(&browser_query("oseltamivir", 5)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NetworkFailure);
}

#[tokio::test]
async fn api_results_respect_limit() {
    let script = pl_script(
        "http://127.0.0.1:9",
        Some(FakeResponse::Body(200, search_payload())),
    );
    let (adapter, _log) = pl_adapter("http://127.0.0.1:9", script);

    // Enrichment targets an unroutable port; failures are swallowed.
    let results = adapter.search(&browser_query("oseltamivir", 1)).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].product_name, "Tamiflu");
}

fn de_adapter(script: Script) -> (BrowserAdapter<PharmNet>, Arc<Mutex<Log>>) {
    de_adapter_with(settings(), script)
}

fn de_adapter_with(
    settings: Settings,
    script: Script,
) -> (BrowserAdapter<PharmNet>, Arc<Mutex<Log>>) {
    let log = Arc::new(Mutex::new(Log::default()));
    let runtime = FakeRuntime {
        script,
        log: Arc::clone(&log),
    };
    let adapter = BrowserAdapter::new(
        PharmNet::new(),
        Client::new().unwrap(),
        Arc::new(runtime),
        settings,
    );
    (adapter, log)
}

fn de_script() -> Script {
    Script {
        available: true,
        // The landing page itself matches no frame hint.
        main_url: de::ENTRY_URL.to_string(),
        embedded: vec![
            FrameInfo {
                id: "ads".into(),
                url: "https://ads.example/banner".into(),
                name: "banner".into(),
                is_main: false,
            },
            FrameInfo {
                id: "app".into(),
                url: "https://amice.example/AMIce/app".into(),
                name: String::new(),
                is_main: false,
            },
        ],
        // Two polls happen before frame discovery (AMIce link, consent).
        reveal_on_poll: 5,
        present: vec![
            ("app", Matcher::Css("input[type='text']")),
            ("app", Matcher::ButtonText("Suchen")),
        ],
        anchors: vec![
            Anchor::new("Cookie-Einstellungen", "/cookies"),
            Anchor::new("Ibuprofen AL 400 mg Filmtabletten", "/amice/detail?id=1"),
            Anchor::new("Start", "/"),
            Anchor::new("Arzneimittel", "#top"),
            Anchor::new("", "/empty"),
            Anchor::new("Ibuprofen-ratiopharm 600 mg", "https://other.example/x"),
            Anchor::new("Nurofen Junior Fieber- und Schmerzsaft", "/amice/detail?id=3"),
        ],
        current_url: "https://amice.example/search?q=1".into(),
        ..Script::default()
    }
}

#[tokio::test]
async fn dom_results_come_from_the_discovered_app_frame() {
    let (adapter, log) = de_adapter(de_script());

    let results = adapter.search(&browser_query("ibuprofen", 3)).await.unwrap();

    let summary: Vec<(&str, &str)> = results
        .iter()
        .map(|r| (r.product_name.as_str(), r.detail_url.as_ref().unwrap().as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("Ibuprofen AL 400 mg Filmtabletten", "https://amice.example/amice/detail?id=1"),
            ("Arzneimittel", "https://amice.example/search?q=1"),
            ("Ibuprofen-ratiopharm 600 mg", "https://other.example/x"),
        ]
    );

    let log = log.lock().unwrap();
    assert_eq!(
        log.navigations,
        vec![de::ENTRY_URL.to_string(), de::AMICE_URL.to_string()]
    );
    // Two misses with linear backoff, then the settle pause.
    assert_eq!(
        log.pauses,
        vec![
            Duration::from_millis(10),
            Duration::from_millis(20),
            Duration::from_millis(50)
        ]
    );
    assert!(log.attempts.contains(&"css(input[type='text'])@app".to_string()));
    assert_eq!(log.clicks, vec!["button-text(Suchen)".to_string()]);
    assert!(log.capture.is_none());
    assert_eq!(log.closes, 1);
}

#[tokio::test]
async fn embedded_app_frame_wins_over_matching_top_level() {
    let mut script = de_script();
    script.main_url = de::AMICE_URL.to_string();
    script.reveal_on_poll = 3;
    let (adapter, log) = de_adapter(script);

    let results = adapter.search(&browser_query("ibuprofen", 3)).await.unwrap();
    assert_eq!(results.len(), 3);

    let log = log.lock().unwrap();
    assert_eq!(log.frame_polls, 2 + 1);
    assert!(log.attempts.contains(&"css(input[type='text'])@app".to_string()));
    assert_eq!(log.pauses, vec![Duration::from_millis(50)]);
}

#[tokio::test]
async fn matching_top_level_document_is_used_without_backoff() {
    let mut script = de_script();
    script.main_url = de::AMICE_URL.to_string();
    script.embedded.truncate(1);
    script.present = vec![("main", Matcher::FirstInput)];
    let (adapter, log) = de_adapter(script);

    let results = adapter.search(&browser_query("ibuprofen", 10)).await.unwrap();
    assert_eq!(results.len(), 4);

    let log = log.lock().unwrap();
    assert_eq!(log.frame_polls, 2 + 1);
    assert!(log.attempts.contains(&"first-input@main".to_string()));
    // Only the settle pause; no frame backoff.
    assert_eq!(log.pauses, vec![Duration::from_millis(50)]);
}

#[tokio::test]
async fn unmatched_frames_fall_back_to_top_level_after_poll_budget() {
    let mut script = de_script();
    script.embedded.truncate(1);
    script.present = vec![("main", Matcher::FirstInput)];
    let (adapter, log) = de_adapter(script);

    let results = adapter.search(&browser_query("ibuprofen", 10)).await.unwrap();
    assert_eq!(results.len(), 4);

    let log = log.lock().unwrap();
    assert_eq!(log.frame_polls, 2 + 5);
    assert!(log.attempts.contains(&"first-input@main".to_string()));
    assert_eq!(log.presses.len(), 1);
}

#[tokio::test]
async fn frame_backoff_is_capped_by_query_timeout() {
    let mut script = de_script();
    script.embedded.truncate(1);
    script.present = vec![("main", Matcher::FirstInput)];
    let (adapter, log) = de_adapter_with(Settings::default(), script);
    let query = SearchQuery::builder("ibuprofen")
        .with_browser(true)
        .with_timeout(1.0)
        .build()
        .unwrap();

    adapter.search(&query).await.unwrap();

    let log = log.lock().unwrap();
    // 300 ms + 600 ms, then the last 100 ms of the budget; the settle pause is
    // capped at the timeout as well.
    assert_eq!(
        log.pauses,
        vec![
            Duration::from_millis(300),
            Duration::from_millis(600),
            Duration::from_millis(100),
            Duration::from_secs(1),
        ]
    );
    assert_eq!(log.frame_polls, 2 + 4);
    let frame_pauses: Duration = log.pauses[..3].iter().sum();
    assert!(frame_pauses <= query.timeout());
}

#[tokio::test]
async fn stalled_result_links_time_out_and_close() {
    let mut script = de_script();
    script.stalled_anchors = true;
    let (adapter, log) = de_adapter(script);

    let err = adapter.search(&browser_query("ibuprofen", 3)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(err.to_string().contains("reading result links"), "{}", err);
    assert_eq!(log.lock().unwrap().closes, 1);
}

#[tokio::test]
async fn optional_amice_hop_failure_is_tolerated() {
    let mut script = de_script();
    script.failing_navigation = Some(de::AMICE_URL);
    let (adapter, log) = de_adapter(script);

    let results = adapter.search(&browser_query("ibuprofen", 3)).await.unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(log.lock().unwrap().navigations.len(), 2);
}
