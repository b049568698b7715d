//! Poland: Rejestr Produktów Leczniczych (RPL) on e-Zdrowie.
//!
//! The search page is an Angular application backed by a JSON API. Results are
//! taken from the intercepted search response; product and document endpoints
//! are then queried per item over plain HTTP.

use std::time::Duration;

use async_trait::async_trait;
use medreg_api::Client;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::automated::{BrowserRegistry, HarvestedItem, ResultSignal};
use super::Country;
use crate::browser::ResponseRule;
use crate::document::resolve_http;
use crate::normalize::{first_text, joined_names, RawRecord};
use crate::query::SearchQuery;
use crate::selector::{Matcher, SelectorChain};
use crate::SearchResult;

pub const RPL_ROOT: &str = "https://rejestry.ezdrowie.gov.pl/";

const SEARCH_PAGE: &str = "rpl/search/public";
const SEARCH_API: &str = "api/rpl/public/medicinal-products/search";
const PRODUCT_API: &str = "api/rpl/medicinal-products";

const ITEM_KEYS: &[&str] = &["content", "items"];
const ID_KEYS: &[&str] = &["id", "medicinalProductId"];
const NAME_KEYS: &[&str] = &["tradeName", "fullName", "name"];
const SUBSTANCE_KEYS: &[&str] = &["activeSubstances", "substances"];
const FORM_KEYS: &[&str] = &["pharmaceuticalForm", "form"];
const STRENGTH_KEYS: &[&str] = &["strength"];
const MAH_KEYS: &[&str] = &["marketingAuthorisationHolder", "mahName"];

const SPC_TYPES: &[&str] = &["rcp", "charakterystyka"];
const PIL_TYPES: &[&str] = &["ulotka", "pil", "patient"];

const CONSENT: &[Matcher] = &[
    Matcher::ButtonText("Akceptuj"),
    Matcher::ButtonText("Zaakceptuj"),
    Matcher::ButtonText("Accept"),
];

const SEARCH_FIELD: SelectorChain = SelectorChain::new(
    "search field",
    &[
        Matcher::Css("input[formcontrolname='query']"),
        Matcher::Placeholder("wyszukaj"),
        Matcher::Placeholder("szukaj"),
        Matcher::Css("input[type='search']"),
        Matcher::Css("input[type='text']"),
        Matcher::FirstInput,
    ],
    Duration::from_secs(3),
);

const SUBMIT: SelectorChain = SelectorChain::new(
    "submit control",
    &[
        Matcher::Css("button[type='submit']"),
        Matcher::ButtonText("Szukaj"),
        Matcher::ButtonText("Wyszukaj"),
        Matcher::ButtonText("Search"),
    ],
    Duration::from_secs(1),
);

#[derive(Debug, Clone)]
pub struct Rpl {
    root: String,
}

impl Rpl {
    pub fn new() -> Self {
        Self::with_base_url(RPL_ROOT)
    }

    /// Points every page and API URL at another host, e.g. a local mock server.
    pub fn with_base_url(base_url: &str) -> Self {
        let mut root = base_url.to_string();
        if !root.ends_with('/') {
            root.push('/');
        }
        Self { root }
    }

    pub fn search_page(&self) -> String {
        format!("{}{}", self.root, SEARCH_PAGE)
    }

    fn product_url(&self, id: &str) -> Option<Url> {
        Url::parse(&format!("{}{}/{}", self.root, PRODUCT_API, id)).ok()
    }

    fn documents_url(&self, id: &str) -> Option<Url> {
        Url::parse(&format!("{}{}/{}/documents", self.root, PRODUCT_API, id)).ok()
    }

    fn detail_url(&self, id: &str) -> Option<Url> {
        Url::parse(&format!("{}/details/{}", self.search_page(), id)).ok()
    }

    fn map_item(&self, item: &Value) -> HarvestedItem {
        let id = first_text(item, ID_KEYS);
        HarvestedItem {
            record: RawRecord {
                product_name: first_text(item, NAME_KEYS),
                inn: joined_names(item, SUBSTANCE_KEYS),
                form: first_text(item, FORM_KEYS),
                strength: first_text(item, STRENGTH_KEYS),
                mah: first_text(item, MAH_KEYS),
                detail_url: id.as_deref().and_then(|id| self.detail_url(id)),
                ..RawRecord::default()
            },
            id,
        }
    }

    async fn backfill_holder(&self, http: &Client, id: &str, query: &SearchQuery, result: &mut SearchResult) {
        if result.marketing_authorization_holder.is_some() {
            return;
        }
        let Some(url) = self.product_url(id) else {
            return;
        };
        match http
            .get_json::<Value>(&url, query.timeout(), query.language())
            .await
        {
            Ok(product) => result.marketing_authorization_holder = first_text(&product, MAH_KEYS),
            Err(e) => warn!("PL: product {} lookup failed: {}", id, e),
        }
    }

    async fn attach_documents(
        &self,
        http: &Client,
        id: &str,
        page_url: &Url,
        query: &SearchQuery,
        result: &mut SearchResult,
    ) {
        let Some(url) = self.documents_url(id) else {
            return;
        };
        let documents = match http
            .get_json::<Value>(&url, query.timeout(), query.language())
            .await
        {
            Ok(documents) => documents,
            Err(e) => {
                warn!("PL: documents of product {} unavailable: {}", id, e);
                return;
            }
        };
        let entries = match &documents {
            Value::Array(entries) => entries.as_slice(),
            other => other
                .get("content")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default(),
        };
        for doc in entries {
            let Some(href) = first_text(doc, &["downloadUrl"]) else {
                continue;
            };
            let kind = first_text(doc, &["documentType"])
                .unwrap_or_default()
                .to_lowercase();
            if result.spc_url.is_none() && SPC_TYPES.iter().any(|t| kind.contains(t)) {
                result.spc_url = resolve_http(page_url, &href);
            }
            if result.pil_url.is_none() && PIL_TYPES.iter().any(|t| kind.contains(t)) {
                result.pil_url = resolve_http(page_url, &href);
            }
        }
        debug!(
            "PL: product {} documents: spc={} pil={}",
            id,
            result.spc_url.is_some(),
            result.pil_url.is_some()
        );
    }
}

impl Default for Rpl {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserRegistry for Rpl {
    fn country(&self) -> Country {
        Country::Pl
    }

    fn capability_reason(&self) -> &'static str {
        "the RPL registry is a JavaScript-driven single-page application"
    }

    fn entry_url(&self) -> String {
        self.search_page()
    }

    fn consent_buttons(&self) -> &'static [Matcher] {
        CONSENT
    }

    fn frame_hints(&self) -> &'static [&'static str] {
        &[]
    }

    fn search_field(&self) -> SelectorChain {
        SEARCH_FIELD
    }

    fn submit_control(&self) -> SelectorChain {
        SUBMIT
    }

    fn signal(&self) -> ResultSignal {
        ResultSignal::Api(ResponseRule {
            url_prefix: format!("{}{}", self.root, SEARCH_API),
            method: "POST",
        })
    }

    fn harvest_api(&self, payload: &Value, limit: usize) -> Vec<HarvestedItem> {
        let items = ITEM_KEYS
            .iter()
            .find_map(|key| payload.get(*key)?.as_array().filter(|a| !a.is_empty()))
            .map(Vec::as_slice)
            .unwrap_or_default();
        items.iter().take(limit).map(|item| self.map_item(item)).collect()
    }

    async fn enrich(
        &self,
        http: &Client,
        id: &str,
        page_url: &Url,
        query: &SearchQuery,
        result: &mut SearchResult,
    ) {
        self.backfill_holder(http, id, query, result).await;
        self.attach_documents(http, id, page_url, query, result).await;
    }
}
