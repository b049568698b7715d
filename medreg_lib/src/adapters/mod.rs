//! Per-country registry adapters and the dispatcher that picks one.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use medreg_api::Client;
use tracing::info;

use crate::browser::{default_runtime, BrowserRuntime};
use crate::error::SearchError;
use crate::query::SearchQuery;
use crate::settings::Settings;
use crate::SearchResult;

pub mod automated;
pub mod de;
pub mod fr;
pub mod pl;
pub mod static_html;

use self::automated::BrowserAdapter;
use self::static_html::StaticAdapter;

/// A country with a registry adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Country {
    De,
    Fr,
    Pl,
}

impl Country {
    /// Every supported country, in the order error messages list them.
    pub const ALL: [Country; 3] = [Country::De, Country::Fr, Country::Pl];

    /// Lower-case ISO 3166-1 alpha-2 code.
    pub fn code(self) -> &'static str {
        match self {
            Self::De => "de",
            Self::Fr => "fr",
            Self::Pl => "pl",
        }
    }

    /// Upper-case prefix used in messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::De => "DE",
            Self::Fr => "FR",
            Self::Pl => "PL",
        }
    }

    pub fn supported_codes() -> Vec<&'static str> {
        Self::ALL.iter().map(|c| c.code()).collect()
    }

    /// Case-insensitive lookup; surrounding whitespace is ignored.
    pub fn parse(code: &str) -> Result<Self, SearchError> {
        let normalized = code.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.code() == normalized)
            .ok_or_else(|| SearchError::UnsupportedCountry {
                code: normalized,
                supported: Self::supported_codes(),
            })
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// How an adapter reaches its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    /// Server-rendered HTML fetched over plain HTTP.
    StaticHtml,
    /// A client-rendered application driven through a headless browser.
    BrowserAutomation,
}

/// Uniform search contract over every registry.
///
/// Each call is self-contained: nothing learned about a page or session is kept
/// for the next one.
#[async_trait]
pub trait RegistryAdapter: Send + Sync {
    fn country(&self) -> Country;

    fn kind(&self) -> AdapterKind;

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, SearchError>;
}

/// Maps country codes to adapters sharing one HTTP connection pool and one
/// browser runtime.
#[derive(Clone)]
pub struct Dispatcher {
    http: Client,
    runtime: Arc<dyn BrowserRuntime>,
    settings: Settings,
}

impl Dispatcher {
    /// Uses the browser runtime this build was compiled with.
    pub fn new(http: Client, settings: Settings) -> Self {
        let runtime = default_runtime(&settings);
        Self::with_runtime(http, runtime, settings)
    }

    pub fn with_runtime(http: Client, runtime: Arc<dyn BrowserRuntime>, settings: Settings) -> Self {
        Self {
            http,
            runtime,
            settings,
        }
    }

    /// Returns the adapter for `code`. No I/O happens here.
    pub fn resolve(&self, code: &str) -> Result<Box<dyn RegistryAdapter>, SearchError> {
        let adapter: Box<dyn RegistryAdapter> = match Country::parse(code)? {
            Country::Fr => Box::new(StaticAdapter::new(fr::Bdpm::new(), self.http.clone())),
            Country::De => Box::new(BrowserAdapter::new(
                de::PharmNet::new(),
                self.http.clone(),
                Arc::clone(&self.runtime),
                self.settings.clone(),
            )),
            Country::Pl => Box::new(BrowserAdapter::new(
                pl::Rpl::new(),
                self.http.clone(),
                Arc::clone(&self.runtime),
                self.settings.clone(),
            )),
        };
        Ok(adapter)
    }

    /// Resolves `code` and runs one search.
    pub async fn search(
        &self,
        code: &str,
        query: &SearchQuery,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let adapter = self.resolve(code)?;
        info!(
            "Searching {} registry ({:?}) for '{}'",
            adapter.country().label(),
            adapter.kind(),
            query.text()
        );
        let results = adapter.search(query).await?;
        info!("{} registry returned {} results", adapter.country().label(), results.len());
        Ok(results)
    }
}
