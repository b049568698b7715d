//! The normalized request handed to an adapter.

use std::time::Duration;

use crate::error::SearchError;
use crate::validation;

pub const DEFAULT_TIMEOUT_SECS: f64 = 15.0;
pub const DEFAULT_LIMIT: usize = 15;

/// A validated, immutable registry search request.
///
/// Built through [`SearchQuery::builder`]; every field is checked in
/// [`SearchQueryBuilder::build`] so adapters can rely on the invariants.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    text: String,
    timeout: Duration,
    allow_browser: bool,
    language: Option<String>,
    limit: usize,
}

impl SearchQuery {
    pub fn builder(text: &str) -> SearchQueryBuilder {
        SearchQueryBuilder {
            text: text.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            allow_browser: false,
            language: None,
            limit: DEFAULT_LIMIT,
        }
    }

    /// Query text, trimmed and whitespace-collapsed. Never empty.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Deadline applied to every fatal suspension point of the search.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn allow_browser(&self) -> bool {
        self.allow_browser
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Maximum number of records the adapter may return.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// `short` capped by the query's own timeout.
    pub(crate) fn bounded(&self, short: Duration) -> Duration {
        short.min(self.timeout)
    }
}

/// Builder for [`SearchQuery`]. Setters never fail; validation happens in `build`.
#[derive(Debug, Clone)]
pub struct SearchQueryBuilder {
    text: String,
    timeout_secs: f64,
    allow_browser: bool,
    language: Option<String>,
    limit: usize,
}

impl SearchQueryBuilder {
    /// Sets the timeout in seconds.
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout_secs = seconds;
        self
    }

    /// Permits headless browser automation for client-rendered registries.
    pub fn with_browser(mut self, allow: bool) -> Self {
        self.allow_browser = allow;
        self
    }

    /// Sets the preferred UI language tag.
    pub fn with_language(mut self, language: Option<&str>) -> Self {
        self.language = language.map(str::to_string);
        self
    }

    /// Sets the maximum number of results.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn build(self) -> Result<SearchQuery, SearchError> {
        let text = validation::validate_query(&self.text)?;
        let timeout = validation::validate_timeout(self.timeout_secs)?;
        let language = self
            .language
            .as_deref()
            .map(validation::validate_language)
            .transpose()?;
        Ok(SearchQuery {
            text,
            timeout,
            allow_browser: self.allow_browser,
            language,
            limit: self.limit,
        })
    }
}
