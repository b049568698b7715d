//! Adapter for registries that serve their search results as plain HTML.

use async_trait::async_trait;
use medreg_api::Client;
use tracing::{debug, warn};
use url::Url;

use super::{AdapterKind, Country, RegistryAdapter};
use crate::document::Document;
use crate::error::SearchError;
use crate::normalize::{dedupe_by_detail_url, normalize, ExtractionCandidate, RawRecord};
use crate::query::SearchQuery;
use crate::SearchResult;

/// Document links found on a detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentLinks {
    pub spc_url: Option<Url>,
    pub pil_url: Option<Url>,
}

/// What a server-rendered registry looks like to [`StaticAdapter`].
pub trait StaticRegistry: Send + Sync {
    fn country(&self) -> Country;

    /// The search endpoint with the query text and any fixed parameters.
    fn search_url(&self, text: &str) -> Result<Url, SearchError>;

    /// Result anchors on the search page, in document order.
    fn candidates(&self, page: &Document) -> Vec<ExtractionCandidate>;

    /// SmPC and leaflet links on a product's detail page.
    fn documents(&self, page: &Document) -> DocumentLinks;
}

/// One search GET, heuristic anchor extraction, then best-effort detail-page
/// enrichment per result.
pub struct StaticAdapter<R> {
    registry: R,
    http: Client,
}

impl<R: StaticRegistry> StaticAdapter<R> {
    pub fn new(registry: R, http: Client) -> Self {
        Self { registry, http }
    }

    async fn enrich(&self, result: &mut SearchResult, query: &SearchQuery) {
        let Some(detail_url) = result.detail_url.clone() else {
            return;
        };
        match self
            .http
            .get_html(&detail_url, query.timeout(), query.language())
            .await
        {
            Ok(page) => {
                let links = self
                    .registry
                    .documents(&Document::parse(&page.body, &page.url));
                result.spc_url = result.spc_url.take().or(links.spc_url);
                result.pil_url = result.pil_url.take().or(links.pil_url);
            }
            Err(e) => warn!(
                "{}: could not enrich '{}' from {}: {}",
                self.registry.country().label(),
                result.product_name,
                detail_url,
                e
            ),
        }
    }
}

#[async_trait]
impl<R: StaticRegistry> RegistryAdapter for StaticAdapter<R> {
    fn country(&self) -> Country {
        self.registry.country()
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::StaticHtml
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, SearchError> {
        if query.limit() == 0 {
            return Ok(Vec::new());
        }
        let label = self.registry.country().label();
        let url = self.registry.search_url(query.text())?;
        let page = self
            .http
            .get_html(&url, query.timeout(), query.language())
            .await
            .map_err(|e| SearchError::from_transport(label, "search request", e, query.timeout()))?;

        // Parsed documents are not Send; nothing parsed survives past this block.
        let found = {
            let doc = Document::parse(&page.body, &page.url);
            let mut candidates = self.registry.candidates(&doc);
            debug!("{}: {} candidate anchors", label, candidates.len());
            candidates.truncate(query.limit());
            candidates
        };

        let mut results =
            dedupe_by_detail_url(found.into_iter().map(RawRecord::from).filter_map(normalize).collect());
        for result in results.iter_mut() {
            self.enrich(result, query).await;
        }
        Ok(results)
    }
}
