//! HTTP transport shared by every registry adapter.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::redirect::Policy;
use serde::de::DeserializeOwned;
use url::Url;

use crate::{
    user_agent::{accept_language, get_user_agent, DEFAULT_ACCEPT_LANGUAGE},
    Error,
};

/// Redirects followed before a request is abandoned.
pub const MAX_REDIRECTS: usize = 5;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_JSON: &str = "application/json, text/plain, */*";

/// A successfully fetched document together with the URL it was finally served from.
///
/// `url` is the post-redirect location, which is what relative links in `body`
/// must be resolved against.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: Url,
    pub status: u16,
    pub body: String,
}

/// Pooled HTTP client for registry requests.
///
/// Built once per process and passed to adapters explicitly. Cloning is cheap
/// and shares the underlying connection pool, which carries no per-query state.
#[derive(Clone, Debug)]
pub struct Client {
    http: reqwest::Client,
}

impl Client {
    /// Creates a client with default headers and a redirect limit of [`MAX_REDIRECTS`].
    pub fn new() -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let ua = HeaderValue::from_str(&get_user_agent()).map_err(|e| Error::InvalidUrl {
            url: String::new(),
            reason: format!("invalid user agent header: {}", e),
        })?;
        headers.insert(USER_AGENT, ua);
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static(DEFAULT_ACCEPT_LANGUAGE),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .gzip(true)
            .build()
            .map_err(|e| {
                tracing::error!("Failed to build HTTP client: {}", e);
                Error::Build(e)
            })?;
        Ok(Self { http })
    }

    /// Fetches an HTML document. Non-2xx responses are errors.
    pub async fn get_html(
        &self,
        url: &Url,
        timeout: Duration,
        language: Option<&str>,
    ) -> Result<FetchedPage, Error> {
        self.fetch(url, timeout, language, ACCEPT_HTML).await
    }

    /// Fetches and decodes a JSON resource. Non-2xx responses are errors.
    pub async fn get_json<T>(
        &self,
        url: &Url,
        timeout: Duration,
        language: Option<&str>,
    ) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        let page = self.fetch(url, timeout, language, ACCEPT_JSON).await?;
        serde_json::from_str::<T>(&page.body).map_err(|e| {
            let snippet = truncate_body(&page.body);
            tracing::error!("Failed to parse resource: {} | body: {}", e, snippet);
            Error::Decode {
                url: page.url.to_string(),
                reason: e.to_string(),
            }
        })
    }

    async fn fetch(
        &self,
        url: &Url,
        timeout: Duration,
        language: Option<&str>,
        accept: &'static str,
    ) -> Result<FetchedPage, Error> {
        tracing::debug!("GET {}", url);
        let resp = self
            .http
            .get(url.clone())
            .timeout(timeout)
            .header(ACCEPT, accept)
            .header(ACCEPT_LANGUAGE, accept_language(language))
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to get resource {}: {}", url, e);
                Error::Request {
                    url: url.to_string(),
                    source: e,
                }
            })?;

        let status = resp.status();
        let final_url = resp.url().clone();
        let body = resp.text().await.map_err(|e| {
            tracing::error!("Failed to read response body from {}: {}", final_url, e);
            Error::Request {
                url: final_url.to_string(),
                source: e,
            }
        })?;

        if !status.is_success() {
            let snippet = truncate_body(&body);
            tracing::error!("Request to {} failed with status {}: {}", final_url, status, snippet);
            return Err(Error::HttpStatus {
                url: final_url.to_string(),
                status: status.as_u16(),
                body: snippet,
            });
        }

        Ok(FetchedPage {
            url: final_url,
            status: status.as_u16(),
            body,
        })
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 2000;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...[truncated]", &body[..end])
}
