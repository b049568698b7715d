//! Error types for the transport layer.

/// Errors that can occur when fetching a registry resource.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The URL could not be built or parsed.
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    /// The HTTP client itself could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
    /// The request never produced a response (DNS, connect, TLS, timeout, too many redirects).
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// The server answered with a non-success status.
    #[error("{url} responded with status {status}")]
    HttpStatus {
        url: String,
        status: u16,
        body: String,
    },
    /// The body arrived but could not be decoded.
    #[error("failed to decode response from {url}: {reason}")]
    Decode { url: String, reason: String },
}

impl Error {
    /// True when the request was aborted by its deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Request { source, .. } if source.is_timeout())
    }
}
