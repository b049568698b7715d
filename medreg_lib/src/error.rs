//! Error types for the library layer.

use std::fmt;
use std::time::Duration;

/// Stable classification of a [`SearchError`], for callers that branch on the
/// failure rather than print it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnsupportedCountry,
    CapabilityRequired,
    DependencyMissing,
    NetworkFailure,
    ExtractionFailure,
    Timeout,
    InvalidInput,
}

/// Every way a registry search can fail.
///
/// The `Display` output is the user-facing message: it names the registry,
/// what failed and, where the caller can fix it, how.
#[derive(Debug)]
pub enum SearchError {
    /// The country code has no adapter.
    UnsupportedCountry {
        code: String,
        supported: Vec<&'static str>,
    },
    /// The registry needs browser automation but the caller did not allow it.
    CapabilityRequired { country: String, reason: String },
    /// Browser automation was allowed but no runtime is available.
    DependencyMissing {
        country: String,
        detail: String,
        remediation: String,
    },
    /// A transport-level failure at a step the search cannot continue without.
    NetworkFailure {
        country: String,
        context: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// Every strategy for locating a required element or payload failed.
    ExtractionFailure { country: String, what: String },
    /// A deadline expired at a step the search cannot continue without.
    Timeout {
        country: String,
        step: String,
        after: Duration,
    },
    /// The query itself was rejected before any work was done.
    InvalidInput(String),
}

impl SearchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedCountry { .. } => ErrorKind::UnsupportedCountry,
            Self::CapabilityRequired { .. } => ErrorKind::CapabilityRequired,
            Self::DependencyMissing { .. } => ErrorKind::DependencyMissing,
            Self::NetworkFailure { .. } => ErrorKind::NetworkFailure,
            Self::ExtractionFailure { .. } => ErrorKind::ExtractionFailure,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }

    /// Wraps a transport error from a fatal request. Deadline expiries become
    /// [`SearchError::Timeout`]; everything else is a network failure.
    pub(crate) fn from_transport(
        country: &str,
        context: &str,
        err: medreg_api::Error,
        timeout: Duration,
    ) -> Self {
        if err.is_timeout() {
            return Self::Timeout {
                country: country.to_string(),
                step: context.to_string(),
                after: timeout,
            };
        }
        Self::NetworkFailure {
            country: country.to_string(),
            context: context.to_string(),
            source: Box::new(err),
        }
    }

    pub(crate) fn extraction(country: &str, what: &str) -> Self {
        Self::ExtractionFailure {
            country: country.to_string(),
            what: what.to_string(),
        }
    }
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedCountry { code, supported } => write!(
                f,
                "Unsupported country '{}'. Supported: {}",
                code,
                supported.join(", ")
            ),
            Self::CapabilityRequired { country, reason } => write!(
                f,
                "{}: {}. Re-run with --browser (or allow browser automation on the query) to search it",
                country, reason
            ),
            Self::DependencyMissing {
                country,
                detail,
                remediation,
            } => write!(
                f,
                "{}: browser automation is unavailable ({}). {}",
                country, detail, remediation
            ),
            Self::NetworkFailure {
                country,
                context,
                source,
            } => write!(f, "{}: {} failed: {}", country, context, source),
            Self::ExtractionFailure { country, what } => write!(f, "{}: {}", country, what),
            Self::Timeout {
                country,
                step,
                after,
            } => write!(
                f,
                "{}: timed out after {:.1}s while {}",
                country,
                after.as_secs_f64(),
                step
            ),
            Self::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
        }
    }
}

impl std::error::Error for SearchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NetworkFailure { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
