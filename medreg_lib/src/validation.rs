use std::time::Duration;

use regex::Regex;

use crate::error::SearchError;

pub const MAX_QUERY_LENGTH: usize = 200;
pub const MAX_TIMEOUT_SECS: f64 = 600.0;

/// Strip ASCII control characters (0x00-0x1F except space 0x20), trim whitespace,
/// and enforce a byte-length limit.
pub fn sanitize_text(input: &str, max_len: usize) -> Result<String, SearchError> {
    if input.len() > max_len {
        return Err(SearchError::InvalidInput(format!(
            "input exceeds maximum length of {} bytes",
            max_len
        )));
    }
    let sanitized: String = input
        .chars()
        .filter(|c| !c.is_ascii_control() || *c == ' ')
        .collect::<String>()
        .trim()
        .to_string();
    if sanitized.is_empty() {
        return Err(SearchError::InvalidInput(
            "query is empty after sanitization".to_string(),
        ));
    }
    Ok(sanitized)
}

/// Validate free-text query: enforce length, strip control chars, trim, collapse
/// inner whitespace runs.
pub fn validate_query(input: &str) -> Result<String, SearchError> {
    let sanitized = sanitize_text(input, MAX_QUERY_LENGTH)?;
    Ok(sanitized.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Validate a timeout in seconds: finite, positive, at most [`MAX_TIMEOUT_SECS`].
pub fn validate_timeout(seconds: f64) -> Result<Duration, SearchError> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(SearchError::InvalidInput(format!(
            "timeout must be a positive number of seconds, got {}",
            seconds
        )));
    }
    if seconds > MAX_TIMEOUT_SECS {
        return Err(SearchError::InvalidInput(format!(
            "timeout of {}s exceeds the maximum of {}s",
            seconds, MAX_TIMEOUT_SECS
        )));
    }
    Ok(Duration::from_secs_f64(seconds))
}

/// Validate a language tag such as `de`, `pl` or `fr-BE`. The primary subtag
/// is lower-cased.
pub fn validate_language(input: &str) -> Result<String, SearchError> {
    let re = Regex::new(r"^[A-Za-z]{2,3}(-[A-Za-z0-9]{2,8})*$")
        .map_err(|e| SearchError::InvalidInput(format!("regex compile error: {}", e)))?;
    let trimmed = input.trim();
    if !re.is_match(trimmed) {
        return Err(SearchError::InvalidInput(format!(
            "invalid language tag '{}'. Expected e.g. en, de, pl, fr-BE",
            input
        )));
    }
    let mut parts = trimmed.splitn(2, '-');
    let primary = parts.next().unwrap_or_default().to_ascii_lowercase();
    Ok(match parts.next() {
        Some(rest) => format!("{}-{}", primary, rest),
        None => primary,
    })
}
