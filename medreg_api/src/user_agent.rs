//! Identifying request headers sent to every registry.

/// Default `Accept-Language` when the caller expresses no preference.
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// The user agent medreg announces itself with.
///
/// Registries are public-sector portals; we identify honestly rather than
/// impersonating a desktop browser.
pub fn get_user_agent() -> String {
    format!(
        "Mozilla/5.0 (compatible; medreg/{}; +https://example.invalid/medreg)",
        env!("CARGO_PKG_VERSION")
    )
}

/// Builds an `Accept-Language` value preferring `language`, with English as fallback.
pub fn accept_language(language: Option<&str>) -> String {
    match language.map(str::trim).filter(|l| !l.is_empty()) {
        None => DEFAULT_ACCEPT_LANGUAGE.to_string(),
        Some(lang) if lang.eq_ignore_ascii_case("en") => "en;q=1.0".to_string(),
        Some(lang) => format!("{},en;q=0.8", lang),
    }
}
