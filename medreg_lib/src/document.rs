//! HTML parsing shared by the static adapter and detail-page enrichment.
//!
//! A [`Document`] is built from a fetched page and its final URL. It is not
//! `Send`, so parse, extract and drop it before the next `.await`.

use scraper::{ElementRef, Html};
use url::Url;

/// An `<a>` element reduced to what the heuristics look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    /// Visible text, whitespace-collapsed.
    pub text: String,
    /// The raw `href` attribute, untouched.
    pub href: String,
}

impl Anchor {
    pub fn new(text: &str, href: &str) -> Self {
        Self {
            text: collapse_whitespace(text),
            href: href.trim().to_string(),
        }
    }
}

/// A parsed HTML page that knows which URL its relative links are relative to.
pub struct Document {
    html: Html,
    base: Url,
}

impl Document {
    /// Parses `html` served from `page_url`. A `<base href>` in the document,
    /// when present and valid, takes precedence over `page_url`.
    pub fn parse(html: &str, page_url: &Url) -> Self {
        let html = Html::parse_document(html);
        let base = elements(&html)
            .find(|el| el.value().name() == "base")
            .and_then(|el| el.value().attr("href"))
            .and_then(|href| page_url.join(href.trim()).ok())
            .unwrap_or_else(|| page_url.clone());
        Self { html, base }
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// All anchors carrying an `href`, in document order.
    pub fn anchors(&self) -> Vec<Anchor> {
        elements(&self.html)
            .filter(|el| el.value().name() == "a")
            .filter_map(|el| {
                let href = el.value().attr("href")?;
                let text = el.text().collect::<Vec<_>>().join(" ");
                Some(Anchor::new(&text, href))
            })
            .collect()
    }

    /// Resolves `href` against the document base. Only `http`/`https` results
    /// are returned; `javascript:`, `mailto:` and friends yield `None`.
    pub fn resolve(&self, href: &str) -> Option<Url> {
        resolve_http(&self.base, href)
    }
}

fn elements(html: &Html) -> impl Iterator<Item = ElementRef<'_>> {
    html.root_element().descendants().filter_map(ElementRef::wrap)
}

/// Joins `href` onto `base`, keeping only web URLs.
pub fn resolve_http(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let url = base.join(href).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
