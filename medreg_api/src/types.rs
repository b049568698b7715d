//! Canonical record returned for every registry hit.

use serde::{Deserialize, Serialize};
use url::Url;

/// One medicinal product located in a national registry.
///
/// Every URL is absolute. Optional fields are `None` when the registry does not
/// supply them; they are never empty strings. Serializes to the flat object
/// `{product_name, inn, form, strength, mah, detail_url, spc_url, pil_url}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    /// Brand or trade name as listed by the registry.
    pub product_name: String,

    /// Active substances (INN), comma-joined.
    pub inn: Option<String>,

    /// Pharmaceutical form, e.g. "tabletki powlekane".
    pub form: Option<String>,

    /// Strength, e.g. "75 mg".
    pub strength: Option<String>,

    /// Marketing authorisation holder.
    #[serde(rename = "mah")]
    pub marketing_authorization_holder: Option<String>,

    /// Registry page describing the product.
    pub detail_url: Option<Url>,

    /// Summary of Product Characteristics document.
    pub spc_url: Option<Url>,

    /// Patient Information Leaflet document.
    pub pil_url: Option<Url>,
}

impl SearchResult {
    /// A record carrying only a product name.
    pub fn named(product_name: &str) -> Self {
        Self {
            product_name: product_name.to_string(),
            inn: None,
            form: None,
            strength: None,
            marketing_authorization_holder: None,
            detail_url: None,
            spc_url: None,
            pil_url: None,
        }
    }
}
