//! France: Base de données publique des médicaments (BDPM).

use medreg_api::{Query, SpecialitySearch};
use url::Url;

use super::static_html::{DocumentLinks, StaticRegistry};
use super::Country;
use crate::document::Document;
use crate::error::SearchError;
use crate::normalize::ExtractionCandidate;

pub const BDPM_ROOT: &str = "https://base-donnees-publique.medicaments.gouv.fr/";

const SEARCH_PATH: &str = "recherche-de-specialites";
const DETAIL_MARKERS: &[&str] = &["affichageDoc.php", "extrait.php", "fiche"];
const MIN_LABEL_CHARS: usize = 3;
const SPC_SYNONYMS: &[&str] = &["rcp", "caractéristiques du produit", "résumé"];
const PIL_SYNONYMS: &[&str] = &["notice"];

#[derive(Debug, Clone)]
pub struct Bdpm {
    root: String,
}

impl Bdpm {
    pub fn new() -> Self {
        Self {
            root: BDPM_ROOT.to_string(),
        }
    }

    /// Points the adapter at another host, e.g. a local mock server.
    pub fn with_base_url(base_url: &str) -> Self {
        let mut root = base_url.to_string();
        if !root.ends_with('/') {
            root.push('/');
        }
        Self { root }
    }
}

impl Default for Bdpm {
    fn default() -> Self {
        Self::new()
    }
}

fn is_result_href(href: &str) -> bool {
    DETAIL_MARKERS.iter().any(|m| href.contains(m))
        && !href.to_lowercase().contains("telechargement")
}

fn label_matches(label: &str, synonyms: &[&str]) -> bool {
    let label = label.to_lowercase();
    synonyms.iter().any(|s| label.contains(s))
}

impl StaticRegistry for Bdpm {
    fn country(&self) -> Country {
        Country::Fr
    }

    fn search_url(&self, text: &str) -> Result<Url, SearchError> {
        let endpoint = Url::parse(&self.root)
            .and_then(|root| root.join(SEARCH_PATH))
            .map_err(|e| SearchError::InvalidInput(format!("bad registry URL {}: {}", self.root, e)))?;
        Ok(SpecialitySearch::new(text).add_to_url(&endpoint))
    }

    fn candidates(&self, page: &Document) -> Vec<ExtractionCandidate> {
        page.anchors()
            .into_iter()
            .filter(|a| a.text.chars().count() >= MIN_LABEL_CHARS && is_result_href(&a.href))
            .filter_map(|a| {
                let url = page.resolve(&a.href)?;
                Some(ExtractionCandidate {
                    label: a.text,
                    href: a.href,
                    url,
                })
            })
            .collect()
    }

    fn documents(&self, page: &Document) -> DocumentLinks {
        let mut links = DocumentLinks::default();
        for anchor in page.anchors() {
            if links.spc_url.is_none() && label_matches(&anchor.text, SPC_SYNONYMS) {
                links.spc_url = page.resolve(&anchor.href);
            }
            if links.pil_url.is_none() && label_matches(&anchor.text, PIL_SYNONYMS) {
                links.pil_url = page.resolve(&anchor.href);
            }
        }
        links
    }
}
