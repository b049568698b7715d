//! Query builder for the French BDPM "recherche de spécialités" endpoint.

use url::Url;

use super::common::Query;

/// Parameters for a BDPM speciality search.
///
/// The registry requires a handful of fixed flags alongside the free-text
/// query: first page, substance names shown, table layout, no availability
/// filter. These are what its own search form submits.
#[derive(Clone, Debug)]
pub struct SpecialitySearch {
    text: String,
}

impl SpecialitySearch {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

impl Query for SpecialitySearch {
    fn add_to_url(&self, url: &Url) -> Url {
        let mut url = url.clone();
        url.query_pairs_mut()
            .append_pair("txtCaracteres", &self.text)
            .append_pair("page", "1")
            .append_pair("affNomSubstances", "1")
            .append_pair("affListe", "0")
            .append_pair("isDisponibilite", "0");
        url
    }
}
