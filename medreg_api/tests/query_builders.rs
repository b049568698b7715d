use medreg_api::{Query, SpecialitySearch};
use url::Url;

fn base_url() -> Url {
    Url::parse("https://example.com/recherche-de-specialites").unwrap()
}

#[test]
fn speciality_search_defaults() {
    let url = SpecialitySearch::new("oseltamivir").add_to_url(&base_url());
    let query = url.query().unwrap();
    assert!(query.contains("txtCaracteres=oseltamivir"));
    assert!(query.contains("page=1"));
    assert!(query.contains("affNomSubstances=1"));
    assert!(query.contains("affListe=0"));
    assert!(query.contains("isDisponibilite=0"));
}

#[test]
fn speciality_search_encodes_text() {
    let url = SpecialitySearch::new("acide acétylsalicylique").add_to_url(&base_url());
    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    assert!(pairs.contains(&(
        "txtCaracteres".to_string(),
        "acide acétylsalicylique".to_string()
    )));
}

#[test]
fn speciality_search_flags_are_fixed_and_ordered() {
    let url = SpecialitySearch::new("x").add_to_url(&base_url());
    assert_eq!(
        url.query(),
        Some("txtCaracteres=x&page=1&affNomSubstances=1&affListe=0&isDisponibilite=0")
    );
}

#[test]
fn speciality_search_keeps_path() {
    let url = SpecialitySearch::new("x").add_to_url(&base_url());
    assert_eq!(url.path(), "/recherche-de-specialites");
}
