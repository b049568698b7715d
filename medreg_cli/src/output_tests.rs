use medreg_lib::types::SearchResult;
use medreg_lib::Country;
use serde_json::Value;
use url::Url;

use crate::output::{render_json, render_table, render_text, OutputFormat};

fn tamiflu() -> SearchResult {
    SearchResult {
        inn: Some("Oseltamivirum".into()),
        form: Some("kapsułki twarde".into()),
        strength: Some("75 mg".into()),
        marketing_authorization_holder: Some("Roche Registration GmbH".into()),
        detail_url: Some(Url::parse("https://registry.example/details/1").unwrap()),
        spc_url: Some(Url::parse("https://registry.example/docs/1/spc.pdf").unwrap()),
        pil_url: None,
        ..SearchResult::named("Tamiflu")
    }
}

#[test]
fn format_names() {
    assert_eq!(OutputFormat::from_name("json"), OutputFormat::Json);
    assert_eq!(OutputFormat::from_name("table"), OutputFormat::Table);
    assert_eq!(OutputFormat::from_name("text"), OutputFormat::Text);
}

#[test]
fn text_lists_present_fields_only() {
    let out = render_text(
        Country::Pl,
        "oseltamivir",
        &[tamiflu(), SearchResult::named("Ebilfumin")],
    );
    let expected = "Country: PL\n\
                    Query:   \"oseltamivir\"\n\
                    \n\
                    1. Tamiflu\n   \
                    INN: Oseltamivirum\n   \
                    kapsułki twarde | 75 mg\n   \
                    MAH: Roche Registration GmbH\n   \
                    SmPC:  https://registry.example/docs/1/spc.pdf\n   \
                    Detail: https://registry.example/details/1\n\
                    \n\
                    2. Ebilfumin";
    assert_eq!(out, expected);
}

#[test]
fn text_strength_alone_has_no_separator() {
    let record = SearchResult {
        strength: Some("400 mg".into()),
        pil_url: Some(Url::parse("https://registry.example/docs/2/pil.pdf").unwrap()),
        ..SearchResult::named("Ibuprofen AL")
    };
    let out = render_text(Country::De, "ibuprofen", &[record]);
    assert!(out.contains("\n   400 mg\n"), "{}", out);
    assert!(out.contains("   PIL:   https://registry.example/docs/2/pil.pdf"));
}

#[test]
fn empty_results_say_so() {
    assert_eq!(
        render_text(Country::Fr, "xyz", &[]),
        "Country: FR\nQuery:   \"xyz\"\nNo results."
    );
    assert_eq!(render_table(&[]), "No results.");
}

#[test]
fn table_has_headers_and_rows() {
    let out = render_table(&[tamiflu()]);
    assert!(out.contains("Product"));
    assert!(out.contains("SmPC"));
    assert!(out.contains("Tamiflu"));
    assert!(out.contains("Roche Registration GmbH"));
}

#[test]
fn json_payload_keeps_null_fields() {
    let out = render_json(Country::Pl, "oseltamivir", &[tamiflu()]).unwrap();
    let value: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["country"], "pl");
    assert_eq!(value["query"], "oseltamivir");
    let record = &value["results"][0];
    assert_eq!(record["mah"], "Roche Registration GmbH");
    assert!(record.get("pil_url").unwrap().is_null());
    assert_eq!(record.as_object().unwrap().len(), 8);
}
