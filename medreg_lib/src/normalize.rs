//! Mapping adapter-internal item shapes onto [`SearchResult`].

use std::collections::HashSet;

use serde_json::Value;
use url::Url;

use crate::types::SearchResult;

/// An anchor picked out by a result-shape heuristic, before it becomes a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionCandidate {
    pub label: String,
    pub href: String,
    pub url: Url,
}

/// Loose record as harvested from a registry, every field optional.
///
/// Strings may be blank or padded; [`normalize`] cleans them up.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    pub product_name: Option<String>,
    pub inn: Option<String>,
    pub form: Option<String>,
    pub strength: Option<String>,
    pub mah: Option<String>,
    pub detail_url: Option<Url>,
    pub spc_url: Option<Url>,
    pub pil_url: Option<Url>,
}

impl From<ExtractionCandidate> for RawRecord {
    fn from(candidate: ExtractionCandidate) -> Self {
        Self {
            product_name: Some(candidate.label),
            detail_url: Some(candidate.url),
            ..Self::default()
        }
    }
}

/// Turns a raw record into the canonical shape. Blank optional fields become
/// `None`; a record without a usable product name is dropped.
pub fn normalize(raw: RawRecord) -> Option<SearchResult> {
    let product_name = clean(raw.product_name)?;
    Some(SearchResult {
        product_name,
        inn: clean(raw.inn),
        form: clean(raw.form),
        strength: clean(raw.strength),
        marketing_authorization_holder: clean(raw.mah),
        detail_url: raw.detail_url,
        spc_url: raw.spc_url,
        pil_url: raw.pil_url,
    })
}

/// Drops records whose detail URL was already seen. First occurrence wins;
/// records without a detail URL are always kept.
pub fn dedupe_by_detail_url(records: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| match &r.detail_url {
            Some(url) => seen.insert(url.clone()),
            None => true,
        })
        .collect()
}

fn clean(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == value.len() {
        Some(value)
    } else {
        Some(trimmed.to_string())
    }
}

/// Reads the first of `keys` holding a non-blank string (or number) in `item`.
///
/// Upstream APIs rename fields between versions; callers list every known
/// spelling in priority order.
pub fn first_text(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match item.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Comma-joins a substance list given either as strings or as objects with a
/// `name` field. Reads the first of `keys` that holds a non-empty list.
pub fn joined_names(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        let names: Vec<String> = match item.get(*key)? {
            Value::Array(values) => values
                .iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s.trim().to_string()),
                    Value::Object(_) => first_text(v, &["name"]),
                    _ => None,
                })
                .filter(|s| !s.is_empty())
                .collect(),
            Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
            _ => Vec::new(),
        };
        (!names.is_empty()).then(|| names.join(", "))
    })
}
