use anyhow::Result;
use medreg_lib::{Country, SearchResult};
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Table,
}

impl OutputFormat {
    /// Unknown names fall back to plain text.
    pub fn from_name(name: &str) -> Self {
        match name {
            "json" => Self::Json,
            "table" => Self::Table,
            _ => Self::Text,
        }
    }
}

/// Top-level JSON document printed by `--json`.
#[derive(Serialize)]
pub struct SearchPayload<'a> {
    pub country: &'a str,
    pub query: &'a str,
    pub results: &'a [SearchResult],
}

#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Product")]
    product: String,
    #[tabled(rename = "INN")]
    inn: String,
    #[tabled(rename = "Form")]
    form: String,
    #[tabled(rename = "Strength")]
    strength: String,
    #[tabled(rename = "MAH")]
    mah: String,
    #[tabled(rename = "SmPC")]
    spc: String,
    #[tabled(rename = "PIL")]
    pil: String,
}

fn text_or_dash(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

fn build_rows(results: &[SearchResult]) -> Vec<ResultRow> {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| ResultRow {
            index: i + 1,
            product: r.product_name.clone(),
            inn: text_or_dash(r.inn.as_deref()),
            form: text_or_dash(r.form.as_deref()),
            strength: text_or_dash(r.strength.as_deref()),
            mah: text_or_dash(r.marketing_authorization_holder.as_deref()),
            spc: if r.spc_url.is_some() { "yes" } else { "-" }.to_string(),
            pil: if r.pil_url.is_some() { "yes" } else { "-" }.to_string(),
        })
        .collect()
}

pub fn render_json(country: Country, query: &str, results: &[SearchResult]) -> Result<String> {
    let payload = SearchPayload {
        country: country.code(),
        query,
        results,
    };
    Ok(serde_json::to_string_pretty(&payload)?)
}

pub fn render_table(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No results.".to_string();
    }
    let mut table = Table::new(build_rows(results));
    table.with(Style::rounded());
    table.to_string()
}

/// `Country`/`Query` header, then one block per record; absent fields are
/// skipped.
pub fn render_text(country: Country, query: &str, results: &[SearchResult]) -> String {
    let header = format!(
        "Country: {}\nQuery:   \"{}\"",
        country.code().to_uppercase(),
        query
    );
    if results.is_empty() {
        return format!("{}\nNo results.", header);
    }
    let mut blocks = vec![header];
    for (i, r) in results.iter().enumerate() {
        let mut lines = vec![format!("{}. {}", i + 1, r.product_name)];
        if let Some(inn) = &r.inn {
            lines.push(format!("   INN: {}", inn));
        }
        let form: Vec<&str> = [r.form.as_deref(), r.strength.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if !form.is_empty() {
            lines.push(format!("   {}", form.join(" | ")));
        }
        if let Some(mah) = &r.marketing_authorization_holder {
            lines.push(format!("   MAH: {}", mah));
        }
        if let Some(url) = &r.spc_url {
            lines.push(format!("   SmPC:  {}", url));
        }
        if let Some(url) = &r.pil_url {
            lines.push(format!("   PIL:   {}", url));
        }
        if let Some(url) = &r.detail_url {
            lines.push(format!("   Detail: {}", url));
        }
        blocks.push(lines.join("\n"));
    }
    blocks.join("\n\n")
}
