mod output;
#[cfg(test)]
mod output_tests;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use medreg_lib::medreg_api::Client;
use medreg_lib::{Country, Dispatcher, ErrorKind, SearchError, SearchQuery, Settings};
use tracing::debug;

use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "medreg")]
#[command(version)]
#[command(about = "Locate medicinal products in national drug registries")]
#[command(after_help = "Country shorthand: `medreg -de ibuprofen` is `medreg --country de ibuprofen`.")]
struct Cli {
    /// Registry country: de, fr or pl
    #[arg(short = 'c', long)]
    country: String,

    /// Output format
    #[arg(long, default_value = "text", value_parser = ["text", "json", "table"])]
    output: String,

    /// Shorthand for --output json
    #[arg(long)]
    json: bool,

    /// Preferred language tag for registry pages (e.g. de, pl, en-GB)
    #[arg(long)]
    lang: Option<String>,

    /// Allow a headless browser for JavaScript-driven registries (DE, PL)
    #[arg(long)]
    browser: bool,

    /// Timeout in seconds for each network step
    #[arg(long, default_value_t = 15.0)]
    timeout: f64,

    /// Maximum number of results
    #[arg(long, default_value_t = 15)]
    limit: usize,

    /// Debug logging on stderr
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Search terms, joined with single spaces
    #[arg(required = true, num_args = 1..)]
    query: Vec<String>,
}

/// Rewrites `-de` style arguments to `--country de`. Stops at `--`.
fn expand_country_shorthand<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out = Vec::new();
    let mut literal = false;
    for (i, arg) in args.into_iter().enumerate() {
        if i == 0 || literal {
            out.push(arg);
            continue;
        }
        if arg == "--" {
            literal = true;
            out.push(arg);
            continue;
        }
        match shorthand_code(&arg) {
            Some(code) => {
                out.push("--country".to_string());
                out.push(code);
            }
            None => out.push(arg),
        }
    }
    out
}

fn shorthand_code(arg: &str) -> Option<String> {
    let code = arg.strip_prefix('-')?;
    // `-cXX` is the short country flag with an attached value.
    if code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()) && !code.starts_with('c') {
        Some(code.to_ascii_lowercase())
    } else {
        None
    }
}

fn init_tracing(verbose: bool) -> Result<()> {
    let level = if verbose { "medreg=debug" } else { "medreg=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(level.parse().context("invalid log directive")?),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<SearchError>().map(SearchError::kind) {
        Some(ErrorKind::InvalidInput) | Some(ErrorKind::UnsupportedCountry) => ExitCode::from(2),
        _ => ExitCode::from(1),
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::from_name(&cli.output)
    };

    let country = Country::parse(&cli.country)?;
    let query = SearchQuery::builder(&cli.query.join(" "))
        .with_timeout(cli.timeout)
        .with_browser(cli.browser)
        .with_language(cli.lang.as_deref())
        .with_limit(cli.limit)
        .build()?;

    let settings = Settings::from_env();
    debug!("Settings: {:?}", settings);
    let http = Client::new().context("failed to initialise the HTTP client")?;
    let dispatcher = Dispatcher::new(http, settings);

    let results = dispatcher.search(country.code(), &query).await?;
    let rendered = match format {
        OutputFormat::Text => output::render_text(country, query.text(), &results),
        OutputFormat::Table => output::render_table(&results),
        OutputFormat::Json => output::render_json(country, query.text(), &results)?,
    };
    println!("{}", rendered);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse_from(expand_country_shorthand(std::env::args()));

    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("Error: {:#}", e);
        return ExitCode::from(1);
    }

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit_code_for(&e)
        }
    }
}
