//! Germany: PharmNet.Bund / BfArM AMIce public search.
//!
//! No search API is known, so results are read from the DOM once the page has
//! settled.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::automated::{main_frame, BrowserRegistry, ResultSignal};
use super::Country;
use crate::browser::BrowserSession;
use crate::document::Anchor;
use crate::error::SearchError;
use crate::query::SearchQuery;
use crate::selector::{Matcher, SelectorChain};

pub const ENTRY_URL: &str =
    "https://www.pharmnet-bund.de/PharmNet/DE/Oeffentlichkeit/Arzneimittel-Informationssystem/_node.html";
pub const AMICE_URL: &str =
    "https://www.bfarm.de/DE/Arzneimittel/Arzneimittelinformationen/Arzneimittel-recherchieren/AMIce/_node.html";

const AMICE_LINK_WAIT: Duration = Duration::from_secs(3);
const MIN_UNQUALIFIED_LABEL_CHARS: usize = 8;

const CONSENT: &[Matcher] = &[
    Matcher::ButtonText("Akzeptieren"),
    Matcher::ButtonText("Alle akzeptieren"),
    Matcher::ButtonText("Zustimmen"),
    Matcher::ButtonText("Einverstanden"),
    Matcher::ButtonText("Accept"),
];

const FRAME_HINTS: &[&str] = &["amice", "amis", "recherche", "dimdi"];

const SEARCH_FIELD: SelectorChain = SelectorChain::new(
    "search field",
    &[
        Matcher::Css("input[type='text']"),
        Matcher::Css("input[type='search']"),
        Matcher::Placeholder("such"),
        Matcher::FirstInput,
    ],
    Duration::from_secs(2),
);

const SUBMIT: SelectorChain = SelectorChain::new(
    "submit control",
    &[
        Matcher::ButtonText("Suchen"),
        Matcher::Css("input[type='submit']"),
        Matcher::Css("button[type='submit']"),
    ],
    Duration::from_secs(1),
);

#[derive(Debug, Clone, Default)]
pub struct PharmNet;

impl PharmNet {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BrowserRegistry for PharmNet {
    fn country(&self) -> Country {
        Country::De
    }

    fn capability_reason(&self) -> &'static str {
        "the PharmNet/AMIce registry is an interactive JavaScript application"
    }

    fn entry_url(&self) -> String {
        ENTRY_URL.to_string()
    }

    fn consent_buttons(&self) -> &'static [Matcher] {
        CONSENT
    }

    fn frame_hints(&self) -> &'static [&'static str] {
        FRAME_HINTS
    }

    fn search_field(&self) -> SelectorChain {
        SEARCH_FIELD
    }

    fn submit_control(&self) -> SelectorChain {
        SUBMIT
    }

    fn signal(&self) -> ResultSignal {
        ResultSignal::DomSettle
    }

    /// Follows the AMIce link if the landing page has one, then opens the
    /// AMIce module directly. Both hops are optional.
    async fn prepare(
        &self,
        session: &mut dyn BrowserSession,
        query: &SearchQuery,
    ) -> Result<(), SearchError> {
        if let Some(main) = main_frame(session).await {
            match session
                .find(&main, &Matcher::LinkText("AMIce"), query.bounded(AMICE_LINK_WAIT))
                .await
            {
                Ok(Some(link)) => {
                    if let Err(e) = session.click(&link).await {
                        debug!("DE: AMIce link click failed: {}", e);
                    }
                }
                Ok(None) => debug!("DE: no AMIce link on the landing page"),
                Err(e) => debug!("DE: AMIce link lookup failed: {}", e),
            }
        }
        if let Err(e) = session.navigate(AMICE_URL, query.timeout()).await {
            warn!("DE: could not open the AMIce module, staying on the current page: {}", e);
        }
        Ok(())
    }

    fn keep_anchor(&self, anchor: &Anchor) -> bool {
        anchor.text.contains("Arzneimittel")
            || anchor.text.contains("Fachinformation")
            || anchor.text.chars().count() > MIN_UNQUALIFIED_LABEL_CHARS
    }
}
