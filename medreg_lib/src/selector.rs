//! Ordered fallback chains for locating elements on pages we do not control.

use std::fmt;
use std::time::Duration;

use tracing::debug;

use crate::browser::{BrowserSession, ElementHandle, FrameInfo};
use crate::error::SearchError;

/// One strategy for finding an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    /// A CSS selector.
    Css(&'static str),
    /// A button-like control whose label contains the text (case-insensitive).
    ButtonText(&'static str),
    /// A link whose text contains the text (case-insensitive).
    LinkText(&'static str),
    /// An input whose placeholder contains the text (case-insensitive).
    Placeholder(&'static str),
    /// The first input element in the document.
    FirstInput,
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(sel) => write!(f, "css({})", sel),
            Self::ButtonText(text) => write!(f, "button-text({})", text),
            Self::LinkText(text) => write!(f, "link-text({})", text),
            Self::Placeholder(text) => write!(f, "placeholder({})", text),
            Self::FirstInput => write!(f, "first-input"),
        }
    }
}

/// The element a chain settled on, and which strategy found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainMatch {
    pub index: usize,
    pub matcher: Matcher,
    pub element: ElementHandle,
}

/// Matchers for one logical target, tried in order until the first visible hit.
#[derive(Debug, Clone, Copy)]
pub struct SelectorChain {
    target: &'static str,
    matchers: &'static [Matcher],
    attempt_wait: Duration,
}

impl SelectorChain {
    /// `attempt_wait` bounds each individual matcher attempt.
    pub const fn new(
        target: &'static str,
        matchers: &'static [Matcher],
        attempt_wait: Duration,
    ) -> Self {
        Self {
            target,
            matchers,
            attempt_wait,
        }
    }

    pub fn target(&self) -> &'static str {
        self.target
    }

    pub fn matchers(&self) -> &'static [Matcher] {
        self.matchers
    }

    /// Tries each matcher in `frame`, stopping at the first hit. Each attempt
    /// waits at most `attempt_wait`, further capped by `cap`. Backend errors on
    /// a single attempt count as a miss.
    pub async fn first_match(
        &self,
        session: &mut dyn BrowserSession,
        frame: &FrameInfo,
        cap: Duration,
    ) -> Option<ChainMatch> {
        let wait = self.attempt_wait.min(cap);
        for (index, matcher) in self.matchers.iter().enumerate() {
            match session.find(frame, matcher, wait).await {
                Ok(Some(element)) => {
                    debug!("{}: matched {} (strategy {})", self.target, matcher, index + 1);
                    return Some(ChainMatch {
                        index,
                        matcher: *matcher,
                        element,
                    });
                }
                Ok(None) => debug!("{}: no match for {}", self.target, matcher),
                Err(e) => debug!("{}: {} failed: {}", self.target, matcher, e),
            }
        }
        None
    }

    /// Like [`first_match`](Self::first_match), but an exhausted chain is an
    /// [`SearchError::ExtractionFailure`].
    pub async fn require(
        &self,
        session: &mut dyn BrowserSession,
        frame: &FrameInfo,
        cap: Duration,
        country: &str,
    ) -> Result<ChainMatch, SearchError> {
        match self.first_match(session, frame, cap).await {
            Some(found) => Ok(found),
            None => Err(SearchError::extraction(
                country,
                &format!(
                    "could not locate the {} ({} strategies tried)",
                    self.target,
                    self.matchers.len()
                ),
            )),
        }
    }
}
