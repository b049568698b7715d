//! Process-level settings, read once from the environment.

use std::path::PathBuf;
use std::time::Duration;

/// Tunables for browser automation that are not part of an individual query.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Explicit Chrome/Chromium executable; auto-detected when `None`.
    pub chrome_path: Option<PathBuf>,
    /// Launch a visible browser window instead of headless mode.
    pub headful: bool,
    /// How long to let a client-rendered page settle before reading its DOM.
    pub settle: Duration,
    /// Polls of the frame tree before falling back to the top-level document.
    pub frame_polls: usize,
    /// Pause after the first unsuccessful frame poll; grows linearly per poll.
    pub frame_poll_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headful: false,
            settle: Duration::from_millis(1500),
            frame_polls: 10,
            frame_poll_interval: Duration::from_millis(300),
        }
    }
}

impl Settings {
    /// Reads `MEDREG_CHROME_PATH`, `MEDREG_HEADFUL`, `MEDREG_SETTLE_MS`,
    /// `MEDREG_FRAME_POLLS` and `MEDREG_FRAME_POLL_MS`.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars<F>(var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            chrome_path: var("MEDREG_CHROME_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            headful: var("MEDREG_HEADFUL")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.headful),
            settle: Duration::from_millis(parse_or(
                var("MEDREG_SETTLE_MS"),
                defaults.settle.as_millis() as u64,
            )),
            frame_polls: parse_or(var("MEDREG_FRAME_POLLS"), defaults.frame_polls),
            frame_poll_interval: Duration::from_millis(parse_or(
                var("MEDREG_FRAME_POLL_MS"),
                defaults.frame_poll_interval.as_millis() as u64,
            )),
        }
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|val| val.trim().parse::<T>().ok())
        .unwrap_or(default)
}
