//! Capability surface over the browser session.
//!
//! Navigation logic never touches the automation library directly; it talks
//! to [`PortalDriver`], which exposes "locate an element by one criterion,
//! wait for visibility, act on it" primitives plus the network-response
//! observation the completion listener needs. This keeps the locate
//! strategies pluggable (CSS, text match, ordinal position) and lets tests
//! substitute a scripted driver.

pub mod chrome;

use std::fmt;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;

pub use chrome::ChromeDriver;

/// One way of identifying a logical UI control.
///
/// Alternatives are tried strictly in order by the navigator; the first that
/// becomes visible within its timeout wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// A CSS selector.
    Css(&'static str),
    /// An element of the given tag whose rendered text contains `needle`.
    /// Used for localized action buttons ("Continuer" vs "Continue").
    Text { tag: &'static str, needle: &'static str },
    /// An element whose rendered text equals `needle` after whitespace
    /// normalization. Needed when a substring would also hit a longer
    /// sibling label ("Générer" inside "Générer un rapport").
    ExactText { tag: &'static str, needle: &'static str },
    /// The n-th `<button>` on the page, zero-based. Position-indexed and
    /// brittle by design; only used where the portal offers nothing better.
    ButtonIndex(usize),
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(sel) => write!(f, "css:{sel}"),
            Locator::Text { tag, needle } => write!(f, "text:{tag}:{needle}"),
            Locator::ExactText { tag, needle } => write!(f, "exact:{tag}:{needle}"),
            Locator::ButtonIndex(n) => write!(f, "button#{n}"),
        }
    }
}

/// Failures of the browser session itself.
///
/// "Element not visible in time" is *not* an error at this layer: the
/// per-locator primitives report it as `Ok(false)` / `Ok(None)` so the
/// caller can move on to the next alternative.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Launch, navigation, or devtools-protocol failure.
    #[error("browser error: {0}")]
    Browser(String),

    /// No network response matching the fragment arrived in time.
    #[error("no response matching {fragment:?} within {timeout_ms} ms")]
    ResponseTimeout { fragment: String, timeout_ms: u64 },

    /// Local filesystem failure while persisting a screenshot.
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

impl DriverError {
    fn browser(err: anyhow::Error) -> Self {
        DriverError::Browser(format!("{err:#}"))
    }
}

/// Browser-automation primitives consumed by the navigator and listener.
pub trait PortalDriver {
    /// Navigates to `url` and waits for the navigation to settle.
    fn open(&self, url: &str) -> Result<(), DriverError>;

    /// Waits for the locator to become visible. `Ok(false)` on timeout.
    fn wait_visible(&self, locator: &Locator, timeout: Duration) -> Result<bool, DriverError>;

    /// Waits for the locator and clicks it. `Ok(false)` on timeout.
    fn click_if_visible(&self, locator: &Locator, timeout: Duration)
    -> Result<bool, DriverError>;

    /// Waits for the locator and fills it with `value`. `Ok(false)` on timeout.
    fn fill_if_visible(
        &self,
        locator: &Locator,
        value: &str,
        timeout: Duration,
    ) -> Result<bool, DriverError>;

    /// Reads the rendered value of an input. `Ok(None)` on timeout.
    fn read_value(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<Option<String>, DriverError>;

    /// Blocks until the next success response whose URL contains
    /// `url_fragment`, returning its body. Exactly one event is observed;
    /// nothing is buffered beyond it.
    fn wait_for_response(
        &self,
        url_fragment: &str,
        timeout: Duration,
    ) -> Result<String, DriverError>;

    /// Captures a full-page screenshot to `path` (postmortem diagnostics).
    fn screenshot(&self, path: &Path) -> Result<(), DriverError>;
}
