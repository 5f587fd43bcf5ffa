//! Session navigation: login and report configuration.
//!
//! Every UI step is a logical action backed by an ordered list of
//! [`Locator`] alternatives (primary selector first, then localized or
//! legacy fallbacks). Alternatives are tried strictly in order with a
//! bounded per-alternative visibility timeout; when none succeeds the step
//! fails with [`PipelineError::ActionFailed`] naming the action, never a
//! selector string.

use std::time::Duration;

use secrecy::ExposeSecret;
use tracing::{debug, info, warn};

use crate::config::PortalConfig;
use crate::errors::PipelineError;
use crate::portal::{Locator, PortalDriver};
use crate::window::BusinessWindow;

const USERNAME_INPUT: &[Locator] = &[
    Locator::Css("input[name=\"username\"]"),
    Locator::Css("input[type=\"email\"]"),
];
const PASSWORD_INPUT: &[Locator] = &[Locator::Css("input[type=\"password\"]")];
const CONTINUE_BUTTON: &[Locator] = &[
    Locator::Text { tag: "button", needle: "Continuer" },
    Locator::Text { tag: "button", needle: "Continue" },
    Locator::Css("button[type=\"submit\"]"),
];
const OPEN_DIALOG_BUTTON: &[Locator] = &[
    Locator::Text { tag: "button", needle: "Générer un rapport" },
    Locator::Text { tag: "button", needle: "Generate a report" },
];
const DIALOG_CONTAINER: &[Locator] = &[
    Locator::Css(".mat-mdc-dialog-container"),
    Locator::Css("mat-dialog-container"),
];
const REPORT_TYPE_SELECT: &[Locator] = &[
    Locator::Css("mat-select[id=\"mat-select-3\"]"),
    Locator::Css("mat-select[formcontrolname=\"reportType\"]"),
];
const SALES_OPTION: &[Locator] = &[
    Locator::Text { tag: "mat-option", needle: "Ventes" },
    Locator::Text { tag: "mat-option", needle: "Sales" },
];
const FORMAT_SELECT: &[Locator] = &[
    Locator::Css("mat-select[id=\"mat-select-4\"]"),
    Locator::Css("mat-select[formcontrolname=\"format\"]"),
];
const JSON_OPTION: &[Locator] = &[
    Locator::Text { tag: "mat-option", needle: "Fichier JSON (json)" },
    Locator::Text { tag: "mat-option", needle: "JSON file (json)" },
];
const RANGE_START_INPUT: &[Locator] = &[Locator::Css("input[id=\"mat-input-2\"]")];
const RANGE_END_INPUT: &[Locator] = &[Locator::Css("input[id=\"mat-input-3\"]")];
// The dialog's submit button carries no stable id or text across portal
// releases; the ordinal position is the observed-working primary. The text
// fallback must be an exact match: a substring would also hit the
// still-present "Générer un rapport" opener behind the dialog.
const GENERATE_BUTTON: &[Locator] = &[
    Locator::ButtonIndex(11),
    Locator::ExactText { tag: "button", needle: "Générer" },
];

pub struct Navigator<'a, D: PortalDriver> {
    driver: &'a D,
    timeout: Duration,
}

impl<'a, D: PortalDriver> Navigator<'a, D> {
    /// `timeout` bounds each selector-alternative visibility wait.
    pub fn new(driver: &'a D, timeout: Duration) -> Self {
        Self { driver, timeout }
    }

    /// Authenticates against the portal: email step, then password step.
    /// Credentials travel over the portal's own login transport and are not
    /// persisted anywhere locally.
    pub fn login(&self, portal: &PortalConfig) -> Result<(), PipelineError> {
        info!(url = %portal.reports_url, "opening portal reports page");
        self.driver.open(&portal.reports_url)?;

        self.fill("enter email", USERNAME_INPUT, &portal.email)?;
        self.click("submit email", CONTINUE_BUTTON)?;
        self.fill("enter password", PASSWORD_INPUT, portal.password.expose_secret())?;
        self.click("submit password", CONTINUE_BUTTON)?;

        info!("login steps completed");
        Ok(())
    }

    /// Configures the report job: "Sales" type, JSON format, and the
    /// business-day date range.
    pub fn configure_report(&self, window: &BusinessWindow) -> Result<(), PipelineError> {
        self.click("open report dialog", OPEN_DIALOG_BUTTON)?;
        self.wait("report dialog", DIALOG_CONTAINER)?;

        self.click("open report type select", REPORT_TYPE_SELECT)?;
        self.click("select sales report type", SALES_OPTION)?;
        self.click("open export format select", FORMAT_SELECT)?;
        self.click("select json export format", JSON_OPTION)?;

        let start = window.start_input();
        let end = window.end_input();
        info!(%start, %end, "filling report date range");
        self.fill("enter range start", RANGE_START_INPUT, &start)?;
        self.fill("enter range end", RANGE_END_INPUT, &end)?;

        self.check_rendered_range();
        Ok(())
    }

    /// Clicks the generate button, starting an asynchronous job on the
    /// portal side. No job id is returned; completion is observed by the
    /// listener, not here.
    pub fn trigger_generate(&self) -> Result<(), PipelineError> {
        self.click("trigger report generation", GENERATE_BUTTON)?;
        info!("report generation triggered");
        Ok(())
    }

    /// Re-reads the rendered date inputs and warns when the end value is not
    /// strictly after the start. Diagnostic only: the UI may reformat the
    /// values, so a mismatch never fails the run.
    fn check_rendered_range(&self) {
        let start = self.read_first(RANGE_START_INPUT);
        let end = self.read_first(RANGE_END_INPUT);
        match (start, end) {
            (Some(start), Some(end)) => {
                // Values render as %Y-%m-%dT%H:%M, so lexicographic order is
                // chronological order.
                if end <= start {
                    warn!(%start, %end, "rendered date range is not increasing");
                } else {
                    debug!(%start, %end, "rendered date range verified");
                }
            }
            _ => debug!("could not re-read rendered date range"),
        }
    }

    fn read_first(&self, alternatives: &[Locator]) -> Option<String> {
        for locator in alternatives {
            match self.driver.read_value(locator, self.timeout) {
                Ok(Some(value)) => return Some(value),
                Ok(None) => continue,
                Err(err) => {
                    debug!(%locator, error = %err, "value read failed");
                    return None;
                }
            }
        }
        None
    }

    fn click(&self, action: &str, alternatives: &[Locator]) -> Result<(), PipelineError> {
        for locator in alternatives {
            if self.driver.click_if_visible(locator, self.timeout)? {
                debug!(action, %locator, "clicked");
                return Ok(());
            }
        }
        Err(PipelineError::ActionFailed {
            action: action.to_string(),
        })
    }

    fn fill(&self, action: &str, alternatives: &[Locator], value: &str) -> Result<(), PipelineError> {
        for locator in alternatives {
            if self.driver.fill_if_visible(locator, value, self.timeout)? {
                debug!(action, %locator, "filled");
                return Ok(());
            }
        }
        Err(PipelineError::ActionFailed {
            action: action.to_string(),
        })
    }

    fn wait(&self, action: &str, alternatives: &[Locator]) -> Result<(), PipelineError> {
        for locator in alternatives {
            if self.driver.wait_visible(locator, self.timeout)? {
                debug!(action, %locator, "visible");
                return Ok(());
            }
        }
        Err(PipelineError::ActionFailed {
            action: action.to_string(),
        })
    }
}
