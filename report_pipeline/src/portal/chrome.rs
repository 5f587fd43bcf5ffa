//! Headless-Chrome implementation of [`PortalDriver`].
//!
//! Element location is a poll loop over the devtools protocol rather than a
//! single blocking wait, so every [`Locator`] strategy (CSS, text/XPath,
//! ordinal button) gets identical timeout semantics. Network observation
//! registers a response handler on the tab and forwards the first matching
//! body through a channel; the caller blocks on the channel with a bound.

use std::ffi::OsStr;
use std::path::Path;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use serde_json::json;
use tracing::{debug, warn};

use super::{DriverError, Locator, PortalDriver};

const POLL_INTERVAL: Duration = Duration::from_millis(200);
const RESPONSE_HANDLER: &str = "report-task-watch";

fn contains_text_xpath(tag: &str, needle: &str) -> String {
    format!("//{tag}[contains(normalize-space(.), \"{needle}\")]")
}

// Equality, not contains: a substring match on a short label would also hit
// any longer label containing it, in document order.
fn exact_text_xpath(tag: &str, needle: &str) -> String {
    format!("//{tag}[normalize-space(.)=\"{needle}\"]")
}

pub struct ChromeDriver {
    tab: Arc<Tab>,
    // Keeps the browser process alive; dropping it closes the session on
    // every exit path.
    _browser: Browser,
}

impl ChromeDriver {
    /// Launches a Chrome session and opens a fresh tab.
    pub fn launch(headless: bool) -> Result<Self, DriverError> {
        let options = LaunchOptions {
            headless,
            sandbox: false,
            ignore_certificate_errors: true,
            // Must outlast the bounded wait for the task-status response.
            idle_browser_timeout: Duration::from_secs(300),
            args: vec![
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--window-size=1920,1080"),
            ],
            ..Default::default()
        };

        let browser = Browser::new(options).map_err(DriverError::browser)?;
        let tab = browser.new_tab().map_err(DriverError::browser)?;
        Ok(Self {
            tab,
            _browser: browser,
        })
    }

    /// Single location attempt. Lookup failures count as "not found"; the
    /// surrounding poll loop owns the timeout.
    fn try_locate(&self, locator: &Locator) -> Option<Element<'_>> {
        match locator {
            Locator::Css(sel) => self.tab.find_element(sel).ok(),
            Locator::Text { tag, needle } => self
                .tab
                .find_element_by_xpath(&contains_text_xpath(tag, needle))
                .ok(),
            Locator::ExactText { tag, needle } => self
                .tab
                .find_element_by_xpath(&exact_text_xpath(tag, needle))
                .ok(),
            Locator::ButtonIndex(n) => match self.tab.find_elements("button") {
                Ok(buttons) => buttons.into_iter().nth(*n),
                Err(_) => None,
            },
        }
    }

    fn wait_locator(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<Option<Element<'_>>, DriverError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(element) = self.try_locate(locator) {
                return Ok(Some(element));
            }
            if Instant::now() >= deadline {
                debug!(%locator, "element did not appear within timeout");
                return Ok(None);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl PortalDriver for ChromeDriver {
    fn open(&self, url: &str) -> Result<(), DriverError> {
        self.tab.navigate_to(url).map_err(DriverError::browser)?;
        self.tab
            .wait_until_navigated()
            .map_err(DriverError::browser)?;
        Ok(())
    }

    fn wait_visible(&self, locator: &Locator, timeout: Duration) -> Result<bool, DriverError> {
        Ok(self.wait_locator(locator, timeout)?.is_some())
    }

    fn click_if_visible(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<bool, DriverError> {
        match self.wait_locator(locator, timeout)? {
            Some(element) => {
                element.click().map_err(DriverError::browser)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn fill_if_visible(
        &self,
        locator: &Locator,
        value: &str,
        timeout: Duration,
    ) -> Result<bool, DriverError> {
        match self.wait_locator(locator, timeout)? {
            Some(element) => {
                // Set the value directly and raise the events Angular
                // Material listens for; typing into datetime-local inputs
                // is unreliable across Chrome versions.
                element
                    .call_js_fn(
                        r#"function(value) {
                            this.value = value;
                            this.dispatchEvent(new Event("input", { bubbles: true }));
                            this.dispatchEvent(new Event("change", { bubbles: true }));
                        }"#,
                        vec![json!(value)],
                        false,
                    )
                    .map_err(DriverError::browser)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn read_value(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<Option<String>, DriverError> {
        match self.wait_locator(locator, timeout)? {
            Some(element) => {
                let result = element
                    .call_js_fn("function() { return this.value; }", vec![], false)
                    .map_err(DriverError::browser)?;
                Ok(result
                    .value
                    .and_then(|v| v.as_str().map(str::to_string)))
            }
            None => Ok(None),
        }
    }

    fn wait_for_response(
        &self,
        url_fragment: &str,
        timeout: Duration,
    ) -> Result<String, DriverError> {
        // Single-slot rendezvous: the handler runs on the event thread, the
        // caller parks on the condvar. Only the first matching body is kept.
        let slot: Arc<(Mutex<Option<String>>, Condvar)> =
            Arc::new((Mutex::new(None), Condvar::new()));
        let handler_slot = Arc::clone(&slot);
        let fragment = url_fragment.to_string();

        self.tab
            .register_response_handling(
                RESPONSE_HANDLER,
                Box::new(move |params, fetch_body| {
                    if !params.response.url.contains(&fragment) {
                        return;
                    }
                    let status = params.response.status as i64;
                    if !(200..300).contains(&status) {
                        return;
                    }
                    match fetch_body() {
                        Ok(body) => {
                            let text = if body.base_64_encoded {
                                match BASE64.decode(body.body.as_bytes()) {
                                    Ok(raw) => String::from_utf8_lossy(&raw).into_owned(),
                                    Err(_) => return,
                                }
                            } else {
                                body.body
                            };
                            let (lock, cvar) = &*handler_slot;
                            let mut kept = lock.lock().unwrap_or_else(|p| p.into_inner());
                            if kept.is_none() {
                                *kept = Some(text);
                                cvar.notify_one();
                            }
                        }
                        Err(err) => warn!(error = %err, "failed to read response body"),
                    }
                }),
            )
            .map_err(DriverError::browser)?;

        let (lock, cvar) = &*slot;
        let guard = lock.lock().unwrap_or_else(|p| p.into_inner());
        let (mut kept, _) = cvar
            .wait_timeout_while(guard, timeout, |kept| kept.is_none())
            .unwrap_or_else(|p| p.into_inner());
        let outcome = kept.take().ok_or_else(|| DriverError::ResponseTimeout {
            fragment: url_fragment.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        });

        if let Err(err) = self.tab.deregister_response_handling(RESPONSE_HANDLER) {
            warn!(error = %err, "failed to deregister response handler");
        }
        outcome
    }

    fn screenshot(&self, path: &Path) -> Result<(), DriverError> {
        let png = self
            .tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(DriverError::browser)?;
        std::fs::write(path, png)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_text_xpath_uses_equality() {
        assert_eq!(
            exact_text_xpath("button", "Générer"),
            "//button[normalize-space(.)=\"Générer\"]"
        );
    }

    #[test]
    fn contains_text_xpath_uses_substring() {
        assert_eq!(
            contains_text_xpath("button", "Continuer"),
            "//button[contains(normalize-space(.), \"Continuer\")]"
        );
    }
}
