//! One pipeline run, strictly sequential:
//! window → login → configure → generate → listen → fetch → write.
//!
//! There is no whole-pipeline retry; a run either completes or fails once,
//! and re-running is the scheduler's job. The browser session is owned by
//! this scope and dropped on every exit path; the database pool hands out
//! connections per operation, so nothing is held across the UI phase.

use std::path::Path;

use chrono::Utc;
use sqlx::PgPool;
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::errors::PipelineError;
use crate::fetcher;
use crate::ingest;
use crate::listener;
use crate::navigator::Navigator;
use crate::portal::{ChromeDriver, PortalDriver};
use crate::window::{BusinessWindow, business_window};

/// Executes one full acquisition-and-ingestion run.
pub async fn run(
    config: &PipelineConfig,
    pool: &PgPool,
    headless: bool,
) -> Result<(), PipelineError> {
    let now_local = Utc::now().with_timezone(&config.window.timezone);
    let window = business_window(now_local, config.window.cutoff)?;
    info!(start = %window.start, end = %window.end, "business-day window computed");

    // The whole browser phase is synchronous devtools I/O ending in a bounded
    // condvar wait, so it runs in a blocking section instead of holding a
    // runtime worker.
    let file_url = tokio::task::block_in_place(|| {
        let driver = ChromeDriver::launch(headless)?;
        drive_portal(&driver, config, &window).inspect_err(|_| {
            capture_failure_screenshot(&driver, &config.export_dir);
        })
    })?;
    info!(%file_url, "report file URL recovered");

    let client = reqwest::Client::new();
    let report =
        fetcher::fetch_report(&client, &file_url, &config.export_dir, config.window.timezone)
            .await?;

    match ingest::write_export(pool, &report.payload, report.export_date.instant()).await {
        Ok(_) => Ok(()),
        // Reported, write skipped, not re-raised: the run ends cleanly with
        // no partial state.
        Err(PipelineError::InvalidPayloadShape(reason)) => {
            error!(%reason, payload = %report.payload, "invalid payload shape, nothing written");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

/// The browser-facing half of the run: authenticate, configure the report,
/// trigger generation, and wait for the task-status response that carries
/// the file URL.
fn drive_portal(
    driver: &impl PortalDriver,
    config: &PipelineConfig,
    window: &BusinessWindow,
) -> Result<String, PipelineError> {
    let navigator = Navigator::new(driver, config.ui_timeout);
    navigator.login(&config.portal)?;
    navigator.configure_report(window)?;
    navigator.trigger_generate()?;
    listener::await_report_url(driver, config.job_timeout)
}

/// Best-effort postmortem capture; never turns a navigation failure into a
/// different error.
fn capture_failure_screenshot(driver: &impl PortalDriver, export_dir: &Path) {
    if let Err(err) = std::fs::create_dir_all(export_dir) {
        warn!(error = %err, "could not create export directory for screenshot");
        return;
    }
    let path = export_dir.join(format!("failure_{}.png", Utc::now().format("%Y%m%d%H%M%S")));
    match driver.screenshot(&path) {
        Ok(()) => info!(path = %path.display(), "failure screenshot captured"),
        Err(err) => warn!(error = %err, "failed to capture failure screenshot"),
    }
}
