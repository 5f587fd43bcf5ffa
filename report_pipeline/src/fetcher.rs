//! Export file retrieval and parsing.
//!
//! Downloads the generated file, keeps it on disk under the export
//! directory (audit trail; never cleaned up), parses it as JSON, and
//! derives the true reporting date from the portal-chosen filename.
//!
//! Filenames look like `global_items_ShopX_2025-04-23-2025-04-24.json`; the
//! *last* embedded date is the reporting day, stamped with the current
//! wall-clock time-of-day ("the file covers day D, ingested now"). A
//! malformed filename falls back to the current instant instead of aborting
//! — the two branches are explicit in [`ExportDate`] so callers and tests
//! can tell which one fired.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde_json::Value;
use tracing::{info, warn};

use crate::errors::PipelineError;
use crate::window::resolve_local;

/// The resolved export date, with provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportDate {
    /// Derived from the filename's embedded date range.
    Parsed(DateTime<Utc>),
    /// Filename was unusable; the current instant substitutes.
    Fallback(DateTime<Utc>),
}

impl ExportDate {
    pub fn instant(&self) -> DateTime<Utc> {
        match self {
            ExportDate::Parsed(dt) | ExportDate::Fallback(dt) => *dt,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ExportDate::Fallback(_))
    }
}

/// A downloaded, parsed export.
#[derive(Debug)]
pub struct FetchedReport {
    pub payload: Value,
    pub export_date: ExportDate,
    /// Where the raw bytes were persisted.
    pub path: PathBuf,
}

/// Downloads `file_url`, persists it under `export_dir`, and parses it.
pub async fn fetch_report(
    client: &reqwest::Client,
    file_url: &str,
    export_dir: &Path,
    tz: Tz,
) -> Result<FetchedReport, PipelineError> {
    let filename = filename_from_url(file_url);

    let response = client.get(file_url).send().await?.error_for_status()?;
    let bytes = response.bytes().await?;

    let path = persist_export(export_dir, filename, &bytes)?;
    info!(path = %path.display(), size = bytes.len(), "report downloaded");

    let payload: Value = serde_json::from_slice(&bytes)?;
    let export_date = export_date_from_filename(filename, Utc::now().with_timezone(&tz));
    if export_date.is_fallback() {
        warn!(filename, "export date fell back to the current instant");
    } else {
        info!(filename, export_date = %export_date.instant(), "export date derived from filename");
    }

    Ok(FetchedReport {
        payload,
        export_date,
        path,
    })
}

/// Writes the raw export bytes under `export_dir`, creating the directory
/// when absent. The file stays on disk after the run.
fn persist_export(
    export_dir: &Path,
    filename: &str,
    bytes: &[u8],
) -> Result<PathBuf, PipelineError> {
    std::fs::create_dir_all(export_dir)?;
    let path = export_dir.join(filename);
    std::fs::write(&path, bytes)?;
    Ok(path)
}

/// Strips any query string, then takes the final path segment.
pub fn filename_from_url(url: &str) -> &str {
    let no_query = url.split('?').next().unwrap_or(url);
    no_query.rsplit('/').next().unwrap_or(no_query)
}

/// Derives the export date from the filename, attaching the current local
/// time-of-day and converting to UTC. Any parse failure yields
/// [`ExportDate::Fallback`] with `now_local` as the instant.
pub fn export_date_from_filename(filename: &str, now_local: DateTime<Tz>) -> ExportDate {
    let now_utc = now_local.with_timezone(&Utc);
    match embedded_report_day(filename) {
        Some(day) => {
            let stamped = day.and_time(now_local.time());
            match resolve_local(stamped, now_local.timezone()) {
                Ok(local) => ExportDate::Parsed(local.with_timezone(&Utc)),
                // Time-of-day landed in a DST gap on the report day.
                Err(_) => ExportDate::Fallback(now_utc),
            }
        }
        None => ExportDate::Fallback(now_utc),
    }
}

/// The last date of the range embedded in the filename: split the final
/// `_`-segment, drop the extension, and read dash-separated fragments 3..6
/// as year-month-day.
fn embedded_report_day(filename: &str) -> Option<NaiveDate> {
    let tail = filename.rsplit('_').next()?;
    let stem = tail.split('.').next()?;
    let fragments: Vec<&str> = stem.split('-').collect();
    if fragments.len() < 6 {
        return None;
    }
    let year = fragments[3].parse().ok()?;
    let month = fragments[4].parse().ok()?;
    let day = fragments[5].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}
