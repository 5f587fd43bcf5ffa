use thiserror::Error;

use crate::{portal::DriverError, window::WindowError};

/// The unified error type for a pipeline run.
///
/// Every variant except [`PipelineError::InvalidPayloadShape`] terminates the
/// run; the payload-shape case is reported and the run ends without a write
/// (see `pipeline::run`).
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Business-day window computation failed.
    #[error("time window error: {0}")]
    Window(#[from] WindowError),

    /// The browser session itself failed (launch, navigation, protocol).
    #[error("browser driver error: {0}")]
    Driver(#[from] DriverError),

    /// No selector alternative for a logical UI action became visible within
    /// its timeout. Carries the action name, never a selector string.
    #[error("UI action failed: {action}")]
    ActionFailed { action: String },

    /// The task-status response was missing, malformed, or did not describe
    /// a completed file artifact.
    #[error("invalid task response: {0}")]
    InvalidTaskResponse(String),

    /// Transport or HTTP-status failure while fetching the export file.
    #[error("report download failed")]
    DownloadFailed(#[from] reqwest::Error),

    /// The downloaded export was not valid JSON.
    #[error("export file is not valid JSON")]
    MalformedExport(#[from] serde_json::Error),

    /// The parsed payload does not have the expected `"Global"` shape.
    /// Reported, never written; no partial insert happens.
    #[error("invalid payload shape: {0}")]
    InvalidPayloadShape(String),

    /// Database failure during the ingest transaction; the transaction is
    /// rolled back before this surfaces.
    #[error("database persistence failed")]
    PersistenceFailed(#[from] sqlx::Error),

    /// Local filesystem failure (export directory, file write).
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}
