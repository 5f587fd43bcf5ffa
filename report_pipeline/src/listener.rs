//! Report-completion listening.
//!
//! The portal gives the caller no job id when generation is triggered;
//! completion is only observable through the portal's own polling of its
//! task-status endpoint. The listener blocks on the *next* success response
//! whose URL contains [`TASK_PATH_FRAGMENT`] and extracts the generated
//! file's download URL from it. One observed event per run; any shape
//! deviation is terminal for the run and is not retried here.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::errors::PipelineError;
use crate::portal::PortalDriver;

/// URL fragment identifying the portal's task-status endpoint.
pub const TASK_PATH_FRAGMENT: &str = "tasks";

/// Root of the task-status payload: all recent jobs for the account.
#[derive(Debug, Deserialize)]
pub struct TaskEnvelope {
    pub data: Vec<TaskRecord>,
}

/// One job record. Only `response` matters for extraction; `id` and
/// `status` are kept for logging.
#[derive(Debug, Deserialize)]
pub struct TaskRecord {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub response: Option<TaskOutcome>,
}

/// A finished job's artifact descriptor.
#[derive(Debug, Deserialize)]
pub struct TaskOutcome {
    #[serde(rename = "type")]
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
}

/// Waits for the next matching task-status response and returns the file
/// download URL.
pub fn await_report_url(
    driver: &impl PortalDriver,
    timeout: Duration,
) -> Result<String, PipelineError> {
    info!(fragment = TASK_PATH_FRAGMENT, "waiting for task-status response");
    let body = driver.wait_for_response(TASK_PATH_FRAGMENT, timeout)?;
    extract_file_url(&body)
}

/// Parses a task-status body and extracts the download URL of the job we
/// triggered.
///
/// The endpoint returns every recent job for the account; the most recently
/// created is assumed to be the last element. Two generation requests racing
/// on the same account could make this pick the wrong job; the portal offers
/// no correlation id to guard against that.
pub fn extract_file_url(body: &str) -> Result<String, PipelineError> {
    let envelope: TaskEnvelope = serde_json::from_str(body)
        .map_err(|e| PipelineError::InvalidTaskResponse(format!("malformed envelope: {e}")))?;

    let task = envelope
        .data
        .last()
        .ok_or_else(|| PipelineError::InvalidTaskResponse("task list is empty".to_string()))?;
    debug!(id = ?task.id, status = ?task.status, "inspecting last task record");

    let outcome = task.response.as_ref().ok_or_else(|| {
        PipelineError::InvalidTaskResponse("last task carries no response".to_string())
    })?;

    match outcome.kind.as_deref() {
        Some("file") => {}
        other => {
            return Err(PipelineError::InvalidTaskResponse(format!(
                "unexpected response type: {other:?}"
            )));
        }
    }

    outcome.file.clone().ok_or_else(|| {
        PipelineError::InvalidTaskResponse("file response carries no URL".to_string())
    })
}
