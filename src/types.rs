//! Core types for export-tracker

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Client-assigned identifier for a tracked export task
///
/// Stable across the task's lifetime and unique within the repository;
/// distinct from the remote service's own task identifier.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExportId(pub String);

impl ExportId {
    /// Create a new ExportId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ExportId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ExportId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ExportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Export format variant
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// PowerPoint slide deck (.pptx)
    Pptx,
    /// PDF document
    Pdf,
    /// Rendered page images (.png)
    Png,
}

/// Task lifecycle status as reported by the remote service
///
/// `Processing` and `Running` are both the non-terminal "in progress" state
/// for control purposes; polling continues through either.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Queued on the remote side, not yet started
    Pending,
    /// Export is being prepared
    Processing,
    /// Export is actively running
    Running,
    /// Export finished and an artifact is available
    Completed,
    /// Export failed
    Failed,
}

impl TaskStatus {
    /// Whether this status admits no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether the task is still in flight and should keep polling
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

/// One (context, reason) pair describing a conversion warning
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningEntry {
    /// Where the warning occurred (slide, shape, cell, ...)
    pub context: String,
    /// Why the conversion degraded
    pub reason: String,
}

/// Warning breakdown by conversion failure category
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WarningDetails {
    /// Warnings raised while extracting styles
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub style_extraction: Vec<WarningEntry>,

    /// Warnings raised while rendering text
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text_rendering: Vec<WarningEntry>,

    /// Warnings raised while inserting images
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_insertion: Vec<WarningEntry>,

    /// Warnings raised while parsing source data
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_parsing: Vec<WarningEntry>,

    /// Aggregate warning count across all categories
    #[serde(default)]
    pub total_warnings: u32,

    /// Free-form warnings that fit no category
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub other_warnings: Vec<String>,
}

/// Structured progress snapshot reported by the remote service
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportProgress {
    /// Total number of pages/steps in the export
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u32>,

    /// Number of pages/steps completed so far
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<u32>,

    /// Progress percentage (0.0 to 100.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<f32>,

    /// Label of the step currently executing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,

    /// Human-readable progress messages
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<String>,

    /// Warning strings accumulated during the export
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    /// Per-category warning breakdown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning_details: Option<WarningDetails>,

    /// URL of the completed artifact, once available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,

    /// Filename of the completed artifact, once available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Progress as tracked on a task record
///
/// The remote service sends progress either as a pre-parsed structure or as
/// a serialized JSON string. A value that decodes becomes `Parsed`; a value
/// that does not is kept verbatim as `Raw` rather than aborting the poll.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgressPayload {
    /// Progress decoded into the structured snapshot
    Parsed(ExportProgress),
    /// Progress that could not be decoded, kept un-decoded
    Raw(serde_json::Value),
}

impl ProgressPayload {
    /// Interpret a wire progress value, decoding serialized strings.
    ///
    /// A string value is decoded as JSON before use; a decode failure is
    /// logged and the raw value is passed through un-decoded.
    pub fn from_value(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(raw) => match serde_json::from_str::<ExportProgress>(&raw) {
                Ok(progress) => ProgressPayload::Parsed(progress),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Failed to decode serialized progress payload, keeping raw value"
                    );
                    ProgressPayload::Raw(serde_json::Value::String(raw))
                }
            },
            other => match serde_json::from_value::<ExportProgress>(other.clone()) {
                Ok(progress) => ProgressPayload::Parsed(progress),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Progress payload did not match the expected structure, keeping raw value"
                    );
                    ProgressPayload::Raw(other)
                }
            },
        }
    }

    /// The structured snapshot, if this payload decoded
    pub fn as_parsed(&self) -> Option<&ExportProgress> {
        match self {
            ProgressPayload::Parsed(progress) => Some(progress),
            ProgressPayload::Raw(_) => None,
        }
    }
}

/// One export job as tracked by the client
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportTask {
    /// Client-assigned unique identifier; the repository key
    pub id: ExportId,

    /// Remote service's task identifier, used to address the status endpoint
    pub task_id: String,

    /// Project the export belongs to, used to address the status endpoint
    pub project_id: String,

    /// Export format variant
    pub format: ExportFormat,

    /// Current lifecycle state
    pub status: TaskStatus,

    /// Optional page subset selection; `None` means all pages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_ids: Option<Vec<String>>,

    /// Latest progress snapshot reported by the remote service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<ProgressPayload>,

    /// URL of the completed artifact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,

    /// Filename of the completed artifact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Human-readable failure message, populated when the task fails
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// When the task was first inserted; immutable thereafter
    pub created_at: DateTime<Utc>,

    /// When the task first reached a terminal state; set exactly once
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExportTask {
    /// Create a pending task for a freshly submitted export.
    pub fn new(
        id: ExportId,
        project_id: impl Into<String>,
        task_id: impl Into<String>,
        format: ExportFormat,
    ) -> Self {
        Self {
            id,
            task_id: task_id.into(),
            project_id: project_id.into(),
            format,
            status: TaskStatus::Pending,
            page_ids: None,
            progress: None,
            download_url: None,
            filename: None,
            error_message: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Restrict the export to a subset of pages.
    pub fn with_pages(mut self, page_ids: Vec<String>) -> Self {
        self.page_ids = Some(page_ids);
        self
    }

    /// Whether this task has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Partial update merged onto a tracked task
///
/// `None` fields are left unchanged; `Some` fields overwrite the record.
#[derive(Clone, Debug, Default)]
pub struct TaskPatch {
    /// New lifecycle state
    pub status: Option<TaskStatus>,
    /// New progress snapshot
    pub progress: Option<ProgressPayload>,
    /// Completed artifact URL
    pub download_url: Option<String>,
    /// Completed artifact filename
    pub filename: Option<String>,
    /// Failure message
    pub error_message: Option<String>,
    /// Page subset selection
    pub page_ids: Option<Vec<String>>,
}

impl TaskPatch {
    /// Patch that only moves the task to a new status.
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Event emitted as tracked tasks change
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// A task was inserted into the repository
    Added {
        /// Task ID
        id: ExportId,
    },

    /// A task's fields were updated
    Updated {
        /// Task ID
        id: ExportId,
        /// Status after the update
        status: TaskStatus,
    },

    /// A task reached `Completed`
    Completed {
        /// Task ID
        id: ExportId,
        /// Artifact filename, when the remote side reported one
        filename: Option<String>,
    },

    /// A task reached `Failed`
    Failed {
        /// Task ID
        id: ExportId,
        /// Human-readable failure message
        error: String,
    },

    /// A task was removed from the repository
    Removed {
        /// Task ID
        id: ExportId,
    },

    /// Terminal tasks were cleared in bulk
    Cleared {
        /// Number of tasks removed
        removed: usize,
    },
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_are_completed_and_failed() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
    }

    #[test]
    fn active_statuses_keep_polling() {
        assert!(TaskStatus::Pending.is_active());
        assert!(TaskStatus::Processing.is_active());
        assert!(TaskStatus::Running.is_active());
        assert!(!TaskStatus::Completed.is_active());
        assert!(!TaskStatus::Failed.is_active());
    }

    #[test]
    fn status_uses_wire_casing() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::Pending).unwrap(),
            "\"PENDING\""
        );
        assert_eq!(
            serde_json::to_string(&TaskStatus::Running).unwrap(),
            "\"RUNNING\""
        );
        let status: TaskStatus = serde_json::from_str("\"COMPLETED\"").unwrap();
        assert_eq!(status, TaskStatus::Completed);
    }

    #[test]
    fn unknown_status_string_is_rejected() {
        let result = serde_json::from_str::<TaskStatus>("\"EXPLODED\"");
        assert!(result.is_err(), "unknown status strings must not decode");
    }

    #[test]
    fn export_id_is_transparent_in_json() {
        let id = ExportId::new("export-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"export-1\"");
        assert_eq!(id.to_string(), "export-1");
        assert_eq!(id.as_str(), "export-1");
    }

    #[test]
    fn new_task_starts_pending_without_terminal_stamp() {
        let task = ExportTask::new(
            ExportId::new("t1"),
            "project-1",
            "remote-1",
            ExportFormat::Pptx,
        );
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.completed_at.is_none());
        assert!(task.page_ids.is_none());
        assert!(task.progress.is_none());
    }

    #[test]
    fn with_pages_selects_a_subset() {
        let task = ExportTask::new(
            ExportId::new("t1"),
            "project-1",
            "remote-1",
            ExportFormat::Pdf,
        )
        .with_pages(vec!["p1".to_string(), "p3".to_string()]);
        assert_eq!(
            task.page_ids.as_deref(),
            Some(&["p1".to_string(), "p3".to_string()][..])
        );
    }

    // ── Progress payload decoding ───────────────────────────────────────

    #[test]
    fn structured_progress_decodes_to_parsed() {
        let value = serde_json::json!({
            "total": 10,
            "completed": 3,
            "percent": 30.0,
            "current_step": "rendering slides",
        });

        let payload = ProgressPayload::from_value(value);
        let progress = payload.as_parsed().expect("should decode");
        assert_eq!(progress.total, Some(10));
        assert_eq!(progress.completed, Some(3));
        assert_eq!(progress.current_step.as_deref(), Some("rendering slides"));
    }

    #[test]
    fn serialized_string_progress_is_decoded_before_use() {
        let value = serde_json::Value::String(
            "{\"total\":5,\"completed\":5,\"download_url\":\"/f/deck.pptx\"}".to_string(),
        );

        let payload = ProgressPayload::from_value(value);
        let progress = payload.as_parsed().expect("string should decode");
        assert_eq!(progress.completed, Some(5));
        assert_eq!(progress.download_url.as_deref(), Some("/f/deck.pptx"));
    }

    #[test]
    fn undecodable_string_progress_is_kept_raw() {
        let value = serde_json::Value::String("not json at all {{".to_string());

        let payload = ProgressPayload::from_value(value.clone());
        assert_eq!(payload, ProgressPayload::Raw(value));
        assert!(payload.as_parsed().is_none());
    }

    #[test]
    fn mistyped_progress_structure_is_kept_raw() {
        // `total` must be a number; a mismatched structure is passed through
        let value = serde_json::json!({ "total": "lots" });

        let payload = ProgressPayload::from_value(value.clone());
        assert_eq!(payload, ProgressPayload::Raw(value));
    }

    #[test]
    fn raw_payload_survives_a_serde_round_trip() {
        let raw = ProgressPayload::Raw(serde_json::Value::String("garbled {{".to_string()));
        let json = serde_json::to_string(&raw).unwrap();
        let back: ProgressPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn warning_details_decode_by_category() {
        let value = serde_json::json!({
            "warning_details": {
                "style_extraction": [
                    { "context": "slide 2", "reason": "unsupported gradient" }
                ],
                "data_parsing": [
                    { "context": "table 1", "reason": "malformed cell" }
                ],
                "total_warnings": 2,
                "other_warnings": ["font fallback applied"]
            }
        });

        let payload = ProgressPayload::from_value(value);
        let details = payload
            .as_parsed()
            .and_then(|p| p.warning_details.as_ref())
            .expect("warning details should decode");
        assert_eq!(details.style_extraction.len(), 1);
        assert_eq!(details.style_extraction[0].context, "slide 2");
        assert_eq!(details.data_parsing[0].reason, "malformed cell");
        assert_eq!(details.total_warnings, 2);
        assert_eq!(details.other_warnings, vec!["font fallback applied"]);
        assert!(details.text_rendering.is_empty());
    }

    #[test]
    fn task_survives_a_serde_round_trip() {
        let mut task = ExportTask::new(
            ExportId::new("t9"),
            "project-9",
            "remote-9",
            ExportFormat::Png,
        );
        task.status = TaskStatus::Completed;
        task.download_url = Some("/f/pages.zip".to_string());
        task.filename = Some("pages.zip".to_string());
        task.completed_at = Some(Utc::now());
        task.progress = Some(ProgressPayload::Parsed(ExportProgress {
            total: Some(4),
            completed: Some(4),
            ..ExportProgress::default()
        }));

        let json = serde_json::to_string(&task).unwrap();
        let back: ExportTask = serde_json::from_str(&json).unwrap();
        assert_eq!(back, task);
    }
}
