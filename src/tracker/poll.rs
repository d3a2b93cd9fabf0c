//! Per-task polling loops against the remote status endpoint
//!
//! Each tracked export gets at most one loop: query, interpret, update the
//! repository, then either reschedule after the configured delay or stop on
//! a terminal state. Every loop is bound to a cancellation token held in the
//! tracker's poller registry, so it can be halted without touching the
//! record.

use crate::backoff::Backoff;
use crate::client::StatusResponse;
use crate::error::{Error, Result};
use crate::types::{ExportId, ProgressPayload, TaskEvent, TaskPatch, TaskStatus};
use std::sync::atomic::Ordering;
use tokio_util::sync::CancellationToken;

use super::{ExportTracker, PollHandle};

/// Fallback message when a failed export carries no error detail
const DEFAULT_FAILURE_MESSAGE: &str = "Export failed";

impl ExportTracker {
    /// Start the polling loop for one task.
    ///
    /// Queries the remote status endpoint immediately, then keeps
    /// re-querying on the configured cadence until the task reaches a
    /// terminal state or the poller is cancelled. Queries never overlap: the
    /// next one is scheduled only after the previous response has been fully
    /// processed, and a task that already has an active poller is left
    /// alone.
    ///
    /// A transport failure or undecodable response marks the task `Failed`
    /// and stops the loop; there is no automatic retry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShuttingDown`] once shutdown has begun.
    pub async fn poll_task(&self, id: &ExportId, project_id: &str, task_id: &str) -> Result<()> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let mut active = self.active_polls.lock().await;
        if active.contains_key(id) {
            tracing::debug!(task = %id, "Poller already active, not starting another");
            return Ok(());
        }

        let cancel = CancellationToken::new();
        let tracker = self.clone();
        let loop_id = id.clone();
        let project = project_id.to_string();
        let remote = task_id.to_string();
        let token = cancel.clone();
        let join = tokio::spawn(async move {
            tracker.run_poll_loop(loop_id, project, remote, token).await;
        });

        // The registry lock is still held, so the loop's own cleanup cannot
        // run before this entry exists.
        active.insert(id.clone(), PollHandle { cancel, join });
        Ok(())
    }

    async fn run_poll_loop(
        self,
        id: ExportId,
        project_id: String,
        task_id: String,
        cancel: CancellationToken,
    ) {
        tracing::debug!(task = %id, project_id = %project_id, remote_task = %task_id, "Poller started");
        let mut backoff = Backoff::new(self.config.poll.backoff.clone());

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let response = tokio::select! {
                result = self.client.fetch_status(&project_id, &task_id) => result,
                _ = cancel.cancelled() => break,
            };

            match response {
                Ok(status) => {
                    if !self.apply_status(&id, status).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(task = %id, error = %e, "Status query failed, marking task failed");
                    self.fail_task(&id, e.to_string()).await;
                    break;
                }
            }

            let delay = if self.config.poll.use_backoff {
                backoff.next_delay()
            } else {
                self.config.poll.interval
            };
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => break,
            }
        }

        self.active_polls.lock().await.remove(&id);
        tracing::debug!(task = %id, "Poller stopped");
    }

    /// Interpret one status response. Returns whether polling continues.
    async fn apply_status(&self, id: &ExportId, response: StatusResponse) -> bool {
        let Some(payload) = response.task else {
            // A well-formed response without a task body stalls this task
            // (no mutation, no reschedule) until a manual re-poll.
            tracing::warn!(task = %id, "Status response carried no task data, polling stopped");
            return false;
        };

        let progress = payload.progress.map(ProgressPayload::from_value);

        match payload.status {
            TaskStatus::Pending | TaskStatus::Processing | TaskStatus::Running => {
                let patch = TaskPatch {
                    status: Some(payload.status),
                    progress,
                    ..TaskPatch::default()
                };
                match self.store.partial_update(id, patch).await {
                    Ok(Some(updated)) => {
                        tracing::debug!(task = %id, status = ?updated.status, "Export still in progress");
                        self.emit_event(TaskEvent::Updated {
                            id: id.clone(),
                            status: updated.status,
                        });
                    }
                    Ok(None) => {
                        tracing::debug!(task = %id, "Poll update for a task no longer tracked");
                    }
                    Err(e) => {
                        tracing::error!(task = %id, error = %e, "Failed to persist poll update");
                    }
                }
                true
            }
            TaskStatus::Completed => {
                let parsed = progress.as_ref().and_then(ProgressPayload::as_parsed);
                let download_url = parsed
                    .and_then(|p| p.download_url.clone())
                    .or(payload.download_url);
                let filename = parsed.and_then(|p| p.filename.clone()).or(payload.filename);

                let patch = TaskPatch {
                    status: Some(TaskStatus::Completed),
                    progress,
                    download_url,
                    filename,
                    ..TaskPatch::default()
                };
                match self.store.partial_update(id, patch).await {
                    Ok(Some(updated)) => {
                        tracing::info!(
                            task = %id,
                            filename = updated.filename.as_deref().unwrap_or(""),
                            "Export completed"
                        );
                        self.emit_event(TaskEvent::Completed {
                            id: id.clone(),
                            filename: updated.filename,
                        });
                    }
                    Ok(None) => {
                        tracing::debug!(task = %id, "Completion reported for a task no longer tracked");
                    }
                    Err(e) => {
                        tracing::error!(task = %id, error = %e, "Failed to persist export completion");
                    }
                }
                false
            }
            TaskStatus::Failed => {
                // Empty strings count as absent in the fallback chain
                let message = payload
                    .error_message
                    .filter(|m| !m.is_empty())
                    .or(payload.error.filter(|m| !m.is_empty()))
                    .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string());
                self.fail_task(id, message).await;
                false
            }
        }
    }

    /// Mark a task failed with the given message.
    async fn fail_task(&self, id: &ExportId, message: String) {
        let patch = TaskPatch {
            status: Some(TaskStatus::Failed),
            error_message: Some(message.clone()),
            ..TaskPatch::default()
        };
        match self.store.partial_update(id, patch).await {
            Ok(Some(_)) => {
                self.emit_event(TaskEvent::Failed {
                    id: id.clone(),
                    error: message,
                });
            }
            Ok(None) => {
                tracing::debug!(task = %id, "Failure reported for a task no longer tracked");
            }
            Err(e) => {
                tracing::error!(task = %id, error = %e, "Failed to persist task failure");
            }
        }
    }
}
