//! Resuming pollers for persisted in-flight tasks
//!
//! An export submitted before a restart keeps updating afterwards: the
//! repository loads the persisted collection, and this routine relaunches a
//! poller for every record that never reached a terminal state.

use super::ExportTracker;

impl ExportTracker {
    /// Re-launch a poller for every persisted task still in flight.
    ///
    /// Scans the repository for tasks whose status is non-terminal
    /// (`Pending`, `Processing`, or `Running`) and starts a poller for each
    /// using the record's stored identifiers. A failure to start one task's
    /// poller is logged and does not block the remaining tasks.
    ///
    /// Call once at startup, after construction has loaded persisted state.
    /// Returns the number of pollers started.
    pub async fn restore_active_tasks(&self) -> usize {
        let tasks = self.store.all().await;
        let mut started = 0;

        for task in tasks.into_iter().filter(|t| t.status.is_active()) {
            match self
                .poll_task(&task.id, &task.project_id, &task.task_id)
                .await
            {
                Ok(()) => {
                    tracing::info!(
                        task = %task.id,
                        status = ?task.status,
                        "Resumed polling for in-flight export"
                    );
                    started += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        task = %task.id,
                        error = %e,
                        "Failed to resume polling for export task"
                    );
                }
            }
        }

        if started > 0 {
            tracing::info!(count = started, "Restored pollers for in-flight exports");
        }
        started
    }
}
