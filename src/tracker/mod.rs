//! Export task tracking service split into focused submodules
//!
//! The `ExportTracker` struct and its methods are organized by domain:
//! - [`poll`] - per-task polling loops against the status endpoint
//! - [`restore`] - resuming pollers for persisted in-flight tasks

mod poll;
mod restore;

use crate::client::{HttpStatusClient, StatusClient};
use crate::config::Config;
use crate::error::Result;
use crate::store::TaskStore;
use crate::store::storage::{SqliteStorage, TaskStorage};
use crate::types::{ExportId, ExportTask, TaskEvent, TaskPatch};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Registry entry for one active poller
pub(crate) struct PollHandle {
    /// Cancels the poll loop; honored before each query and reschedule
    pub(crate) cancel: CancellationToken,
    /// Handle of the spawned poll loop, joined during shutdown
    pub(crate) join: tokio::task::JoinHandle<()>,
}

/// Tracks long-running export jobs submitted to a remote service
///
/// Accepts submitted task references, polls the remote status endpoint until
/// each task reaches a terminal state, persists the task collection across
/// restarts, and resumes polling for in-flight tasks after a restart.
/// Cloneable - all fields are Arc-wrapped.
#[derive(Clone)]
pub struct ExportTracker {
    /// Task repository with write-through persistence
    pub(crate) store: Arc<TaskStore>,
    /// Remote status endpoint client
    pub(crate) client: Arc<dyn StatusClient>,
    /// Configuration (wrapped in Arc for sharing across poll loops)
    pub(crate) config: Arc<Config>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<TaskEvent>,
    /// Map of active pollers to their cancellation handles
    pub(crate) active_polls: Arc<Mutex<HashMap<ExportId, PollHandle>>>,
    /// Flag cleared during shutdown so no new pollers start
    pub(crate) accepting_new: Arc<AtomicBool>,
}

impl ExportTracker {
    /// Create a tracker with SQLite persistence and the HTTP status client.
    ///
    /// Opens (or creates) the configured database, runs migrations, and
    /// loads the persisted task collection. Call
    /// [`restore_active_tasks`](ExportTracker::restore_active_tasks)
    /// afterwards to resume polling for tasks still in flight.
    pub async fn new(config: Config) -> Result<Self> {
        let storage = SqliteStorage::new(&config.persistence.database_path).await?;
        let client = HttpStatusClient::new(&config.endpoint, config.poll.request_timeout)?;
        Self::with_parts(config, Arc::new(storage), Arc::new(client)).await
    }

    /// Create a tracker over explicit storage and client implementations.
    ///
    /// Useful for embedding with in-memory storage or a custom transport.
    pub async fn with_parts(
        config: Config,
        storage: Arc<dyn TaskStorage>,
        client: Arc<dyn StatusClient>,
    ) -> Result<Self> {
        let store = TaskStore::open(storage).await?;

        // Buffered so slow subscribers lag rather than stall the tracker
        let (event_tx, _rx) = tokio::sync::broadcast::channel(256);

        Ok(Self {
            store: Arc::new(store),
            client,
            config: Arc::new(config),
            event_tx,
            active_polls: Arc::new(Mutex::new(HashMap::new())),
            accepting_new: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Subscribe to task lifecycle events
    ///
    /// Multiple subscribers are supported; each receives all events
    /// independently. A subscriber that falls behind the channel buffer
    /// receives a `RecvError::Lagged` and continues from the newest events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<TaskEvent> {
        self.event_tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers the event is silently dropped;
    /// tracking never depends on anyone listening.
    pub(crate) fn emit_event(&self, event: TaskEvent) {
        self.event_tx.send(event).ok();
    }

    /// Insert a tracked task, or merge fields onto an existing record.
    pub async fn add_task(&self, task: ExportTask) -> Result<()> {
        let (inserted, stored) = self.store.add_or_update(task).await?;
        if inserted {
            tracing::info!(task = %stored.id, project_id = %stored.project_id, "Tracking new export task");
            self.emit_event(TaskEvent::Added { id: stored.id });
        } else {
            self.emit_event(TaskEvent::Updated {
                id: stored.id,
                status: stored.status,
            });
        }
        Ok(())
    }

    /// Merge fields onto a tracked task; a no-op for an unknown id.
    pub async fn update_task(&self, id: &ExportId, patch: TaskPatch) -> Result<()> {
        if let Some(updated) = self.store.partial_update(id, patch).await? {
            self.emit_event(TaskEvent::Updated {
                id: updated.id,
                status: updated.status,
            });
        }
        Ok(())
    }

    /// Remove a tracked task and stop its poller, if one is active.
    ///
    /// Returns whether a record was removed.
    pub async fn remove_task(&self, id: &ExportId) -> Result<bool> {
        self.cancel_poll(id).await;
        let removed = self.store.remove(id).await?;
        if removed {
            self.emit_event(TaskEvent::Removed { id: id.clone() });
        }
        Ok(removed)
    }

    /// Delete every task in a terminal state.
    ///
    /// Returns how many tasks were removed.
    pub async fn clear_completed(&self) -> Result<usize> {
        let removed = self.store.clear_terminal().await?;
        if removed > 0 {
            tracing::debug!(removed, "Cleared terminal export tasks");
            self.emit_event(TaskEvent::Cleared { removed });
        }
        Ok(removed)
    }

    /// Snapshot of all tracked tasks, newest first.
    pub async fn tasks(&self) -> Vec<ExportTask> {
        self.store.all().await
    }

    /// Fetch one tracked task by id.
    pub async fn task(&self, id: &ExportId) -> Option<ExportTask> {
        self.store.get(id).await
    }

    /// Number of pollers currently running.
    pub async fn active_poll_count(&self) -> usize {
        self.active_polls.lock().await.len()
    }

    /// Stop polling one task without touching its record.
    ///
    /// Returns whether a poller was active for the id.
    pub async fn cancel_poll(&self, id: &ExportId) -> bool {
        let handle = self.active_polls.lock().await.remove(id);
        match handle {
            Some(handle) => {
                tracing::debug!(task = %id, "Cancelling poller");
                handle.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Gracefully shut down the tracker
    ///
    /// Stops accepting new pollers, cancels every active poll loop, and
    /// waits for the loops to finish. Task records are untouched; whatever
    /// was persisted last remains for the next session to restore.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating export tracker shutdown");
        self.accepting_new.store(false, Ordering::SeqCst);

        let handles: Vec<PollHandle> = {
            let mut active = self.active_polls.lock().await;
            active.drain().map(|(_, handle)| handle).collect()
        };

        tracing::debug!(count = handles.len(), "Cancelling active pollers");
        for handle in &handles {
            handle.cancel.cancel();
        }

        let joins = handles.into_iter().map(|handle| handle.join);
        for result in futures::future::join_all(joins).await {
            if let Err(e) = result {
                tracing::warn!(error = %e, "Poller task failed during shutdown");
            }
        }

        tracing::info!("Export tracker shutdown complete");
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
