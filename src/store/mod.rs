//! Task repository: bounded, ordered, write-through persisted task records
//!
//! The repository is the single shared mutable resource of the tracker. It
//! keeps tasks newest-first, caps the collection at [`MAX_TRACKED_TASKS`],
//! and writes the full collection to its storage adapter as part of every
//! mutation, so in-memory and durable state never diverge.

use crate::error::Result;
use crate::types::{ExportId, ExportTask, TaskPatch};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;

pub mod storage;

use storage::TaskStorage;

/// Maximum number of tasks retained; inserting beyond it evicts the oldest
pub const MAX_TRACKED_TASKS: usize = 20;

/// Bounded, newest-first collection of tracked export tasks
///
/// Every mutating operation holds the collection lock across both the
/// in-memory change and the persistence write, so each mutation is atomic
/// with respect to its own write.
pub struct TaskStore {
    tasks: Mutex<Vec<ExportTask>>,
    storage: Arc<dyn TaskStorage>,
}

impl TaskStore {
    /// Open a store over the given storage adapter, loading persisted tasks.
    pub async fn open(storage: Arc<dyn TaskStorage>) -> Result<Self> {
        let tasks = storage.load().await?;
        tracing::debug!(count = tasks.len(), "Loaded persisted export tasks");
        Ok(Self {
            tasks: Mutex::new(tasks),
            storage,
        })
    }

    /// Insert a task, or merge its fields onto the existing record.
    ///
    /// An existing record keeps its `created_at`, and `completed_at` is
    /// stamped on a first transition into a terminal state (never re-set);
    /// every other field is overwritten by the supplied task, and the record
    /// moves to the front of the collection. A new record is stamped with
    /// the current time and inserted at the front, after which the
    /// collection is truncated to the most recent [`MAX_TRACKED_TASKS`].
    ///
    /// Returns whether the task was newly inserted, plus the stored record.
    pub async fn add_or_update(&self, task: ExportTask) -> Result<(bool, ExportTask)> {
        let mut tasks = self.tasks.lock().await;

        let (inserted, snapshot) = match tasks.iter().position(|t| t.id == task.id) {
            Some(index) => {
                let mut existing = tasks.remove(index);
                merge_task(&mut existing, task);
                let snapshot = existing.clone();
                tasks.insert(0, existing);
                (false, snapshot)
            }
            None => {
                let mut task = task;
                task.created_at = Utc::now();
                let snapshot = task.clone();
                tasks.insert(0, task);
                tasks.truncate(MAX_TRACKED_TASKS);
                (true, snapshot)
            }
        };

        self.persist(&tasks).await?;
        Ok((inserted, snapshot))
    }

    /// Merge the given fields onto the record matching `id`, in place.
    ///
    /// Returns the updated record, or `None` when the id is unknown (a
    /// no-op that leaves storage untouched).
    pub async fn partial_update(
        &self,
        id: &ExportId,
        patch: TaskPatch,
    ) -> Result<Option<ExportTask>> {
        let mut tasks = self.tasks.lock().await;

        let Some(task) = tasks.iter_mut().find(|t| &t.id == id) else {
            return Ok(None);
        };
        apply_patch(task, patch);
        let snapshot = task.clone();

        self.persist(&tasks).await?;
        Ok(Some(snapshot))
    }

    /// Delete the record matching `id`. Returns whether a record was removed.
    pub async fn remove(&self, id: &ExportId) -> Result<bool> {
        let mut tasks = self.tasks.lock().await;

        let before = tasks.len();
        tasks.retain(|t| &t.id != id);
        if tasks.len() == before {
            return Ok(false);
        }

        self.persist(&tasks).await?;
        Ok(true)
    }

    /// Delete every record in a terminal state. Returns how many were removed.
    pub async fn clear_terminal(&self) -> Result<usize> {
        let mut tasks = self.tasks.lock().await;

        let before = tasks.len();
        tasks.retain(|t| !t.is_terminal());
        let removed = before - tasks.len();
        if removed == 0 {
            return Ok(0);
        }

        self.persist(&tasks).await?;
        Ok(removed)
    }

    /// Snapshot of all tracked tasks, newest first.
    pub async fn all(&self) -> Vec<ExportTask> {
        self.tasks.lock().await.clone()
    }

    /// Fetch one task by id.
    pub async fn get(&self, id: &ExportId) -> Option<ExportTask> {
        self.tasks.lock().await.iter().find(|t| &t.id == id).cloned()
    }

    /// Number of tracked tasks.
    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.tasks.lock().await.is_empty()
    }

    async fn persist(&self, tasks: &[ExportTask]) -> Result<()> {
        self.storage.save(tasks).await
    }
}

/// Overwrite an existing record with the supplied task's fields.
///
/// `created_at` is immutable; `completed_at` follows the single-stamp rule.
fn merge_task(existing: &mut ExportTask, incoming: ExportTask) {
    let created_at = existing.created_at;
    let completed_at = existing.completed_at;

    *existing = incoming;
    existing.created_at = created_at;
    existing.completed_at = completed_at;

    if existing.status.is_terminal() && existing.completed_at.is_none() {
        existing.completed_at = Some(Utc::now());
    }
}

/// Apply a partial update, stamping `completed_at` on a first terminal
/// transition.
fn apply_patch(task: &mut ExportTask, patch: TaskPatch) {
    if let Some(status) = patch.status {
        task.status = status;
        if status.is_terminal() && task.completed_at.is_none() {
            task.completed_at = Some(Utc::now());
        }
    }
    if let Some(progress) = patch.progress {
        task.progress = Some(progress);
    }
    if let Some(download_url) = patch.download_url {
        task.download_url = Some(download_url);
    }
    if let Some(filename) = patch.filename {
        task.filename = Some(filename);
    }
    if let Some(error_message) = patch.error_message {
        task.error_message = Some(error_message);
    }
    if let Some(page_ids) = patch.page_ids {
        task.page_ids = Some(page_ids);
    }
}
