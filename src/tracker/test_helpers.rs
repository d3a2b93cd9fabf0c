//! Shared fixtures for tracker tests.

use crate::client::{StatusClient, StatusResponse, TaskPayload};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::storage::MemoryStorage;
use crate::tracker::ExportTracker;
use crate::types::{ExportFormat, ExportId, ExportTask, TaskStatus};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// One scripted answer from the fake status endpoint.
pub(crate) enum Reply {
    /// Successful response with the given body
    Ok(StatusResponse),
    /// Transport-class failure surfaced as an endpoint error
    TransportError(String),
}

/// Fake status client that plays back a script of replies.
///
/// Once the script is exhausted it keeps answering `RUNNING`, so a loop
/// under test stays alive until cancelled or shut down.
pub(crate) struct ScriptedClient {
    script: Mutex<VecDeque<Reply>>,
    calls: AtomicUsize,
}

impl ScriptedClient {
    pub(crate) fn new(script: Vec<Reply>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of status queries received so far.
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusClient for ScriptedClient {
    async fn fetch_status(&self, _project_id: &str, _task_id: &str) -> Result<StatusResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().await.pop_front();
        match next {
            Some(Reply::Ok(response)) => Ok(response),
            Some(Reply::TransportError(message)) => Err(Error::Endpoint(message)),
            None => {
                if let Reply::Ok(response) = running_reply(10, 1) {
                    Ok(response)
                } else {
                    unreachable!("running_reply always builds an Ok reply")
                }
            }
        }
    }
}

fn payload(status: TaskStatus) -> TaskPayload {
    TaskPayload {
        status,
        progress: None,
        download_url: None,
        filename: None,
        error_message: None,
        error: None,
    }
}

/// RUNNING reply carrying a structured progress snapshot.
pub(crate) fn running_reply(total: u32, completed: u32) -> Reply {
    let mut body = payload(TaskStatus::Running);
    body.progress = Some(serde_json::json!({ "total": total, "completed": completed }));
    Reply::Ok(StatusResponse { task: Some(body) })
}

/// COMPLETED reply with the artifact described inside the progress payload.
pub(crate) fn completed_reply(download_url: &str, filename: &str) -> Reply {
    let mut body = payload(TaskStatus::Completed);
    body.progress = Some(serde_json::json!({
        "download_url": download_url,
        "filename": filename,
    }));
    Reply::Ok(StatusResponse { task: Some(body) })
}

/// FAILED reply with the given error fields.
pub(crate) fn failed_reply(error_message: Option<&str>, error: Option<&str>) -> Reply {
    let mut body = payload(TaskStatus::Failed);
    body.error_message = error_message.map(str::to_string);
    body.error = error.map(str::to_string);
    Reply::Ok(StatusResponse { task: Some(body) })
}

/// Well-formed reply lacking a task body.
pub(crate) fn no_task_reply() -> Reply {
    Reply::Ok(StatusResponse { task: None })
}

/// Transport failure with the given message.
pub(crate) fn transport_error_reply(message: &str) -> Reply {
    Reply::TransportError(message.to_string())
}

/// Pending task addressed at project-1 / remote-{id}.
pub(crate) fn task(id: &str) -> ExportTask {
    ExportTask::new(
        ExportId::new(id),
        "project-1",
        format!("remote-{id}"),
        ExportFormat::Pptx,
    )
}

/// Tracker over in-memory storage and a scripted client, polling fast.
pub(crate) async fn scripted_tracker(script: Vec<Reply>) -> (ExportTracker, Arc<ScriptedClient>) {
    let client = Arc::new(ScriptedClient::new(script));
    let mut config = Config::default();
    config.poll.interval = Duration::from_millis(25);
    config.poll.backoff.min_delay = Duration::from_millis(25);
    config.poll.backoff.max_delay = Duration::from_millis(100);

    let tracker = ExportTracker::with_parts(config, Arc::new(MemoryStorage::new()), client.clone())
        .await
        .expect("tracker construction should succeed");
    (tracker, client)
}

/// Poll until the condition holds, panicking after five seconds.
pub(crate) async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if condition().await {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within five seconds"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Wait until the tracked task reaches the given status, returning it.
pub(crate) async fn wait_for_status(
    tracker: &ExportTracker,
    id: &ExportId,
    status: TaskStatus,
) -> ExportTask {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(task) = tracker.task(id).await
            && task.status == status
        {
            return task;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "task {id} did not reach {status:?} within five seconds"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
