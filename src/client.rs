//! Remote status endpoint client
//!
//! The export service runs jobs on its side; this module only queries their
//! status. The [`StatusClient`] trait is the seam the poller depends on, with
//! [`HttpStatusClient`] as the production implementation over reqwest.

use crate::config::EndpointConfig;
use crate::error::{Error, Result};
use crate::types::TaskStatus;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Wire payload describing one export task's current state
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskPayload {
    /// Current lifecycle state
    pub status: TaskStatus,

    /// Progress snapshot; either a structure or a serialized JSON string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<serde_json::Value>,

    /// URL of the completed artifact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,

    /// Filename of the completed artifact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Structured failure message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Generic failure field, used when `error_message` is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Envelope returned by the status endpoint
///
/// A well-formed response may lack the task body entirely; the poller treats
/// that as the degraded "no task data" case.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// The task body, when the service returned one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskPayload>,
}

/// Capability interface for querying remote export status
#[async_trait]
pub trait StatusClient: Send + Sync {
    /// Fetch the current status of one export task.
    async fn fetch_status(&self, project_id: &str, task_id: &str) -> Result<StatusResponse>;
}

/// Production client querying the export service over HTTP
pub struct HttpStatusClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpStatusClient {
    /// Build a client for the configured endpoint.
    ///
    /// Every request carries the given bounded timeout; expiry surfaces as a
    /// network error and is handled by the poller as a transport failure.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the base URL cannot be parsed.
    pub fn new(endpoint: &EndpointConfig, request_timeout: Duration) -> Result<Self> {
        Url::parse(&endpoint.base_url).map_err(|e| Error::Config {
            message: format!("invalid endpoint base URL '{}': {}", endpoint.base_url, e),
            key: Some("endpoint.base_url".to_string()),
        })?;

        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(Error::Network)?;

        Ok(Self {
            http,
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn status_url(&self, project_id: &str, task_id: &str) -> String {
        format!(
            "{}/projects/{}/export-tasks/{}",
            self.base_url, project_id, task_id
        )
    }
}

#[async_trait]
impl StatusClient for HttpStatusClient {
    async fn fetch_status(&self, project_id: &str, task_id: &str) -> Result<StatusResponse> {
        let url = self.status_url(project_id, task_id);
        tracing::debug!(url = %url, "Querying export task status");

        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(Error::Endpoint(format!(
                "status endpoint returned HTTP {} for task {}",
                response.status(),
                task_id
            )));
        }

        let body = response.json::<StatusResponse>().await?;
        Ok(body)
    }
}
