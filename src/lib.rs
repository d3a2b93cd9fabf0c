//! # export-tracker
//!
//! Client-side tracker for long-running asynchronous export jobs
//! (document/slide-deck export) submitted to a remote service.
//!
//! ## Design Philosophy
//!
//! export-tracker is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Durable** - The task collection is written through to storage on
//!   every mutation and reloaded after a restart
//! - **Event-driven** - Consumers subscribe to task events, no polling of
//!   the tracker itself required
//! - **Sensible defaults** - Works out of the box with zero configuration
//!
//! ## Quick Start
//!
//! ```no_run
//! use export_tracker::{Config, ExportFormat, ExportId, ExportTask, ExportTracker};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tracker = ExportTracker::new(Config::default()).await?;
//!
//!     // Resume polling for exports still in flight from the last session
//!     tracker.restore_active_tasks().await;
//!
//!     // Subscribe to task events
//!     let mut events = tracker.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     // Track a freshly submitted export and start polling it
//!     let id = ExportId::new("export-1");
//!     let task = ExportTask::new(id.clone(), "project-42", "task-7", ExportFormat::Pptx);
//!     tracker.add_task(task).await?;
//!     tracker.poll_task(&id, "project-42", "task-7").await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Poll rescheduling delays with growth, cap, and jitter
pub mod backoff;
/// Remote status endpoint client
pub mod client;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Task repository and persistence layer
pub mod store;
/// Export tracking service
pub mod tracker;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use backoff::Backoff;
pub use client::{HttpStatusClient, StatusClient, StatusResponse, TaskPayload};
pub use config::{BackoffConfig, Config, EndpointConfig, PersistenceConfig, PollConfig};
pub use error::{Error, Result, StorageError};
pub use store::storage::{MemoryStorage, STORAGE_KEY, SqliteStorage, TaskStorage};
pub use store::{MAX_TRACKED_TASKS, TaskStore};
pub use tracker::ExportTracker;
pub use types::{
    ExportFormat, ExportId, ExportProgress, ExportTask, ProgressPayload, TaskEvent, TaskPatch,
    TaskStatus, WarningDetails, WarningEntry,
};
