//! Durable storage adapters for the task repository
//!
//! The repository persists its full task collection under a single fixed
//! storage key after every mutation, so tracked exports survive a process
//! restart. [`SqliteStorage`] is the production adapter; [`MemoryStorage`]
//! backs tests and ephemeral embedding.

use crate::error::{Error, Result, StorageError};
use crate::types::ExportTask;
use async_trait::async_trait;
use sqlx::SqliteConnection;
use sqlx::sqlite::SqlitePool;
use std::path::Path;

/// Fixed key the serialized task collection is stored under
pub const STORAGE_KEY: &str = "export_tasks";

/// Save/load capability for the serialized task collection
///
/// Implementations hold the whole collection as one value; the repository
/// writes through on every mutation and loads once at startup.
#[async_trait]
pub trait TaskStorage: Send + Sync {
    /// Persist the full task collection.
    async fn save(&self, tasks: &[ExportTask]) -> Result<()>;

    /// Load the persisted task collection; empty if nothing was stored yet.
    async fn load(&self) -> Result<Vec<ExportTask>>;
}

/// SQLite-backed storage adapter
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open the database at `path` and run migrations.
    ///
    /// Creates the database file (and its parent directory) if missing.
    pub async fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Storage(StorageError::ConnectionFailed(format!(
                    "Failed to create database directory: {}",
                    e
                )))
            })?;
        }

        use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| {
                Error::Storage(StorageError::ConnectionFailed(format!(
                    "Failed to parse database path: {}",
                    e
                )))
            })?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            Error::Storage(StorageError::ConnectionFailed(format!(
                "Failed to connect to database: {}",
                e
            )))
        })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            Error::Storage(StorageError::ConnectionFailed(format!(
                "Failed to acquire connection: {}",
                e
            )))
        })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Storage(StorageError::MigrationFailed(format!(
                "Failed to create schema_version table: {}",
                e
            )))
        })?;

        let current_version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| {
                    Error::Storage(StorageError::QueryFailed(format!(
                        "Failed to query schema version: {}",
                        e
                    )))
                })?
                .flatten();

        if current_version.unwrap_or(0) < 1 {
            Self::migrate_v1(&mut conn).await?;
        }

        Ok(())
    }

    /// Migration v1: key-value state table holding the serialized collection
    async fn migrate_v1(conn: &mut SqliteConnection) -> Result<()> {
        tracing::info!("Applying tracker storage migration v1");

        sqlx::query("BEGIN")
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Storage(StorageError::MigrationFailed(format!(
                    "Failed to begin transaction: {}",
                    e
                )))
            })?;

        let result = async {
            sqlx::query(
                r#"
                CREATE TABLE tracker_state (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at INTEGER NOT NULL
                )
                "#,
            )
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Storage(StorageError::MigrationFailed(format!(
                    "Failed to create tracker_state table: {}",
                    e
                )))
            })?;

            let now = chrono::Utc::now().timestamp();
            sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
                .bind(1)
                .bind(now)
                .execute(&mut *conn)
                .await
                .map_err(|e| {
                    Error::Storage(StorageError::MigrationFailed(format!(
                        "Failed to record migration: {}",
                        e
                    )))
                })?;

            Ok::<(), Error>(())
        }
        .await;

        match result {
            Ok(()) => {
                sqlx::query("COMMIT")
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| {
                        Error::Storage(StorageError::MigrationFailed(format!(
                            "Failed to commit migration v1: {}",
                            e
                        )))
                    })?;
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                return Err(e);
            }
        }

        tracing::info!("Tracker storage migration v1 complete");
        Ok(())
    }

    /// Close the underlying connection pool
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl TaskStorage for SqliteStorage {
    async fn save(&self, tasks: &[ExportTask]) -> Result<()> {
        let payload = serde_json::to_string(tasks)?;
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO tracker_state (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = ?, updated_at = ?
            "#,
        )
        .bind(STORAGE_KEY)
        .bind(&payload)
        .bind(now)
        .bind(&payload)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Storage(StorageError::QueryFailed(format!(
                "Failed to persist task collection: {}",
                e
            )))
        })?;

        Ok(())
    }

    async fn load(&self) -> Result<Vec<ExportTask>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM tracker_state WHERE key = ?")
                .bind(STORAGE_KEY)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    Error::Storage(StorageError::QueryFailed(format!(
                        "Failed to load task collection: {}",
                        e
                    )))
                })?;

        match value {
            None => Ok(Vec::new()),
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                Error::Storage(StorageError::Corrupted(format!(
                    "Failed to decode persisted task collection: {}",
                    e
                )))
            }),
        }
    }
}

/// In-memory storage adapter for tests and ephemeral embedding
#[derive(Debug, Default)]
pub struct MemoryStorage {
    value: tokio::sync::Mutex<Option<String>>,
}

impl MemoryStorage {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStorage for MemoryStorage {
    async fn save(&self, tasks: &[ExportTask]) -> Result<()> {
        let payload = serde_json::to_string(tasks)?;
        *self.value.lock().await = Some(payload);
        Ok(())
    }

    async fn load(&self) -> Result<Vec<ExportTask>> {
        let value = self.value.lock().await.clone();
        match value {
            None => Ok(Vec::new()),
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                Error::Storage(StorageError::Corrupted(format!(
                    "Failed to decode persisted task collection: {}",
                    e
                )))
            }),
        }
    }
}
