//! Database layer for the directory
//!
//! Provides:
//! - SeaORM entity models
//! - The `SubmissionStore` seam used by intake and the gateway
//! - A Postgres-backed repository and an in-memory store
//! - Connection pool management

pub mod models;
mod memory;
mod repository;

pub use memory::MemoryStore;
pub use repository::Repository;

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use models::{Submission, SubmissionStatus};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Verification fields written after a badge check
#[derive(Debug, Clone)]
pub struct VerificationUpdate {
    pub backlink_verified: bool,
    pub backlink_verified_at: Option<DateTime<Utc>>,
    pub status: SubmissionStatus,
}

/// Persistence contract for submissions
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Check connectivity
    async fn ping(&self) -> Result<()>;

    /// Whether a category id exists
    async fn category_exists(&self, id: Uuid) -> Result<bool>;

    /// Insert a fully built submission (single atomic insert)
    async fn insert_submission(&self, submission: Submission) -> Result<Submission>;

    /// Find a submission by id
    async fn find_submission(&self, id: Uuid) -> Result<Option<Submission>>;

    /// Write the outcome of a badge check
    async fn update_verification(
        &self,
        id: Uuid,
        update: VerificationUpdate,
    ) -> Result<Submission>;

    /// Mark every due pending/verified submission as published
    async fn publish_due(&self, now: DateTime<Utc>) -> Result<u64>;

    /// Publicly visible submissions, newest first
    async fn list_visible(
        &self,
        now: DateTime<Utc>,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<Submission>, u64)>;

    /// Submission counts grouped by status
    async fn count_by_status(&self) -> Result<Vec<(String, u64)>>;

    /// Most recent submissions, optionally filtered by status
    async fn list_recent(
        &self,
        status: Option<SubmissionStatus>,
        limit: u64,
    ) -> Result<Vec<Submission>>;
}

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    /// Primary connection (for writes)
    pub primary: DatabaseConnection,

    /// Read replica connection (optional)
    pub replica: Option<DatabaseConnection>,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to primary database...");

        let primary = Self::connect(&config.url, config)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect to primary: {}", e)
            })?;

        // Connect to replica if configured
        let replica = match config.read_url {
            Some(ref read_url) => {
                info!("Connecting to read replica...");
                let conn = Self::connect(read_url, config)
                    .await
                    .map_err(|e| AppError::DatabaseConnection {
                        message: format!("Failed to connect to replica: {}", e)
                    })?;
                Some(conn)
            }
            None => None,
        };

        info!("Database connections established");

        Ok(Self { primary, replica })
    }

    async fn connect(
        url: &str,
        config: &DatabaseConfig,
    ) -> std::result::Result<DatabaseConnection, sea_orm::DbErr> {
        let mut opts = ConnectOptions::new(url);
        opts
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .sqlx_logging(false);

        Database::connect(opts).await
    }

    /// Get the connection for reads (replica if available, otherwise primary)
    pub fn read(&self) -> &DatabaseConnection {
        self.replica.as_ref().unwrap_or(&self.primary)
    }

    /// Get the connection for writes (always primary)
    pub fn write(&self) -> &DatabaseConnection {
        &self.primary
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        use sea_orm::ConnectionTrait;

        self.primary
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Primary ping failed: {}", e),
            })?;

        if let Some(ref replica) = self.replica {
            replica
                .execute_unprepared("SELECT 1")
                .await
                .map_err(|e| AppError::DatabaseConnection {
                    message: format!("Replica ping failed: {}", e),
                })?;
        }

        Ok(())
    }
}
