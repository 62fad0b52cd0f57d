// ABOUTME: Gateway metadata store holding tenant project rows and query history
// ABOUTME: Sqlite-backed with compile-time embedded migrations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Querybase Contributors

/// Query history recording and filtered retrieval
pub mod history;
/// Tenant project metadata operations
pub mod projects;

pub use history::{DateRange, HistoryFilter, HistoryPage, HistoryRecorder};

use sqlx::{Pool, Sqlite, SqlitePool};
use tracing::info;

use crate::errors::{AppError, AppResult};

/// Metadata store connection pool. Distinct from every tenant pool; this is
/// the gateway's own bookkeeping database.
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Open the metadata store and run pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or a migration fails.
    pub async fn new(database_url: &str) -> AppResult<Self> {
        // Ensure sqlite creates the database file if it doesn't exist
        let connection_options = if database_url.starts_with("sqlite:") {
            format!("{database_url}?mode=rwc")
        } else {
            database_url.to_owned()
        };

        let pool = SqlitePool::connect(&connection_options)
            .await
            .map_err(|e| AppError::database(format!("failed to connect to metadata store: {e}")))?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Run all pending migrations embedded at compile time from ./migrations
    ///
    /// # Errors
    ///
    /// Returns an error if any migration fails.
    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("migration failed: {e}")))?;
        info!("metadata store migrations completed");
        Ok(())
    }

    /// Reference to the underlying pool
    #[must_use]
    pub const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}
