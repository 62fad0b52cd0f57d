// ABOUTME: Tenant database abstraction with runtime backend selection
// ABOUTME: Dispatches to sqlite or postgres pools based on the connection string scheme
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Querybase Contributors

//! # Tenant Database Backends
//!
//! A [`TenantDatabase`] wraps one bounded connection pool against one tenant's
//! physical database. The backend is chosen from the connection string scheme:
//! `sqlite:` for file-per-tenant databases (default), `postgres:`/`postgresql:`
//! for server-hosted databases behind the `postgresql` feature.

/// Postgres backend (requires the `postgresql` feature)
#[cfg(feature = "postgresql")]
pub mod postgres;
/// Sqlite backend (default)
pub mod sqlite;

use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::config::TenantPoolConfig;
use crate::errors::{AppError, AppResult};
use crate::models::{QueryType, SchemaTable};

#[cfg(feature = "postgresql")]
use sqlx::postgres::PgPoolOptions;
#[cfg(feature = "postgresql")]
use sqlx::PgPool;

/// One live, bounded connection pool against one tenant database
#[derive(Debug, Clone)]
pub enum TenantDatabase {
    /// File-backed sqlite tenant database
    SQLite(SqlitePool),
    /// Server-hosted postgres tenant database
    #[cfg(feature = "postgresql")]
    PostgreSQL(PgPool),
}

impl TenantDatabase {
    /// Open a bounded pool against `connection_string`.
    ///
    /// The pool caps concurrent connections at
    /// [`TenantPoolConfig::max_connections`]; checkouts beyond the cap wait up
    /// to the acquire timeout and then fail rather than blocking forever.
    ///
    /// # Errors
    ///
    /// Returns a connection error if the database is unreachable or rejects
    /// credentials, and a configuration error for a `postgres:` URL when the
    /// `postgresql` feature is not compiled in.
    pub async fn connect(
        connection_string: &str,
        config: &TenantPoolConfig,
    ) -> AppResult<Self> {
        if connection_string.starts_with("sqlite:") {
            let pool = SqlitePoolOptions::new()
                .max_connections(config.max_connections)
                .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
                .connect(connection_string)
                .await
                .map_err(|e| AppError::connection(format!("failed to open tenant pool: {e}")))?;
            return Ok(Self::SQLite(pool));
        }

        if connection_string.starts_with("postgres://")
            || connection_string.starts_with("postgresql://")
        {
            #[cfg(feature = "postgresql")]
            {
                let pool = PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
                    .connect(connection_string)
                    .await
                    .map_err(|e| {
                        AppError::connection(format!("failed to open tenant pool: {e}"))
                    })?;
                return Ok(Self::PostgreSQL(pool));
            }
            #[cfg(not(feature = "postgresql"))]
            {
                return Err(AppError::config(
                    "postgres connection string supplied but postgresql support is not compiled in",
                ));
            }
        }

        Err(AppError::config(format!(
            "unsupported connection string scheme: {}",
            scheme_of(connection_string)
        )))
    }

    /// Descriptive backend label for logging
    #[must_use]
    pub const fn backend_info(&self) -> &'static str {
        match self {
            Self::SQLite(_) => "sqlite",
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(_) => "postgresql",
        }
    }

    /// Cheap liveness probe, used when importing an existing database
    ///
    /// # Errors
    ///
    /// Returns a connection error if the probe statement fails.
    pub async fn ping(&self) -> AppResult<()> {
        match self {
            Self::SQLite(pool) => sqlite::ping(pool).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(pool) => postgres::ping(pool).await,
        }
    }

    /// Run one already-validated statement and return `(rows, row_count)`.
    ///
    /// Row-returning statements yield JSON objects and their count;
    /// write statements yield no rows and the affected-row count.
    ///
    /// # Errors
    ///
    /// Returns a query execution error with the driver's diagnostic text.
    pub async fn run_statement(
        &self,
        sql: &str,
        query_type: QueryType,
    ) -> AppResult<(Vec<serde_json::Value>, u64)> {
        match self {
            Self::SQLite(pool) => sqlite::run_statement(pool, sql, query_type).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(pool) => postgres::run_statement(pool, sql, query_type).await,
        }
    }

    /// Produce a fresh structural snapshot of the tenant database.
    ///
    /// Output is deterministic: tables sorted by name, columns in catalog
    /// order, foreign keys sorted by referencing column. An empty database
    /// yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns a schema introspection error if a catalog query fails.
    pub async fn introspect(&self) -> AppResult<Vec<SchemaTable>> {
        match self {
            Self::SQLite(pool) => sqlite::introspect(pool).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(pool) => postgres::introspect(pool).await,
        }
    }

    /// Close all connections in the pool
    pub async fn close(&self) {
        match self {
            Self::SQLite(pool) => pool.close().await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(pool) => pool.close().await,
        }
    }

    /// True once [`Self::close`] has run
    #[must_use]
    pub fn is_closed(&self) -> bool {
        match self {
            Self::SQLite(pool) => pool.is_closed(),
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(pool) => pool.is_closed(),
        }
    }
}

/// Quote an identifier that came out of the catalog, doubling embedded quotes.
/// Caller-supplied values are never passed through here.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn scheme_of(connection_string: &str) -> &str {
    connection_string
        .split(':')
        .next()
        .unwrap_or(connection_string)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn quote_ident_doubles_embedded_quotes() {
        assert_eq!(quote_ident("items"), "\"items\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[tokio::test]
    async fn unsupported_scheme_is_rejected() {
        let err = TenantDatabase::connect("mysql://localhost/x", &TenantPoolConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
