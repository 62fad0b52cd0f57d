// ABOUTME: Unified error type and result alias for the gateway
// ABOUTME: Maps provisioning, execution, admission, and storage failures to one taxonomy
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Querybase Contributors

//! # Gateway Error Taxonomy
//!
//! Every fallible operation in the crate returns [`AppResult`]. The variants
//! mirror the failure domains of the gateway: reaching a tenant database,
//! creating or dropping one, introspecting it, executing SQL against it,
//! and admission control. Constructor helpers keep call sites terse.

use thiserror::Error;

/// Result alias used throughout the crate
pub type AppResult<T> = Result<T, AppError>;

/// Unified application error
#[derive(Debug, Error)]
pub enum AppError {
    /// Tenant database unreachable or rejected credentials
    #[error("connection error: {0}")]
    Connection(String),

    /// Creating or dropping a physical tenant database failed
    #[error("provisioning error: {0}")]
    Provisioning(String),

    /// Catalog query against a tenant database failed
    #[error("schema introspection error: {0}")]
    SchemaIntrospection(String),

    /// Statement failed at runtime, or was rejected by execution policy
    #[error("query execution error: {message}")]
    QueryExecution {
        /// Diagnostic text returned to the caller
        message: String,
        /// True when the statement was rejected by the destructive-keyword
        /// policy before reaching the database
        dangerous: bool,
    },

    /// Admission denied by the rate limiter
    #[error("rate limit exceeded, retry after {retry_after_ms}ms")]
    RateLimitExceeded {
        /// Milliseconds until the next point becomes available
        retry_after_ms: u64,
    },

    /// Referenced project or record absent, or not owned by the caller
    #[error("not found: {0}")]
    NotFound(String),

    /// Gateway metadata store operation failed
    #[error("database error: {0}")]
    Database(String),

    /// Caller-supplied input rejected before any resource was touched
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration missing or malformed
    #[error("configuration error: {0}")]
    Config(String),

    /// Unexpected internal failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Tenant database unreachable or rejected credentials
    #[must_use]
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Physical database create/drop failed
    #[must_use]
    pub fn provisioning(msg: impl Into<String>) -> Self {
        Self::Provisioning(msg.into())
    }

    /// Catalog query failed
    #[must_use]
    pub fn schema_introspection(msg: impl Into<String>) -> Self {
        Self::SchemaIntrospection(msg.into())
    }

    /// Statement failed at runtime
    #[must_use]
    pub fn query_execution(msg: impl Into<String>) -> Self {
        Self::QueryExecution {
            message: msg.into(),
            dangerous: false,
        }
    }

    /// Statement rejected by the destructive-keyword policy
    #[must_use]
    pub fn dangerous_operation(msg: impl Into<String>) -> Self {
        Self::QueryExecution {
            message: msg.into(),
            dangerous: true,
        }
    }

    /// Metadata store failure
    #[must_use]
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Referenced entity absent or not visible to the caller
    #[must_use]
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Caller-supplied input rejected
    #[must_use]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Configuration missing or malformed
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Unexpected internal failure
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True when this error is a policy rejection of a destructive statement
    #[must_use]
    pub const fn is_dangerous_operation(&self) -> bool {
        matches!(
            self,
            Self::QueryExecution {
                dangerous: true,
                ..
            }
        )
    }
}
