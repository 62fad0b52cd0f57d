// ABOUTME: Core domain models for tenant projects, schema snapshots, and execution results
// ABOUTME: Shared across the registry, provisioning, execution, and history modules
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Querybase Contributors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Resolved caller identity, supplied by the external auth layer after it has
/// verified a session or bearer token. The gateway never inspects credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// Stable caller id
    pub id: Uuid,
    /// Caller email, used for logging only
    pub email: String,
}

/// A tenant project: one logical unit owning exactly one physical database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantProject {
    /// Project id, also the connection-pool registry key
    pub id: Uuid,
    /// Owning caller identity
    pub owner_id: Uuid,
    /// Display name chosen by the owner
    pub name: String,
    /// Optional free-form description
    pub description: Option<String>,
    /// Physical database name derived at provisioning time
    pub database_name: String,
    /// Connection string for the tenant database
    pub connection_string: String,
    /// False once the project has been deactivated
    pub active: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last metadata update
    pub updated_at: DateTime<Utc>,
}

/// Advisory classification of a SQL statement, derived from its leading
/// tokens. Used for history and display, never as a security boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    /// SELECT or WITH statements
    Select,
    /// INSERT statements
    Insert,
    /// UPDATE statements
    Update,
    /// DELETE statements
    Delete,
    /// Data-definition statements (CREATE, DROP, ALTER, TRUNCATE)
    Ddl,
    /// Anything else (PRAGMA, EXPLAIN, vendor extensions)
    Other,
}

impl QueryType {
    /// Stable string form used in history rows and filters
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Ddl => "ddl",
            Self::Other => "other",
        }
    }

    /// Parse the stable string form back into a type, defaulting to `Other`
    #[must_use]
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "select" => Self::Select,
            "insert" => Self::Insert,
            "update" => Self::Update,
            "delete" => Self::Delete,
            "ddl" => Self::Ddl,
            _ => Self::Other,
        }
    }
}

/// Result of one SQL execution through the gateway
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    /// Result rows as JSON objects, empty for non-returning statements
    pub rows: Vec<serde_json::Value>,
    /// Row count: rows returned for reads, rows affected for writes
    pub row_count: u64,
    /// Wall-clock time from submission to completion
    pub elapsed_ms: u64,
    /// Advisory statement classification
    pub query_type: QueryType,
}

/// Column description within a [`SchemaTable`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaColumn {
    /// Column name
    pub name: String,
    /// Declared type as reported by the catalog
    pub data_type: String,
    /// True when NULL is permitted
    pub nullable: bool,
    /// Primary-key or unique constraint marker, when present
    pub constraint: Option<String>,
}

/// Foreign-key relationship within a [`SchemaTable`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    /// Referencing column in this table
    pub column: String,
    /// Referenced table
    pub foreign_table: String,
    /// Referenced column
    pub foreign_column: String,
}

/// Point-in-time structural description of one table in a tenant database.
/// Snapshots are recomputed fresh on every request and never cached, so the
/// output always reflects the live database at call time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaTable {
    /// Table name
    pub name: String,
    /// Columns, sorted by catalog ordinal
    pub columns: Vec<SchemaColumn>,
    /// Outgoing foreign-key references
    pub foreign_keys: Vec<ForeignKeyRef>,
}

/// Immutable log entry for one SQL execution attempt. Only `favorite` and
/// `annotation` may change after the record is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryHistoryRecord {
    /// Record id
    pub id: Uuid,
    /// Project the statement ran against
    pub project_id: Uuid,
    /// Caller who submitted the statement
    pub user_id: Uuid,
    /// The statement text as submitted
    pub query_text: String,
    /// Advisory classification at execution time
    pub query_type: QueryType,
    /// Optional natural-language annotation (caller-supplied or AI-generated)
    pub annotation: Option<String>,
    /// Measured wall-clock execution time
    pub execution_time_ms: u64,
    /// Whether the statement completed successfully
    pub success: bool,
    /// Driver error text on failure
    pub error_message: Option<String>,
    /// Favorite flag, the only other mutable field
    pub favorite: bool,
    /// When the attempt was recorded
    pub created_at: DateTime<Utc>,
}
