// ABOUTME: Validates, classifies, and executes caller-supplied SQL against tenant pools
// ABOUTME: Every attempt, including policy rejections, emits exactly one history record
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Querybase Contributors

//! # Query Execution Gateway
//!
//! The execution path: validate input, classify the statement from its
//! leading tokens, apply the destructive-keyword policy, obtain the tenant
//! pool from the registry, run and time the statement, and record the
//! outcome. Classification is advisory (history and display); the keyword
//! policy is a heuristic, not a security boundary — it can over-block safe
//! statements containing a keyword and under-block obfuscated destructive
//! ones, which is accepted and documented behavior.

use std::sync::{Arc, LazyLock};
use std::time::Instant;

use chrono::Utc;
use regex::Regex;
use tracing::warn;
use uuid::Uuid;

use crate::database::HistoryRecorder;
use crate::errors::{AppError, AppResult};
use crate::models::{
    AuthenticatedUser, ExecutionResult, QueryHistoryRecord, QueryType, TenantProject,
};
use crate::registry::PoolRegistry;

/// Statements allowed through even though they begin with a DDL keyword
#[allow(clippy::expect_used)]
static SAFE_COMPOUND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*create\s+(table|index|unique\s+index|view|trigger)\b")
        .expect("static regex")
});

/// Destructive keyword patterns rejected before any database contact
#[allow(clippy::expect_used)]
static DANGEROUS_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(drop|truncate|alter|grant|revoke|delete)\b").expect("static regex")
});

/// Classify a statement from its leading keyword. Advisory only.
#[must_use]
pub fn classify_statement(sql: &str) -> QueryType {
    let leading = sql
        .trim_start()
        .split_whitespace()
        .next()
        .map(str::to_lowercase)
        .unwrap_or_default();
    match leading.as_str() {
        "select" | "with" => QueryType::Select,
        "insert" => QueryType::Insert,
        "update" => QueryType::Update,
        "delete" => QueryType::Delete,
        "create" | "drop" | "alter" | "truncate" => QueryType::Ddl,
        _ => QueryType::Other,
    }
}

/// Apply the destructive-keyword denylist. Recognized safe compounds
/// (CREATE TABLE and friends) short-circuit past the keyword scan.
///
/// # Errors
///
/// Returns a dangerous-operation error naming the matched keyword.
pub fn check_statement_policy(sql: &str) -> AppResult<()> {
    if SAFE_COMPOUND.is_match(sql) {
        return Ok(());
    }
    if let Some(found) = DANGEROUS_KEYWORD.find(sql) {
        return Err(AppError::dangerous_operation(format!(
            "statement contains a blocked destructive keyword: {}",
            found.as_str().to_lowercase()
        )));
    }
    Ok(())
}

/// Executes validated SQL through tenant pools and records every attempt
pub struct QueryGateway {
    registry: Arc<PoolRegistry>,
    history: HistoryRecorder,
}

impl QueryGateway {
    /// Create a gateway over the given registry and history recorder
    #[must_use]
    pub const fn new(registry: Arc<PoolRegistry>, history: HistoryRecorder) -> Self {
        Self { registry, history }
    }

    /// Validate and run `sql` against `project`'s database, measuring
    /// wall-clock time from submission to completion. Exactly one history
    /// record is written per attempt, whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for empty SQL, a dangerous-operation error on
    /// policy rejection, and a `QueryExecution` error carrying the driver's
    /// diagnostic text on statement failure. The caller owns the tenant
    /// database, so driver error text is returned as-is; connection
    /// credentials never appear in it.
    pub async fn execute(
        &self,
        project: &TenantProject,
        user: &AuthenticatedUser,
        sql: &str,
        annotation: Option<String>,
    ) -> AppResult<ExecutionResult> {
        let statement = sql.trim();
        if statement.is_empty() {
            return Err(AppError::invalid_input("query text must not be empty"));
        }
        let query_type = classify_statement(statement);

        if let Err(policy_err) = check_statement_policy(statement) {
            self.record_failure(project, user, statement, query_type, annotation, 0, &policy_err)
                .await;
            return Err(policy_err);
        }

        let started = Instant::now();
        let outcome = self.run(project, statement, query_type).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok((rows, row_count)) => {
                self.history
                    .record(&attempt_record(
                        project, user, statement, query_type, annotation, elapsed_ms, true, None,
                    ))
                    .await?;
                Ok(ExecutionResult {
                    rows,
                    row_count,
                    elapsed_ms,
                    query_type,
                })
            }
            Err(exec_err) => {
                self.record_failure(
                    project, user, statement, query_type, annotation, elapsed_ms, &exec_err,
                )
                .await;
                Err(exec_err)
            }
        }
    }

    async fn run(
        &self,
        project: &TenantProject,
        statement: &str,
        query_type: QueryType,
    ) -> AppResult<(Vec<serde_json::Value>, u64)> {
        let database = self
            .registry
            .get_or_create(project.id, &project.connection_string)
            .await?;
        database.run_statement(statement, query_type).await
    }

    /// Record a failed attempt. A history write error here is logged rather
    /// than returned, so it never masks the original execution error.
    #[allow(clippy::too_many_arguments)]
    async fn record_failure(
        &self,
        project: &TenantProject,
        user: &AuthenticatedUser,
        statement: &str,
        query_type: QueryType,
        annotation: Option<String>,
        elapsed_ms: u64,
        error: &AppError,
    ) {
        let entry = attempt_record(
            project,
            user,
            statement,
            query_type,
            annotation,
            elapsed_ms,
            false,
            Some(error.to_string()),
        );
        if let Err(record_err) = self.history.record(&entry).await {
            warn!(project_id = %project.id, %record_err, "failed to record failed execution attempt");
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn attempt_record(
    project: &TenantProject,
    user: &AuthenticatedUser,
    statement: &str,
    query_type: QueryType,
    annotation: Option<String>,
    elapsed_ms: u64,
    success: bool,
    error_message: Option<String>,
) -> QueryHistoryRecord {
    QueryHistoryRecord {
        id: Uuid::new_v4(),
        project_id: project.id,
        user_id: user.id,
        query_text: statement.to_owned(),
        query_type,
        annotation,
        execution_time_ms: elapsed_ms,
        success,
        error_message,
        favorite: false,
        created_at: Utc::now(),
    }
}
