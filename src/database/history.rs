// ABOUTME: Durable log of every SQL execution attempt with filtered, paginated retrieval
// ABOUTME: Records are written once per attempt; only favorite and annotation mutate
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Querybase Contributors

//! # History Recorder
//!
//! Every execution attempt through the query gateway lands here exactly
//! once, success or failure. Retrieval is always scoped to one
//! `(project_id, user_id)` pair; the filter dimensions are ANDed inside
//! that scope, and the page and total count are computed against the same
//! predicate.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::projects::parse_uuid;
use crate::errors::{AppError, AppResult};
use crate::models::{QueryHistoryRecord, QueryType};

/// Creation-date window for history filtering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DateRange {
    /// Since midnight UTC today
    Today,
    /// Last 7 days
    Last7Days,
    /// Last 30 days
    Last30Days,
    /// No date restriction
    #[default]
    All,
}

impl DateRange {
    fn cutoff(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Today => Some(now.date_naive().and_time(NaiveTime::MIN).and_utc()),
            Self::Last7Days => Some(now - Duration::days(7)),
            Self::Last30Days => Some(now - Duration::days(30)),
            Self::All => None,
        }
    }
}

/// Filter dimensions, ANDed together under the project/user scope
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryFilter {
    /// Restrict to successes (true) or failures (false)
    pub success: Option<bool>,
    /// Restrict to one statement category
    pub query_type: Option<QueryType>,
    /// Creation-date window
    pub date_range: DateRange,
    /// Restrict to favorited records
    pub favorite_only: bool,
}

/// One page of matching records plus the total matching count
#[derive(Debug, Clone)]
pub struct HistoryPage {
    /// Matching records, newest first
    pub items: Vec<QueryHistoryRecord>,
    /// Total records matching the same predicate, for pagination
    pub total: u64,
}

/// History database operations
#[derive(Clone)]
pub struct HistoryRecorder {
    pool: SqlitePool,
}

impl HistoryRecorder {
    /// Create a recorder over the metadata store pool
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append one execution attempt. Called exactly once per attempt.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn record(&self, entry: &QueryHistoryRecord) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO query_history (
                id, project_id, user_id, query_text, query_type, annotation,
                execution_time_ms, success, error_message, favorite, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ",
        )
        .bind(entry.id.to_string())
        .bind(entry.project_id.to_string())
        .bind(entry.user_id.to_string())
        .bind(&entry.query_text)
        .bind(entry.query_type.as_str())
        .bind(&entry.annotation)
        .bind(entry.execution_time_ms as i64)
        .bind(entry.success)
        .bind(&entry.error_message)
        .bind(entry.favorite)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to record history entry: {e}")))?;
        Ok(())
    }

    /// Retrieve one page of matching records (newest first) and the total
    /// count under the same predicate.
    ///
    /// # Errors
    ///
    /// Returns an error if either query fails.
    pub async fn query(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        filter: &HistoryFilter,
        limit: u32,
        offset: u32,
    ) -> AppResult<HistoryPage> {
        let now = Utc::now();

        let mut count_qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM query_history");
        push_predicate(&mut count_qb, project_id, user_id, filter, now);
        let total_row = count_qb
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("failed to count history: {e}")))?;
        let total: i64 = total_row
            .try_get(0)
            .map_err(|e| AppError::database(format!("malformed history count: {e}")))?;

        let mut page_qb = QueryBuilder::<Sqlite>::new("SELECT * FROM query_history");
        push_predicate(&mut page_qb, project_id, user_id, filter, now);
        page_qb.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        page_qb.push_bind(i64::from(limit));
        page_qb.push(" OFFSET ");
        page_qb.push_bind(i64::from(offset));
        let rows = page_qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("failed to query history: {e}")))?;

        let items = rows.iter().map(record_from_row).collect::<AppResult<_>>()?;
        Ok(HistoryPage {
            items,
            total: total.max(0) as u64,
        })
    }

    /// Fetch one record, scoped to its owner
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an absent or foreign record.
    pub async fn get_record(
        &self,
        history_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<QueryHistoryRecord> {
        let row = sqlx::query("SELECT * FROM query_history WHERE id = $1 AND user_id = $2")
            .bind(history_id.to_string())
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("failed to fetch history entry: {e}")))?;
        row.as_ref().map(record_from_row).transpose()?.ok_or_else(|| {
            AppError::not_found(format!("history record {history_id} not found"))
        })
    }

    /// Replace the natural-language annotation on an owned record
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no owned row was updated.
    pub async fn update_annotation(
        &self,
        history_id: Uuid,
        user_id: Uuid,
        annotation: &str,
    ) -> AppResult<()> {
        let result =
            sqlx::query("UPDATE query_history SET annotation = $3 WHERE id = $1 AND user_id = $2")
                .bind(history_id.to_string())
                .bind(user_id.to_string())
                .bind(annotation)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::database(format!("failed to update annotation: {e}")))?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!(
                "history record {history_id} not found"
            )));
        }
        Ok(())
    }

    /// Flip the favorite flag on an owned record
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no owned row was updated.
    pub async fn set_favorite(
        &self,
        history_id: Uuid,
        user_id: Uuid,
        favorite: bool,
    ) -> AppResult<()> {
        let result =
            sqlx::query("UPDATE query_history SET favorite = $3 WHERE id = $1 AND user_id = $2")
                .bind(history_id.to_string())
                .bind(user_id.to_string())
                .bind(favorite)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::database(format!("failed to update favorite: {e}")))?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!(
                "history record {history_id} not found"
            )));
        }
        Ok(())
    }
}

/// Append the WHERE clause shared by the count and page queries. Both run
/// against the identical predicate so totals stay consistent with pages.
fn push_predicate(
    qb: &mut QueryBuilder<'_, Sqlite>,
    project_id: Uuid,
    user_id: Uuid,
    filter: &HistoryFilter,
    now: DateTime<Utc>,
) {
    qb.push(" WHERE project_id = ");
    qb.push_bind(project_id.to_string());
    qb.push(" AND user_id = ");
    qb.push_bind(user_id.to_string());
    if let Some(success) = filter.success {
        qb.push(" AND success = ");
        qb.push_bind(success);
    }
    if let Some(query_type) = filter.query_type {
        qb.push(" AND query_type = ");
        qb.push_bind(query_type.as_str());
    }
    if let Some(cutoff) = filter.date_range.cutoff(now) {
        qb.push(" AND created_at >= ");
        qb.push_bind(cutoff);
    }
    if filter.favorite_only {
        qb.push(" AND favorite = TRUE");
    }
}

fn record_from_row(row: &SqliteRow) -> AppResult<QueryHistoryRecord> {
    let db_err = |e: sqlx::Error| AppError::database(format!("malformed history row: {e}"));
    let id: String = row.try_get("id").map_err(db_err)?;
    let project_id: String = row.try_get("project_id").map_err(db_err)?;
    let user_id: String = row.try_get("user_id").map_err(db_err)?;
    let query_type: String = row.try_get("query_type").map_err(db_err)?;
    let execution_time_ms: i64 = row.try_get("execution_time_ms").map_err(db_err)?;
    Ok(QueryHistoryRecord {
        id: parse_uuid(&id)?,
        project_id: parse_uuid(&project_id)?,
        user_id: parse_uuid(&user_id)?,
        query_text: row.try_get("query_text").map_err(db_err)?,
        query_type: QueryType::from_str_lossy(&query_type),
        annotation: row.try_get("annotation").map_err(db_err)?,
        execution_time_ms: execution_time_ms.max(0) as u64,
        success: row.try_get("success").map_err(db_err)?,
        error_message: row.try_get("error_message").map_err(db_err)?,
        favorite: row.try_get("favorite").map_err(db_err)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(db_err)?,
    })
}
