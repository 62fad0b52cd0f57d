// ABOUTME: Tenant project metadata operations on the gateway store
// ABOUTME: Create, owner-scoped lookup, listing, deactivation, and deletion
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Querybase Contributors

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::Database;
use crate::errors::{AppError, AppResult};
use crate::models::TenantProject;

impl Database {
    /// Persist a new tenant project row
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails (including a duplicate database
    /// name, which is unique-constrained).
    pub async fn create_project(&self, project: &TenantProject) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO tenant_projects (
                id, owner_id, name, description, database_name,
                connection_string, active, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(project.id.to_string())
        .bind(project.owner_id.to_string())
        .bind(&project.name)
        .bind(&project.description)
        .bind(&project.database_name)
        .bind(&project.connection_string)
        .bind(project.active)
        .bind(project.created_at)
        .bind(project.updated_at)
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("failed to create project: {e}")))?;
        Ok(())
    }

    /// Fetch a project by id, regardless of owner
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_project(&self, project_id: Uuid) -> AppResult<Option<TenantProject>> {
        let row = sqlx::query("SELECT * FROM tenant_projects WHERE id = $1")
            .bind(project_id.to_string())
            .fetch_optional(self.pool())
            .await
            .map_err(|e| AppError::database(format!("failed to fetch project: {e}")))?;
        row.as_ref().map(project_from_row).transpose()
    }

    /// Fetch an active project owned by `owner_id`. Absent and foreign
    /// projects are indistinguishable to the caller.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the project is absent, inactive, or owned by
    /// someone else, and a database error if the query fails.
    pub async fn get_owned_project(
        &self,
        project_id: Uuid,
        owner_id: Uuid,
    ) -> AppResult<TenantProject> {
        let row = sqlx::query(
            "SELECT * FROM tenant_projects WHERE id = $1 AND owner_id = $2 AND active = TRUE",
        )
        .bind(project_id.to_string())
        .bind(owner_id.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("failed to fetch project: {e}")))?;
        row.as_ref().map(project_from_row).transpose()?.ok_or_else(|| {
            AppError::not_found(format!("project {project_id} not found"))
        })
    }

    /// List all active projects owned by `owner_id`, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_projects(&self, owner_id: Uuid) -> AppResult<Vec<TenantProject>> {
        let rows = sqlx::query(
            "SELECT * FROM tenant_projects \
             WHERE owner_id = $1 AND active = TRUE \
             ORDER BY created_at DESC",
        )
        .bind(owner_id.to_string())
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("failed to list projects: {e}")))?;
        rows.iter().map(project_from_row).collect()
    }

    /// Mark a project inactive without touching its physical database
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no owned row was updated.
    pub async fn deactivate_project(&self, project_id: Uuid, owner_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE tenant_projects SET active = FALSE, updated_at = $3 \
             WHERE id = $1 AND owner_id = $2",
        )
        .bind(project_id.to_string())
        .bind(owner_id.to_string())
        .bind(Utc::now())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("failed to deactivate project: {e}")))?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!(
                "project {project_id} not found"
            )));
        }
        Ok(())
    }

    /// Hard-delete a project row, used only after its physical database has
    /// been dropped. History rows are kept for audit.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete_project(&self, project_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM tenant_projects WHERE id = $1")
            .bind(project_id.to_string())
            .execute(self.pool())
            .await
            .map_err(|e| AppError::database(format!("failed to delete project: {e}")))?;
        Ok(())
    }
}

fn project_from_row(row: &SqliteRow) -> AppResult<TenantProject> {
    let db_err = |e: sqlx::Error| AppError::database(format!("malformed project row: {e}"));
    let id: String = row.try_get("id").map_err(db_err)?;
    let owner_id: String = row.try_get("owner_id").map_err(db_err)?;
    Ok(TenantProject {
        id: parse_uuid(&id)?,
        owner_id: parse_uuid(&owner_id)?,
        name: row.try_get("name").map_err(db_err)?,
        description: row.try_get("description").map_err(db_err)?,
        database_name: row.try_get("database_name").map_err(db_err)?,
        connection_string: row.try_get("connection_string").map_err(db_err)?,
        active: row.try_get("active").map_err(db_err)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(db_err)?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at").map_err(db_err)?,
    })
}

pub(crate) fn parse_uuid(value: &str) -> AppResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| AppError::database(format!("malformed uuid in store: {e}")))
}
