// ABOUTME: Caller-facing service facade wiring provisioning, pools, execution, and history
// ABOUTME: Every project-scoped operation is ownership-checked before touching tenant resources
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Querybase Contributors

//! # Project Gateway
//!
//! The facade the outer layers (HTTP handlers, background jobs) talk to.
//! Dependencies are injected at construction; nothing here is global state.
//! Project-scoped operations resolve the project and verify the caller owns
//! it, returning `NotFound` otherwise so foreign projects are
//! indistinguishable from absent ones.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{GatewayConfig, TenantPoolConfig};
use crate::database::{Database, HistoryFilter, HistoryPage, HistoryRecorder};
use crate::errors::{AppError, AppResult};
use crate::external::{ErrorExplanation, SqlAssistant};
use crate::models::{AuthenticatedUser, ExecutionResult, SchemaTable, TenantProject};
use crate::provisioning::{
    redact_connection_string, remote_connection_string, DbCredentials, HostInfo, Provisioner,
};
use crate::query_gateway::QueryGateway;
use crate::rate_limiting::{AdmissionDecision, LimiterClass, RateLimiter};
use crate::registry::PoolRegistry;
use crate::tenant_db::TenantDatabase;

/// Multi-tenant connection and execution gateway
pub struct ProjectGateway {
    database: Database,
    registry: Arc<PoolRegistry>,
    provisioner: Provisioner,
    limiter: RateLimiter,
    executor: QueryGateway,
    history: HistoryRecorder,
    tenant_pool: TenantPoolConfig,
    assistant: Option<Arc<dyn SqlAssistant>>,
}

impl ProjectGateway {
    /// Wire up the gateway from configuration: open the metadata store,
    /// connect the provisioning backend, and build the registry and limiter.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata store or provisioning backend cannot
    /// be reached.
    pub async fn new(config: &GatewayConfig) -> AppResult<Self> {
        let database = Database::new(&config.database_url).await?;
        let provisioner = Provisioner::connect(&config.provisioning).await?;
        let registry = Arc::new(PoolRegistry::new(config.tenant_pool));
        let history = HistoryRecorder::new(database.pool().clone());
        let executor = QueryGateway::new(Arc::clone(&registry), history.clone());
        Ok(Self {
            database,
            registry,
            provisioner,
            limiter: RateLimiter::new(config.rate_limits),
            executor,
            history,
            tenant_pool: config.tenant_pool,
            assistant: None,
        })
    }

    /// Attach an AI assistant collaborator
    #[must_use]
    pub fn with_assistant(mut self, assistant: Arc<dyn SqlAssistant>) -> Self {
        self.assistant = Some(assistant);
        self
    }

    /// Provision a fresh database and persist the project metadata.
    /// Provisioning failure aborts before any metadata is written.
    ///
    /// # Errors
    ///
    /// Returns a provisioning error if the physical creation fails, and a
    /// database error if the metadata write fails (the freshly provisioned
    /// database is then dropped again, best effort).
    pub async fn create_project(
        &self,
        user: &AuthenticatedUser,
        name: &str,
        description: Option<String>,
    ) -> AppResult<TenantProject> {
        let provisioned = self.provisioner.create_database(user.id, name).await?;
        let now = Utc::now();
        let project = TenantProject {
            id: Uuid::new_v4(),
            owner_id: user.id,
            name: name.to_owned(),
            description,
            database_name: provisioned.database_name,
            connection_string: provisioned.connection_string,
            active: true,
            created_at: now,
            updated_at: now,
        };
        if let Err(db_err) = self.database.create_project(&project).await {
            warn!(database_name = %project.database_name,
                "metadata write failed after provisioning, dropping orphan database");
            if let Err(drop_err) = self.provisioner.drop_database(&project.database_name).await {
                warn!(%drop_err, "orphan database cleanup failed");
            }
            return Err(db_err);
        }
        info!(project_id = %project.id, owner = %user.email, "created project");
        Ok(project)
    }

    /// Import an existing external database as a project. Connectivity is
    /// tested with a throwaway pool before anything is persisted.
    ///
    /// # Errors
    ///
    /// Returns a connection error if the probe fails, and a database error
    /// if the metadata write fails.
    pub async fn import_project(
        &self,
        user: &AuthenticatedUser,
        name: &str,
        host: &HostInfo,
        credentials: &DbCredentials,
        database_name: &str,
    ) -> AppResult<TenantProject> {
        let connection_string = remote_connection_string(host, credentials, database_name);

        let probe = TenantDatabase::connect(&connection_string, &self.tenant_pool).await?;
        probe.ping().await?;
        probe.close().await;

        let now = Utc::now();
        let project = TenantProject {
            id: Uuid::new_v4(),
            owner_id: user.id,
            name: name.to_owned(),
            description: None,
            database_name: database_name.to_owned(),
            connection_string,
            active: true,
            created_at: now,
            updated_at: now,
        };
        self.database.create_project(&project).await?;
        info!(project_id = %project.id,
            connection = %redact_connection_string(&project.connection_string),
            "imported project");
        Ok(project)
    }

    /// List the caller's active projects, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata query fails.
    pub async fn list_projects(&self, user: &AuthenticatedUser) -> AppResult<Vec<TenantProject>> {
        self.database.list_projects(user.id).await
    }

    /// Destroy a project: evict its pool, drop the physical database, then
    /// delete the metadata row — strictly in that order. The first failing
    /// step aborts and surfaces its error, leaving earlier steps as-is; the
    /// drop is never rolled back.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an absent or foreign project, and the failing
    /// step's error otherwise.
    pub async fn delete_project(
        &self,
        user: &AuthenticatedUser,
        project_id: Uuid,
    ) -> AppResult<()> {
        let project = self.database.get_owned_project(project_id, user.id).await?;
        self.registry.evict(project.id).await;
        self.provisioner.drop_database(&project.database_name).await?;
        self.database.delete_project(project.id).await?;
        info!(%project_id, "deleted project");
        Ok(())
    }

    /// Deactivate a project without touching its physical database. Used
    /// for imported databases the gateway does not manage.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an absent or foreign project.
    pub async fn deactivate_project(
        &self,
        user: &AuthenticatedUser,
        project_id: Uuid,
    ) -> AppResult<()> {
        self.registry.evict(project_id).await;
        self.database.deactivate_project(project_id, user.id).await
    }

    /// Fresh structural snapshot of the project's database. Never cached:
    /// the result reflects the live database at call time.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an absent or foreign project and an
    /// introspection error if a catalog query fails.
    pub async fn get_schema(
        &self,
        user: &AuthenticatedUser,
        project_id: Uuid,
    ) -> AppResult<Vec<SchemaTable>> {
        let project = self.database.get_owned_project(project_id, user.id).await?;
        let database = self
            .registry
            .get_or_create(project.id, &project.connection_string)
            .await?;
        database.introspect().await
    }

    /// Execute SQL against the project's database (see
    /// [`QueryGateway::execute`] for the validation and recording contract)
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an absent or foreign project, plus the
    /// execution path's errors.
    pub async fn run_query(
        &self,
        user: &AuthenticatedUser,
        project_id: Uuid,
        sql: &str,
        annotation: Option<String>,
    ) -> AppResult<ExecutionResult> {
        let project = self.database.get_owned_project(project_id, user.id).await?;
        self.executor.execute(&project, user, sql, annotation).await
    }

    /// Page through the caller's execution history for one project
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an absent or foreign project and a database
    /// error if the history query fails.
    pub async fn list_history(
        &self,
        user: &AuthenticatedUser,
        project_id: Uuid,
        filter: &HistoryFilter,
        limit: u32,
        offset: u32,
    ) -> AppResult<HistoryPage> {
        let project = self.database.get_owned_project(project_id, user.id).await?;
        self.history
            .query(project.id, user.id, filter, limit, offset)
            .await
    }

    /// Replace the annotation on one of the caller's history records
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an absent or foreign record.
    pub async fn update_history_annotation(
        &self,
        user: &AuthenticatedUser,
        history_id: Uuid,
        text: &str,
    ) -> AppResult<()> {
        self.history.update_annotation(history_id, user.id, text).await
    }

    /// Flip the favorite flag on one of the caller's history records
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an absent or foreign record.
    pub async fn set_history_favorite(
        &self,
        user: &AuthenticatedUser,
        history_id: Uuid,
        favorite: bool,
    ) -> AppResult<()> {
        self.history.set_favorite(history_id, user.id, favorite).await
    }

    /// Admission check for one limiter class and caller identity. Runs
    /// before any tenant resource is touched.
    #[must_use]
    pub fn check_admission(&self, class: LimiterClass, identity_key: &str) -> AdmissionDecision {
        self.limiter.check(class, identity_key)
    }

    /// Ask the assistant for a short title describing `sql`, given the
    /// project's current schema. Throttled under the AI-assisted class.
    ///
    /// # Errors
    ///
    /// Returns a rate-limit error when the AI class is exhausted, a
    /// configuration error when no assistant is attached, and the
    /// assistant's error otherwise.
    pub async fn suggest_title(
        &self,
        user: &AuthenticatedUser,
        project_id: Uuid,
        sql: &str,
    ) -> AppResult<String> {
        self.limiter
            .check(LimiterClass::AiAssisted, &user.id.to_string())
            .require()?;
        let assistant = self.require_assistant()?;
        let schema = self.get_schema(user, project_id).await?;
        assistant.generate_title(sql, &schema).await
    }

    /// Ask the assistant to explain a failed statement in plain language.
    /// Throttled under the AI-assisted class.
    ///
    /// # Errors
    ///
    /// Returns a rate-limit error when the AI class is exhausted, a
    /// configuration error when no assistant is attached, and the
    /// assistant's error otherwise.
    pub async fn explain_error(
        &self,
        user: &AuthenticatedUser,
        project_id: Uuid,
        error_text: &str,
        sql: Option<&str>,
    ) -> AppResult<ErrorExplanation> {
        self.limiter
            .check(LimiterClass::AiAssisted, &user.id.to_string())
            .require()?;
        let assistant = self.require_assistant()?;
        let schema = self.get_schema(user, project_id).await?;
        assistant.explain_error(error_text, sql, Some(&schema)).await
    }

    /// Render the project's current schema as diagram text via the
    /// assistant. Throttled under the AI-assisted class.
    ///
    /// # Errors
    ///
    /// Returns a rate-limit error when the AI class is exhausted, a
    /// configuration error when no assistant is attached, and the
    /// assistant's error otherwise.
    pub async fn schema_diagram(
        &self,
        user: &AuthenticatedUser,
        project_id: Uuid,
    ) -> AppResult<String> {
        self.limiter
            .check(LimiterClass::AiAssisted, &user.id.to_string())
            .require()?;
        let assistant = self.require_assistant()?;
        let schema = self.get_schema(user, project_id).await?;
        assistant.schema_to_diagram(&schema).await
    }

    /// Close every tenant pool. The metadata store pool stays open until
    /// drop.
    pub async fn shutdown(&self) {
        self.registry.shutdown().await;
    }

    fn require_assistant(&self) -> AppResult<&Arc<dyn SqlAssistant>> {
        self.assistant
            .as_ref()
            .ok_or_else(|| AppError::config("no assistant service configured"))
    }
}
