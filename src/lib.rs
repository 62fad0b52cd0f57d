// ABOUTME: Main library entry point for the Querybase multi-tenant database gateway
// ABOUTME: Provisions tenant databases, pools connections, executes SQL, records history
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Querybase Contributors

#![deny(unsafe_code)]

//! # Querybase Gateway
//!
//! A multi-tenant connection and execution gateway: many independent callers
//! each own one or more isolated relational databases. The gateway
//! provisions those databases, caches live connections to them, introspects
//! their structure, executes arbitrary SQL against them safely, records
//! every execution attempt, and throttles request volume per caller class.
//!
//! ## Architecture
//!
//! - **Registry**: keyed cache of live tenant pools, created lazily with
//!   per-key create-once semantics
//! - **Provisioning**: creates and destroys physical tenant databases over a
//!   control-plane connection
//! - **Query gateway**: classifies and polices caller SQL, runs it through
//!   the tenant pool, and records every attempt
//! - **History**: durable, filterable log of execution attempts
//! - **Rate limiting**: per-class token buckets keyed by caller identity
//! - **Gateway facade**: the injected service object outer layers call
//!
//! The presentation layer, credential verification, and
//! natural-language-to-SQL generation are external collaborators: callers
//! arrive as a resolved [`models::AuthenticatedUser`], and the AI service is
//! consumed behind [`external::SqlAssistant`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use querybase::config::GatewayConfig;
//! use querybase::errors::AppResult;
//! use querybase::gateway::ProjectGateway;
//!
//! #[tokio::main]
//! async fn main() -> AppResult<()> {
//!     let config = GatewayConfig::from_env()?;
//!     let gateway = ProjectGateway::new(&config).await?;
//!     // hand `gateway` to the transport layer
//!     gateway.shutdown().await;
//!     Ok(())
//! }
//! ```

/// Configuration management (environment-only)
pub mod config;

/// Gateway metadata store: tenant projects and query history
pub mod database;

/// Unified error type and result alias
pub mod errors;

/// External collaborator clients (AI assistant)
pub mod external;

/// Caller-facing service facade
pub mod gateway;

/// Core domain models
pub mod models;

/// Provisioning of physical tenant databases
pub mod provisioning;

/// SQL classification, execution policy, and timed execution
pub mod query_gateway;

/// Token-bucket admission control
pub mod rate_limiting;

/// Keyed cache of live tenant connection pools
pub mod registry;

/// Tenant database backends (sqlite default, postgres feature-gated)
pub mod tenant_db;

pub use errors::{AppError, AppResult};
pub use gateway::ProjectGateway;
