// ABOUTME: Environment-variable configuration for the gateway
// ABOUTME: Covers metadata store, tenant pools, provisioning backend, and rate limits
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Querybase Contributors

//! Environment-only configuration. Every knob has a default suitable for
//! local development; production deployments override via `QUERYBASE_*`
//! variables. No configuration files are read.

use std::env;
use std::path::PathBuf;

use crate::errors::{AppError, AppResult};

/// Default metadata database location
const DEFAULT_DATABASE_URL: &str = "sqlite:data/querybase.db";
/// Default directory for tenant database files (sqlite backend)
const DEFAULT_TENANT_DATA_DIR: &str = "data/tenants";

/// Bounded-pool settings applied to every tenant connection pool
#[derive(Debug, Clone, Copy)]
pub struct TenantPoolConfig {
    /// Maximum concurrent connections per tenant pool
    pub max_connections: u32,
    /// How long a checkout may wait before failing with a
    /// connection-unavailable error. Checkouts never block indefinitely.
    pub acquire_timeout_secs: u64,
}

impl Default for TenantPoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout_secs: 30,
        }
    }
}

/// Token-bucket parameters for one limiter class
#[derive(Debug, Clone, Copy)]
pub struct ClassLimit {
    /// Points available per window
    pub points: u32,
    /// Window length in seconds
    pub window_secs: u64,
}

/// Per-class admission-control settings. The credential and AI classes are
/// deliberately tighter than the general class.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitSettings {
    /// General API traffic
    pub general: ClassLimit,
    /// Credential-related endpoints (login, password reset)
    pub credential: ClassLimit,
    /// AI-assisted endpoints (generation, explanation)
    pub ai_assisted: ClassLimit,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            general: ClassLimit {
                points: 100,
                window_secs: 60,
            },
            credential: ClassLimit {
                points: 5,
                window_secs: 300,
            },
            ai_assisted: ClassLimit {
                points: 10,
                window_secs: 60,
            },
        }
    }
}

/// Where and how physical tenant databases are created
#[derive(Debug, Clone)]
pub enum ProvisioningConfig {
    /// File-per-tenant sqlite databases under a data directory
    Sqlite {
        /// Directory holding one `.db` file per tenant
        data_dir: PathBuf,
    },
    /// Server-hosted databases created over a control-plane connection
    #[cfg(feature = "postgresql")]
    Postgres {
        /// Control-plane URL, distinct from any tenant pool
        control_url: String,
        /// Host placed into generated tenant connection strings
        tenant_host: String,
        /// Port placed into generated tenant connection strings
        tenant_port: u16,
        /// Username placed into generated tenant connection strings
        tenant_user: String,
        /// Password placed into generated tenant connection strings
        tenant_password: String,
    },
}

/// Complete gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Metadata store (projects + history) connection URL
    pub database_url: String,
    /// Tenant pool bounds
    pub tenant_pool: TenantPoolConfig,
    /// Provisioning backend
    pub provisioning: ProvisioningConfig,
    /// Admission-control settings
    pub rate_limits: RateLimitSettings,
}

impl GatewayConfig {
    /// Load configuration from environment variables, falling back to
    /// development defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a set variable fails to parse, or if the
    /// `postgresql` provisioning backend is selected without its required
    /// variables.
    pub fn from_env() -> AppResult<Self> {
        let database_url =
            env::var("QUERYBASE_DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_owned());

        let tenant_pool = TenantPoolConfig {
            max_connections: parse_var("QUERYBASE_TENANT_MAX_CONNECTIONS", 5)?,
            acquire_timeout_secs: parse_var("QUERYBASE_TENANT_ACQUIRE_TIMEOUT_SECS", 30)?,
        };

        let defaults = RateLimitSettings::default();
        let rate_limits = RateLimitSettings {
            general: ClassLimit {
                points: parse_var("QUERYBASE_RATE_GENERAL_POINTS", defaults.general.points)?,
                window_secs: parse_var(
                    "QUERYBASE_RATE_GENERAL_WINDOW_SECS",
                    defaults.general.window_secs,
                )?,
            },
            credential: ClassLimit {
                points: parse_var(
                    "QUERYBASE_RATE_CREDENTIAL_POINTS",
                    defaults.credential.points,
                )?,
                window_secs: parse_var(
                    "QUERYBASE_RATE_CREDENTIAL_WINDOW_SECS",
                    defaults.credential.window_secs,
                )?,
            },
            ai_assisted: ClassLimit {
                points: parse_var("QUERYBASE_RATE_AI_POINTS", defaults.ai_assisted.points)?,
                window_secs: parse_var(
                    "QUERYBASE_RATE_AI_WINDOW_SECS",
                    defaults.ai_assisted.window_secs,
                )?,
            },
        };

        let provisioning = Self::provisioning_from_env()?;

        Ok(Self {
            database_url,
            tenant_pool,
            provisioning,
            rate_limits,
        })
    }

    #[cfg(feature = "postgresql")]
    fn provisioning_from_env() -> AppResult<ProvisioningConfig> {
        // Postgres provisioning activates when a control URL is configured;
        // otherwise the sqlite backend is used even with the feature on.
        if let Ok(control_url) = env::var("QUERYBASE_CONTROL_DATABASE_URL") {
            return Ok(ProvisioningConfig::Postgres {
                control_url,
                tenant_host: require_var("QUERYBASE_TENANT_DB_HOST")?,
                tenant_port: parse_var("QUERYBASE_TENANT_DB_PORT", 5432)?,
                tenant_user: require_var("QUERYBASE_TENANT_DB_USER")?,
                tenant_password: require_var("QUERYBASE_TENANT_DB_PASSWORD")?,
            });
        }
        Ok(ProvisioningConfig::Sqlite {
            data_dir: sqlite_data_dir(),
        })
    }

    #[cfg(not(feature = "postgresql"))]
    fn provisioning_from_env() -> AppResult<ProvisioningConfig> {
        Ok(ProvisioningConfig::Sqlite {
            data_dir: sqlite_data_dir(),
        })
    }
}

fn sqlite_data_dir() -> PathBuf {
    env::var("QUERYBASE_TENANT_DATA_DIR")
        .map_or_else(|_| PathBuf::from(DEFAULT_TENANT_DATA_DIR), PathBuf::from)
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> AppResult<T> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| AppError::config(format!("{name} has invalid value: {raw}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(feature = "postgresql")]
fn require_var(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::config(format!("{name} must be set")))
}
