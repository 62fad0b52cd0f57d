// ABOUTME: Shared test utilities: temp-backed gateway construction and fixture users
// ABOUTME: Keeps integration tests free of repeated wiring boilerplate
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Querybase Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs, dead_code)]

use std::sync::Once;

use querybase::config::{
    GatewayConfig, ProvisioningConfig, RateLimitSettings, TenantPoolConfig,
};
use querybase::gateway::ProjectGateway;
use querybase::models::AuthenticatedUser;
use tempfile::TempDir;
use uuid::Uuid;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("warn")
            .with_test_writer()
            .try_init();
    });
}

/// Gateway configuration rooted in a fresh temp directory
pub fn test_config(dir: &TempDir) -> GatewayConfig {
    GatewayConfig {
        database_url: format!("sqlite:{}/metadata.db", dir.path().display()),
        tenant_pool: TenantPoolConfig {
            max_connections: 5,
            acquire_timeout_secs: 5,
        },
        provisioning: ProvisioningConfig::Sqlite {
            data_dir: dir.path().join("tenants"),
        },
        rate_limits: RateLimitSettings::default(),
    }
}

/// Build a gateway over a fresh temp directory. The directory must be kept
/// alive for the lifetime of the gateway.
pub async fn test_gateway() -> (ProjectGateway, TempDir) {
    init_test_logging();
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let gateway = ProjectGateway::new(&test_config(&dir))
        .await
        .expect("failed to build gateway");
    (gateway, dir)
}

/// Fixture caller identity
pub fn test_user() -> AuthenticatedUser {
    AuthenticatedUser {
        id: Uuid::new_v4(),
        email: "owner@example.com".to_owned(),
    }
}
