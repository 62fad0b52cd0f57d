// ABOUTME: Configuration module root
// ABOUTME: Environment-only configuration, no config files
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Querybase Contributors

/// Environment-variable backed server configuration
pub mod environment;

pub use environment::{
    ClassLimit, GatewayConfig, ProvisioningConfig, RateLimitSettings, TenantPoolConfig,
};
