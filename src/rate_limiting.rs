// ABOUTME: Token-bucket admission control keyed by caller identity per endpoint class
// ABOUTME: Buckets refill continuously; denials carry the wait until the next point
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Querybase Contributors

//! # Rate Limiter
//!
//! Three independent limiter classes, each an isolated set of token buckets
//! keyed by caller network identity. Buckets refill continuously based on
//! elapsed time rather than in discrete window resets. State is in-memory
//! and per-process: multiple gateway instances each enforce limits
//! independently. Sharing the counters across instances requires an external
//! store and is a documented extension point, not provided here.

use std::time::Instant;

use dashmap::DashMap;
use serde::Serialize;
use tracing::warn;

use crate::config::{ClassLimit, RateLimitSettings};
use crate::errors::{AppError, AppResult};

/// Endpoint class with its own bucket configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LimiterClass {
    /// General API traffic
    General,
    /// Credential-related endpoints (login, password reset)
    Credential,
    /// AI-assisted endpoints (generation, explanation)
    AiAssisted,
}

/// Outcome of one admission check
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AdmissionDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Milliseconds until the next point becomes available, on denial
    pub retry_after_ms: Option<u64>,
    /// Whole points left in the bucket after this check
    pub remaining: u32,
}

impl AdmissionDecision {
    /// Convert a denial into [`AppError::RateLimitExceeded`]
    ///
    /// # Errors
    ///
    /// Returns the rate-limit error when the decision was a denial.
    pub fn require(self) -> AppResult<()> {
        if self.allowed {
            Ok(())
        } else {
            Err(AppError::RateLimitExceeded {
                retry_after_ms: self.retry_after_ms.unwrap_or(0),
            })
        }
    }
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// In-memory token-bucket admission control
pub struct RateLimiter {
    settings: RateLimitSettings,
    buckets: DashMap<(LimiterClass, String), Bucket>,
}

impl RateLimiter {
    /// Create a limiter with the given per-class settings
    #[must_use]
    pub fn new(settings: RateLimitSettings) -> Self {
        Self {
            settings,
            buckets: DashMap::new(),
        }
    }

    /// Deduct one point from the bucket for `(class, identity_key)`,
    /// admitting or denying the request. Bucket state is mutated atomically
    /// per key under the map's entry lock.
    #[must_use]
    pub fn check(&self, class: LimiterClass, identity_key: &str) -> AdmissionDecision {
        self.check_at(class, identity_key, Instant::now())
    }

    fn check_at(&self, class: LimiterClass, identity_key: &str, now: Instant) -> AdmissionDecision {
        let limit = self.class_limit(class);

        // A zero-width bucket can never mint a token. Admission bookkeeping
        // failures admit rather than block: availability over strictness.
        if limit.points == 0 || limit.window_secs == 0 {
            warn!(?class, "unusable rate limit configuration, admitting request");
            return AdmissionDecision {
                allowed: true,
                retry_after_ms: None,
                remaining: 0,
            };
        }

        let capacity = f64::from(limit.points);
        let rate_per_sec = capacity / limit.window_secs as f64;

        let mut bucket = self
            .buckets
            .entry((class, identity_key.to_owned()))
            .or_insert_with(|| Bucket {
                tokens: capacity,
                last_refill: now,
            });

        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * rate_per_sec).min(capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            AdmissionDecision {
                allowed: true,
                retry_after_ms: None,
                remaining: bucket.tokens as u32,
            }
        } else {
            let deficit = 1.0 - bucket.tokens;
            let retry_after_ms = ((deficit / rate_per_sec) * 1000.0).ceil() as u64;
            AdmissionDecision {
                allowed: false,
                retry_after_ms: Some(retry_after_ms.max(1)),
                remaining: 0,
            }
        }
    }

    const fn class_limit(&self, class: LimiterClass) -> ClassLimit {
        match class {
            LimiterClass::General => self.settings.general,
            LimiterClass::Credential => self.settings.credential,
            LimiterClass::AiAssisted => self.settings.ai_assisted,
        }
    }
}
