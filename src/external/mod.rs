// ABOUTME: External collaborator clients
// ABOUTME: AI assistant consumed as a black box behind a trait
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Querybase Contributors

/// AI assistant trait and HTTP client implementation
pub mod assistant;

pub use assistant::{AssistantConfig, ErrorExplanation, HttpAssistant, SqlAssistant};
