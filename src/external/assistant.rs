// ABOUTME: AI assistant client for query titling, error explanation, and schema diagrams
// ABOUTME: Consumed as pure functions; the gateway never depends on its internals
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Querybase Contributors

//! External AI service consumed as a black box. The gateway calls these as
//! pure functions over the statement text and a schema snapshot; any failure
//! is the caller's to handle and never affects execution or history.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::{AppError, AppResult};
use crate::models::SchemaTable;

/// Structured explanation of a failed statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorExplanation {
    /// One-paragraph plain-language summary
    pub summary: String,
    /// Most likely cause, when the service identifies one
    pub likely_cause: Option<String>,
    /// Suggested fix, when the service offers one
    pub suggestion: Option<String>,
}

/// AI assistant collaborator interface
#[async_trait]
pub trait SqlAssistant: Send + Sync {
    /// Produce a short natural-language title for a statement
    ///
    /// # Errors
    ///
    /// Returns an error if the assistant service cannot be reached or
    /// rejects the request.
    async fn generate_title(&self, sql: &str, schema: &[SchemaTable]) -> AppResult<String>;

    /// Explain a database error in plain language
    ///
    /// # Errors
    ///
    /// Returns an error if the assistant service cannot be reached or
    /// rejects the request.
    async fn explain_error(
        &self,
        error_text: &str,
        sql: Option<&str>,
        schema: Option<&[SchemaTable]>,
    ) -> AppResult<ErrorExplanation>;

    /// Render a schema snapshot as diagram text
    ///
    /// # Errors
    ///
    /// Returns an error if the assistant service cannot be reached or
    /// rejects the request.
    async fn schema_to_diagram(&self, schema: &[SchemaTable]) -> AppResult<String>;
}

/// HTTP assistant configuration
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Service base URL
    pub base_url: String,
    /// Bearer token sent with every request
    pub api_key: String,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8900".to_owned(),
            api_key: String::new(),
            timeout_secs: 30,
        }
    }
}

/// HTTP client for the AI assistant service
pub struct HttpAssistant {
    client: Client,
    config: AssistantConfig,
}

#[derive(Serialize)]
struct TitleRequest<'a> {
    sql: &'a str,
    schema: &'a [SchemaTable],
}

#[derive(Deserialize)]
struct TitleResponse {
    title: String,
}

#[derive(Serialize)]
struct ExplainRequest<'a> {
    error: &'a str,
    sql: Option<&'a str>,
    schema: Option<&'a [SchemaTable]>,
}

#[derive(Serialize)]
struct DiagramRequest<'a> {
    schema: &'a [SchemaTable],
}

#[derive(Deserialize)]
struct DiagramResponse {
    diagram: String,
}

impl HttpAssistant {
    /// Create a client for the configured assistant service
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new(config: AssistantConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::config(format!("failed to build assistant client: {e}")))?;
        Ok(Self { client, config })
    }

    async fn post<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &Req,
    ) -> AppResult<Resp> {
        let url = format!("{}/{path}", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::internal(format!("assistant request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(AppError::internal(format!(
                "assistant returned status {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| AppError::internal(format!("malformed assistant response: {e}")))
    }
}

#[async_trait]
impl SqlAssistant for HttpAssistant {
    async fn generate_title(&self, sql: &str, schema: &[SchemaTable]) -> AppResult<String> {
        let response: TitleResponse = self.post("v1/title", &TitleRequest { sql, schema }).await?;
        Ok(response.title)
    }

    async fn explain_error(
        &self,
        error_text: &str,
        sql: Option<&str>,
        schema: Option<&[SchemaTable]>,
    ) -> AppResult<ErrorExplanation> {
        self.post(
            "v1/explain",
            &ExplainRequest {
                error: error_text,
                sql,
                schema,
            },
        )
        .await
    }

    async fn schema_to_diagram(&self, schema: &[SchemaTable]) -> AppResult<String> {
        let response: DiagramResponse = self.post("v1/diagram", &DiagramRequest { schema }).await?;
        Ok(response.diagram)
    }
}
