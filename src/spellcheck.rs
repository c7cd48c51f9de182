//! Spell and grammar checking backends used by the readability scorer.

use crate::config::Config;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by spell-check backends.
#[derive(Debug, Error)]
pub enum SpellCheckError {
    /// Base URL failed to parse.
    #[error("Invalid spell-check URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The checker responded with an unexpected status code.
    #[error("Unexpected spell-check response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the checker.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// One problem reported by a checker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpellIssue {
    /// Rubric key, e.g. `spelling`, `suggestion`, `grammar`.
    pub issue_type: String,
    /// Human-readable description, when the backend supplies one.
    pub message: Option<String>,
}

impl SpellIssue {
    /// Issue with no message.
    pub fn new(issue_type: impl Into<String>) -> Self {
        Self {
            issue_type: issue_type.into(),
            message: None,
        }
    }
}

/// Interface implemented by spell/grammar backends.
#[async_trait]
pub trait SpellChecker: Send + Sync {
    /// Report every issue found in `text`.
    async fn check(&self, text: &str) -> Result<Vec<SpellIssue>, SpellCheckError>;
}

/// Checker that never reports issues; used when no service is configured.
pub struct NoopChecker;

#[async_trait]
impl SpellChecker for NoopChecker {
    async fn check(&self, _text: &str) -> Result<Vec<SpellIssue>, SpellCheckError> {
        Ok(Vec::new())
    }
}

/// Client for a LanguageTool-compatible `/v2/check` endpoint.
pub struct LanguageToolClient {
    client: Client,
    base_url: String,
    language: String,
}

#[derive(Deserialize)]
struct CheckResponse {
    #[serde(default)]
    matches: Vec<CheckMatch>,
}

#[derive(Deserialize)]
struct CheckMatch {
    #[serde(default)]
    message: Option<String>,
    rule: CheckRule,
}

#[derive(Deserialize)]
struct CheckRule {
    #[serde(rename = "issueType")]
    issue_type: String,
}

impl LanguageToolClient {
    /// Build a client for the checker at `base_url`.
    pub fn new(base_url: &str, language: &str) -> Result<Self, SpellCheckError> {
        let parsed = reqwest::Url::parse(base_url)
            .map_err(|err| SpellCheckError::InvalidUrl(err.to_string()))?;
        let client = Client::builder().user_agent("docreader/0.1").build()?;
        tracing::debug!(url = %parsed, language, "Initialized spell-check client");
        Ok(Self {
            client,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            language: language.to_string(),
        })
    }
}

#[async_trait]
impl SpellChecker for LanguageToolClient {
    async fn check(&self, text: &str) -> Result<Vec<SpellIssue>, SpellCheckError> {
        let response = self
            .client
            .post(format!("{}/v2/check", self.base_url))
            .form(&[("text", text), ("language", self.language.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SpellCheckError::UnexpectedStatus { status, body });
        }

        let payload: CheckResponse = response.json().await?;
        Ok(payload
            .matches
            .into_iter()
            .map(|found| SpellIssue {
                issue_type: rubric_key(&found.rule.issue_type),
                message: found.message,
            })
            .collect())
    }
}

/// Map a LanguageTool issue type onto the rubric vocabulary.
fn rubric_key(issue_type: &str) -> String {
    match issue_type.to_lowercase().as_str() {
        "misspelling" | "spelling" => "spelling".into(),
        "grammar" => "grammar".into(),
        "style" | "typographical" | "whitespace" | "suggestion" => "suggestion".into(),
        other => other.to_string(),
    }
}

/// Build the spell checker selected by configuration.
pub fn get_spell_checker(config: &Config) -> Result<Arc<dyn SpellChecker>, SpellCheckError> {
    match config.spellcheck_url.as_deref() {
        Some(url) => Ok(Arc::new(LanguageToolClient::new(
            url,
            &config.spellcheck_language,
        )?)),
        None => {
            tracing::info!("No spell-check service configured; readability stays at baseline");
            Ok(Arc::new(NoopChecker))
        }
    }
}
