//! Query engine contract
//!
//! The engine is an opaque, precomputed component: it is built once at
//! startup and answers free-text questions. Sessions only ever see it through
//! the [`QueryEngine`] trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error type for query engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("engine artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("invalid engine artifact: {0}")]
    InvalidArtifact(String),

    #[error("query is empty")]
    EmptyQuery,

    #[error("query failed: {0}")]
    Failed(String),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Reply produced by a query engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Answer text
    pub text: String,
    /// Identifiers of the documents the answer was drawn from
    #[serde(default)]
    pub sources: Vec<String>,
}

impl QueryResponse {
    /// Create a response without sources
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sources: Vec::new(),
        }
    }

    /// Attach source identifiers
    pub fn with_sources(mut self, sources: Vec<String>) -> Self {
        self.sources = sources;
        self
    }
}

/// The stringified reply is what lands in the transcript.
impl fmt::Display for QueryResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Trait for query engines
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Answer a free-text question
    async fn query(&self, text: &str) -> EngineResult<QueryResponse>;

    /// Short name used in logs
    fn name(&self) -> &str {
        "query-engine"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_display_is_text_only() {
        let response = QueryResponse::new("X is Y").with_sources(vec!["doc-1".to_string()]);
        assert_eq!(response.to_string(), "X is Y");
    }

    #[test]
    fn test_response_sources_default_when_missing() {
        let response: QueryResponse = serde_json::from_str(r#"{"text":"hi"}"#).unwrap();
        assert!(response.sources.is_empty());
    }
}
