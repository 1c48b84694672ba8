//! In-memory term index over an engine artifact

use async_trait::async_trait;
use once_cell::sync::Lazy;
use query_chat_core::engine::{EngineError, EngineResult, QueryEngine, QueryResponse};
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

use crate::artifact::{EngineArtifact, IndexedDocument};

static TERM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}]+").expect("valid regex"));

/// Lowercased alphanumeric terms of `text`
fn tokenize(text: &str) -> Vec<String> {
    TERM_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Engine answering from the documents of a loaded artifact
#[derive(Debug)]
pub struct IndexedQueryEngine {
    documents: Vec<IndexedDocument>,
    /// term -> (document index, term frequency)
    postings: HashMap<String, Vec<(usize, usize)>>,
    fallback_answer: String,
    top_k: usize,
}

impl IndexedQueryEngine {
    /// Build the term index; `top_k` is clamped to at least one document
    pub fn new(artifact: EngineArtifact, top_k: usize) -> Self {
        let mut postings: HashMap<String, Vec<(usize, usize)>> = HashMap::new();

        for (doc_idx, doc) in artifact.documents.iter().enumerate() {
            let mut counts: HashMap<String, usize> = HashMap::new();
            let title = doc.title.as_deref().unwrap_or_default();
            for term in tokenize(title).into_iter().chain(tokenize(&doc.text)) {
                *counts.entry(term).or_default() += 1;
            }
            for (term, count) in counts {
                postings.entry(term).or_default().push((doc_idx, count));
            }
        }

        Self {
            documents: artifact.documents,
            postings,
            fallback_answer: artifact.fallback_answer,
            top_k: top_k.max(1),
        }
    }

    /// Number of indexed documents
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Score documents against the query terms, best first
    fn rank(&self, terms: &[String]) -> Vec<(usize, f64)> {
        let total = self.documents.len() as f64;
        let mut scores: HashMap<usize, f64> = HashMap::new();

        for term in terms {
            let Some(postings) = self.postings.get(term) else {
                continue;
            };
            let idf = (1.0 + total / postings.len() as f64).ln();
            for &(doc_idx, tf) in postings {
                *scores.entry(doc_idx).or_default() += tf as f64 * idf;
            }
        }

        let mut ranked: Vec<(usize, f64)> = scores.into_iter().filter(|(_, s)| *s > 0.0).collect();
        // Ties fall back to artifact order so answers are deterministic.
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(self.top_k);
        ranked
    }
}

#[async_trait]
impl QueryEngine for IndexedQueryEngine {
    async fn query(&self, text: &str) -> EngineResult<QueryResponse> {
        let mut terms = tokenize(text);
        if terms.is_empty() {
            return Err(EngineError::EmptyQuery);
        }
        terms.sort();
        terms.dedup();

        let ranked = self.rank(&terms);
        debug!(terms = terms.len(), hits = ranked.len(), "Ranked documents");

        if ranked.is_empty() {
            return Ok(QueryResponse::new(self.fallback_answer.clone()));
        }

        let text = ranked
            .iter()
            .map(|&(idx, _)| self.documents[idx].text.trim())
            .collect::<Vec<_>>()
            .join("\n\n");
        let sources = ranked
            .iter()
            .map(|&(idx, _)| self.documents[idx].id.clone())
            .collect();

        Ok(QueryResponse::new(text).with_sources(sources))
    }

    fn name(&self) -> &str {
        "indexed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_engine;
    use tempfile::TempDir;

    fn artifact() -> EngineArtifact {
        EngineArtifact::from_json(
            r#"{
  "documents": [
    {"id": "rust", "title": "Rust", "text": "Rust is a systems programming language."},
    {"id": "tokio", "text": "Tokio is an async runtime for Rust."},
    {"id": "csv", "text": "CSV files separate fields with commas."}
  ],
  "fallback_answer": "No idea."
}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("What is X?"), vec!["what", "is", "x"]);
        assert_eq!(tokenize("Ünïcode, 42!"), vec!["ünïcode", "42"]);
        assert!(tokenize("  ?! ").is_empty());
    }

    #[tokio::test]
    async fn test_best_document_first() {
        let engine = IndexedQueryEngine::new(artifact(), 1);
        let response = engine.query("What is an async runtime?").await.unwrap();
        assert_eq!(response.sources, vec!["tokio"]);
        assert_eq!(response.to_string(), "Tokio is an async runtime for Rust.");
    }

    #[tokio::test]
    async fn test_top_k_joins_documents() {
        let engine = IndexedQueryEngine::new(artifact(), 2);
        let response = engine.query("rust").await.unwrap();
        assert_eq!(response.sources.len(), 2);
        assert_eq!(response.sources[0], "rust");
        assert!(response.text.contains("\n\n"));
    }

    #[tokio::test]
    async fn test_no_match_uses_fallback() {
        let engine = IndexedQueryEngine::new(artifact(), 2);
        let response = engine.query("zebra").await.unwrap();
        assert_eq!(response.text, "No idea.");
        assert!(response.sources.is_empty());
    }

    #[tokio::test]
    async fn test_empty_query_is_an_error() {
        let engine = IndexedQueryEngine::new(artifact(), 2);
        assert!(matches!(
            engine.query("   ").await,
            Err(EngineError::EmptyQuery)
        ));
    }

    #[tokio::test]
    async fn test_load_engine_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("rag_model.json");
        std::fs::write(&path, serde_json::to_string(&artifact()).unwrap()).unwrap();

        let engine = load_engine(&path, 0).unwrap();
        assert_eq!(engine.document_count(), 3);
        assert_eq!(engine.top_k, 1);
        let response = engine.query("commas").await.unwrap();
        assert_eq!(response.sources, vec!["csv"]);
    }
}
