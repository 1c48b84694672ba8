//! On-disk format of a precomputed engine

use query_chat_core::engine::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Artifact format version this build understands
pub const ARTIFACT_VERSION: u32 = 1;

fn default_version() -> u32 {
    ARTIFACT_VERSION
}

fn default_fallback_answer() -> String {
    "I couldn't find anything relevant to that question.".to_string()
}

/// A serialized engine: the documents it answers from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineArtifact {
    #[serde(default = "default_version")]
    pub version: u32,
    pub documents: Vec<IndexedDocument>,
    /// Reply used when no document matches
    #[serde(default = "default_fallback_answer")]
    pub fallback_answer: String,
}

/// One answerable document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub text: String,
}

impl EngineArtifact {
    /// Read and validate an artifact file
    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                EngineError::ArtifactNotFound(path.display().to_string())
            }
            _ => EngineError::InvalidArtifact(format!("{}: {}", path.display(), e)),
        })?;

        let artifact = Self::from_json(&content)?;
        info!(
            path = %path.display(),
            documents = artifact.documents.len(),
            "Loaded engine artifact"
        );
        Ok(artifact)
    }

    /// Parse and validate artifact JSON
    pub fn from_json(content: &str) -> EngineResult<Self> {
        let artifact: Self = serde_json::from_str(content)
            .map_err(|e| EngineError::InvalidArtifact(e.to_string()))?;
        artifact.validate()?;
        Ok(artifact)
    }

    fn validate(&self) -> EngineResult<()> {
        if self.version != ARTIFACT_VERSION {
            return Err(EngineError::InvalidArtifact(format!(
                "unsupported version {} (expected {})",
                self.version, ARTIFACT_VERSION
            )));
        }
        if self.documents.is_empty() {
            return Err(EngineError::InvalidArtifact(
                "artifact contains no documents".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for doc in &self.documents {
            if doc.id.trim().is_empty() {
                return Err(EngineError::InvalidArtifact(
                    "document with empty id".to_string(),
                ));
            }
            if !seen.insert(doc.id.as_str()) {
                return Err(EngineError::InvalidArtifact(format!(
                    "duplicate document id '{}'",
                    doc.id
                )));
            }
        }
        Ok(())
    }
}
