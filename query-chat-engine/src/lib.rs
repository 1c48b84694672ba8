//! Query engine implementations for query-chat
//!
//! The engine is built elsewhere and shipped as a JSON artifact; this crate
//! loads it once at startup and answers questions from it.

pub mod artifact;
pub mod index;

pub use artifact::{EngineArtifact, IndexedDocument, ARTIFACT_VERSION};
pub use index::IndexedQueryEngine;

use query_chat_core::engine::EngineResult;
use std::path::Path;
use std::sync::Arc;

/// Load the engine artifact at `path` into a shareable engine handle
pub fn load_engine<P: AsRef<Path>>(
    path: P,
    top_k: usize,
) -> EngineResult<Arc<IndexedQueryEngine>> {
    let artifact = EngineArtifact::load(path)?;
    Ok(Arc::new(IndexedQueryEngine::new(artifact, top_k)))
}
