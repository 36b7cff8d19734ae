//! Knowledge routing.
//!
//! Decides per question which knowledge sources are worth querying, queries
//! them concurrently and assembles their results into one ordered context
//! block. Records live in a local SQLite store.

pub mod context;
pub mod embeddings;
pub mod gate;
pub mod router;
pub mod sources;
pub mod store;

#[cfg(test)]
mod tests;

pub use context::{ContextBlock, ContextSection, RetrievedChunk};
pub use embeddings::{create_embedder, EmbeddingProvider, TrigramEmbedder};
pub use gate::{GateDecision, GateEvaluator, GateOutcome};
pub use router::{Routed, Router};
pub use sources::{RetrievalSource, ScopeIds, Snippet, Source, SourceRegistry};
pub use store::{ingest, RecordStore, SqliteSource};

use scout_core::{AppResult, SourceConfig};
use std::sync::Arc;

/// Register every configured source against the SQLite store, in order.
pub fn sqlite_registry(sources: &[SourceConfig], store: &RecordStore) -> AppResult<SourceRegistry> {
    let mut registry = SourceRegistry::new();
    for config in sources {
        let retriever = Arc::new(SqliteSource::new(store.clone(), config.clone()));
        registry.register(config.clone(), retriever)?;
    }

    tracing::debug!(sources = ?registry.ids(), "Built source registry");
    Ok(registry)
}
