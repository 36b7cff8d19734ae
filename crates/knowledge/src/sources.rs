//! Source registry.
//!
//! The registry is the ordered, process-wide list of knowledge sources. Its
//! order is the order sources appear in every assembled context block. It is
//! built once at startup and only read afterwards.

use scout_core::{AppError, AppResult, SourceConfig};
use std::sync::Arc;

/// Identifiers bounding which records a source may return.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScopeIds {
    pub project_id: String,
    pub conversation_id: Option<String>,
}

impl ScopeIds {
    pub fn project(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            conversation_id: None,
        }
    }

    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }
}

/// One snippet returned by a retrieval function, in retrieval order.
#[derive(Debug, Clone, PartialEq)]
pub struct Snippet {
    pub text: String,
    pub score: Option<f32>,
}

impl Snippet {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            score: None,
        }
    }

    pub fn scored(text: impl Into<String>, score: f32) -> Self {
        Self {
            text: text.into(),
            score: Some(score),
        }
    }
}

/// Retrieval function bound to a source.
///
/// Implementations must be safe to call concurrently with other sources and
/// with themselves across requests, and must not mutate shared state.
#[async_trait::async_trait]
pub trait RetrievalSource: Send + Sync {
    /// Return up to `limit` snippets for the query embedding, best first.
    async fn retrieve(
        &self,
        embedding: &[f32],
        scope: &ScopeIds,
        limit: usize,
    ) -> AppResult<Vec<Snippet>>;
}

/// A source: its configuration and the function that retrieves from it.
#[derive(Clone)]
pub struct Source {
    pub config: SourceConfig,
    pub retriever: Arc<dyn RetrievalSource>,
}

impl Source {
    pub fn id(&self) -> &str {
        &self.config.id
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("id", &self.config.id)
            .finish_non_exhaustive()
    }
}

/// Ordered registry of sources.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Source>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source. Ids must be unique.
    pub fn register(
        &mut self,
        config: SourceConfig,
        retriever: Arc<dyn RetrievalSource>,
    ) -> AppResult<()> {
        if self.get(&config.id).is_some() {
            return Err(AppError::Knowledge(format!(
                "Source '{}' is already registered",
                config.id
            )));
        }

        tracing::debug!(source = %config.id, "Registering retrieval source");
        self.sources.push(Source { config, retriever });
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.id() == id)
    }

    /// Sources in registry order.
    pub fn iter(&self) -> impl Iterator<Item = &Source> {
        self.sources.iter()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
