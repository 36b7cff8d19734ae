//! Retrieval fan-out.
//!
//! Every registered source is gated concurrently; included sources are then
//! retrieved concurrently. Both fan-outs join all futures and never short
//! circuit, so one slow or failing source cannot affect its siblings.

use crate::context::{ContextBlock, ContextSection, RetrievedChunk};
use crate::gate::{GateDecision, GateEvaluator};
use crate::sources::{ScopeIds, Source, SourceRegistry};
use futures::future::join_all;
use std::sync::Arc;
use tracing::Instrument;

/// Result of routing one question.
#[derive(Debug, Clone)]
pub struct Routed {
    /// One decision per registered source, in registry order
    pub decisions: Vec<GateDecision>,
    pub context: ContextBlock,
}

impl Routed {
    pub fn included_sources(&self) -> Vec<String> {
        self.decisions
            .iter()
            .filter(|d| d.include)
            .map(|d| d.source_id.clone())
            .collect()
    }
}

#[derive(Clone)]
pub struct Router {
    registry: Arc<SourceRegistry>,
    gate: GateEvaluator,
    limit: usize,
}

impl Router {
    pub fn new(registry: Arc<SourceRegistry>, gate: GateEvaluator, limit: usize) -> Self {
        Self {
            registry,
            gate,
            limit,
        }
    }

    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.registry
    }

    /// Build the context block for `query`.
    pub async fn route(&self, query: &str, embedding: &[f32], scope: &ScopeIds) -> ContextBlock {
        self.route_with_decisions(query, embedding, scope)
            .await
            .context
    }

    /// Like [`Router::route`], keeping every gate decision.
    pub async fn route_with_decisions(
        &self,
        query: &str,
        embedding: &[f32],
        scope: &ScopeIds,
    ) -> Routed {
        let span = tracing::info_span!("route", sources = self.registry.len());

        async move {
            let decisions = join_all(
                self.registry
                    .iter()
                    .map(|source| self.gate.gate(&source.config, query)),
            )
            .await;

            let included: Vec<&Source> = self
                .registry
                .iter()
                .zip(&decisions)
                .filter(|(_, decision)| decision.include)
                .map(|(source, _)| source)
                .collect();

            tracing::info!(
                included = ?included.iter().map(|s| s.id()).collect::<Vec<_>>(),
                "Gating complete"
            );

            let retrievals = join_all(
                included
                    .iter()
                    .map(|source| self.retrieve_one(source, embedding, scope)),
            )
            .await;

            let mut context = ContextBlock::new();
            for (source, chunks) in included.iter().zip(retrievals) {
                context.push(ContextSection::new(source.id(), chunks));
            }

            Routed { decisions, context }
        }
        .instrument(span)
        .await
    }

    async fn retrieve_one(
        &self,
        source: &Source,
        embedding: &[f32],
        scope: &ScopeIds,
    ) -> Vec<RetrievedChunk> {
        match source.retriever.retrieve(embedding, scope, self.limit).await {
            Ok(snippets) => {
                tracing::debug!(source = %source.id(), count = snippets.len(), "Retrieved");
                snippets
                    .into_iter()
                    .map(|s| RetrievedChunk {
                        source_id: source.id().to_string(),
                        text: s.text,
                        score: s.score,
                    })
                    .collect()
            }
            Err(e) => {
                tracing::warn!(source = %source.id(), error = %e, "Retrieval failed, using empty result");
                Vec::new()
            }
        }
    }
}
