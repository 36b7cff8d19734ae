//! End-to-end question answering.
//!
//! embed -> route -> orchestrate -> persist. Persistence runs only after the
//! orchestrator reaches DONE; a persistence failure is reported next to the
//! answer instead of replacing it.

use crate::conversation::{ConversationStore, SqliteConversationStore};
use crate::orchestrator::{Answer, Orchestrator};
use crate::tools::ToolRegistry;
use scout_core::{AppConfig, AppError, AppResult};
use scout_knowledge::embeddings::MOCK_PROVIDER;
use scout_knowledge::{
    create_embedder, sqlite_registry, EmbeddingProvider, GateEvaluator, RecordStore, Router,
    ScopeIds,
};
use scout_llm::{ChatMessage, LlmClient};
use scout_prompt::PromptSet;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// One question from a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskRequest {
    pub conversation_id: String,
    pub project_id: String,
    pub question: String,
}

impl AskRequest {
    pub fn new(
        conversation_id: impl Into<String>,
        project_id: impl Into<String>,
        question: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            project_id: project_id.into(),
            question: question.into(),
        }
    }
}

/// Tool call summary reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCallReport {
    pub id: String,
    pub name: String,
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatOutcome {
    pub answer: Answer,
    /// Sources whose gate said yes, in registry order
    pub included_sources: Vec<String>,
    pub tool_calls: Vec<ToolCallReport>,
    /// Set when the answer could not be saved to the conversation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistence_warning: Option<String>,
}

pub struct ChatPipeline {
    router: Router,
    orchestrator: Orchestrator,
    embedder: Arc<dyn EmbeddingProvider>,
    conversations: Arc<dyn ConversationStore>,
}

impl ChatPipeline {
    pub fn new(
        router: Router,
        orchestrator: Orchestrator,
        embedder: Arc<dyn EmbeddingProvider>,
        conversations: Arc<dyn ConversationStore>,
    ) -> Self {
        Self {
            router,
            orchestrator,
            embedder,
            conversations,
        }
    }

    /// Wire the pipeline for a workspace: SQLite sources and conversations,
    /// workspace prompts, and the routing section of the configuration.
    pub fn from_config(config: &AppConfig, client: Arc<dyn LlmClient>) -> AppResult<Self> {
        let routing = &config.routing;
        routing.validate()?;
        config.ensure_scout_dir()?;

        let prompts = Arc::new(PromptSet::load(&config.workspace)?);
        let embedder = create_embedder(MOCK_PROVIDER, routing.embedding_dimensions)?;
        let records = RecordStore::open(config.database_path())?;
        let sources = Arc::new(sqlite_registry(&routing.sources, &records)?);

        let gate = GateEvaluator::new(
            client.clone(),
            &routing.gate_model,
            prompts.clone(),
            Duration::from_secs(routing.gate_timeout_secs),
        );
        let router = Router::new(sources.clone(), gate, routing.retrieval_limit);

        let tools = ToolRegistry::new(
            &routing.tools,
            sources,
            embedder.clone(),
            Duration::from_secs(routing.tool_timeout_secs),
        )?;
        let orchestrator = Orchestrator::new(
            client,
            prompts,
            tools,
            &routing.planning_model,
            &routing.reasoning_model,
        );

        let conversations = Arc::new(SqliteConversationStore::open(config.database_path())?);

        tracing::debug!(
            sources = ?router.registry().ids(),
            gate_model = %routing.gate_model,
            planning_model = %routing.planning_model,
            reasoning_model = %routing.reasoning_model,
            "Chat pipeline ready"
        );

        Ok(Self::new(router, orchestrator, embedder, conversations))
    }

    /// Answer one question.
    ///
    /// Fails only on an empty question, an embedding failure, or a planning or
    /// reasoning failure; in every failure case nothing is persisted.
    pub async fn answer(&self, request: &AskRequest) -> AppResult<ChatOutcome> {
        if request.question.trim().is_empty() {
            return Err(AppError::Other("Question must not be empty".to_string()));
        }

        tracing::info!(
            conversation = %request.conversation_id,
            project = %request.project_id,
            "Answering question"
        );

        let embedding = self.embedder.embed(&request.question).await?;
        let scope = ScopeIds::project(&request.project_id)
            .with_conversation(&request.conversation_id);

        let routed = self
            .router
            .route_with_decisions(&request.question, &embedding, &scope)
            .await;
        let orchestration = self
            .orchestrator
            .run(&request.question, &routed.context, &scope)
            .await?;

        let persistence_warning = self
            .persist(&request.conversation_id, &request.question, &orchestration.answer)
            .await
            .err()
            .map(|e| {
                tracing::warn!(conversation = %request.conversation_id, error = %e, "Answer not persisted");
                e.to_string()
            });

        let tool_calls = orchestration
            .tool_calls
            .iter()
            .zip(&orchestration.tool_results)
            .map(|(call, result)| ToolCallReport {
                id: call.id.clone(),
                name: call.name.clone(),
                is_error: result.is_error,
            })
            .collect();

        Ok(ChatOutcome {
            answer: orchestration.answer,
            included_sources: routed.included_sources(),
            tool_calls,
            persistence_warning,
        })
    }

    /// Save the question and its answer as one unit.
    async fn persist(&self, conversation_id: &str, question: &str, answer: &Answer) -> AppResult<()> {
        let turns = [
            ChatMessage::user(question),
            ChatMessage::assistant(answer.content.clone()),
        ];
        self.conversations.append(conversation_id, &turns).await
    }
}
