//! Test doubles shared by the integration tests.
#![allow(dead_code)]

use scout_agent::{ChatPipeline, ConversationStore, Orchestrator, ToolRegistry};
use scout_core::{AppError, AppResult, SourceConfig, SourceScope, KNOWN_TOOLS};
use scout_knowledge::{
    EmbeddingProvider, GateEvaluator, RetrievalSource, Router, ScopeIds, Snippet, SourceRegistry,
    TrigramEmbedder,
};
use scout_llm::{ChatMessage, ChatRequest, ChatResponse, LlmClient, Role, ToolCall};
use scout_prompt::PromptSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const GATE_MODEL: &str = "gate-model";
pub const PLANNING_MODEL: &str = "planning-model";
pub const REASONING_MODEL: &str = "reasoning-model";

type Handler = Box<dyn Fn(&ChatRequest) -> AppResult<ChatResponse> + Send + Sync>;

/// LLM double driven by a closure, recording every request.
pub struct FnLlm {
    handler: Handler,
    requests: Mutex<Vec<ChatRequest>>,
}

impl FnLlm {
    pub fn new(
        handler: impl Fn(&ChatRequest) -> AppResult<ChatResponse> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_for(&self, model: &str) -> Vec<ChatRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.model == model)
            .collect()
    }
}

#[async_trait::async_trait]
impl LlmClient for FnLlm {
    fn provider_name(&self) -> &str {
        "fn"
    }

    async fn chat(&self, request: &ChatRequest) -> AppResult<ChatResponse> {
        self.requests.lock().unwrap().push(request.clone());
        (self.handler)(request)
    }
}

/// Source id named in a gate prompt.
pub fn gated_source(request: &ChatRequest) -> Option<String> {
    let text = &request.messages.first()?.content;
    let start = text.find("source '")? + "source '".len();
    let end = text[start..].find('\'')? + start;
    Some(text[start..end].to_string())
}

pub fn gate_reply(request: &ChatRequest, include: &[&str]) -> ChatResponse {
    let yes = gated_source(request).is_some_and(|id| include.contains(&id.as_str()));
    let verdict = if yes { "yes" } else { "no" };
    ChatResponse::text(&request.model, format!(r#"{{"include": "{}"}}"#, verdict))
}

pub fn plan_with_calls(request: &ChatRequest, calls: Vec<ToolCall>) -> ChatResponse {
    let mut response = ChatResponse::text(&request.model, "");
    response.message = ChatMessage::assistant("").with_tool_calls(calls);
    response
}

/// Answer built from whatever context and tool output reached the reasoning model.
pub fn echo_reasoning(request: &ChatRequest) -> ChatResponse {
    let mut facts: Vec<String> = Vec::new();
    for message in &request.messages {
        match message.role {
            Role::User => facts.extend(
                message
                    .content
                    .lines()
                    .filter_map(|l| l.strip_prefix("- "))
                    .map(str::to_string),
            ),
            Role::Tool => facts.push(message.content.clone()),
            _ => {}
        }
    }

    let content = if facts.is_empty() {
        "I could not find anything relevant in the project records.".to_string()
    } else {
        format!("From the project records: {}", facts.join("; "))
    };
    ChatResponse::text(&request.model, content)
}

/// Source returning fixed snippets, optionally after a delay.
pub struct StaticSource {
    snippets: Vec<String>,
    delay: Option<Duration>,
}

impl StaticSource {
    pub fn new(snippets: &[&str]) -> Self {
        Self {
            snippets: snippets.iter().map(|s| s.to_string()).collect(),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait::async_trait]
impl RetrievalSource for StaticSource {
    async fn retrieve(&self, _: &[f32], _: &ScopeIds, limit: usize) -> AppResult<Vec<Snippet>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .snippets
            .iter()
            .take(limit)
            .map(|s| Snippet::new(s.as_str()))
            .collect())
    }
}

pub fn shared<S: RetrievalSource + 'static>(source: S) -> Arc<dyn RetrievalSource> {
    Arc::new(source)
}

/// In-memory conversation store.
#[derive(Default)]
pub struct MemoryConversations {
    turns: Mutex<Vec<(String, ChatMessage)>>,
}

impl MemoryConversations {
    pub fn all(&self) -> Vec<(String, ChatMessage)> {
        self.turns.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ConversationStore for MemoryConversations {
    async fn append(&self, conversation_id: &str, turns: &[ChatMessage]) -> AppResult<()> {
        self.turns.lock().unwrap().extend(
            turns
                .iter()
                .map(|turn| (conversation_id.to_string(), turn.clone())),
        );
        Ok(())
    }

    async fn read(&self, conversation_id: &str) -> AppResult<Vec<ChatMessage>> {
        Ok(self
            .turns
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == conversation_id)
            .map(|(_, turn)| turn.clone())
            .collect())
    }
}

/// Store that is always unavailable.
pub struct BrokenConversations;

#[async_trait::async_trait]
impl ConversationStore for BrokenConversations {
    async fn append(&self, _: &str, _: &[ChatMessage]) -> AppResult<()> {
        Err(AppError::Persistence("database is locked".to_string()))
    }

    async fn read(&self, _: &str) -> AppResult<Vec<ChatMessage>> {
        Err(AppError::Persistence("database is locked".to_string()))
    }
}

/// Scope of the request every orchestrator test runs under.
pub fn request_scope() -> ScopeIds {
    ScopeIds::project("p1").with_conversation("c1")
}

/// `docs`, `tasks` and `messages` backed by the given retrievers.
pub fn sources(
    docs: Arc<dyn RetrievalSource>,
    tasks: Arc<dyn RetrievalSource>,
    messages: Arc<dyn RetrievalSource>,
) -> Arc<SourceRegistry> {
    let mut registry = SourceRegistry::new();
    for (id, scope, retriever) in [
        ("docs", SourceScope::Project, docs),
        ("tasks", SourceScope::Project, tasks),
        ("messages", SourceScope::Conversation, messages),
    ] {
        registry
            .register(SourceConfig::new(id, format!("Project {}", id), 0.0, scope), retriever)
            .unwrap();
    }
    Arc::new(registry)
}

pub fn embedder() -> Arc<dyn EmbeddingProvider> {
    Arc::new(TrigramEmbedder::new(64))
}

pub fn orchestrator(llm: Arc<FnLlm>, sources: Arc<SourceRegistry>) -> Orchestrator {
    let names: Vec<String> = KNOWN_TOOLS.iter().map(|s| s.to_string()).collect();
    let tools =
        ToolRegistry::new(&names, sources, embedder(), Duration::from_secs(5)).unwrap();

    Orchestrator::new(
        llm,
        Arc::new(PromptSet::builtin().unwrap()),
        tools,
        PLANNING_MODEL,
        REASONING_MODEL,
    )
}

pub fn pipeline(
    llm: Arc<FnLlm>,
    sources: Arc<SourceRegistry>,
    conversations: Arc<dyn ConversationStore>,
) -> ChatPipeline {
    let gate = GateEvaluator::new(
        llm.clone(),
        GATE_MODEL,
        Arc::new(PromptSet::builtin().unwrap()),
        Duration::from_secs(5),
    );
    let router = Router::new(sources.clone(), gate, 5);

    ChatPipeline::new(router, orchestrator(llm, sources), embedder(), conversations)
}
