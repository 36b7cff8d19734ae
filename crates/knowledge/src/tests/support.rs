//! Shared test doubles.

use crate::gate::GateEvaluator;
use crate::sources::{RetrievalSource, ScopeIds, Snippet, SourceRegistry};
use scout_core::{AppError, AppResult, SourceConfig, SourceScope};
use scout_llm::{ChatRequest, ChatResponse, LlmClient};
use scout_prompt::PromptSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone)]
enum Action {
    Reply(String),
    Fail(String),
}

/// LLM double answering by substring match on the request text.
#[derive(Clone)]
pub struct ScriptedLlm {
    rules: Vec<(String, Action)>,
    delays: Vec<(String, Duration)>,
    fallback: String,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            delays: Vec::new(),
            fallback: r#"{"include": "no"}"#.to_string(),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn reply_when(mut self, needle: &str, reply: &str) -> Self {
        self.rules
            .push((needle.to_string(), Action::Reply(reply.to_string())));
        self
    }

    pub fn fail_when(mut self, needle: &str, error: &str) -> Self {
        self.rules
            .push((needle.to_string(), Action::Fail(error.to_string())));
        self
    }

    pub fn delay_when(mut self, needle: &str, delay: Duration) -> Self {
        self.delays.push((needle.to_string(), delay));
        self
    }

    pub fn default_reply(mut self, reply: &str) -> Self {
        self.fallback = reply.to_string();
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedLlm {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, request: &ChatRequest) -> AppResult<ChatResponse> {
        self.requests.lock().unwrap().push(request.clone());

        let text: String = request
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        if let Some((_, delay)) = self.delays.iter().find(|(n, _)| text.contains(n.as_str())) {
            tokio::time::sleep(*delay).await;
        }

        match self.rules.iter().find(|(n, _)| text.contains(n.as_str())) {
            Some((_, Action::Reply(reply))) => Ok(ChatResponse::text(&request.model, reply)),
            Some((_, Action::Fail(error))) => Err(AppError::Llm(error.clone())),
            None => Ok(ChatResponse::text(&request.model, &self.fallback)),
        }
    }
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

/// Source whose retrieval always errors.
pub struct FailingSource;

#[async_trait::async_trait]
impl RetrievalSource for FailingSource {
    async fn retrieve(&self, _: &[f32], _: &ScopeIds, _: usize) -> AppResult<Vec<Snippet>> {
        Err(AppError::Knowledge("source offline".to_string()))
    }
}

pub fn gate_evaluator(llm: ScriptedLlm) -> GateEvaluator {
    GateEvaluator::new(
        Arc::new(llm),
        "gate-model",
        Arc::new(PromptSet::builtin().unwrap()),
        Duration::from_secs(5),
    )
}

pub fn shared<S: RetrievalSource + 'static>(source: S) -> Arc<dyn RetrievalSource> {
    Arc::new(source)
}

pub fn registry(sources: Vec<(&str, Arc<dyn RetrievalSource>)>) -> Arc<SourceRegistry> {
    let mut registry = SourceRegistry::new();
    for (id, retriever) in sources {
        registry
            .register(
                SourceConfig::new(id, format!("{} records", id), 0.0, SourceScope::Project),
                retriever,
            )
            .unwrap();
    }
    Arc::new(registry)
}
