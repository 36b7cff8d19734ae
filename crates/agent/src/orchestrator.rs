//! Tool-call orchestrator.
//!
//! One request makes exactly two model round trips:
//!
//! ```text
//! PLANNING --> EXECUTING_TOOLS --> REASONING --> DONE
//!     |              (skipped when       |
//!     |               no calls)          |
//!     +--------------> FAILED <----------+
//! ```
//!
//! The transcript is owned by the request and rebuilt from scratch every time.

use crate::tools::{ToolError, ToolRegistry, ToolResult};
use futures::future::join_all;
use scout_core::{AppError, AppResult, Stage};
use scout_knowledge::{ContextBlock, ScopeIds};
use scout_llm::{ChatMessage, ChatRequest, LlmClient, Role, ToolCall, ToolChoice};
use scout_prompt::{PromptSet, CHAT_REASONING, CHAT_SYSTEM, CHAT_USER};
use serde::Serialize;
use std::sync::Arc;
use tracing::Instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrchestratorState {
    Planning,
    ExecutingTools,
    Reasoning,
    Done,
    Failed,
}

/// The final assistant reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub role: Role,
    pub content: String,
}

impl Answer {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Everything a completed orchestration produced.
#[derive(Debug, Clone)]
pub struct Orchestration {
    pub answer: Answer,
    /// Calls requested by the planning model, in its order
    pub tool_calls: Vec<ToolCall>,
    /// One result per call, same order
    pub tool_results: Vec<ToolResult>,
    /// Transcript sent to the reasoning model
    pub transcript: Vec<ChatMessage>,
    /// States visited, ending in `Done`
    pub states: Vec<OrchestratorState>,
}

#[derive(Clone)]
pub struct Orchestrator {
    client: Arc<dyn LlmClient>,
    prompts: Arc<PromptSet>,
    tools: ToolRegistry,
    planning_model: String,
    reasoning_model: String,
}

impl Orchestrator {
    pub fn new(
        client: Arc<dyn LlmClient>,
        prompts: Arc<PromptSet>,
        tools: ToolRegistry,
        planning_model: impl Into<String>,
        reasoning_model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            prompts,
            tools,
            planning_model: planning_model.into(),
            reasoning_model: reasoning_model.into(),
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Answer `question` using the routed `context` and any tools the planner
    /// calls. Every tool call retrieves within `scope`.
    pub async fn run(
        &self,
        question: &str,
        context: &ContextBlock,
        scope: &ScopeIds,
    ) -> AppResult<Orchestration> {
        let span = tracing::info_span!("orchestrate", tools = self.tools.enabled().len());

        async move {
            let result = self.drive(question, context, scope).await;
            if let Err(e) = &result {
                tracing::error!(state = ?OrchestratorState::Failed, error = %e, "Orchestration failed");
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        question: &str,
        context: &ContextBlock,
        scope: &ScopeIds,
    ) -> AppResult<Orchestration> {
        let mut states = vec![OrchestratorState::Planning];
        let mut transcript = self.opening_transcript(question, context, scope)?;

        let definitions = self.tools.definitions();
        let mut planning = ChatRequest::new(&self.planning_model, transcript.clone());
        if !definitions.is_empty() {
            planning = planning.with_tools(definitions, ToolChoice::Auto);
        }

        let plan = self
            .client
            .chat(&planning)
            .await
            .map_err(|e| AppError::orchestration(Stage::Planning, e))?;

        let tool_calls = plan.message.tool_calls.clone();
        tracing::info!(calls = tool_calls.len(), "Planning complete");

        let tool_results = if tool_calls.is_empty() {
            Vec::new()
        } else {
            states.push(OrchestratorState::ExecutingTools);
            self.execute_tools(&tool_calls, scope).await
        };

        states.push(OrchestratorState::Reasoning);
        let mut planning_turn = plan.message;
        planning_turn.role = Role::Assistant;
        transcript.push(planning_turn);
        for result in &tool_results {
            transcript.push(ChatMessage::tool(&result.correlation_id, &result.content));
        }
        let restated = self
            .prompts
            .render_with(CHAT_REASONING, &[("question", question)])
            .map_err(|e| AppError::orchestration(Stage::Reasoning, e))?;
        transcript.push(ChatMessage::user(restated));

        let reasoning = ChatRequest::new(&self.reasoning_model, transcript.clone());
        let reply = self
            .client
            .chat(&reasoning)
            .await
            .map_err(|e| AppError::orchestration(Stage::Reasoning, e))?;

        let content = strip_think_block(&reply.message.content);
        if content.is_empty() {
            tracing::warn!("Reasoning model returned an empty answer");
        }

        states.push(OrchestratorState::Done);
        tracing::info!(states = ?states, "Orchestration complete");

        Ok(Orchestration {
            answer: Answer::new(content),
            tool_calls,
            tool_results,
            transcript,
            states,
        })
    }

    fn opening_transcript(
        &self,
        question: &str,
        context: &ContextBlock,
        scope: &ScopeIds,
    ) -> AppResult<Vec<ChatMessage>> {
        let system = self
            .prompts
            .render_with(CHAT_SYSTEM, &[])
            .map_err(|e| AppError::orchestration(Stage::Planning, e))?;
        let rendered = context.render();
        let user = self
            .prompts
            .render_with(
                CHAT_USER,
                &[
                    ("question", question),
                    ("context", rendered.as_str()),
                    ("project_id", scope.project_id.as_str()),
                    (
                        "conversation_id",
                        scope.conversation_id.as_deref().unwrap_or("none"),
                    ),
                ],
            )
            .map_err(|e| AppError::orchestration(Stage::Planning, e))?;

        Ok(vec![ChatMessage::system(system), ChatMessage::user(user)])
    }

    /// Run every call on its own task and join them all, keeping call order.
    async fn execute_tools(&self, calls: &[ToolCall], scope: &ScopeIds) -> Vec<ToolResult> {
        let handles: Vec<_> = calls
            .iter()
            .cloned()
            .map(|call| {
                let tools = self.tools.clone();
                let scope = scope.clone();
                tokio::spawn(async move { tools.execute(&call, &scope).await })
            })
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .zip(calls)
            .map(|(joined, call)| match joined {
                Ok(result) => result,
                Err(e) => ToolResult::failure(
                    &call.id,
                    &ToolError::ExecutionFailed(format!("tool task aborted: {}", e)),
                ),
            })
            .collect()
    }
}

/// Drop a leading `<think>...</think>` block some reasoning models emit.
pub fn strip_think_block(content: &str) -> String {
    let trimmed = content.trim_start();
    if let Some(rest) = trimmed.strip_prefix("<think>") {
        if let Some(end) = rest.find("</think>") {
            return rest[end + "</think>".len()..].trim().to_string();
        }
    }
    content.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_think_block() {
        assert_eq!(
            strip_think_block("<think>\nlet me see\n</think>\n\nThe roof is booked."),
            "The roof is booked."
        );
        assert_eq!(strip_think_block("  plain answer "), "plain answer");
        // Unterminated block is kept as-is
        assert_eq!(strip_think_block("<think>oops"), "<think>oops");
    }

    #[test]
    fn test_answer_role_is_assistant() {
        let answer = Answer::new("hi");
        assert_eq!(answer.role, Role::Assistant);
        let json = serde_json::to_value(&answer).unwrap();
        assert_eq!(json["role"], "assistant");
    }
}
