//! Tools offered to the planning model.
//!
//! Each tool is a variant of [`ToolKind`] with its own argument struct.
//! Arguments are parsed strictly (unknown fields rejected) and validated
//! before anything runs. Every failure is folded into a [`ToolResult`] whose
//! content describes the error, so the reasoning model still sees one reply
//! per requested call.

use scout_core::{AppError, AppResult, KNOWN_TOOLS, TOOL_SOURCES};
use scout_knowledge::{EmbeddingProvider, ScopeIds, SourceRegistry};
use scout_llm::{ToolCall, ToolDefinition};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_LIMIT: usize = 5;
pub const MAX_LIMIT: usize = 20;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Out of scope: {0}")]
    OutOfScope(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

/// Reply to one tool call, keyed by the call's correlation id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    pub correlation_id: String,
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(correlation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn failure(correlation_id: impl Into<String>, error: &ToolError) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            content: format!("Error: {}", error),
            is_error: true,
        }
    }
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

/// Arguments for `retrieve_docs` and `retrieve_tasks`.
///
/// `project_id` may be omitted. When present it must name the request's project.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrieveArgs {
    pub query: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

/// Arguments for `retrieve_messages`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrieveMessagesArgs {
    pub query: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default, rename = "conversationId")]
    pub conversation_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

/// Parsed, validated arguments tagged with their tool.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolArgs {
    Docs(RetrieveArgs),
    Tasks(RetrieveArgs),
    Messages(RetrieveMessagesArgs),
}

impl ToolArgs {
    pub fn kind(&self) -> ToolKind {
        match self {
            ToolArgs::Docs(_) => ToolKind::RetrieveDocs,
            ToolArgs::Tasks(_) => ToolKind::RetrieveTasks,
            ToolArgs::Messages(_) => ToolKind::RetrieveMessages,
        }
    }

    pub fn query(&self) -> &str {
        match self {
            ToolArgs::Docs(a) | ToolArgs::Tasks(a) => &a.query,
            ToolArgs::Messages(a) => &a.query,
        }
    }

    pub fn limit(&self) -> usize {
        match self {
            ToolArgs::Docs(a) | ToolArgs::Tasks(a) => a.limit,
            ToolArgs::Messages(a) => a.limit,
        }
    }

    /// Scope for this call, taken from the request.
    ///
    /// Ids written by the model are only checked against the request's ids;
    /// a call can never widen or move its scope.
    pub fn bind_scope(&self, request: &ScopeIds) -> Result<ScopeIds, ToolError> {
        let (project, conversation) = match self {
            ToolArgs::Docs(a) | ToolArgs::Tasks(a) => (a.project_id.as_deref(), None),
            ToolArgs::Messages(a) => (a.project_id.as_deref(), a.conversation_id.as_deref()),
        };

        if let Some(project) = project {
            if project != request.project_id {
                return Err(ToolError::OutOfScope(format!(
                    "project_id '{}' is not the current project",
                    project
                )));
            }
        }
        if let Some(conversation) = conversation {
            if request.conversation_id.as_deref() != Some(conversation) {
                return Err(ToolError::OutOfScope(format!(
                    "conversationId '{}' is not the current conversation",
                    conversation
                )));
            }
        }

        Ok(request.clone())
    }

    fn validate(self) -> Result<Self, ToolError> {
        if self.query().trim().is_empty() {
            return Err(ToolError::InvalidArguments(
                "query must not be empty".to_string(),
            ));
        }

        let limit = self.limit();
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(ToolError::InvalidArguments(format!(
                "limit must be between 1 and {}, got {}",
                MAX_LIMIT, limit
            )));
        }

        Ok(self)
    }
}

/// Every tool the registry can offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    RetrieveDocs,
    RetrieveTasks,
    RetrieveMessages,
}

impl ToolKind {
    pub const ALL: [ToolKind; 3] = [
        ToolKind::RetrieveDocs,
        ToolKind::RetrieveTasks,
        ToolKind::RetrieveMessages,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::RetrieveDocs => KNOWN_TOOLS[0],
            ToolKind::RetrieveTasks => KNOWN_TOOLS[1],
            ToolKind::RetrieveMessages => KNOWN_TOOLS[2],
        }
    }

    /// Registry source the tool reads from.
    pub fn source_id(&self) -> &'static str {
        match self {
            ToolKind::RetrieveDocs => TOOL_SOURCES[0],
            ToolKind::RetrieveTasks => TOOL_SOURCES[1],
            ToolKind::RetrieveMessages => TOOL_SOURCES[2],
        }
    }

    fn description(&self) -> &'static str {
        match self {
            ToolKind::RetrieveDocs => "Retrieve documents stored in the project file system: paperwork, models and financial statements",
            ToolKind::RetrieveTasks => "Get the relevant tasks for this project",
            ToolKind::RetrieveMessages => "Get the relevant previous messages for this conversation",
        }
    }

    fn parameters(&self) -> serde_json::Value {
        let mut properties = json!({
            "query": {
                "type": "string",
                "description": "What to search for"
            },
            "project_id": {
                "type": "string",
                "description": "The current project id. Defaults to it when omitted"
            },
            "limit": {
                "type": "integer",
                "minimum": 1,
                "maximum": MAX_LIMIT,
                "description": "The number of results to retrieve"
            }
        });

        if *self == ToolKind::RetrieveMessages {
            properties["conversationId"] = json!({
                "type": "string",
                "description": "The current conversation id. Defaults to it when omitted"
            });
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": ["query"],
            "additionalProperties": false
        })
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(self.name(), self.description(), self.parameters())
    }

    /// Parse and validate the model's JSON argument string.
    pub fn parse_arguments(&self, raw: &str) -> Result<ToolArgs, ToolError> {
        let raw = if raw.trim().is_empty() { "{}" } else { raw };
        let invalid = |e: serde_json::Error| ToolError::InvalidArguments(e.to_string());

        let args = match self {
            ToolKind::RetrieveDocs => ToolArgs::Docs(serde_json::from_str(raw).map_err(invalid)?),
            ToolKind::RetrieveTasks => {
                ToolArgs::Tasks(serde_json::from_str(raw).map_err(invalid)?)
            }
            ToolKind::RetrieveMessages => {
                ToolArgs::Messages(serde_json::from_str(raw).map_err(invalid)?)
            }
        };

        args.validate()
    }
}

/// The tools enabled for this deployment, bound to the knowledge sources.
#[derive(Clone)]
pub struct ToolRegistry {
    enabled: Vec<ToolKind>,
    sources: Arc<SourceRegistry>,
    embedder: Arc<dyn EmbeddingProvider>,
    timeout: Duration,
}

impl ToolRegistry {
    /// Enable the named tools. Unknown names are a configuration error.
    pub fn new(
        names: &[String],
        sources: Arc<SourceRegistry>,
        embedder: Arc<dyn EmbeddingProvider>,
        timeout: Duration,
    ) -> AppResult<Self> {
        let mut enabled = Vec::with_capacity(names.len());
        for name in names {
            let kind = ToolKind::parse(name)
                .ok_or_else(|| AppError::Config(format!("Unknown tool: {}", name)))?;
            if !enabled.contains(&kind) {
                enabled.push(kind);
            }
        }

        Ok(Self {
            enabled,
            sources,
            embedder,
            timeout,
        })
    }

    pub fn enabled(&self) -> &[ToolKind] {
        &self.enabled
    }

    /// Schemas sent with the planning request.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.enabled.iter().map(|kind| kind.definition()).collect()
    }

    pub fn resolve(&self, name: &str) -> Result<ToolKind, ToolError> {
        ToolKind::parse(name)
            .filter(|kind| self.enabled.contains(kind))
            .ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    /// Run one call within the request's `scope`, turning any failure into
    /// failure content.
    pub async fn execute(&self, call: &ToolCall, scope: &ScopeIds) -> ToolResult {
        match self.invoke(call, scope).await {
            Ok(content) => {
                tracing::debug!(tool = %call.name, id = %call.id, "Tool succeeded");
                ToolResult::success(&call.id, content)
            }
            Err(e) => {
                tracing::warn!(tool = %call.name, id = %call.id, error = %e, "Tool failed");
                ToolResult::failure(&call.id, &e)
            }
        }
    }

    async fn invoke(&self, call: &ToolCall, scope: &ScopeIds) -> Result<String, ToolError> {
        let kind = self.resolve(&call.name)?;
        let args = kind.parse_arguments(&call.arguments)?;
        let scope = args.bind_scope(scope)?;

        tokio::time::timeout(self.timeout, self.run(&args, &scope))
            .await
            .map_err(|_| ToolError::Timeout(self.timeout))?
    }

    async fn run(&self, args: &ToolArgs, scope: &ScopeIds) -> Result<String, ToolError> {
        let source_id = args.kind().source_id();
        let source = self.sources.get(source_id).ok_or_else(|| {
            ToolError::ExecutionFailed(format!("source '{}' is not registered", source_id))
        })?;

        let embedding = self
            .embedder
            .embed(args.query())
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        let snippets = source
            .retriever
            .retrieve(&embedding, scope, args.limit())
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        if snippets.is_empty() {
            return Ok(format!("No results found in '{}'.", source_id));
        }

        Ok(snippets
            .into_iter()
            .map(|s| s.text)
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
