//! Tool-calling question answering over routed project knowledge.

pub mod conversation;
pub mod orchestrator;
pub mod pipeline;
pub mod tools;

pub use conversation::{ConversationStore, SqliteConversationStore};
pub use orchestrator::{Answer, Orchestration, Orchestrator, OrchestratorState};
pub use pipeline::{AskRequest, ChatOutcome, ChatPipeline, ToolCallReport};
pub use tools::{ToolArgs, ToolError, ToolKind, ToolRegistry, ToolResult};
