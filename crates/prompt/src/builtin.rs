//! Built-in prompt definitions.
//!
//! Workspaces may override any of these by placing a file with the same id
//! under `.scout/prompts/<id>.yml`.

use crate::types::PromptDefinition;
use scout_core::{AppError, AppResult};

/// Per-source yes/no inclusion question. Variables: source, description, query.
pub const GATE_SOURCE: &str = "gate.source";

/// System prompt opening every orchestration transcript. Variables: none.
pub const CHAT_SYSTEM: &str = "chat.system";

/// User turn carrying the question, the request's ids and the routed context.
/// Variables: question, context, project_id, conversation_id.
pub const CHAT_USER: &str = "chat.user";

/// Restated question closing the reasoning transcript. Variables: question.
pub const CHAT_REASONING: &str = "chat.reasoning";

const GATE_SOURCE_YAML: &str = r#"
id: gate.source
title: Source relevance gate
apiVersion: "1.0"
createdBy: scout
variables: [source, description, query]
template: |-
  Answer strictly with JSON {"include": "yes"} or {"include": "no"} and nothing else.
  Would the source '{{source}}' help answer the user's question?

  ### source contents
  {{description}}

  ### user question
  {{query}}
"#;

const CHAT_SYSTEM_YAML: &str = r#"
id: chat.system
title: Project assistant system prompt
apiVersion: "1.0"
createdBy: scout
variables: []
template: |-
  You are a project assistant. You answer questions about a single project
  using the context retrieved from its documents, tasks and conversations.

  Instructions:
  - Answer only from the supplied context and tool results
  - Call a tool when the supplied context is missing something the question needs
  - If a tool reports a failure, say what could not be looked up
  - If the context does not contain the answer, say so plainly
  - Keep your response concise and factual
"#;

const CHAT_USER_YAML: &str = r#"
id: chat.user
title: Question with routed context
apiVersion: "1.0"
createdBy: scout
variables: [question, context, project_id, conversation_id]
template: |-
  User question:
  {{question}}

  Project: {{project_id}}
  Conversation: {{conversation_id}}

  Relevant project context:
  {{context}}
"#;

const CHAT_REASONING_YAML: &str = r#"
id: chat.reasoning
title: Reasoning stage question
apiVersion: "1.0"
createdBy: scout
variables: [question]
template: |-
  Using the context and tool results above, answer the original question:
  {{question}}
"#;

/// Every built-in prompt id.
pub const BUILTIN_IDS: [&str; 4] = [GATE_SOURCE, CHAT_SYSTEM, CHAT_USER, CHAT_REASONING];

/// Parse the built-in definition for `id`.
pub fn builtin_prompt(id: &str) -> AppResult<PromptDefinition> {
    let yaml = match id {
        GATE_SOURCE => GATE_SOURCE_YAML,
        CHAT_SYSTEM => CHAT_SYSTEM_YAML,
        CHAT_USER => CHAT_USER_YAML,
        CHAT_REASONING => CHAT_REASONING_YAML,
        other => {
            return Err(AppError::Prompt(format!(
                "No built-in prompt named '{}'",
                other
            )))
        }
    };

    serde_yaml::from_str(yaml)
        .map_err(|e| AppError::Prompt(format!("Built-in prompt '{}' is invalid: {}", id, e)))
}
