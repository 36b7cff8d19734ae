//! LLM integration crate for Scout.
//!
//! This crate provides a provider-agnostic chat-completion contract. Every
//! model interaction in the pipeline (gate evaluation, planning, reasoning)
//! goes through the [`LlmClient`] trait.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (`/api/chat`)
//! - **OpenAI-compatible**: OpenAI and Groq (`/chat/completions`)
//!
//! # Example
//! ```no_run
//! use scout_llm::{ChatMessage, ChatRequest, LlmClient, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = ChatRequest::new("llama3.2", vec![ChatMessage::user("Hello, world!")]);
//! let response = client.chat(&request).await?;
//! println!("{}", response.message.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{
    ChatMessage, ChatRequest, ChatResponse, FunctionDefinition, LlmClient, LlmUsage, Role,
    ToolCall, ToolChoice, ToolDefinition,
};
pub use factory::create_client;
pub use providers::{OllamaClient, OpenAiClient};
pub use types::ProviderType;
