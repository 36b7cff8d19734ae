//! Prompt system for Scout.
//!
//! This crate provides the prompt templates used by the pipeline:
//! - YAML-based prompt definitions, built in and overridable per workspace
//! - Handlebars rendering in strict mode (a missing variable is an error)
//! - Up-front validation that every template embeds the variables its
//!   caller supplies, so substitution defects surface at startup

pub mod builder;
pub mod builtin;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::PromptSet;
pub use builtin::{CHAT_REASONING, CHAT_SYSTEM, CHAT_USER, GATE_SOURCE};
pub use loader::load_prompt;
pub use types::PromptDefinition;
