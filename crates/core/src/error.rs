//! Error types for Scout.
//!
//! This module defines a unified error enum covering every failure category
//! the routing and orchestration pipeline can surface to its caller. Failures
//! that are recovered locally (gate parsing, per-source retrieval, tool calls)
//! never reach this type at the API boundary.

use std::fmt;
use thiserror::Error;

/// Orchestration stage that produced a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Planning,
    Reasoning,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Planning => write!(f, "planning"),
            Stage::Reasoning => write!(f, "reasoning"),
        }
    }
}

/// Unified error type for Scout.
///
/// All fallible functions return `Result<T, AppError>`.
/// We never panic: errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider errors (transport, status, rate limit, timeout)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Retrieval store and source registry errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Prompt template errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Conversation persistence errors
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Fatal orchestration failure, carrying the stage and underlying cause
    #[error("Orchestration failed during {stage} stage: {source}")]
    Orchestration {
        stage: Stage,
        #[source]
        source: Box<AppError>,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Wrap a model-call failure as a fatal orchestration error.
    pub fn orchestration(stage: Stage, cause: AppError) -> Self {
        AppError::Orchestration {
            stage,
            source: Box::new(cause),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
