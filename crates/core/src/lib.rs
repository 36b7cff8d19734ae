//! Scout Core Library
//!
//! This crate provides the foundational utilities shared by every Scout crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management (providers, routing, sources, tools)

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{
    AppConfig, RoutingConfig, SourceConfig, SourceScope, KNOWN_PROVIDERS, KNOWN_TOOLS,
    TOOL_SOURCES,
};
pub use error::{AppError, AppResult, Stage};
