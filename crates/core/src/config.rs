//! Configuration management for Scout.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Environment variables
//! - Command-line flags
//! - Config files (.scout/config.yaml)
//!
//! The configuration is workspace-centric, with all local state stored in `.scout/`.
//! The `routing` section is the deployment parameter that decides which
//! knowledge sources exist, which models run each stage, and which tools the
//! planning model may call.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Providers the LLM factory knows how to build.
pub const KNOWN_PROVIDERS: [&str; 3] = ["ollama", "openai", "groq"];

/// Tools the planning model may be offered.
pub const KNOWN_TOOLS: [&str; 3] = ["retrieve_docs", "retrieve_tasks", "retrieve_messages"];

/// Source each of [`KNOWN_TOOLS`] reads from, by position.
pub const TOOL_SOURCES: [&str; 3] = ["docs", "tasks", "messages"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .scout/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Active LLM provider (e.g., "groq", "openai", "ollama")
    pub provider: String,

    /// API key for the LLM provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// LLM provider configurations
    pub llm: Option<LlmConfig>,

    /// Source registry, stage models and tool selection
    pub routing: RoutingConfig,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    /// OpenAI-compatible chat completions API (OpenAI, Groq)
    OpenAI {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        endpoint: Option<String>,
        timeout: Option<u64>,
    },
    Ollama {
        endpoint: String,
        timeout: Option<u64>,
    },
}

impl ProviderConfig {
    /// Custom endpoint, if configured.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            ProviderConfig::OpenAI { endpoint, .. } => endpoint.as_deref(),
            ProviderConfig::Ollama { endpoint, .. } => Some(endpoint.as_str()),
        }
    }

    /// Request timeout in seconds, if configured.
    pub fn timeout(&self) -> Option<u64> {
        match self {
            ProviderConfig::OpenAI { timeout, .. } | ProviderConfig::Ollama { timeout, .. } => {
                *timeout
            }
        }
    }
}

/// Which scope id a retrieval source filters its records by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceScope {
    /// Records belonging to the project
    Project,
    /// Records belonging to the current conversation
    Conversation,
}

/// One entry of the source registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    /// Unique source identifier (e.g., "docs")
    pub id: String,

    /// What the source contains; embedded in the gate prompt as the rubric
    pub description: String,

    /// Minimum cosine similarity for a record to be returned
    #[serde(default)]
    pub match_threshold: f32,

    #[serde(default = "default_scope")]
    pub scope: SourceScope,
}

fn default_scope() -> SourceScope {
    SourceScope::Project
}

impl SourceConfig {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        match_threshold: f32,
        scope: SourceScope,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            match_threshold,
            scope,
        }
    }
}

/// Routing and orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingConfig {
    /// Small model answering the per-source yes/no gate question
    #[serde(default = "default_gate_model")]
    pub gate_model: String,

    /// Tool-capable model for the planning stage
    #[serde(default = "default_planning_model")]
    pub planning_model: String,

    /// Stronger model for the final reasoning stage
    #[serde(default = "default_reasoning_model")]
    pub reasoning_model: String,

    /// Upper bound on a single gate call
    #[serde(default = "default_gate_timeout_secs")]
    pub gate_timeout_secs: u64,

    /// Upper bound on a single tool execution
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    /// Maximum snippets returned per source
    #[serde(default = "default_retrieval_limit")]
    pub retrieval_limit: usize,

    /// Dimension of query and record embeddings
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: usize,

    /// Ordered source registry; order defines context order
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,

    /// Tool names exposed to the planning model
    #[serde(default = "default_tools")]
    pub tools: Vec<String>,
}

fn default_gate_model() -> String {
    "llama-3.1-8b-instant".to_string()
}

fn default_planning_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_reasoning_model() -> String {
    "qwen/qwen3-32b".to_string()
}

fn default_gate_timeout_secs() -> u64 {
    10
}

fn default_tool_timeout_secs() -> u64 {
    30
}

fn default_retrieval_limit() -> usize {
    5
}

fn default_embedding_dimensions() -> usize {
    384
}

fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig::new(
            "docs",
            "Documents stored in the project file system: paperwork, models and financial statements",
            0.2,
            SourceScope::Project,
        ),
        SourceConfig::new(
            "tasks",
            "Project tasks with their status, assignees and due dates",
            0.7,
            SourceScope::Project,
        ),
        SourceConfig::new(
            "messages",
            "Earlier messages exchanged in this conversation",
            0.0,
            SourceScope::Conversation,
        ),
    ]
}

fn default_tools() -> Vec<String> {
    vec![
        "retrieve_docs".to_string(),
        "retrieve_tasks".to_string(),
        "retrieve_messages".to_string(),
    ]
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            gate_model: default_gate_model(),
            planning_model: default_planning_model(),
            reasoning_model: default_reasoning_model(),
            gate_timeout_secs: default_gate_timeout_secs(),
            tool_timeout_secs: default_tool_timeout_secs(),
            retrieval_limit: default_retrieval_limit(),
            embedding_dimensions: default_embedding_dimensions(),
            sources: default_sources(),
            tools: default_tools(),
        }
    }
}

impl RoutingConfig {
    /// Check source ids are non-empty and unique, every tool is known and
    /// backed by a configured source, and limits and timeouts are usable.
    pub fn validate(&self) -> AppResult<()> {
        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.id.trim().is_empty() {
                return Err(AppError::Config("Source id must not be empty".to_string()));
            }
            if !seen.insert(source.id.as_str()) {
                return Err(AppError::Config(format!(
                    "Duplicate source id in routing.sources: {}",
                    source.id
                )));
            }
        }

        for tool in &self.tools {
            let position = KNOWN_TOOLS.iter().position(|t| *t == tool.as_str());
            let Some(position) = position else {
                return Err(AppError::Config(format!(
                    "Unknown tool in routing.tools: {}. Supported: {}",
                    tool,
                    KNOWN_TOOLS.join(", ")
                )));
            };

            let source = TOOL_SOURCES[position];
            if !seen.contains(source) {
                return Err(AppError::Config(format!(
                    "Tool {} needs source '{}', which is not in routing.sources",
                    tool, source
                )));
            }
        }

        if self.gate_timeout_secs == 0 {
            return Err(AppError::Config(
                "routing.gateTimeoutSecs must be at least 1".to_string(),
            ));
        }

        if self.tool_timeout_secs == 0 {
            return Err(AppError::Config(
                "routing.toolTimeoutSecs must be at least 1".to_string(),
            ));
        }

        if self.retrieval_limit == 0 {
            return Err(AppError::Config(
                "routing.retrievalLimit must be at least 1".to_string(),
            ));
        }

        if self.embedding_dimensions == 0 {
            return Err(AppError::Config(
                "routing.embeddingDimensions must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    routing: Option<RoutingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "groq".to_string(),
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            llm: None,
            routing: RoutingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and defaults.
    ///
    /// Environment variables:
    /// - `SCOUT_WORKSPACE`: Override workspace path
    /// - `SCOUT_CONFIG`: Path to config file
    /// - `SCOUT_PROVIDER`: LLM provider
    /// - `SCOUT_API_KEY`: API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use scout_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("SCOUT_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("SCOUT_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = if let Some(ref cf) = config.config_file {
            cf.clone()
        } else {
            config.workspace.join(".scout/config.yaml")
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("SCOUT_PROVIDER") {
            config.provider = provider;
        }

        config.api_key = std::env::var("SCOUT_API_KEY").ok();
        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        self.merge_yaml_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })
    }

    fn merge_yaml_str(&self, contents: &str) -> AppResult<Self> {
        let config_file: ConfigFile = serde_yaml::from_str(contents)?;

        let mut result = self.clone();

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();
            result.llm = Some(llm);
        }

        if let Some(routing) = config_file.routing {
            result.routing = routing;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .scout directory.
    pub fn scout_dir(&self) -> PathBuf {
        self.workspace.join(".scout")
    }

    /// SQLite database holding retrieval records and conversations.
    pub fn database_path(&self) -> PathBuf {
        self.scout_dir().join("scout.db")
    }

    /// Ensure the .scout directory exists.
    pub fn ensure_scout_dir(&self) -> AppResult<()> {
        let scout_dir = self.scout_dir();
        if !scout_dir.exists() {
            std::fs::create_dir_all(&scout_dir).map_err(|e| {
                AppError::Config(format!("Failed to create .scout directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Get a provider's configuration.
    pub fn get_provider_config(&self, provider: &str) -> Option<ProviderConfig> {
        self.llm
            .as_ref()
            .and_then(|llm| llm.providers.get(provider).cloned())
    }

    /// Resolve API key, preferring `SCOUT_API_KEY` over the provider's key variable.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        match self.get_provider_config(provider) {
            Some(ProviderConfig::OpenAI { api_key_env, .. }) => std::env::var(&api_key_env).ok(),
            Some(ProviderConfig::Ollama { .. }) => None,
            None => match provider {
                "groq" => std::env::var("GROQ_API_KEY").ok(),
                "openai" => std::env::var("OPENAI_API_KEY").ok(),
                _ => None,
            },
        }
    }

    /// Validate configuration for the active provider and the routing section.
    pub fn validate(&self) -> AppResult<()> {
        let provider = &self.provider;

        if !KNOWN_PROVIDERS.contains(&provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if provider != "ollama" && self.resolve_api_key(provider).is_none() {
            return Err(AppError::Config(format!(
                "No API key found for provider '{}'. Set SCOUT_API_KEY or the provider's apiKeyEnv variable.",
                provider
            )));
        }

        self.routing.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "groq");
        assert!(!config.verbose);
        assert!(!config.no_color);
        assert_eq!(config.routing.retrieval_limit, 5);
    }

    #[test]
    fn test_default_sources_in_registry_order() {
        let routing = RoutingConfig::default();
        let ids: Vec<&str> = routing.sources.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["docs", "tasks", "messages"]);
        assert_eq!(routing.sources[2].scope, SourceScope::Conversation);
    }

    #[test]
    fn test_database_path() {
        let config = AppConfig::default();
        assert!(config.database_path().ends_with(".scout/scout.db"));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden =
            config.with_overrides(None, None, Some("ollama".to_string()), None, true, false);

        assert_eq!(overridden.provider, "ollama");
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_merge_yaml_routing_section() {
        let yaml = r#"
llm:
  activeProvider: ollama
  providers:
    ollama:
      endpoint: http://localhost:11434
routing:
  gateModel: llama3.2
  retrievalLimit: 3
  sources:
    - id: tasks
      description: Project tasks
      matchThreshold: 0.5
    - id: notes
      description: Meeting notes
      scope: conversation
  tools: [retrieve_tasks]
"#;
        let merged = AppConfig::default().merge_yaml_str(yaml).unwrap();
        assert_eq!(merged.provider, "ollama");
        assert_eq!(merged.routing.gate_model, "llama3.2");
        assert_eq!(merged.routing.planning_model, "llama-3.3-70b-versatile");
        assert_eq!(merged.routing.retrieval_limit, 3);
        assert_eq!(merged.routing.sources.len(), 2);
        assert_eq!(merged.routing.sources[0].scope, SourceScope::Project);
        assert_eq!(merged.routing.sources[1].scope, SourceScope::Conversation);
        assert_eq!(merged.routing.tools, vec!["retrieve_tasks".to_string()]);
        assert!(merged.routing.validate().is_ok());
        assert_eq!(
            merged.get_provider_config("ollama").unwrap().endpoint(),
            Some("http://localhost:11434")
        );
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_ollama() {
        let mut config = AppConfig::default();
        config.provider = "ollama".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_unknown_tool() {
        let mut routing = RoutingConfig::default();
        routing.tools.push("search_web".to_string());
        let err = routing.validate().unwrap_err();
        assert!(err.to_string().contains("search_web"));
    }

    #[test]
    fn test_validate_tool_without_source() {
        let mut routing = RoutingConfig::default();
        routing.sources.retain(|s| s.id != "messages");
        let err = routing.validate().unwrap_err();
        assert!(err.to_string().contains("retrieve_messages"));

        routing.tools.retain(|t| t != "retrieve_messages");
        assert!(routing.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_timeouts() {
        let mut routing = RoutingConfig::default();
        routing.gate_timeout_secs = 0;
        assert!(routing
            .validate()
            .unwrap_err()
            .to_string()
            .contains("gateTimeoutSecs"));

        let mut routing = RoutingConfig::default();
        routing.tool_timeout_secs = 0;
        assert!(routing
            .validate()
            .unwrap_err()
            .to_string()
            .contains("toolTimeoutSecs"));
    }

    #[test]
    fn test_validate_duplicate_sources() {
        let mut routing = RoutingConfig::default();
        routing.sources.push(SourceConfig::new(
            "docs",
            "again",
            0.0,
            SourceScope::Project,
        ));
        let err = routing.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate source id"));
    }
}
