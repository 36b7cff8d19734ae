//! Ask command handler.
//!
//! Runs one question through gating, retrieval and the tool-calling
//! orchestrator, then prints the answer to stdout.

use clap::Args;
use scout_agent::{AskRequest, ChatPipeline};
use scout_core::{AppConfig, AppError, AppResult};
use scout_llm::create_client;
use std::time::Duration;

/// Ask a question about a project
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Project the question is about
    #[arg(long)]
    pub project: String,

    /// Conversation the question belongs to
    #[arg(long)]
    pub conversation: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        config.validate()?;

        let provider_config = config.get_provider_config(&config.provider);
        let endpoint = provider_config.as_ref().and_then(|pc| pc.endpoint());
        let timeout = provider_config
            .as_ref()
            .and_then(|pc| pc.timeout())
            .map(Duration::from_secs);
        let api_key = config.resolve_api_key(&config.provider);

        let client = create_client(&config.provider, endpoint, api_key.as_deref(), timeout)
            .map_err(AppError::Config)?;

        let pipeline = ChatPipeline::from_config(config, client)?;
        let request = AskRequest::new(&self.conversation, &self.project, &self.question);
        let outcome = pipeline.answer(&request).await?;

        if self.json {
            let output = serde_json::json!({
                "answer": outcome.answer,
                "includedSources": outcome.included_sources,
                "toolCalls": outcome.tool_calls,
                "persistenceWarning": outcome.persistence_warning,
                "provider": config.provider,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", outcome.answer.content);

            if let Some(warning) = &outcome.persistence_warning {
                tracing::warn!("Answer was not saved to the conversation: {}", warning);
            }
            tracing::debug!(sources = ?outcome.included_sources, "Sources used");
        }

        Ok(())
    }
}
