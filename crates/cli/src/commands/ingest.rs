//! Ingest command handler.

use clap::Args;
use scout_core::{AppConfig, AppError, AppResult};
use scout_knowledge::embeddings::MOCK_PROVIDER;
use scout_knowledge::{create_embedder, ingest, RecordStore, ScopeIds};

/// Add a record to a knowledge source
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Record text
    pub text: String,

    /// Source the record belongs to (e.g. docs, tasks, messages)
    #[arg(long)]
    pub source: String,

    /// Project the record belongs to
    #[arg(long)]
    pub project: String,

    /// Conversation the record belongs to (conversation-scoped sources)
    #[arg(long)]
    pub conversation: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command for source '{}'", self.source);

        let source = config
            .routing
            .sources
            .iter()
            .find(|s| s.id == self.source)
            .ok_or_else(|| {
                AppError::Config(format!(
                    "Unknown source '{}'. Run 'scout sources' to list configured sources.",
                    self.source
                ))
            })?;

        let mut scope = ScopeIds::project(&self.project);
        if let Some(conversation) = &self.conversation {
            scope = scope.with_conversation(conversation);
        } else if source.scope == scout_core::SourceScope::Conversation {
            return Err(AppError::Config(format!(
                "Source '{}' is conversation-scoped; pass --conversation",
                source.id
            )));
        }

        let store = RecordStore::open(config.database_path())?;
        let embedder = create_embedder(MOCK_PROVIDER, config.routing.embedding_dimensions)?;
        let id = ingest(&store, embedder.as_ref(), &source.id, &scope, &self.text).await?;

        if self.json {
            let output = serde_json::json!({
                "id": id,
                "source": source.id,
                "projectId": scope.project_id,
                "conversationId": scope.conversation_id,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("Stored record {} in '{}'", id, source.id);
        }

        Ok(())
    }
}
