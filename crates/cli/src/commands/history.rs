//! History command handler.

use clap::Args;
use scout_agent::{ConversationStore, SqliteConversationStore};
use scout_core::{AppConfig, AppResult};

/// Show the stored turns of a conversation
#[derive(Args, Debug)]
pub struct HistoryCommand {
    /// Conversation to show
    #[arg(long)]
    pub conversation: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl HistoryCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing history command for '{}'", self.conversation);

        let store = SqliteConversationStore::open(config.database_path())?;
        let turns = store.read(&self.conversation).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&turns)?);
            return Ok(());
        }

        if turns.is_empty() {
            println!("No messages in conversation '{}'", self.conversation);
            return Ok(());
        }

        for turn in &turns {
            println!("[{}] {}", turn.role.as_str(), turn.content);
        }

        Ok(())
    }
}
