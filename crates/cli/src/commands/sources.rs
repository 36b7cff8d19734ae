//! Sources command handler.

use clap::Args;
use scout_core::{AppConfig, AppResult};
use scout_knowledge::RecordStore;

/// List the configured knowledge sources
#[derive(Args, Debug)]
pub struct SourcesCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SourcesCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let store = RecordStore::open(config.database_path())?;

        let mut rows = Vec::with_capacity(config.routing.sources.len());
        for source in &config.routing.sources {
            rows.push((source, store.count(&source.id)?));
        }

        if self.json {
            let output: Vec<_> = rows
                .iter()
                .map(|(source, records)| {
                    serde_json::json!({
                        "id": source.id,
                        "description": source.description,
                        "matchThreshold": source.match_threshold,
                        "scope": source.scope,
                        "records": records,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        for (source, records) in rows {
            println!(
                "{:<10} threshold {:.2}  {:>5} records  {}",
                source.id, source.match_threshold, records, source.description
            );
        }

        Ok(())
    }
}
