//! Command handlers for the Scout CLI.

pub mod ask;
pub mod history;
pub mod ingest;
pub mod sources;

pub use ask::AskCommand;
pub use history::HistoryCommand;
pub use ingest::IngestCommand;
pub use sources::SourcesCommand;
