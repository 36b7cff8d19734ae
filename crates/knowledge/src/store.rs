//! SQLite-backed retrieval store.
//!
//! All sources share one `records` table keyed by source id. Similarity is
//! computed in process over the stored embeddings; a source's match threshold
//! and scope are applied before the top `limit` records are returned.

use crate::embeddings::EmbeddingProvider;
use crate::sources::{RetrievalSource, ScopeIds, Snippet};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use scout_core::{AppError, AppResult, SourceConfig, SourceScope};
use std::path::{Path, PathBuf};

/// A stored record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub source: String,
    pub project_id: String,
    pub conversation_id: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Handle to the records database. Connections are opened per operation.
#[derive(Debug, Clone)]
pub struct RecordStore {
    db_path: PathBuf,
}

impl RecordStore {
    /// Open (creating if needed) the records database.
    pub fn open(db_path: impl Into<PathBuf>) -> AppResult<Self> {
        let store = Self {
            db_path: db_path.into(),
        };
        init_records(&store.db_path)?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> AppResult<Connection> {
        Connection::open(&self.db_path)
            .map_err(|e| AppError::Knowledge(format!("Failed to open records database: {}", e)))
    }

    /// Insert a record with its embedding, returning the generated id.
    pub fn insert(
        &self,
        source: &str,
        scope: &ScopeIds,
        content: &str,
        embedding: &[f32],
    ) -> AppResult<String> {
        let conn = self.connect()?;
        let id = uuid::Uuid::new_v4().to_string();

        conn.execute(
            "INSERT INTO records (id, source, project_id, conversation_id, content, embedding, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                source,
                scope.project_id,
                scope.conversation_id,
                content,
                embedding_to_bytes(embedding),
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| AppError::Knowledge(format!("Failed to insert record: {}", e)))?;

        tracing::debug!(source, record = %id, "Inserted record");
        Ok(id)
    }

    /// Number of records held for `source`.
    pub fn count(&self, source: &str) -> AppResult<usize> {
        let conn = self.connect()?;
        conn.query_row(
            "SELECT COUNT(*) FROM records WHERE source = ?1",
            params![source],
            |row| row.get::<_, i64>(0),
        )
        .map(|n| n as usize)
        .map_err(|e| AppError::Knowledge(format!("Failed to count records: {}", e)))
    }

    /// Records for `source` within `scope` scoring at least `threshold`, best first.
    pub fn search(
        &self,
        source: &SourceConfig,
        scope: &ScopeIds,
        embedding: &[f32],
        limit: usize,
    ) -> AppResult<Vec<(Record, f32)>> {
        let (filter_column, filter_value) = match source.scope {
            SourceScope::Project => ("project_id", scope.project_id.as_str()),
            SourceScope::Conversation => match scope.conversation_id.as_deref() {
                Some(conversation_id) => ("conversation_id", conversation_id),
                None => {
                    tracing::debug!(source = %source.id, "No conversation id in scope, nothing to search");
                    return Ok(Vec::new());
                }
            },
        };

        let conn = self.connect()?;
        let sql = format!(
            "SELECT id, source, project_id, conversation_id, content, embedding, created_at
             FROM records WHERE source = ?1 AND {} = ?2",
            filter_column
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| AppError::Knowledge(format!("Failed to prepare search: {}", e)))?;

        let rows = stmt
            .query_map(params![source.id, filter_value], |row| {
                let bytes: Vec<u8> = row.get(5)?;
                let created_at: String = row.get(6)?;
                Ok((
                    Record {
                        id: row.get(0)?,
                        source: row.get(1)?,
                        project_id: row.get(2)?,
                        conversation_id: row.get(3)?,
                        content: row.get(4)?,
                        created_at: DateTime::parse_from_rfc3339(&created_at)
                            .map(|t| t.with_timezone(&Utc))
                            .unwrap_or_else(|_| Utc::now()),
                    },
                    bytes,
                ))
            })
            .map_err(|e| AppError::Knowledge(format!("Failed to search records: {}", e)))?;

        let mut results = Vec::new();
        for row in rows {
            let (record, bytes) =
                row.map_err(|e| AppError::Knowledge(format!("Failed to read record: {}", e)))?;
            let stored = bytes_to_embedding(&bytes)?;
            let score = cosine_similarity(embedding, &stored);
            if score >= source.match_threshold {
                results.push((record, score));
            }
        }

        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(limit);

        tracing::debug!(
            source = %source.id,
            matched = results.len(),
            threshold = source.match_threshold,
            "Searched records"
        );

        Ok(results)
    }
}

fn init_records(db_path: &Path) -> AppResult<()> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            AppError::Knowledge(format!("Failed to create records directory: {}", e))
        })?;
    }

    let conn = Connection::open(db_path)
        .map_err(|e| AppError::Knowledge(format!("Failed to open records database: {}", e)))?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            id TEXT PRIMARY KEY,
            source TEXT NOT NULL,
            project_id TEXT NOT NULL,
            conversation_id TEXT,
            content TEXT NOT NULL,
            embedding BLOB NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_records_source_project ON records(source, project_id);
        CREATE INDEX IF NOT EXISTS idx_records_source_conversation ON records(source, conversation_id);
        "#,
    )
    .map_err(|e| AppError::Knowledge(format!("Failed to create records table: {}", e)))?;

    tracing::debug!("Initialized records database at {:?}", db_path);
    Ok(())
}

/// Embed `content` and store it under `source`.
pub async fn ingest(
    store: &RecordStore,
    embedder: &dyn EmbeddingProvider,
    source: &str,
    scope: &ScopeIds,
    content: &str,
) -> AppResult<String> {
    if content.trim().is_empty() {
        return Err(AppError::Knowledge("Cannot ingest empty content".to_string()));
    }

    let embedding = embedder.embed(content).await?;
    let store = store.clone();
    let source = source.to_string();
    let scope = scope.clone();
    let content = content.to_string();

    tokio::task::spawn_blocking(move || store.insert(&source, &scope, &content, &embedding))
        .await
        .map_err(|e| AppError::Knowledge(format!("Ingest task failed: {}", e)))?
}

/// Retrieval source reading one source's records from the store.
#[derive(Debug, Clone)]
pub struct SqliteSource {
    store: RecordStore,
    config: SourceConfig,
}

impl SqliteSource {
    pub fn new(store: RecordStore, config: SourceConfig) -> Self {
        Self { store, config }
    }
}

#[async_trait::async_trait]
impl RetrievalSource for SqliteSource {
    async fn retrieve(
        &self,
        embedding: &[f32],
        scope: &ScopeIds,
        limit: usize,
    ) -> AppResult<Vec<Snippet>> {
        let store = self.store.clone();
        let config = self.config.clone();
        let scope = scope.clone();
        let embedding = embedding.to_vec();

        let results = tokio::task::spawn_blocking(move || {
            store.search(&config, &scope, &embedding, limit)
        })
        .await
        .map_err(|e| AppError::Knowledge(format!("Retrieval task failed: {}", e)))??;

        Ok(results
            .into_iter()
            .map(|(record, score)| Snippet::scored(record.content, score))
            .collect())
    }
}

fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Knowledge(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Cosine similarity; mismatched lengths or zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::TrigramEmbedder;
    use tempfile::TempDir;

    fn store() -> (TempDir, RecordStore) {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::open(dir.path().join("scout.db")).unwrap();
        (dir, store)
    }

    fn source(id: &str, threshold: f32, scope: SourceScope) -> SourceConfig {
        SourceConfig::new(id, "test", threshold, scope)
    }

    #[test]
    fn test_search_orders_by_score_and_limits() {
        let (_dir, store) = store();
        let scope = ScopeIds::project("p1");
        store.insert("docs", &scope, "exact", &[1.0, 0.0, 0.0]).unwrap();
        store.insert("docs", &scope, "close", &[0.8, 0.6, 0.0]).unwrap();
        store.insert("docs", &scope, "far", &[0.0, 0.0, 1.0]).unwrap();

        let cfg = source("docs", 0.0, SourceScope::Project);
        let results = store.search(&cfg, &scope, &[1.0, 0.0, 0.0], 2).unwrap();
        let texts: Vec<_> = results.iter().map(|(r, _)| r.content.as_str()).collect();
        assert_eq!(texts, vec!["exact", "close"]);
        assert!(results[0].1 > results[1].1);
    }

    #[test]
    fn test_threshold_filters() {
        let (_dir, store) = store();
        let scope = ScopeIds::project("p1");
        store.insert("tasks", &scope, "strong", &[1.0, 0.0]).unwrap();
        store.insert("tasks", &scope, "weak", &[0.5, 0.866]).unwrap();

        let cfg = source("tasks", 0.7, SourceScope::Project);
        let results = store.search(&cfg, &scope, &[1.0, 0.0], 5).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.content, "strong");
    }

    #[test]
    fn test_project_scope_isolates_records() {
        let (_dir, store) = store();
        store.insert("docs", &ScopeIds::project("p1"), "mine", &[1.0]).unwrap();
        store.insert("docs", &ScopeIds::project("p2"), "theirs", &[1.0]).unwrap();
        store.insert("tasks", &ScopeIds::project("p1"), "other source", &[1.0]).unwrap();

        let cfg = source("docs", 0.0, SourceScope::Project);
        let results = store.search(&cfg, &ScopeIds::project("p1"), &[1.0], 5).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.content, "mine");
    }

    #[test]
    fn test_conversation_scope() {
        let (_dir, store) = store();
        let c1 = ScopeIds::project("p1").with_conversation("c1");
        let c2 = ScopeIds::project("p1").with_conversation("c2");
        store.insert("messages", &c1, "in c1", &[1.0]).unwrap();
        store.insert("messages", &c2, "in c2", &[1.0]).unwrap();

        let cfg = source("messages", 0.0, SourceScope::Conversation);
        let results = store.search(&cfg, &c1, &[1.0], 5).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.content, "in c1");

        // Without a conversation id there is nothing to match
        let none = store.search(&cfg, &ScopeIds::project("p1"), &[1.0], 5).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_count() {
        let (_dir, store) = store();
        let scope = ScopeIds::project("p1");
        store.insert("docs", &scope, "first", &[1.0]).unwrap();
        store.insert("docs", &scope, "second", &[1.0]).unwrap();

        assert_eq!(store.count("docs").unwrap(), 2);
        assert_eq!(store.count("tasks").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ingest_then_retrieve() {
        let (_dir, store) = store();
        let embedder = TrigramEmbedder::new(384);
        let scope = ScopeIds::project("p1");

        ingest(&store, &embedder, "tasks", &scope, "Roof repair booked with contractor")
            .await
            .unwrap();
        ingest(&store, &embedder, "tasks", &scope, "Order new office chairs")
            .await
            .unwrap();

        let retriever = SqliteSource::new(store, source("tasks", 0.2, SourceScope::Project));
        let query = embedder.embed_text("roof repair status");
        let snippets = retriever.retrieve(&query, &scope, 5).await.unwrap();

        assert_eq!(snippets[0].text, "Roof repair booked with contractor");
        assert!(snippets[0].score.unwrap() > 0.2);
    }

    #[tokio::test]
    async fn test_ingest_rejects_empty() {
        let (_dir, store) = store();
        let embedder = TrigramEmbedder::new(8);
        assert!(ingest(&store, &embedder, "docs", &ScopeIds::project("p1"), "  ")
            .await
            .is_err());
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-3);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-3);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_embedding_bytes_roundtrip() {
        let v = vec![0.25f32, -1.5, 3.0];
        assert_eq!(bytes_to_embedding(&embedding_to_bytes(&v)).unwrap(), v);
        assert!(bytes_to_embedding(&[0, 1, 2]).is_err());
    }
}
