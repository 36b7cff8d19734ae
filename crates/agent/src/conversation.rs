//! Conversation persistence.
//!
//! Turns are appended only after an orchestration reaches DONE. The SQLite
//! store opens a connection per call on the blocking pool so the async
//! pipeline never holds a connection across an await. A batch of turns is
//! written in one transaction: either every turn lands or none does.

use chrono::Utc;
use rusqlite::{params, Connection};
use scout_core::{AppError, AppResult};
use scout_llm::{ChatMessage, Role, ToolCall};
use std::path::{Path, PathBuf};

#[async_trait::async_trait]
pub trait ConversationStore: Send + Sync {
    /// Append `turns` in order, atomically.
    async fn append(&self, conversation_id: &str, turns: &[ChatMessage]) -> AppResult<()>;

    /// All turns of a conversation, oldest first.
    async fn read(&self, conversation_id: &str) -> AppResult<Vec<ChatMessage>>;
}

#[derive(Debug, Clone)]
pub struct SqliteConversationStore {
    db_path: PathBuf,
}

impl SqliteConversationStore {
    pub fn open(db_path: impl Into<PathBuf>) -> AppResult<Self> {
        let store = Self {
            db_path: db_path.into(),
        };
        store.create_tables()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(path: &Path) -> AppResult<Connection> {
        Connection::open(path).map_err(|e| {
            AppError::Persistence(format!("Failed to open conversation database: {}", e))
        })
    }

    fn create_tables(&self) -> AppResult<()> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Self::connect(&self.db_path)?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                tool_call_id TEXT,
                tool_calls TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (conversation_id) REFERENCES conversations(id)
            );

            CREATE INDEX IF NOT EXISTS idx_messages_conversation
                ON messages(conversation_id, id);
            ",
        )
        .map_err(|e| AppError::Persistence(format!("Failed to create conversation tables: {}", e)))
    }

    fn append_blocking(
        path: &Path,
        conversation_id: &str,
        turns: &[ChatMessage],
    ) -> AppResult<()> {
        let now = Utc::now().to_rfc3339();

        let mut conn = Self::connect(path)?;
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Persistence(format!("Failed to start transaction: {}", e)))?;

        tx.execute(
            "INSERT INTO conversations (id, created_at, updated_at) VALUES (?1, ?2, ?2)
             ON CONFLICT(id) DO UPDATE SET updated_at = excluded.updated_at",
            params![conversation_id, now],
        )
        .map_err(|e| AppError::Persistence(format!("Failed to upsert conversation: {}", e)))?;

        for turn in turns {
            let tool_calls = if turn.tool_calls.is_empty() {
                None
            } else {
                Some(serde_json::to_string(&turn.tool_calls)?)
            };

            tx.execute(
                "INSERT INTO messages (conversation_id, role, content, tool_call_id, tool_calls, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    conversation_id,
                    turn.role.as_str(),
                    turn.content,
                    turn.tool_call_id,
                    tool_calls,
                    now,
                ],
            )
            .map_err(|e| AppError::Persistence(format!("Failed to insert message: {}", e)))?;
        }

        // Dropping an uncommitted transaction rolls it back
        tx.commit()
            .map_err(|e| AppError::Persistence(format!("Failed to commit messages: {}", e)))
    }

    fn read_blocking(path: &Path, conversation_id: &str) -> AppResult<Vec<ChatMessage>> {
        let conn = Self::connect(path)?;
        let mut stmt = conn
            .prepare(
                "SELECT role, content, tool_call_id, tool_calls FROM messages
                 WHERE conversation_id = ?1 ORDER BY id",
            )
            .map_err(|e| AppError::Persistence(format!("Failed to prepare read: {}", e)))?;

        let rows = stmt
            .query_map(params![conversation_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })
            .map_err(|e| AppError::Persistence(format!("Failed to read messages: {}", e)))?;

        let mut turns = Vec::new();
        for row in rows {
            let (role, content, tool_call_id, tool_calls) =
                row.map_err(|e| AppError::Persistence(format!("Failed to read message: {}", e)))?;

            let role = Role::parse(&role).ok_or_else(|| {
                AppError::Persistence(format!("Unknown role '{}' in stored message", role))
            })?;
            let tool_calls: Vec<ToolCall> = match tool_calls {
                Some(json) => serde_json::from_str(&json)?,
                None => Vec::new(),
            };

            turns.push(ChatMessage {
                role,
                content,
                tool_call_id,
                tool_calls,
            });
        }

        Ok(turns)
    }
}

#[async_trait::async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn append(&self, conversation_id: &str, turns: &[ChatMessage]) -> AppResult<()> {
        let path = self.db_path.clone();
        let conversation_id = conversation_id.to_string();
        let turns = turns.to_vec();

        tokio::task::spawn_blocking(move || Self::append_blocking(&path, &conversation_id, &turns))
            .await
            .map_err(|e| AppError::Persistence(format!("Append task failed: {}", e)))?
    }

    async fn read(&self, conversation_id: &str) -> AppResult<Vec<ChatMessage>> {
        let path = self.db_path.clone();
        let conversation_id = conversation_id.to_string();

        tokio::task::spawn_blocking(move || Self::read_blocking(&path, &conversation_id))
            .await
            .map_err(|e| AppError::Persistence(format!("Read task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, SqliteConversationStore) {
        let dir = TempDir::new().unwrap();
        let store = SqliteConversationStore::open(dir.path().join(".scout").join("scout.db")).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_append_and_read_in_order() {
        let (_dir, store) = store();
        store.append("c1", &[ChatMessage::user("Where is the roof repair?")]).await.unwrap();
        store.append("c1", &[ChatMessage::assistant("Booked for Friday.")]).await.unwrap();
        store.append("c2", &[ChatMessage::user("Other thread")]).await.unwrap();

        let turns = store.read("c1").await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1], ChatMessage::assistant("Booked for Friday."));
    }

    #[tokio::test]
    async fn test_tool_fields_survive_storage() {
        let (_dir, store) = store();
        let planning = ChatMessage::assistant("")
            .with_tool_calls(vec![ToolCall::new("call_0", "retrieve_tasks", "{}")]);
        store.append("c1", &[planning.clone()]).await.unwrap();
        store.append("c1", &[ChatMessage::tool("call_0", "none")]).await.unwrap();

        let turns = store.read("c1").await.unwrap();
        assert_eq!(turns[0], planning);
        assert_eq!(turns[1].tool_call_id.as_deref(), Some("call_0"));
    }

    #[tokio::test]
    async fn test_append_is_all_or_nothing() {
        let (_dir, store) = store();
        store.append("c1", &[ChatMessage::user("earlier")]).await.unwrap();

        // Reject assistant rows so the second insert of a batch fails
        let conn = Connection::open(store.path()).unwrap();
        conn.execute_batch(
            "CREATE TRIGGER reject_assistant BEFORE INSERT ON messages
             WHEN NEW.role = 'assistant'
             BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
        )
        .unwrap();

        let err = store
            .append(
                "c1",
                &[ChatMessage::user("question"), ChatMessage::assistant("answer")],
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("disk full"));

        let turns = store.read("c1").await.unwrap();
        assert_eq!(turns, vec![ChatMessage::user("earlier")]);
    }

    #[tokio::test]
    async fn test_read_unknown_conversation_is_empty() {
        let (_dir, store) = store();
        assert!(store.read("missing").await.unwrap().is_empty());
    }
}
