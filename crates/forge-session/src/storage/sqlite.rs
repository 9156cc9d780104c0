//! SQLite conversation rows.
//!
//! Layout matches the persisted-state contract: one row per session per
//! table, the message list serialized as a JSON array in a TEXT column.

use super::{ConversationStore, LogTable, StorageError};
use async_trait::async_trait;
use forge_contract::ConversationMessage;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct SqliteConversationStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteConversationStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|e| StorageError::Backend(e.to_string()))?;
        Self::bootstrap(conn)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(|e| StorageError::Backend(e.to_string()))?;
        Self::bootstrap(conn)
    }

    fn bootstrap(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS full_conversations (
                id TEXT PRIMARY KEY,
                messages TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS compact_conversations (
                id TEXT PRIMARY KEY,
                messages TEXT NOT NULL
            );",
        )
        .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn load(
        &self,
        id: &str,
        table: LogTable,
    ) -> Result<Option<Vec<ConversationMessage>>, StorageError> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT messages FROM {} WHERE id = ?1",
            table.table_name()
        );
        let raw: Option<String> = conn
            .query_row(&sql, params![id], |row| row.get(0))
            .optional()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        match raw {
            Some(text) => serde_json::from_str(&text)
                .map(Some)
                .map_err(|e| StorageError::Encode(e.to_string())),
            None => Ok(None),
        }
    }

    async fn save(
        &self,
        id: &str,
        table: LogTable,
        messages: &[ConversationMessage],
    ) -> Result<(), StorageError> {
        let text =
            serde_json::to_string(messages).map_err(|e| StorageError::Encode(e.to_string()))?;
        let conn = self.conn.lock().await;
        let sql = format!(
            "INSERT INTO {table} (id, messages) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET messages = excluded.messages",
            table = table.table_name()
        );
        conn.execute(&sql, params![id, text])
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }
}
