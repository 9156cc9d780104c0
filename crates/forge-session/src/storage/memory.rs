//! In-memory conversation rows for tests and local development.

use super::{ConversationStore, LogTable, StorageError};
use async_trait::async_trait;
use forge_contract::ConversationMessage;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryConversationStore {
    full: RwLock<HashMap<String, Vec<ConversationMessage>>>,
    compact: RwLock<HashMap<String, Vec<ConversationMessage>>>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, table: LogTable) -> &RwLock<HashMap<String, Vec<ConversationMessage>>> {
        match table {
            LogTable::Full => &self.full,
            LogTable::Compact => &self.compact,
        }
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn load(
        &self,
        id: &str,
        table: LogTable,
    ) -> Result<Option<Vec<ConversationMessage>>, StorageError> {
        Ok(self.table(table).read().await.get(id).cloned())
    }

    async fn save(
        &self,
        id: &str,
        table: LogTable,
        messages: &[ConversationMessage],
    ) -> Result<(), StorageError> {
        self.table(table)
            .write()
            .await
            .insert(id.to_string(), messages.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_row_loads_none() {
        let store = MemoryConversationStore::new();
        assert!(store.load("nope", LogTable::Full).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn tables_are_independent() {
        let store = MemoryConversationStore::new();
        store
            .save("s", LogTable::Full, &[ConversationMessage::user("hi")])
            .await
            .unwrap();
        assert!(store.load("s", LogTable::Full).await.unwrap().is_some());
        assert!(store.load("s", LogTable::Compact).await.unwrap().is_none());
    }
}
