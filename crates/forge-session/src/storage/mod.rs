//! Conversation persistence (C2).
//!
//! Two tables keyed by session id, each holding one serialized message
//! list: `full_conversations` (append-only audit) and
//! `compact_conversations` (working memory). Persistence is best-effort:
//! failures are logged and the in-memory compact log remains the source of
//! truth for reconstruction.

mod memory;
mod sqlite;

pub use memory::MemoryConversationStore;
pub use sqlite::SqliteConversationStore;

use crate::state::StateStore;
use async_trait::async_trait;
use forge_contract::{upsert_message, ConversationLogs, ConversationMessage};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("storage backend: {0}")]
    Backend(String),

    #[error("row encoding: {0}")]
    Encode(String),
}

/// Which of the two tables a call addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTable {
    Full,
    Compact,
}

impl LogTable {
    pub fn table_name(self) -> &'static str {
        match self {
            Self::Full => "full_conversations",
            Self::Compact => "compact_conversations",
        }
    }
}

/// Backing rows for conversation logs.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Load the message list for `id`, or `None` when the row is missing.
    async fn load(
        &self,
        id: &str,
        table: LogTable,
    ) -> Result<Option<Vec<ConversationMessage>>, StorageError>;

    /// Replace the message list for `id`.
    async fn save(
        &self,
        id: &str,
        table: LogTable,
        messages: &[ConversationMessage],
    ) -> Result<(), StorageError>;
}

/// Session-scoped facade over the two logs.
///
/// Dedup is by `conversation_id` only. The compact log is mirrored into the
/// session record (the in-memory authority); the full log lives only in the
/// store.
pub struct ConversationManager {
    session_id: String,
    state: Arc<StateStore>,
    store: Arc<dyn ConversationStore>,
}

impl ConversationManager {
    pub fn new(session_id: String, state: Arc<StateStore>, store: Arc<dyn ConversationStore>) -> Self {
        Self {
            session_id,
            state,
            store,
        }
    }

    /// Both logs, deduplicated. A missing compact row is seeded from the
    /// in-memory compact log; a missing full row falls back the same way.
    pub async fn state(&self) -> ConversationLogs {
        let in_memory = self.state.read(|s| s.base.conversation.clone());

        let running = match self.store.load(&self.session_id, LogTable::Compact).await {
            Ok(Some(messages)) => dedup(messages),
            Ok(None) => {
                self.persist(LogTable::Compact, &in_memory).await;
                in_memory.clone()
            }
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "compact conversation load failed");
                in_memory.clone()
            }
        };

        let full = match self.store.load(&self.session_id, LogTable::Full).await {
            Ok(Some(messages)) => dedup(messages),
            Ok(None) => {
                self.persist(LogTable::Full, &in_memory).await;
                in_memory
            }
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "full conversation load failed");
                in_memory
            }
        };

        ConversationLogs { running, full }
    }

    /// Replace both logs wholesale (compaction path).
    pub async fn set_state(&self, logs: ConversationLogs) {
        self.state
            .update(|s| s.base.conversation = logs.running.clone());
        self.persist(LogTable::Compact, &logs.running).await;
        self.persist(LogTable::Full, &logs.full).await;
    }

    /// Upsert one message into both logs.
    pub async fn add_message(&self, msg: ConversationMessage) {
        let running = self
            .state
            .update(|s| {
                upsert_message(&mut s.base.conversation, msg.clone());
            })
            .base
            .conversation;

        let mut full = match self.store.load(&self.session_id, LogTable::Full).await {
            Ok(Some(messages)) => messages,
            Ok(None) => running.clone(),
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "full conversation load failed");
                running.clone()
            }
        };
        upsert_message(&mut full, msg);

        self.persist(LogTable::Compact, &running).await;
        self.persist(LogTable::Full, &full).await;
    }

    /// Empty the compact log; the full log is untouched.
    pub async fn clear_running(&self) {
        self.state.update(|s| s.base.conversation.clear());
        self.persist(LogTable::Compact, &[]).await;
    }

    async fn persist(&self, table: LogTable, messages: &[ConversationMessage]) {
        if let Err(e) = self.store.save(&self.session_id, table, messages).await {
            warn!(
                session_id = %self.session_id,
                table = table.table_name(),
                error = %e,
                "conversation persist failed"
            );
        }
    }
}

fn dedup(messages: Vec<ConversationMessage>) -> Vec<ConversationMessage> {
    let mut out: Vec<ConversationMessage> = Vec::with_capacity(messages.len());
    for msg in messages {
        upsert_message(&mut out, msg);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_contract::{ProjectType, SessionState};

    fn manager(store: Arc<dyn ConversationStore>) -> ConversationManager {
        let state = Arc::new(StateStore::new(SessionState::initial(ProjectType::App)));
        ConversationManager::new("sess-1".into(), state, store)
    }

    fn msg(id: &str, content: &str) -> ConversationMessage {
        ConversationMessage::user(content).with_id(id)
    }

    #[tokio::test]
    async fn add_message_is_idempotent_per_id() {
        let mgr = manager(Arc::new(MemoryConversationStore::new()));
        mgr.add_message(msg("m1", "one")).await;
        mgr.add_message(msg("m1", "one")).await;

        let logs = mgr.state().await;
        assert_eq!(logs.running.len(), 1);
        assert_eq!(logs.full.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_id_updates_in_place() {
        let mgr = manager(Arc::new(MemoryConversationStore::new()));
        mgr.add_message(msg("m1", "before")).await;
        mgr.add_message(msg("m1", "after")).await;

        let logs = mgr.state().await;
        assert_eq!(logs.full[0].content, "after");
    }

    #[tokio::test]
    async fn clear_running_keeps_full_log() {
        let mgr = manager(Arc::new(MemoryConversationStore::new()));
        for (id, content) in [("m1", "a"), ("m2", "b"), ("m3", "c")] {
            mgr.add_message(msg(id, content)).await;
        }
        mgr.clear_running().await;

        let logs = mgr.state().await;
        assert!(logs.running.is_empty());
        let ids: Vec<&str> = logs.full.iter().map(|m| m.conversation_id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2", "m3"]);
    }

    #[tokio::test]
    async fn missing_rows_seed_from_in_memory_compact_log() {
        let store: Arc<dyn ConversationStore> = Arc::new(MemoryConversationStore::new());
        let state = Arc::new(StateStore::new(SessionState::initial(ProjectType::App)));
        state.update(|s| s.base.conversation.push(msg("m1", "seeded")));
        let mgr = ConversationManager::new("sess-1".into(), state, store.clone());

        let logs = mgr.state().await;
        assert_eq!(logs.running.len(), 1);
        assert_eq!(logs.full.len(), 1);
        // The seed was written through to the backing rows.
        assert!(store
            .load("sess-1", LogTable::Compact)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn set_state_replaces_both_logs() {
        let mgr = manager(Arc::new(MemoryConversationStore::new()));
        mgr.add_message(msg("m1", "old")).await;

        mgr.set_state(ConversationLogs {
            running: vec![msg("r1", "compacted")],
            full: vec![msg("m1", "old"), msg("r1", "compacted")],
        })
        .await;

        let logs = mgr.state().await;
        assert_eq!(logs.running.len(), 1);
        assert_eq!(logs.full.len(), 2);
    }

    struct FailingStore;

    #[async_trait]
    impl ConversationStore for FailingStore {
        async fn load(
            &self,
            _id: &str,
            _table: LogTable,
        ) -> Result<Option<Vec<ConversationMessage>>, StorageError> {
            Err(StorageError::Backend("disk on fire".into()))
        }

        async fn save(
            &self,
            _id: &str,
            _table: LogTable,
            _messages: &[ConversationMessage],
        ) -> Result<(), StorageError> {
            Err(StorageError::Backend("disk on fire".into()))
        }
    }

    #[tokio::test]
    async fn store_failures_fall_back_to_in_memory_log() {
        let mgr = manager(Arc::new(FailingStore));
        mgr.add_message(msg("m1", "survives")).await;

        let logs = mgr.state().await;
        assert_eq!(logs.running.len(), 1);
        assert_eq!(logs.full.len(), 1);
        assert_eq!(logs.full[0].content, "survives");
    }
}
