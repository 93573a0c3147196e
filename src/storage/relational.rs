//! Relational History Storage (placeholder)
//!
//! Not implemented. Reads return an empty history and writes are discarded with
//! a warning, so this only marks where a SQL-backed store plugs in.

use super::{HistoryStore, Message, StoreResult};
use async_trait::async_trait;

pub struct RelationalStore {
    connection_string: String,
}

impl RelationalStore {
    pub fn new(connection_string: impl Into<String>) -> Self {
        let connection_string = connection_string.into();
        tracing::warn!(
            "[RelationalStore] Placeholder backend in use; history will not be persisted"
        );
        Self { connection_string }
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }
}

#[async_trait]
impl HistoryStore for RelationalStore {
    async fn get_session_history(&self, session_id: &str) -> StoreResult<Vec<Message>> {
        tracing::debug!(
            "[RelationalStore] No history available for session '{}'",
            session_id
        );
        Ok(Vec::new())
    }

    async fn save_events(&self, events: &[Message]) -> StoreResult<()> {
        if !events.is_empty() {
            tracing::warn!("[RelationalStore] Discarding {} events", events.len());
        }
        Ok(())
    }
}
