//! Session History Storage Abstraction
//!
//! Information Hiding:
//! - Storage medium hidden behind the `HistoryStore` trait
//! - Allows swapping between memory, single JSON file, Redis and relational backends
//! - Each backend owns its medium and its own concurrency story

use crate::config::{StoreBackend, StoreConfig};
use crate::core::llm::{ChatMessage, Role};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

pub mod filesystem;
pub mod memory;
pub mod redis_store;
pub mod relational;

pub use filesystem::FileStore;
pub use memory::{InMemoryStore, MemoryRegistry, MemoryStoreOptions};
pub use redis_store::{ListClient, RedisStore, RedisStoreOptions};
pub use relational::RelationalStore;

/// One recorded turn of a session. Never mutated after it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default)]
    pub session_id: String,
    pub model: String,
    pub user_id: String,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Message {
    /// The `{role, content}` view sent back to the completion API
    pub fn to_chat_message(&self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// Sort ascending by `created_at`. Equal timestamps keep no particular order.
pub(crate) fn sort_by_created(messages: &mut [Message]) {
    messages.sort_unstable_by_key(|m| m.created_at);
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Trait every history backend implements
///
/// Contract:
/// - `get_session_history` returns an empty list for unknown sessions, sorted
///   ascending by `created_at`, and never mutates stored state
/// - `save_events` appends each event exactly once in the given order, skips
///   events with an empty `session_id`, and is a no-op for an empty slice
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Load the history of one session
    async fn get_session_history(&self, session_id: &str) -> StoreResult<Vec<Message>>;

    /// Append events, possibly spanning several sessions
    async fn save_events(&self, events: &[Message]) -> StoreResult<()>;
}

/// Build the backend selected by configuration.
///
/// In-memory stores attach to `registry`, so every store opened against the same
/// registry and namespace shares its data.
pub async fn open_store(
    config: &StoreConfig,
    registry: &Arc<MemoryRegistry>,
) -> StoreResult<Arc<dyn HistoryStore>> {
    let store: Arc<dyn HistoryStore> = match config.backend {
        StoreBackend::Memory => Arc::new(InMemoryStore::new(
            registry,
            MemoryStoreOptions {
                namespace: config.namespace.clone(),
                max_sessions: config.max_sessions,
                max_messages_per_session: config.max_messages_per_session,
            },
        )),
        StoreBackend::File => Arc::new(FileStore::new(config.file_path.clone())),
        StoreBackend::Redis => Arc::new(
            RedisStore::connect(RedisStoreOptions {
                url: config.redis_url.clone(),
                namespace: config.namespace.clone(),
                ttl_seconds: config.ttl_seconds,
            })
            .await?,
        ),
        StoreBackend::Relational => {
            let url = config
                .relational_url
                .clone()
                .filter(|url| !url.is_empty())
                .ok_or_else(|| {
                    StoreError::Config("Relational store requires relational_url".to_string())
                })?;
            Arc::new(RelationalStore::new(url))
        }
    };

    tracing::debug!("Opened {:?} history store", config.backend);
    Ok(store)
}
