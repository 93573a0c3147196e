//! Redis History Storage
//!
//! Information Hiding:
//! - Key schema `chat:session:<namespace>:<session_id>` hidden from users
//! - Each session is a Redis list of JSON-encoded messages
//! - Connection management delegated to `redis::aio::ConnectionManager`
//!
//! List primitives go through `ListClient`, so any client with RPUSH / LRANGE /
//! EXPIRE semantics can back the store.

use super::{sort_by_created, HistoryStore, Message, StoreError, StoreResult};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::sync::Arc;

pub const KEY_PREFIX: &str = "chat:session";

/// Ordered-list primitives the Redis store needs
#[async_trait]
pub trait ListClient: Send + Sync {
    /// Append `values` to the tail of the list at `key`
    async fn rpush(&self, key: &str, values: &[String]) -> StoreResult<()>;

    /// Every element of the list at `key`, head first; empty if the key is missing
    async fn lrange_all(&self, key: &str) -> StoreResult<Vec<String>>;

    async fn expire(&self, key: &str, seconds: u64) -> StoreResult<()>;
}

#[async_trait]
impl ListClient for ConnectionManager {
    async fn rpush(&self, key: &str, values: &[String]) -> StoreResult<()> {
        let mut conn = self.clone();
        redis::cmd("RPUSH")
            .arg(key)
            .arg(values)
            .query_async::<i64>(&mut conn)
            .await
            .map_err(|e| StoreError::Backend(format!("RPUSH {} failed: {}", key, e)))?;
        Ok(())
    }

    async fn lrange_all(&self, key: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.clone();
        redis::cmd("LRANGE")
            .arg(key)
            .arg(0)
            .arg(-1)
            .query_async::<Vec<String>>(&mut conn)
            .await
            .map_err(|e| StoreError::Backend(format!("LRANGE {} failed: {}", key, e)))
    }

    async fn expire(&self, key: &str, seconds: u64) -> StoreResult<()> {
        let mut conn = self.clone();
        redis::cmd("EXPIRE")
            .arg(key)
            .arg(seconds)
            .query_async::<i64>(&mut conn)
            .await
            .map_err(|e| StoreError::Backend(format!("EXPIRE {} failed: {}", key, e)))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RedisStoreOptions {
    /// Required by `RedisStore::connect`, ignored by `RedisStore::with_client`
    pub url: Option<String>,
    /// Key namespace; empty means `default`
    pub namespace: String,
    /// Expire each written session key after this many seconds
    pub ttl_seconds: Option<u64>,
}

pub struct RedisStore {
    client: Arc<dyn ListClient>,
    prefix: String,
    ttl_seconds: Option<u64>,
}

impl RedisStore {
    /// Open a connection from `options.url`.
    ///
    /// Fails immediately when the URL is missing or invalid, or the server is
    /// unreachable.
    pub async fn connect(options: RedisStoreOptions) -> StoreResult<Self> {
        let url = options.url.as_deref().ok_or_else(|| {
            StoreError::Config("RedisStore requires a redis url or an injected client".to_string())
        })?;

        let client = redis::Client::open(url)
            .map_err(|e| StoreError::Config(format!("Invalid redis url '{}': {}", url, e)))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        tracing::info!("[RedisStore] Connected to {}", url);
        Ok(Self::with_client(Arc::new(manager), options))
    }

    /// Use an already-established list client
    pub fn with_client(client: Arc<dyn ListClient>, options: RedisStoreOptions) -> Self {
        let namespace = if options.namespace.is_empty() {
            "default"
        } else {
            options.namespace.as_str()
        };

        Self {
            client,
            prefix: format!("{}:{}", KEY_PREFIX, namespace),
            ttl_seconds: options.ttl_seconds.filter(|&ttl| ttl > 0),
        }
    }

    pub fn key(&self, session_id: &str) -> String {
        format!("{}:{}", self.prefix, session_id)
    }
}

#[async_trait]
impl HistoryStore for RedisStore {
    async fn get_session_history(&self, session_id: &str) -> StoreResult<Vec<Message>> {
        let key = self.key(session_id);
        let raw = self.client.lrange_all(&key).await?;

        let mut history = raw
            .iter()
            .map(|item| serde_json::from_str::<Message>(item))
            .collect::<Result<Vec<_>, _>>()?;
        sort_by_created(&mut history);

        tracing::debug!("[RedisStore] Loaded {} messages from '{}'", history.len(), key);
        Ok(history)
    }

    async fn save_events(&self, events: &[Message]) -> StoreResult<()> {
        if events.is_empty() {
            return Ok(());
        }

        // Group per session, keeping first-seen order of sessions and events
        let mut order: Vec<&str> = Vec::new();
        let mut by_session: HashMap<&str, Vec<String>> = HashMap::new();
        for event in events.iter().filter(|e| !e.session_id.is_empty()) {
            let payloads = by_session.entry(event.session_id.as_str()).or_insert_with(|| {
                order.push(event.session_id.as_str());
                Vec::new()
            });
            payloads.push(serde_json::to_string(event)?);
        }

        for session_id in order {
            let key = self.key(session_id);
            let payloads = &by_session[session_id];

            self.client.rpush(&key, payloads).await?;
            if let Some(ttl) = self.ttl_seconds {
                self.client.expire(&key, ttl).await?;
            }

            tracing::debug!("[RedisStore] Pushed {} messages to '{}'", payloads.len(), key);
        }

        Ok(())
    }
}
