//! In-Memory History Storage
//!
//! Information Hiding:
//! - Per-namespace HashMaps hidden behind the registry
//! - Thread-safe access via RwLock hidden behind async interface
//! - Eviction bookkeeping never leaks into read results
//!
//! Data is lost when the process terminates.

use super::{sort_by_created, HistoryStore, Message, StoreResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug, Default)]
struct NamespaceState {
    messages_by_session: HashMap<String, Vec<Message>>,
    last_updated_by_session: HashMap<String, u64>,
    write_counter: u64,
}

impl NamespaceState {
    fn next_write(&mut self) -> u64 {
        self.write_counter += 1;
        self.write_counter
    }

    fn evict_least_recent(&mut self, max_sessions: usize) -> Vec<String> {
        let count = self.messages_by_session.len();
        if count <= max_sessions {
            return Vec::new();
        }

        let mut by_age: Vec<(String, u64)> = self
            .last_updated_by_session
            .iter()
            .map(|(id, tick)| (id.clone(), *tick))
            .collect();
        by_age.sort_by_key(|(_, tick)| *tick);

        let evicted: Vec<String> = by_age
            .into_iter()
            .take(count - max_sessions)
            .map(|(id, _)| id)
            .collect();

        for session_id in &evicted {
            self.messages_by_session.remove(session_id);
            self.last_updated_by_session.remove(session_id);
        }
        evicted
    }
}

/// Process-scoped registry of in-memory namespaces.
///
/// Create one per process (usually behind an `Arc`) and hand it to every
/// `InMemoryStore`; stores opened with the same namespace see the same data.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    namespaces: Mutex<HashMap<String, Arc<RwLock<NamespaceState>>>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn namespace(&self, name: &str) -> Arc<RwLock<NamespaceState>> {
        // The map is only ever inserted into, so a poisoned lock still holds valid data
        let mut namespaces = self
            .namespaces
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        namespaces
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    /// Names of all namespaces created so far
    pub fn namespaces(&self) -> Vec<String> {
        let namespaces = self
            .namespaces
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        namespaces.keys().cloned().collect()
    }
}

#[derive(Debug, Clone)]
pub struct MemoryStoreOptions {
    /// Isolates stores sharing one registry
    pub namespace: String,
    /// Keep at most this many sessions; `None` or `0` means unbounded
    pub max_sessions: Option<usize>,
    /// Keep at most this many messages per session; `None` or `0` means unbounded
    pub max_messages_per_session: Option<usize>,
}

impl Default for MemoryStoreOptions {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            max_sessions: None,
            max_messages_per_session: None,
        }
    }
}

/// In-memory store with optional bounded eviction
pub struct InMemoryStore {
    namespace: String,
    state: Arc<RwLock<NamespaceState>>,
    max_sessions: Option<usize>,
    max_messages_per_session: Option<usize>,
}

impl InMemoryStore {
    pub fn new(registry: &MemoryRegistry, options: MemoryStoreOptions) -> Self {
        let state = registry.namespace(&options.namespace);
        Self {
            namespace: options.namespace,
            state,
            max_sessions: options.max_sessions.filter(|&n| n > 0),
            max_messages_per_session: options.max_messages_per_session.filter(|&n| n > 0),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Sessions currently held in this namespace
    pub async fn session_ids(&self) -> Vec<String> {
        let state = self.state.read().await;
        state.messages_by_session.keys().cloned().collect()
    }

    /// Write marker of the last append to `session_id`; larger means more recent
    pub async fn last_updated(&self, session_id: &str) -> Option<u64> {
        let state = self.state.read().await;
        state.last_updated_by_session.get(session_id).copied()
    }
}

#[async_trait]
impl HistoryStore for InMemoryStore {
    async fn get_session_history(&self, session_id: &str) -> StoreResult<Vec<Message>> {
        let state = self.state.read().await;
        let mut history = state
            .messages_by_session
            .get(session_id)
            .cloned()
            .unwrap_or_default();
        drop(state);

        sort_by_created(&mut history);
        tracing::debug!(
            "[InMemoryStore] Loaded {} messages for session '{}' in namespace '{}'",
            history.len(),
            session_id,
            self.namespace
        );
        Ok(history)
    }

    async fn save_events(&self, events: &[Message]) -> StoreResult<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut state = self.state.write().await;
        let mut saved = 0;

        for event in events {
            if event.session_id.is_empty() {
                tracing::debug!("[InMemoryStore] Dropping event without session id");
                continue;
            }

            let tick = state.next_write();
            let list = state
                .messages_by_session
                .entry(event.session_id.clone())
                .or_default();
            list.push(event.clone());

            if let Some(max) = self.max_messages_per_session {
                if list.len() > max {
                    let excess = list.len() - max;
                    list.drain(..excess);
                }
            }

            state
                .last_updated_by_session
                .insert(event.session_id.clone(), tick);
            saved += 1;
        }

        if let Some(max) = self.max_sessions {
            let evicted = state.evict_least_recent(max);
            if !evicted.is_empty() {
                tracing::debug!(
                    "[InMemoryStore] Evicted {} sessions from namespace '{}': {:?}",
                    evicted.len(),
                    self.namespace,
                    evicted
                );
            }
        }

        tracing::debug!(
            "[InMemoryStore] Saved {} of {} events in namespace '{}'",
            saved,
            events.len(),
            self.namespace
        );
        Ok(())
    }
}
