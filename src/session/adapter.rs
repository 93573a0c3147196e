//! History Adapter - Chat Completions with Persistent Session History
//!
//! Information Hiding:
//! - Storage backend hidden from adapter users
//! - History merge and event derivation internalized
//! - Completion transport hidden behind `CompletionClient`
//!
//! Two `create` calls for the same session running at the same time both read the
//! same prior history and both append; their events interleave in storage. Attach
//! `SessionLocks` to serialize them.

use super::locks::SessionLocks;
use crate::core::llm::{ChatCompletion, CompletionClient, CompletionRequest, RequestOptions, Role};
use crate::storage::{HistoryStore, Message, StoreError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    /// History could not be read; the completion API was not called
    #[error("Failed to load history for session '{session_id}': {source}")]
    HistoryRead {
        session_id: String,
        #[source]
        source: StoreError,
    },

    /// The completion call failed; nothing was persisted
    #[error(transparent)]
    Upstream(anyhow::Error),

    /// The completion succeeded but its events were not persisted
    #[error("Failed to persist history for session '{session_id}': {source}")]
    Persist {
        session_id: String,
        #[source]
        source: StoreError,
        completion: Box<ChatCompletion>,
    },
}

/// Completion enriched with the session transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterCompletion {
    #[serde(flatten)]
    pub completion: ChatCompletion,
    /// Prior history followed by the events derived from this call
    pub history: Vec<Message>,
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

impl AdapterCompletion {
    /// Content of the reply persisted for this turn
    pub fn reply(&self) -> &str {
        self.completion.first_content().unwrap_or_default()
    }
}

/// Wraps a completion client so every call carries and extends one session's history
pub struct HistoryAdapter {
    client: Arc<dyn CompletionClient>,
    store: Arc<dyn HistoryStore>,
    session_id: String,
    user_id: String,
    locks: Option<Arc<SessionLocks>>,
}

impl HistoryAdapter {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        store: Arc<dyn HistoryStore>,
        session_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            store,
            session_id: session_id.into(),
            user_id: user_id.into(),
            locks: None,
        }
    }

    /// Serialize `create` calls per session across every adapter sharing `locks`
    pub fn with_session_locks(mut self, locks: Arc<SessionLocks>) -> Self {
        self.locks = Some(locks);
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Stored history of the bound session
    pub async fn history(&self) -> Result<Vec<Message>, StoreError> {
        self.store.get_session_history(&self.session_id).await
    }

    /// Run one completion with the session's history prepended, then persist the reply
    pub async fn create(
        &self,
        request: CompletionRequest,
        options: Option<RequestOptions>,
    ) -> Result<AdapterCompletion, AdapterError> {
        let _guard = match &self.locks {
            Some(locks) => Some(locks.acquire(&self.session_id).await),
            None => None,
        };

        let history = self
            .store
            .get_session_history(&self.session_id)
            .await
            .map_err(|source| AdapterError::HistoryRead {
                session_id: self.session_id.clone(),
                source,
            })?;

        tracing::debug!(
            "[HistoryAdapter] Session '{}': merging {} stored with {} new messages",
            self.session_id,
            history.len(),
            request.messages.len()
        );

        let merged = self.merge(&history, request);
        let options = options.unwrap_or_default();

        let completion = self
            .client
            .create(&merged, &options)
            .await
            .map_err(AdapterError::Upstream)?;

        let events = self.derive_events(&completion);

        if let Err(source) = self.store.save_events(&events).await {
            tracing::error!(
                "[HistoryAdapter] Session '{}': failed to persist {} events: {}",
                self.session_id,
                events.len(),
                source
            );
            return Err(AdapterError::Persist {
                session_id: self.session_id.clone(),
                source,
                completion: Box::new(completion),
            });
        }

        tracing::debug!(
            "[HistoryAdapter] Session '{}': persisted {} events",
            self.session_id,
            events.len()
        );

        let mut full_history = history;
        full_history.extend(events);

        Ok(AdapterCompletion {
            completion,
            history: full_history,
            session_id: self.session_id.clone(),
        })
    }

    fn merge(&self, history: &[Message], request: CompletionRequest) -> CompletionRequest {
        let mut messages: Vec<_> = history.iter().map(Message::to_chat_message).collect();
        messages.extend(request.messages);

        CompletionRequest {
            messages,
            ..request
        }
    }

    fn derive_events(&self, completion: &ChatCompletion) -> Vec<Message> {
        if completion.choices.len() > 1 {
            tracing::debug!(
                "[HistoryAdapter] Session '{}': keeping first of {} choices",
                self.session_id,
                completion.choices.len()
            );
        }

        vec![Message {
            session_id: self.session_id.clone(),
            model: completion.model.clone(),
            user_id: self.user_id.clone(),
            role: Role::Assistant,
            content: completion.first_content().unwrap_or_default().to_string(),
            created_at: completion.created,
            updated_at: completion.created,
        }]
    }
}
