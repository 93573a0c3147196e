//! Chatlog - persistent per-session history for chat completion APIs
//!
//! A `HistoryAdapter` wraps a stateless completion client: before each call it
//! prepends the session's stored turns, afterwards it appends the reply to a
//! `HistoryStore` and returns the full transcript with the completion.

mod config;
pub mod core;
pub mod session;
pub mod storage;
pub mod utils;

pub mod cli;

pub use crate::config::{LLMConfig, LoggingConfig, Settings, StoreBackend, StoreConfig};
pub use crate::core::llm::{
    ChatCompletion, ChatMessage, CompletionClient, CompletionRequest, OpenAIClient,
    RequestOptions, Role,
};
pub use session::{AdapterCompletion, AdapterError, HistoryAdapter, SessionLocks};
pub use storage::{
    open_store, FileStore, HistoryStore, InMemoryStore, MemoryRegistry, MemoryStoreOptions,
    Message, RedisStore, RedisStoreOptions, RelationalStore, StoreError, StoreResult,
};
