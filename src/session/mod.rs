//! Session-scoped completion pipeline

pub mod adapter;
pub mod locks;

pub use adapter::{AdapterCompletion, AdapterError, HistoryAdapter};
pub use locks::{SessionGuard, SessionLocks};
