//! Single-File JSON History Storage
//!
//! Information Hiding:
//! - File path and JSON document layout hidden from users
//! - Lazy creation of the file and its directory hidden behind the trait
//! - Whole-document read-modify-write kept internal
//!
//! On-disk layout is one pretty-printed document:
//! `{ "sessions": { "<session_id>": [ <Message>, ... ] } }`
//!
//! Content that fails to parse reads as an empty store, and the next write
//! replaces it. Writes and file creation inside one `FileStore` are serialized,
//! but nothing guards against other instances or processes writing the same file
//! concurrently; the last writer wins.

use super::{sort_by_created, HistoryStore, Message, StoreError, StoreResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

type Sessions = BTreeMap<String, Vec<Message>>;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    sessions: Sessions,
}

/// File-backed store; every session lives in one JSON document at `file_path`
pub struct FileStore {
    file_path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Nothing touches the disk until the first read or write
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.file_path.clone(),
            source,
        }
    }

    async fn file_exists(&self) -> StoreResult<bool> {
        fs::try_exists(&self.file_path)
            .await
            .map_err(|e| self.io_error(e))
    }

    /// Create the directory and an empty document if the file is missing.
    /// Callers hold `write_lock`; `create_new` keeps another instance's file intact.
    async fn ensure_file_ready(&self) -> StoreResult<()> {
        if self.file_exists().await? {
            return Ok(());
        }

        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.io_error(e))?;
            }
        }

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.file_path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(()),
            Err(e) => return Err(self.io_error(e)),
        };

        tracing::debug!("[FileStore] Creating empty history file at {:?}", self.file_path);
        let json = serde_json::to_string_pretty(&Document::default())?;
        file.write_all(json.as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        file.flush().await.map_err(|e| self.io_error(e))
    }

    async fn read_all(&self) -> StoreResult<Sessions> {
        let raw = fs::read_to_string(&self.file_path)
            .await
            .map_err(|e| self.io_error(e))?;

        match serde_json::from_str::<Document>(&raw) {
            Ok(document) => Ok(document.sessions),
            Err(e) => {
                tracing::warn!(
                    "[FileStore] Unparsable history file {:?}, treating as empty: {}",
                    self.file_path,
                    e
                );
                Ok(Sessions::new())
            }
        }
    }

    /// Replace the document through a sibling temp file so readers never see a
    /// half-written file
    async fn write_all(&self, sessions: Sessions) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(&Document { sessions })?;

        let mut tmp_name = self.file_path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        fs::write(&tmp_path, json)
            .await
            .map_err(|e| self.io_error(e))?;
        fs::rename(&tmp_path, &self.file_path)
            .await
            .map_err(|e| self.io_error(e))
    }
}

#[async_trait]
impl HistoryStore for FileStore {
    async fn get_session_history(&self, session_id: &str) -> StoreResult<Vec<Message>> {
        if !self.file_exists().await? {
            let _guard = self.write_lock.lock().await;
            self.ensure_file_ready().await?;
        }

        let mut sessions = self.read_all().await?;
        let mut history = sessions.remove(session_id).unwrap_or_default();
        sort_by_created(&mut history);

        tracing::debug!(
            "[FileStore] Loaded {} messages for session '{}' from {:?}",
            history.len(),
            session_id,
            self.file_path
        );
        Ok(history)
    }

    async fn save_events(&self, events: &[Message]) -> StoreResult<()> {
        if events.is_empty() {
            return Ok(());
        }

        let _guard = self.write_lock.lock().await;
        self.ensure_file_ready().await?;
        let mut sessions = self.read_all().await?;

        let mut saved = 0;
        for event in events.iter().filter(|e| !e.session_id.is_empty()) {
            sessions
                .entry(event.session_id.clone())
                .or_default()
                .push(event.clone());
            saved += 1;
        }

        self.write_all(sessions).await?;
        tracing::debug!("[FileStore] Saved {} events to {:?}", saved, self.file_path);
        Ok(())
    }
}
