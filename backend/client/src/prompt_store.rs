//! Persisted "have we asked for permission yet" flag.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptState {
    #[default]
    Unasked,
    Asked,
}

#[async_trait]
pub trait PromptStore: Send + Sync {
    async fn load(&self) -> Result<PromptState, ClientError>;

    /// Record the ask. Returns `false` if it was already recorded, so of
    /// several concurrent callers exactly one sees `true`.
    async fn try_mark_asked(&self) -> Result<bool, ClientError>;
}

#[derive(Default)]
pub struct MemoryPromptStore {
    state: RwLock<PromptState>,
}

impl MemoryPromptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: PromptState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }
}

#[async_trait]
impl PromptStore for MemoryPromptStore {
    async fn load(&self) -> Result<PromptState, ClientError> {
        Ok(*self.state.read().await)
    }

    async fn try_mark_asked(&self) -> Result<bool, ClientError> {
        let mut state = self.state.write().await;
        let first = *state == PromptState::Unasked;
        *state = PromptState::Asked;
        Ok(first)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PromptFile {
    state: PromptState,
}

/// Flag kept as a small JSON file, surviving restarts like browser storage.
pub struct FilePromptStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FilePromptStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl PromptStore for FilePromptStore {
    async fn load(&self) -> Result<PromptState, ClientError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(PromptState::Unasked),
            Err(e) => return Err(ClientError::Store(e.to_string())),
        };
        let file: PromptFile =
            serde_json::from_str(&raw).map_err(|e| ClientError::Store(e.to_string()))?;
        Ok(file.state)
    }

    async fn try_mark_asked(&self) -> Result<bool, ClientError> {
        let _held = self.write_lock.lock().await;
        if self.load().await? == PromptState::Asked {
            return Ok(false);
        }

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ClientError::Store(e.to_string()))?;
        }
        let json = serde_json::to_string(&PromptFile {
            state: PromptState::Asked,
        })
        .map_err(|e| ClientError::Store(e.to_string()))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| ClientError::Store(e.to_string()))?;
        debug!(path = %self.path.display(), "Recorded permission prompt");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_store_persists_across_instances() {
        let dir = std::env::temp_dir().join(format!("pushcast-prompt-{}", std::process::id()));
        let path = dir.join("prompt.json");
        let _ = std::fs::remove_file(&path);

        let store = FilePromptStore::new(&path);
        assert_eq!(store.load().await.unwrap(), PromptState::Unasked);
        assert!(store.try_mark_asked().await.unwrap());
        assert!(!store.try_mark_asked().await.unwrap());

        let reopened = FilePromptStore::new(&path);
        assert_eq!(reopened.load().await.unwrap(), PromptState::Asked);
        assert!(!reopened.try_mark_asked().await.unwrap());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn memory_store() {
        let store = MemoryPromptStore::new();
        assert_eq!(store.load().await.unwrap(), PromptState::Unasked);
        assert!(store.try_mark_asked().await.unwrap());
        assert_eq!(store.load().await.unwrap(), PromptState::Asked);
    }

    #[tokio::test]
    async fn concurrent_marks_have_one_winner() {
        let store = std::sync::Arc::new(MemoryPromptStore::new());
        let attempts: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.try_mark_asked().await.unwrap() })
            })
            .collect();

        let mut winners = 0;
        for attempt in attempts {
            if attempt.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
