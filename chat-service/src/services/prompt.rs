//! Persisted system prompt.
//!
//! The prompt is a single process-wide string backed by a file. Edits
//! rewrite the file first and only then swap the in-memory copy, so a
//! prompt that has been served was durable at the time it was served.

use service_core::error::AppError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;

pub struct PromptStore {
    path: PathBuf,
    current: RwLock<String>,
}

impl PromptStore {
    /// Load the prompt from `path`. A missing file is treated as an empty
    /// prompt, not an error.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let current = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            current: RwLock::new(current),
        })
    }

    /// The current prompt, verbatim.
    pub async fn get(&self) -> String {
        self.current.read().await.clone()
    }

    /// Replace the prompt in full. A failed file write propagates and
    /// leaves the in-memory copy untouched.
    pub async fn edit(&self, text: String) -> Result<(), AppError> {
        fs::write(&self.path, &text).await?;
        *self.current.write().await = text;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn test_path() -> String {
        format!("target/test-prompt-{}.txt", Uuid::new_v4())
    }

    #[tokio::test]
    async fn missing_file_loads_as_empty_prompt() {
        let store = PromptStore::load(test_path()).await.unwrap();
        assert_eq!(store.get().await, "");
    }

    #[tokio::test]
    async fn edit_persists_across_a_fresh_load() {
        let path = test_path();

        let store = PromptStore::load(&path).await.unwrap();
        store.edit("You are terse.".to_string()).await.unwrap();
        assert_eq!(store.get().await, "You are terse.");

        let reloaded = PromptStore::load(&path).await.unwrap();
        assert_eq!(reloaded.get().await, "You are terse.");

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn edit_replaces_the_whole_prompt() {
        let path = test_path();

        let store = PromptStore::load(&path).await.unwrap();
        store.edit("first".to_string()).await.unwrap();
        store.edit("second".to_string()).await.unwrap();

        assert_eq!(store.get().await, "second");
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "second");

        let _ = tokio::fs::remove_file(&path).await;
    }
}
