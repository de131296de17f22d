use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

const QUOTA_DIR_NAME: &str = ".modelquota";
const STORE_DIR_NAME: &str = "store";
const VALUE_EXTENSION: &str = "json";

/// Errors that can occur during key-value store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Key is blank or cannot be mapped to storage.
    #[error("Invalid store key: {0:?}")]
    InvalidKey(String),

    /// The backing store refused the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for key-value store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable key-value storage used to persist usage counts.
///
/// The store needs no transactions or compare-and-swap; callers supply their
/// own serialization around read-modify-write sequences.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Replace the value stored under `key`.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;
}

/// Volatile store kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store backed by the local filesystem, one file per key.
#[derive(Debug, Clone)]
pub struct FileStore {
    root_dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at the given base directory.
    pub async fn open(base_dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let root_dir = base_dir.into().join(QUOTA_DIR_NAME).join(STORE_DIR_NAME);
        fs::create_dir_all(&root_dir).await?;
        Ok(Self { root_dir })
    }

    /// Get the store root directory path.
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn value_path(&self, key: &str) -> StoreResult<PathBuf> {
        let invalid = key.trim().is_empty()
            || key == "."
            || key == ".."
            || key.contains(|c: char| matches!(c, '/' | '\\' | '\0'));
        if invalid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root_dir.join(format!("{}.{}", key, VALUE_EXTENSION)))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let path = self.value_path(key)?;
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::Io(err)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let path = self.value_path(key)?;
        let temp_path = self
            .root_dir
            .join(format!("{}.{}.tmp", key, VALUE_EXTENSION));

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(value.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&temp_path, &path).await?;

        Ok(())
    }
}
