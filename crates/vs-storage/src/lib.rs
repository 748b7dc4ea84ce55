//! Versioned JSON persistence
//!
//! Files live in `<dir>/.storage/<key>` and look like:
//!
//! ```json
//! {
//!   "version": 1,
//!   "minor_version": 1,
//!   "key": "scripting.interactive_scripts",
//!   "data": { ... }
//! }
//! ```

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored JSON is invalid: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{key} is stored as version {found}, expected {expected}")]
    VersionMismatch { key: String, expected: u32, found: u32 },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Envelope written around every stored payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageFile<T> {
    /// Bumped on incompatible layout changes
    pub version: u32,
    /// Bumped when fields are only added
    pub minor_version: u32,
    pub key: String,
    pub data: T,
}

impl<T> StorageFile<T> {
    pub fn new(key: impl Into<String>, data: T, version: u32, minor_version: u32) -> Self {
        let key = key.into();
        Self { version, minor_version, key, data }
    }
}

/// Payload types with a fixed key and version
pub trait Storable: Serialize + DeserializeOwned {
    const KEY: &'static str;
    const VERSION: u32;
    const MINOR_VERSION: u32;
}

/// Handle on a `.storage/` directory
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    /// Storage rooted at `<base_dir>/.storage`
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        let root = base_dir.as_ref().join(".storage");
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where `key` is kept
    pub fn path_of(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Read an envelope, `None` if nothing was stored under `key`
    pub async fn load<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<StorageFile<T>>> {
        let content = match fs::read_to_string(self.path_of(key)).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(key, "Nothing stored yet");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let file: StorageFile<T> = serde_json::from_str(&content)?;
        debug!(key, version = file.version, minor_version = file.minor_version, "Loaded");
        Ok(Some(file))
    }

    /// Write an envelope
    ///
    /// The content goes to `<key>.tmp` first and is renamed over the target,
    /// so a crash mid-write leaves the previous file intact.
    pub async fn save<T: Serialize>(&self, file: &StorageFile<T>) -> StorageResult<()> {
        let json = serde_json::to_string_pretty(file)?;
        fs::create_dir_all(&self.root).await?;

        let staging = self.path_of(&format!("{}.tmp", file.key));
        fs::write(&staging, json).await?;
        fs::rename(&staging, self.path_of(&file.key)).await?;

        debug!(key = %file.key, version = file.version, minor_version = file.minor_version, "Saved");
        Ok(())
    }

    /// Load a [`Storable`], checking its major version
    pub async fn load_data<T: Storable>(&self) -> StorageResult<Option<T>> {
        let Some(file) = self.load::<T>(T::KEY).await? else {
            return Ok(None);
        };

        match (file.version, file.minor_version) {
            (major, _) if major != T::VERSION => {
                return Err(StorageError::VersionMismatch {
                    key: T::KEY.to_owned(),
                    expected: T::VERSION,
                    found: major,
                })
            }
            (_, minor) if minor < T::MINOR_VERSION => {
                warn!(key = T::KEY, minor, current = T::MINOR_VERSION, "Stored data predates this minor version");
            }
            _ => {}
        }

        Ok(Some(file.data))
    }

    /// Save a [`Storable`] under its own key and version
    pub async fn save_data<T: Storable>(&self, data: &T) -> StorageResult<()> {
        let file = StorageFile::new(T::KEY, data, T::VERSION, T::MINOR_VERSION);
        self.save(&file).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Scripts {
        names: Vec<String>,
    }

    impl Storable for Scripts {
        const KEY: &'static str = "test.scripts";
        const VERSION: u32 = 1;
        const MINOR_VERSION: u32 = 1;
    }

    fn scratch() -> (TempDir, Storage) {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path());
        (dir, storage)
    }

    #[tokio::test]
    async fn test_save_and_load_storable() {
        let (_dir, storage) = scratch();

        let data = Scripts {
            names: vec!["greet".into(), "bedtime".into()],
        };
        storage.save_data(&data).await.unwrap();

        assert!(storage.path_of("test.scripts").exists());
        assert!(!storage.path_of("test.scripts.tmp").exists());

        let loaded: Option<Scripts> = storage.load_data().await.unwrap();
        assert_eq!(loaded, Some(data));
    }

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let (_dir, storage) = scratch();

        let loaded: Option<Scripts> = storage.load_data().await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_version_mismatch() {
        let (_dir, storage) = scratch();

        let future = StorageFile::new("test.scripts", Scripts { names: vec![] }, 2, 1);
        storage.save(&future).await.unwrap();

        let result = storage.load_data::<Scripts>().await;
        assert!(matches!(
            result,
            Err(StorageError::VersionMismatch { found: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_corrupt_file() {
        let (_dir, storage) = scratch();
        std::fs::create_dir_all(storage.root()).unwrap();
        std::fs::write(storage.path_of("test.scripts"), "{not json").unwrap();

        let result = storage.load_data::<Scripts>().await;
        assert!(matches!(result, Err(StorageError::Json(_))));
    }
}
