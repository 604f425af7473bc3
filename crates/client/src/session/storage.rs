//! Durable key-value storage for the session.
//!
//! The session is persisted as two entries: the bearer token under
//! [`keys::AUTH_TOKEN`] and the JSON-serialized user under
//! [`keys::AUTH_USER`].

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

/// Storage keys for session data.
pub mod keys {
    /// Key for the opaque bearer token.
    pub const AUTH_TOKEN: &str = "auth_token";

    /// Key for the serialized `SessionUser`.
    pub const AUTH_USER: &str = "auth_user";
}

/// Errors raised by a [`SessionStorage`] backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to read {key}: {source}")]
    Read { key: String, source: io::Error },
    #[error("failed to write {key}: {source}")]
    Write { key: String, source: io::Error },
    #[error("failed to remove {key}: {source}")]
    Remove { key: String, source: io::Error },
}

/// A durable string key-value store.
pub trait SessionStorage: Send + Sync {
    /// Read a value; `Ok(None)` when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a value. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be modified.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// File-backed storage: one file per key inside a directory.
///
/// Writes go to a temporary file first and are renamed into place, so a
/// crash never leaves a half-written entry behind. On unix the directory is
/// created `0700` and every entry `0600`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Storage rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Directory holding the entries.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Read {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let write_err = |source| StorageError::Write {
            key: key.to_string(),
            source,
        };

        create_private_dir(&self.dir).map_err(write_err)?;

        let tmp = self.dir.join(format!(".{key}.tmp"));
        remove_if_present(&tmp).map_err(write_err)?;

        let mut file = private_file_options().open(&tmp).map_err(write_err)?;
        file.write_all(value.as_bytes()).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        drop(file);

        std::fs::rename(&tmp, self.path(key)).map_err(write_err)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        remove_if_present(&self.path(key)).map_err(|source| StorageError::Remove {
            key: key.to_string(),
            source,
        })
    }
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    std::fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dir)
}

fn private_file_options() -> OpenOptions {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options
}

/// In-process storage, for tests and for sessions that should not outlive
/// the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "tradedesk-storage-{name}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_file_storage_set_get_remove() {
        let dir = temp_dir("roundtrip");
        let storage = FileStorage::new(&dir);

        assert_eq!(storage.get(keys::AUTH_TOKEN).unwrap(), None);

        storage.set(keys::AUTH_TOKEN, "tok-1").unwrap();
        assert_eq!(storage.get(keys::AUTH_TOKEN).unwrap().as_deref(), Some("tok-1"));

        storage.set(keys::AUTH_TOKEN, "tok-2").unwrap();
        assert_eq!(storage.get(keys::AUTH_TOKEN).unwrap().as_deref(), Some("tok-2"));

        storage.remove(keys::AUTH_TOKEN).unwrap();
        assert_eq!(storage.get(keys::AUTH_TOKEN).unwrap(), None);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_file_storage_entries_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = temp_dir("mode");
        let storage = FileStorage::new(dir.join("session"));

        storage.set(keys::AUTH_TOKEN, "tok-1").unwrap();
        storage.set(keys::AUTH_TOKEN, "tok-2").unwrap();

        let file_mode = std::fs::metadata(storage.dir().join(keys::AUTH_TOKEN))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(file_mode & 0o777, 0o600);

        let dir_mode = std::fs::metadata(storage.dir()).unwrap().permissions().mode();
        assert_eq!(dir_mode & 0o077, 0);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_file_storage_remove_missing_is_ok() {
        let storage = FileStorage::new(temp_dir("missing"));
        assert!(storage.remove(keys::AUTH_USER).is_ok());
    }

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::new();
        assert!(storage.is_empty());
        storage.set(keys::AUTH_USER, "{}").unwrap();
        assert_eq!(storage.len(), 1);
        storage.remove(keys::AUTH_USER).unwrap();
        assert!(storage.is_empty());
    }
}
