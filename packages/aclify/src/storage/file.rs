//! File-backed storage: one file per key under a root directory.
//!
//! This is the native stand-in for browser local storage. Records survive
//! process restarts, which is what lets a CLI or desktop host keep the
//! signed-in principal between sessions.

use std::fmt::Write as _;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use super::KeyValueStore;
use crate::error::{StorageError, StorageResult};

/// Key-value store persisted as files in a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `root`. The directory is created lazily on
    /// the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding `key`.
    ///
    /// Every byte outside `[A-Za-z0-9_-]` is percent-escaped, dots and
    /// separators included, so distinct keys map to distinct files that all
    /// sit directly under the root.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let mut name = String::with_capacity(key.len() + 5);
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'-') {
                name.push(char::from(byte));
            } else {
                let _ = write!(name, "%{byte:02X}");
            }
        }
        name.push_str(".json");

        self.root.join(name)
    }

    fn io_error(key: &str, source: std::io::Error) -> StorageError {
        StorageError::Io {
            key: key.to_string(),
            source,
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Self::io_error(key, err)),
        }
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        fs::create_dir_all(&self.root).map_err(|e| Self::io_error(key, e))?;

        let path = self.path_for(key);

        // Write then rename so a crash never leaves a half-written record
        let mut tmp = NamedTempFile::new_in(&self.root).map_err(|e| Self::io_error(key, e))?;
        tmp.write_all(value.as_bytes())
            .map_err(|e| Self::io_error(key, e))?;
        tmp.persist(&path)
            .map_err(|e| Self::io_error(key, e.error))?;

        debug!(key, path = %path.display(), "stored record");
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Self::io_error(key, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"));

        assert_eq!(store.get("user").unwrap(), None);

        store.set("user", r#"{"id":1}"#).unwrap();
        assert_eq!(store.get("user").unwrap().as_deref(), Some(r#"{"id":1}"#));

        store.remove("user").unwrap();
        assert_eq!(store.get("user").unwrap(), None);

        // Second remove is a no-op
        store.remove("user").unwrap();
    }

    #[test]
    fn test_keys_cannot_escape_root() {
        let store = FileStore::new("/tmp/aclify-root");
        let path = store.path_for("../../etc/passwd");

        assert!(path.starts_with("/tmp/aclify-root"));
        assert_eq!(path.parent(), Some(Path::new("/tmp/aclify-root")));
    }

    #[test]
    fn test_distinct_keys_never_share_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store.set("tenant:a", "A").unwrap();
        store.set("tenant/a", "B").unwrap();
        store.set("tenant_a", "C").unwrap();

        assert_eq!(store.get("tenant:a").unwrap().as_deref(), Some("A"));
        assert_eq!(store.get("tenant/a").unwrap().as_deref(), Some("B"));
        assert_eq!(store.get("tenant_a").unwrap().as_deref(), Some("C"));

        let paths: std::collections::HashSet<PathBuf> =
            ["", ".", "..", "%2E", "a.b"].iter().map(|k| store.path_for(k)).collect();
        assert_eq!(paths.len(), 5);
    }

    #[test]
    fn test_default_key_keeps_a_readable_name() {
        let store = FileStore::new("/tmp/aclify-root");

        assert_eq!(
            store.path_for("__ACLIFY_USER__"),
            Path::new("/tmp/aclify-root/__ACLIFY_USER__.json")
        );
    }

    #[test]
    fn test_overwrite_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store.set("user", "first").unwrap();
        store.set("user", "second").unwrap();

        assert_eq!(store.get("user").unwrap().as_deref(), Some("second"));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_records_survive_new_instances() {
        let dir = tempfile::tempdir().unwrap();

        FileStore::new(dir.path()).set("k", "v").unwrap();

        assert_eq!(
            FileStore::new(dir.path()).get("k").unwrap().as_deref(),
            Some("v")
        );
    }
}
