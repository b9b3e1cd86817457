use anyhow::{bail, Context, Result};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::storage::{FileStore, DEFAULT_STORAGE_KEY};

/// Where the current identity is persisted, loaded from environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclifyConfig {
    pub storage_key: String,
    pub storage_dir: PathBuf,
}

impl Default for AclifyConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            storage_dir: PathBuf::from(".aclify"),
        }
    }
}

impl AclifyConfig {
    /// Load configuration from environment variables
    ///
    /// - `ACLIFY_STORAGE_KEY` (default `__ACLIFY_USER__`)
    /// - `ACLIFY_STORAGE_DIR` (default `.aclify`)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let storage_key = lookup("ACLIFY_STORAGE_KEY").unwrap_or(defaults.storage_key);
        if storage_key.trim().is_empty() {
            bail!("ACLIFY_STORAGE_KEY must not be empty");
        }

        let storage_dir = lookup("ACLIFY_STORAGE_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.storage_dir);

        Ok(Self {
            storage_key,
            storage_dir,
        })
    }

    /// File-backed store rooted at `storage_dir`, creating the directory
    pub fn file_store(&self) -> Result<FileStore> {
        fs::create_dir_all(&self.storage_dir).with_context(|| {
            format!(
                "ACLIFY_STORAGE_DIR {} could not be created",
                self.storage_dir.display()
            )
        })?;

        Ok(FileStore::new(&self.storage_dir))
    }
}
