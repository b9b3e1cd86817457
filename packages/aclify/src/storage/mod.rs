//! Key-value backends for persisting the current identity.
//!
//! Available backends:
//! - `MemoryStore` - In-memory storage (always available)
//! - `FileStore` - One file per key under a directory (native hosts)
//! - `LocalStorage` - Browser `window.localStorage` (requires `web` feature)

pub mod file;
pub mod memory;

#[cfg(feature = "web")]
pub mod local;

pub use file::FileStore;
pub use memory::MemoryStore;

#[cfg(feature = "web")]
pub use local::LocalStorage;

use crate::error::StorageResult;

/// Key under which the identity record is persisted unless overridden.
pub const DEFAULT_STORAGE_KEY: &str = "__ACLIFY_USER__";

/// Textual value some hosts write for "no value". Reads as absent.
pub const UNDEFINED_SENTINEL: &str = "undefined";

/// Synchronous string key-value store.
///
/// Implementations report failures; callers decide whether to recover.
pub trait KeyValueStore {
    /// Get the raw value stored at `key`, if any.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store `value` at `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Delete the value at `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;
}
