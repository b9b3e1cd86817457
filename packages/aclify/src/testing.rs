//! Testing utilities including mock storage backends.
//!
//! These are useful for exercising the recovery paths of
//! [`IdentityStore`](crate::IdentityStore) without a real browser or disk.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{StorageError, StorageResult};
use crate::storage::{KeyValueStore, MemoryStore};

/// A backend where every operation fails, as when storage is disabled.
#[derive(Debug, Clone, Default)]
pub struct FailingStore {
    reason: Option<String>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail with a specific message.
    pub fn with_reason(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
        }
    }

    fn error(&self) -> StorageError {
        StorageError::Unavailable(
            self.reason
                .clone()
                .unwrap_or_else(|| "storage disabled".to_string()),
        )
    }
}

impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> StorageResult<Option<String>> {
        Err(self.error())
    }

    fn set(&self, _key: &str, _value: &str) -> StorageResult<()> {
        Err(self.error())
    }

    fn remove(&self, _key: &str) -> StorageResult<()> {
        Err(self.error())
    }
}

/// Record of a call made to a [`RecordingStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Get { key: String },
    Set { key: String, value: String },
    Remove { key: String },
}

/// A [`MemoryStore`] that records every call for assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    calls: Rc<RefCell<Vec<StoreCall>>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The underlying entries.
    pub fn entries(&self) -> &MemoryStore {
        &self.inner
    }

    /// All calls made so far, oldest first.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.borrow().clone()
    }

    /// Number of writes (sets and removes).
    pub fn write_count(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| !matches!(c, StoreCall::Get { .. }))
            .count()
    }
}

impl KeyValueStore for RecordingStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.calls.borrow_mut().push(StoreCall::Get {
            key: key.to_string(),
        });
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.calls.borrow_mut().push(StoreCall::Set {
            key: key.to_string(),
            value: value.to_string(),
        });
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.calls.borrow_mut().push(StoreCall::Remove {
            key: key.to_string(),
        });
        self.inner.remove(key)
    }
}
