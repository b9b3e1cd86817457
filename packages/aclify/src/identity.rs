//! Current-principal state with write-through persistence.
//!
//! [`IdentityStore`] is the only writer of the persisted identity record.
//! Reads normalize every kind of absence (missing key, the `"undefined"`
//! sentinel, JSON `null`, a malformed record, an unreachable backend) to
//! `None`. Writes that fail are logged and dropped; memory is still updated.

use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{AclifyError, Result};
use crate::storage::{KeyValueStore, UNDEFINED_SENTINEL};

/// Marker for identity records.
///
/// The core never looks inside an identity; it only stores it, compares it
/// and hands it to the caller's role and permission getters.
pub trait Identity: Clone + PartialEq + Serialize + DeserializeOwned + 'static {}

impl<T: Clone + PartialEq + Serialize + DeserializeOwned + 'static> Identity for T {}

/// Read the identity at `key`, surfacing decode and backend failures.
pub fn load_identity<I: Identity>(backend: &dyn KeyValueStore, key: &str) -> Result<Option<I>> {
    let Some(raw) = backend.get(key)? else {
        return Ok(None);
    };

    if raw == UNDEFINED_SENTINEL {
        return Ok(None);
    }

    // `Option<I>` so a literal JSON `null` reads as "signed out"
    let identity: Option<I> = serde_json::from_str(&raw)?;
    Ok(identity)
}

/// In-memory identity kept in sync with a key-value backend.
pub struct IdentityStore<I> {
    backend: Rc<dyn KeyValueStore>,
    key: String,
    current: Option<I>,
}

impl<I> IdentityStore<I> {
    /// The current identity, `None` when signed out.
    pub fn get(&self) -> Option<&I> {
        self.current.as_ref()
    }

    /// Key the record is persisted under.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl<I: Identity> IdentityStore<I> {
    /// Hydrate from whatever is persisted at `key`. Never fails.
    pub fn initialize(backend: Rc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        let current = match load_identity::<I>(backend.as_ref(), &key) {
            Ok(identity) => identity,
            Err(AclifyError::StorageParseFailure(err)) => {
                warn!(key = %key, error = %err, "discarding malformed identity record");
                None
            }
            Err(err) => {
                warn!(key = %key, error = %err, "identity storage unreadable; starting signed out");
                None
            }
        };

        debug!(key = %key, hydrated = current.is_some(), "identity store initialized");

        Self {
            backend,
            key,
            current,
        }
    }

    /// Start from an explicit identity instead of the persisted record.
    ///
    /// The given identity is written through, replacing whatever was stored.
    pub fn with_initial(
        backend: Rc<dyn KeyValueStore>,
        key: impl Into<String>,
        identity: Option<I>,
    ) -> Self {
        let mut store = Self {
            backend,
            key: key.into(),
            current: None,
        };
        store.set(identity);
        store
    }

    /// Replace the current identity and persist it. `None` deletes the record.
    pub fn set(&mut self, identity: Option<I>) {
        match &identity {
            None => {
                if let Err(err) = self.backend.remove(&self.key) {
                    warn!(key = %self.key, error = %err, "failed to remove identity record");
                }
            }
            Some(value) => match serde_json::to_string(value) {
                Ok(raw) => {
                    if let Err(err) = self.backend.set(&self.key, &raw) {
                        warn!(key = %self.key, error = %err, "failed to persist identity record");
                    }
                }
                Err(err) => {
                    warn!(key = %self.key, error = %err, "identity is not serializable; kept in memory only");
                }
            },
        }

        debug!(key = %self.key, signed_in = identity.is_some(), "identity updated");
        self.current = identity;
    }
}
