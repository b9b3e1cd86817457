//! Typed errors for the aclify library.
//!
//! Only [`AclifyError::ContextNotInitialized`] ever reaches callers of the
//! scoped surface, and it does so as a panic from `use_aclify`. Storage
//! failures are recovered inside [`IdentityStore`](crate::IdentityStore)
//! and only surface through the strict [`load_identity`](crate::load_identity).

use thiserror::Error;

/// Errors raised by aclify operations.
#[derive(Debug, Error)]
pub enum AclifyError {
    /// A hook or gate was used with no enclosing provider scope.
    #[error("{hook} must be used within an Aclify provider scope")]
    ContextNotInitialized { hook: &'static str },

    /// The persisted identity record could not be decoded.
    #[error("stored identity is malformed: {0}")]
    StorageParseFailure(#[from] serde_json::Error),

    /// The key-value backend failed or is missing.
    #[error("identity storage unavailable: {0}")]
    StorageUnavailable(#[from] StorageError),
}

/// Errors reported by a [`KeyValueStore`](crate::KeyValueStore) backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend cannot be reached (no browser storage, disabled, quota...)
    #[error("{0}")]
    Unavailable(String),

    /// Filesystem failure for a given key
    #[error("I/O error for key {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for aclify operations.
pub type Result<T> = std::result::Result<T, AclifyError>;

/// Result type alias for storage backend operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
