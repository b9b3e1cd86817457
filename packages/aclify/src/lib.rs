//! Client-side role and permission gating
//!
//! Given what a principal holds and what a piece of UI requires, aclify
//! yields a yes/no decision and exposes it to a tree of consumers through
//! an explicit [`Scope`]. The signed-in principal is persisted through a
//! pluggable key-value backend so it survives restarts.
//!
//! This is not a policy server: nothing here validates tokens or talks to
//! the network. It only evaluates sets the caller has already resolved.
//!
//! # Usage
//!
//! ```rust,ignore
//! use aclify::{create_aclify_context, CanAccess, IdentityProps, MemoryStore, Scope};
//!
//! let aclify = create_aclify_context::<User, String, String>();
//! let provided = aclify.provide(
//!     &Scope::root(),
//!     IdentityProps::new(MemoryStore::new(), roles_of, permissions_of),
//! );
//!
//! // Anywhere beneath the provider
//! let access = aclify.use_aclify(provided.scope());
//! access.set_identity(Some(user));
//!
//! let view = aclify.gate().render(
//!     provided.scope(),
//!     CanAccess::new("admin panel").with_roles(["admin"]).with_fallback("denied"),
//! );
//! ```
//!
//! # Modules
//!
//! - [`access`] - Pure evaluation of requirements against held tokens
//! - [`storage`] - Key-value backends (MemoryStore, FileStore, LocalStorage)
//! - [`identity`] - Current-principal state with write-through persistence
//! - [`scope`] - Explicit provide / lookup scoping
//! - [`context`] - Memoized access state shared through a scope
//! - [`factory`] - Isolated provider / hook / gate instances
//! - [`gate`] - Conditional rendering driven by the bound decision
//! - [`testing`] - Mock backends for testing

pub mod access;
pub mod config;
pub mod context;
pub mod error;
pub mod factory;
pub mod gate;
pub mod identity;
pub mod scope;
pub mod storage;
pub mod testing;

// Re-export core types at crate root
pub use access::{evaluate, AccessRequirement, MatchMode, Token, UserAccess, ValidationMode};
pub use config::AclifyConfig;
pub use context::{
    permission_getter, role_getter, AccessContext, AccessHandle, AccessSnapshot, IdentityProps,
    NoIdentity, PermissionGetter, Provided, RoleGetter, Subscription,
};
pub use error::{AclifyError, Result, StorageError, StorageResult};
pub use factory::{create_aclify, create_aclify_context, Aclify, AclifyContext, DirectAccess, HOOK_NAME};
pub use gate::{CanAccess, Gate};
pub use identity::{load_identity, Identity, IdentityStore};
pub use scope::{Scope, ScopeToken};
pub use storage::{FileStore, KeyValueStore, MemoryStore, DEFAULT_STORAGE_KEY, UNDEFINED_SENTINEL};

#[cfg(feature = "web")]
pub use storage::LocalStorage;
