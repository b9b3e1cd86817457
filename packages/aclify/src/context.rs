//! Access context: the value a provider makes visible to its scope.
//!
//! An [`AccessContext`] is either fed role and permission sets directly by
//! the caller, or derives them from an identity it owns through an
//! [`IdentityStore`]. Consumers read an [`AccessSnapshot`], which is
//! memoized: the same `Rc` comes back until the identity, a getter, or the
//! direct sets actually change. Each change bumps the revision and
//! notifies subscribers once.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::access::{evaluate, AccessRequirement, Token, UserAccess, ValidationMode};
use crate::error::{AclifyError, Result};
use crate::identity::{Identity, IdentityStore};
use crate::scope::{Scope, ScopeToken};
use crate::storage::{KeyValueStore, DEFAULT_STORAGE_KEY};

/// Derives the role set from the current identity.
pub type RoleGetter<I, R> = Rc<dyn Fn(Option<&I>) -> HashSet<R>>;

/// Derives the permission set from the current identity.
pub type PermissionGetter<I, P> = Rc<dyn Fn(Option<&I>) -> HashSet<P>>;

/// Wrap a closure as a [`RoleGetter`].
///
/// Keep the returned `Rc` and pass it again on later updates; a new `Rc`
/// counts as a new getter and forces a recompute.
pub fn role_getter<I, R, F>(f: F) -> RoleGetter<I, R>
where
    F: Fn(Option<&I>) -> HashSet<R> + 'static,
{
    Rc::new(f)
}

/// Wrap a closure as a [`PermissionGetter`].
pub fn permission_getter<I, P, F>(f: F) -> PermissionGetter<I, P>
where
    F: Fn(Option<&I>) -> HashSet<P> + 'static,
{
    Rc::new(f)
}

/// Identity type of the direct-sets variant. Uninhabited, and not an
/// [`Identity`], so identity operations do not exist on that variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoIdentity {}

/// Provider configuration for the identity-derivation variant.
pub struct IdentityProps<I, R, P> {
    store: Rc<dyn KeyValueStore>,
    storage_key: String,
    initial_identity: Option<I>,
    role_getter: RoleGetter<I, R>,
    permission_getter: PermissionGetter<I, P>,
}

impl<I: Identity, R: Token, P: Token> IdentityProps<I, R, P> {
    /// Persist through `store` under [`DEFAULT_STORAGE_KEY`], deriving
    /// roles and permissions with the given closures.
    pub fn new<F, G>(store: impl KeyValueStore + 'static, roles: F, permissions: G) -> Self
    where
        F: Fn(Option<&I>) -> HashSet<R> + 'static,
        G: Fn(Option<&I>) -> HashSet<P> + 'static,
    {
        Self {
            store: Rc::new(store),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            initial_identity: None,
            role_getter: role_getter(roles),
            permission_getter: permission_getter(permissions),
        }
    }

    /// Start signed in as `identity` instead of hydrating from storage.
    pub fn with_initial_identity(mut self, identity: I) -> Self {
        self.initial_identity = Some(identity);
        self
    }

    /// Persist under `key` instead of the default.
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Use an existing shared role getter.
    pub fn with_role_getter(mut self, getter: RoleGetter<I, R>) -> Self {
        self.role_getter = getter;
        self
    }

    /// Use an existing shared permission getter.
    pub fn with_permission_getter(mut self, getter: PermissionGetter<I, P>) -> Self {
        self.permission_getter = getter;
        self
    }
}

/// The composite value consumers observe.
pub struct AccessSnapshot<I, R, P> {
    identity: Option<I>,
    access: UserAccess<R, P>,
    role_getter: Option<RoleGetter<I, R>>,
    permission_getter: Option<PermissionGetter<I, P>>,
    revision: u64,
}

impl<I, R: Token, P: Token> AccessSnapshot<I, R, P> {
    /// Bound decision: does the user in this snapshot satisfy `requirement`?
    pub fn is_authorized(&self, requirement: &AccessRequirement<R, P>, mode: ValidationMode) -> bool {
        evaluate(requirement, &self.access, mode)
    }

    pub fn identity(&self) -> Option<&I> {
        self.identity.as_ref()
    }

    pub fn user_access(&self) -> &UserAccess<R, P> {
        &self.access
    }

    pub fn user_roles(&self) -> &HashSet<R> {
        &self.access.user_roles
    }

    pub fn user_permissions(&self) -> &HashSet<P> {
        &self.access.user_permissions
    }

    pub fn role_getter(&self) -> Option<&RoleGetter<I, R>> {
        self.role_getter.as_ref()
    }

    pub fn permission_getter(&self) -> Option<&PermissionGetter<I, P>> {
        self.permission_getter.as_ref()
    }

    /// Number of changes the owning context had seen when this was taken.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

impl<I: fmt::Debug, R: fmt::Debug, P: fmt::Debug> fmt::Debug for AccessSnapshot<I, R, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessSnapshot")
            .field("identity", &self.identity)
            .field("access", &self.access)
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}

enum Source<I, R, P> {
    Direct(UserAccess<R, P>),
    Derived {
        store: IdentityStore<I>,
        role_getter: RoleGetter<I, R>,
        permission_getter: PermissionGetter<I, P>,
    },
}

struct State<I, R, P> {
    source: Source<I, R, P>,
    revision: u64,
    cached: Option<Rc<AccessSnapshot<I, R, P>>>,
}

/// Owned copy of what a snapshot is computed from, so getters run with no
/// borrow of the shared state held.
enum Inputs<I, R, P> {
    Direct(UserAccess<R, P>),
    Derived {
        identity: Option<I>,
        role_getter: RoleGetter<I, R>,
        permission_getter: PermissionGetter<I, P>,
    },
}

impl<I: Clone, R: Token, P: Token> State<I, R, P> {
    fn inputs(&self) -> Inputs<I, R, P> {
        match &self.source {
            Source::Direct(access) => Inputs::Direct(access.clone()),
            Source::Derived {
                store,
                role_getter,
                permission_getter,
            } => Inputs::Derived {
                identity: store.get().cloned(),
                role_getter: Rc::clone(role_getter),
                permission_getter: Rc::clone(permission_getter),
            },
        }
    }
}

impl<I, R: Token, P: Token> Inputs<I, R, P> {
    fn resolve(self, revision: u64) -> AccessSnapshot<I, R, P> {
        match self {
            Inputs::Direct(access) => AccessSnapshot {
                identity: None,
                access,
                role_getter: None,
                permission_getter: None,
                revision,
            },
            Inputs::Derived {
                identity,
                role_getter,
                permission_getter,
            } => AccessSnapshot {
                access: UserAccess {
                    user_roles: role_getter(identity.as_ref()),
                    user_permissions: permission_getter(identity.as_ref()),
                },
                identity,
                role_getter: Some(role_getter),
                permission_getter: Some(permission_getter),
                revision,
            },
        }
    }
}

type Listener<I, R, P> = Rc<dyn Fn(&AccessSnapshot<I, R, P>)>;

struct Inner<I, R, P> {
    state: RefCell<State<I, R, P>>,
    listeners: RefCell<Vec<(u64, Listener<I, R, P>)>>,
    next_listener: Cell<u64>,
}

/// Shared access state for one provider scope.
///
/// Cloning is cheap and yields a handle to the same state.
pub struct AccessContext<I, R = String, P = String> {
    inner: Rc<Inner<I, R, P>>,
}

impl<I, R, P> Clone for AccessContext<I, R, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<I: Clone + 'static, R: Token, P: Token> AccessContext<I, R, P> {
    fn from_source(source: Source<I, R, P>) -> Self {
        Self {
            inner: Rc::new(Inner {
                state: RefCell::new(State {
                    source,
                    revision: 0,
                    cached: None,
                }),
                listeners: RefCell::new(Vec::new()),
                next_listener: Cell::new(0),
            }),
        }
    }

    /// A context over caller-owned role and permission sets.
    pub fn direct(access: UserAccess<R, P>) -> Self {
        Self::from_source(Source::Direct(access))
    }

    /// The current composite value, recomputed only after a change.
    ///
    /// Getters may call back into the context. A change made while they run
    /// is not cached over: the next call recomputes.
    pub fn snapshot(&self) -> Rc<AccessSnapshot<I, R, P>> {
        let (inputs, revision) = {
            let state = self.inner.state.borrow();
            if let Some(cached) = &state.cached {
                return Rc::clone(cached);
            }
            (state.inputs(), state.revision)
        };

        let snapshot = Rc::new(inputs.resolve(revision));

        let mut state = self.inner.state.borrow_mut();
        if state.revision == revision {
            state.cached = Some(Rc::clone(&snapshot));
        }
        snapshot
    }

    /// Evaluate `requirement` against the current user.
    pub fn is_authorized(&self, requirement: &AccessRequirement<R, P>, mode: ValidationMode) -> bool {
        self.snapshot().is_authorized(requirement, mode)
    }

    pub fn revision(&self) -> u64 {
        self.inner.state.borrow().revision
    }

    /// Replace the directly supplied sets. Returns whether anything changed.
    ///
    /// Ignored on a context that derives access from an identity.
    pub fn set_user_access(&self, access: UserAccess<R, P>) -> bool {
        let changed = {
            let mut state = self.inner.state.borrow_mut();
            match &mut state.source {
                Source::Direct(current) if *current != access => {
                    *current = access;
                    true
                }
                Source::Direct(_) => false,
                Source::Derived { .. } => {
                    warn!("set_user_access ignored: access is derived from the identity");
                    false
                }
            }
        };

        if changed {
            self.invalidate("user access");
        }
        changed
    }

    /// Call `listener` with every new snapshot until the returned
    /// [`Subscription`] is dropped.
    pub fn subscribe(&self, listener: impl Fn(&AccessSnapshot<I, R, P>) + 'static) -> Subscription {
        let id = self.inner.next_listener.get();
        self.inner.next_listener.set(id + 1);
        self.inner
            .listeners
            .borrow_mut()
            .push((id, Rc::new(listener)));

        let weak = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.listeners.borrow_mut().retain(|(lid, _)| *lid != id);
            }
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    fn invalidate(&self, reason: &'static str) {
        {
            let mut state = self.inner.state.borrow_mut();
            state.revision += 1;
            state.cached = None;
        }

        let snapshot = self.snapshot();
        debug!(revision = snapshot.revision, reason, "access context changed");

        // Listeners may subscribe or unsubscribe while being notified
        let listeners: Vec<Listener<I, R, P>> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();

        for listener in listeners {
            // A listener changed the context again; the nested change
            // already delivered the newer snapshot to everyone
            if self.revision() != snapshot.revision {
                break;
            }
            listener(&snapshot);
        }
    }
}

impl<I: Identity, R: Token, P: Token> AccessContext<I, R, P> {
    /// A context owning the identity lifecycle. Hydrates from storage
    /// unless an initial identity is given.
    pub fn derived(props: IdentityProps<I, R, P>) -> Self {
        let store = match props.initial_identity {
            Some(identity) => {
                IdentityStore::with_initial(props.store, props.storage_key, Some(identity))
            }
            None => IdentityStore::initialize(props.store, props.storage_key),
        };

        Self::from_source(Source::Derived {
            store,
            role_getter: props.role_getter,
            permission_getter: props.permission_getter,
        })
    }

    pub fn identity(&self) -> Option<I> {
        self.snapshot().identity.clone()
    }

    /// Sign in as `identity`, or sign out with `None`, persisting the
    /// change. Returns whether the identity changed.
    pub fn set_identity(&self, identity: Option<I>) -> bool {
        let changed = {
            let mut state = self.inner.state.borrow_mut();
            match &mut state.source {
                Source::Derived { store, .. } => {
                    if store.get() == identity.as_ref() {
                        false
                    } else {
                        store.set(identity);
                        true
                    }
                }
                Source::Direct(_) => {
                    warn!("set_identity ignored: context was given access sets directly");
                    false
                }
            }
        };

        if changed {
            self.invalidate("identity");
        }
        changed
    }

    /// Swap the role getter. A getter is compared by pointer, so passing
    /// the same `Rc` again is not a change.
    pub fn set_role_getter(&self, getter: RoleGetter<I, R>) -> bool {
        let changed = {
            let mut state = self.inner.state.borrow_mut();
            match &mut state.source {
                Source::Derived { role_getter, .. } if !Rc::ptr_eq(role_getter, &getter) => {
                    *role_getter = getter;
                    true
                }
                _ => false,
            }
        };

        if changed {
            self.invalidate("role getter");
        }
        changed
    }

    /// Swap the permission getter. Compared by pointer like the role getter.
    pub fn set_permission_getter(&self, getter: PermissionGetter<I, P>) -> bool {
        let changed = {
            let mut state = self.inner.state.borrow_mut();
            match &mut state.source {
                Source::Derived {
                    permission_getter, ..
                } if !Rc::ptr_eq(permission_getter, &getter) => {
                    *permission_getter = getter;
                    true
                }
                _ => false,
            }
        };

        if changed {
            self.invalidate("permission getter");
        }
        changed
    }

    /// Key the identity is persisted under, if this context owns one.
    pub fn storage_key(&self) -> Option<String> {
        match &self.inner.state.borrow().source {
            Source::Derived { store, .. } => Some(store.key().to_string()),
            Source::Direct(_) => None,
        }
    }
}

/// Keeps a listener registered. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Keep the listener registered for the lifetime of the context.
    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// What a consumer gets back from `use_aclify`.
///
/// Holds the snapshot current at the time of the call. After a mutation,
/// call the hook again (or check [`is_current`](Self::is_current)) to
/// observe the new value.
pub struct AccessHandle<I, R = String, P = String> {
    context: AccessContext<I, R, P>,
    snapshot: Rc<AccessSnapshot<I, R, P>>,
}

impl<I: Clone + 'static, R: Token, P: Token> AccessHandle<I, R, P> {
    pub(crate) fn new(context: AccessContext<I, R, P>) -> Self {
        let snapshot = context.snapshot();
        Self { context, snapshot }
    }

    /// Bound decision against the user in this handle's snapshot.
    pub fn is_authorized(&self, requirement: &AccessRequirement<R, P>, mode: ValidationMode) -> bool {
        self.snapshot.is_authorized(requirement, mode)
    }

    pub fn user_roles(&self) -> &HashSet<R> {
        self.snapshot.user_roles()
    }

    pub fn user_permissions(&self) -> &HashSet<P> {
        self.snapshot.user_permissions()
    }

    pub fn snapshot(&self) -> &AccessSnapshot<I, R, P> {
        &self.snapshot
    }

    /// True when both handles observe the very same composite value.
    pub fn same_value(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.snapshot, &other.snapshot)
    }

    /// False once the context has changed since this handle was taken.
    pub fn is_current(&self) -> bool {
        Rc::ptr_eq(&self.snapshot, &self.context.snapshot())
    }

    pub fn context(&self) -> &AccessContext<I, R, P> {
        &self.context
    }
}

impl<I: Identity, R: Token, P: Token> AccessHandle<I, R, P> {
    pub fn identity(&self) -> Option<&I> {
        self.snapshot.identity()
    }

    /// Mutator: see [`AccessContext::set_identity`].
    pub fn set_identity(&self, identity: Option<I>) -> bool {
        self.context.set_identity(identity)
    }

    pub fn role_getter(&self) -> Option<&RoleGetter<I, R>> {
        self.snapshot.role_getter()
    }

    pub fn permission_getter(&self) -> Option<&PermissionGetter<I, P>> {
        self.snapshot.permission_getter()
    }
}

/// A provider's child scope together with the context it provides.
pub struct Provided<I, R = String, P = String> {
    scope: Scope,
    context: AccessContext<I, R, P>,
}

impl<I, R, P> Provided<I, R, P> {
    pub(crate) fn new(scope: Scope, context: AccessContext<I, R, P>) -> Self {
        Self { scope, context }
    }

    /// Scope to hand to everything beneath the provider.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// The provided context, for updating the provider's inputs.
    pub fn context(&self) -> &AccessContext<I, R, P> {
        &self.context
    }
}

/// Find the context provided under `token`, or report the misuse.
pub(crate) fn consume<I: Clone + 'static, R: Token, P: Token>(
    scope: &Scope,
    token: ScopeToken,
    hook: &'static str,
) -> Result<AccessContext<I, R, P>> {
    scope
        .lookup::<AccessContext<I, R, P>>(token)
        .cloned()
        .ok_or(AclifyError::ContextNotInitialized { hook })
}
