//! Factories for the provider / hook / gate triple.
//!
//! Every factory call allocates a fresh [`ScopeToken`], so two instances
//! never observe each other's providers even when their type parameters
//! are identical.
//!
//! ```rust,ignore
//! use aclify::{create_aclify, CanAccess, Scope, UserAccess};
//!
//! let aclify = create_aclify::<String, String>();
//! let provided = aclify.provide(&Scope::root(), UserAccess::new(["admin"], ["read"]));
//!
//! let content = aclify.gate().render(
//!     provided.scope(),
//!     CanAccess::new("Authorized").with_roles(["admin"]).with_fallback("Not authorized"),
//! );
//! assert_eq!(content, Some("Authorized"));
//! ```

use std::marker::PhantomData;

use tracing::debug;

use crate::access::{Token, UserAccess};
use crate::context::{consume, AccessContext, AccessHandle, IdentityProps, NoIdentity, Provided};
use crate::error::Result;
use crate::gate::Gate;
use crate::identity::Identity;
use crate::scope::{Scope, ScopeToken};

/// Name reported when the hook is used outside a provider.
pub const HOOK_NAME: &str = "use_aclify";

/// Hook result of the direct-sets variant: no identity, no mutator.
pub type DirectAccess<R = String, P = String> = AccessHandle<NoIdentity, R, P>;

/// Direct-sets variant: the caller owns role and permission state.
pub struct Aclify<R = String, P = String> {
    token: ScopeToken,
    _marker: PhantomData<fn() -> (R, P)>,
}

/// Create an isolated direct-sets instance.
pub fn create_aclify<R: Token, P: Token>() -> Aclify<R, P> {
    let token = ScopeToken::fresh();
    debug!(token = token.id(), "created direct aclify instance");

    Aclify {
        token,
        _marker: PhantomData,
    }
}

impl<R: Token, P: Token> Aclify<R, P> {
    pub fn token(&self) -> ScopeToken {
        self.token
    }

    /// Provider: expose `access` to everything under the returned scope.
    pub fn provide(&self, parent: &Scope, access: UserAccess<R, P>) -> Provided<NoIdentity, R, P> {
        let context = AccessContext::direct(access);
        let scope = parent.provide(self.token, context.clone());

        Provided::new(scope, context)
    }

    /// Hook: the nearest provider's value.
    ///
    /// # Panics
    ///
    /// Panics with `ContextNotInitialized` outside a provider scope.
    #[track_caller]
    pub fn use_aclify(&self, scope: &Scope) -> DirectAccess<R, P> {
        match self.try_use_aclify(scope) {
            Ok(handle) => handle,
            Err(err) => panic!("{err}"),
        }
    }

    pub fn try_use_aclify(&self, scope: &Scope) -> Result<DirectAccess<R, P>> {
        consume::<NoIdentity, R, P>(scope, self.token, HOOK_NAME).map(AccessHandle::new)
    }

    /// Gate bound to this instance's providers.
    pub fn gate(&self) -> Gate<NoIdentity, R, P> {
        Gate::new(self.token)
    }
}

/// Identity-derivation variant: the instance owns the identity lifecycle,
/// including hydration from and write-through to storage.
pub struct AclifyContext<I, R = String, P = String> {
    token: ScopeToken,
    _marker: PhantomData<fn() -> (I, R, P)>,
}

/// Create an isolated identity-derivation instance.
pub fn create_aclify_context<I: Identity, R: Token, P: Token>() -> AclifyContext<I, R, P> {
    let token = ScopeToken::fresh();
    debug!(token = token.id(), "created identity aclify instance");

    AclifyContext {
        token,
        _marker: PhantomData,
    }
}

impl<I: Identity, R: Token, P: Token> AclifyContext<I, R, P> {
    pub fn token(&self) -> ScopeToken {
        self.token
    }

    /// Provider: hydrate the identity and expose it under the returned scope.
    pub fn provide(&self, parent: &Scope, props: IdentityProps<I, R, P>) -> Provided<I, R, P> {
        let context = AccessContext::derived(props);
        let scope = parent.provide(self.token, context.clone());

        Provided::new(scope, context)
    }

    /// Hook: identity, mutator and bound decision of the nearest provider.
    ///
    /// # Panics
    ///
    /// Panics with `ContextNotInitialized` outside a provider scope.
    #[track_caller]
    pub fn use_aclify(&self, scope: &Scope) -> AccessHandle<I, R, P> {
        match self.try_use_aclify(scope) {
            Ok(handle) => handle,
            Err(err) => panic!("{err}"),
        }
    }

    pub fn try_use_aclify(&self, scope: &Scope) -> Result<AccessHandle<I, R, P>> {
        consume::<I, R, P>(scope, self.token, HOOK_NAME).map(AccessHandle::new)
    }

    pub fn gate(&self) -> Gate<I, R, P> {
        Gate::new(self.token)
    }
}
