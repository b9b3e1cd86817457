//! Declarative conditional rendering.
//!
//! A [`Gate`] picks between two pieces of content based on the bound
//! decision of the nearest provider. Content is any `V`: a string, a
//! closure, or a UI framework's element type.

use std::cell::Cell;
use std::marker::PhantomData;

use crate::access::{AccessRequirement, Token, ValidationMode};
use crate::context::{consume, Subscription};
use crate::error::Result;
use crate::factory::HOOK_NAME;
use crate::scope::{Scope, ScopeToken};

/// Props for one gated region.
#[derive(Debug, Clone)]
pub struct CanAccess<V, R = String, P = String> {
    pub requirement: AccessRequirement<R, P>,
    pub validation_mode: ValidationMode,
    /// Rendered when authorized.
    pub children: V,
    /// Rendered when not authorized. Nothing by default.
    pub fallback: Option<V>,
}

impl<V, R: Token, P: Token> CanAccess<V, R, P> {
    /// Gate `children` behind an empty requirement; add requirements with
    /// the builder methods.
    pub fn new(children: V) -> Self {
        Self {
            requirement: AccessRequirement::default(),
            validation_mode: ValidationMode::default(),
            children,
            fallback: None,
        }
    }

    pub fn with_roles<T: Into<R>>(mut self, roles: impl IntoIterator<Item = T>) -> Self {
        self.requirement = self.requirement.with_roles(roles);
        self
    }

    pub fn with_permissions<T: Into<P>>(mut self, permissions: impl IntoIterator<Item = T>) -> Self {
        self.requirement = self.requirement.with_permissions(permissions);
        self
    }

    pub fn with_requirement(mut self, requirement: AccessRequirement<R, P>) -> Self {
        self.requirement = requirement;
        self
    }

    pub fn with_validation_mode(mut self, mode: ValidationMode) -> Self {
        self.validation_mode = mode;
        self
    }

    pub fn with_fallback(mut self, fallback: V) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

/// Conditional-render primitive bound to one factory instance.
pub struct Gate<I, R = String, P = String> {
    token: ScopeToken,
    _marker: PhantomData<fn() -> (I, R, P)>,
}

impl<I, R, P> Clone for Gate<I, R, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<I, R, P> Copy for Gate<I, R, P> {}

impl<I: Clone + 'static, R: Token, P: Token> Gate<I, R, P> {
    pub(crate) fn new(token: ScopeToken) -> Self {
        Self {
            token,
            _marker: PhantomData,
        }
    }

    /// `children` when the nearest provider authorizes the requirement,
    /// otherwise the fallback.
    ///
    /// # Panics
    ///
    /// Panics with `ContextNotInitialized` when `scope` has no provider.
    #[track_caller]
    pub fn render<V>(&self, scope: &Scope, props: CanAccess<V, R, P>) -> Option<V> {
        match self.try_render(scope, props) {
            Ok(content) => content,
            Err(err) => panic!("{err}"),
        }
    }

    /// Like [`render`](Self::render) but reports a missing provider.
    pub fn try_render<V>(&self, scope: &Scope, props: CanAccess<V, R, P>) -> Result<Option<V>> {
        let context = consume::<I, R, P>(scope, self.token, HOOK_NAME)?;

        if context.is_authorized(&props.requirement, props.validation_mode) {
            Ok(Some(props.children))
        } else {
            Ok(props.fallback)
        }
    }

    /// Call `on_change` whenever the decision for `requirement` flips.
    ///
    /// The initial decision is not reported.
    ///
    /// # Panics
    ///
    /// Panics with `ContextNotInitialized` when `scope` has no provider.
    #[track_caller]
    pub fn watch<F>(
        &self,
        scope: &Scope,
        requirement: AccessRequirement<R, P>,
        mode: ValidationMode,
        on_change: F,
    ) -> Subscription
    where
        F: Fn(bool) + 'static,
    {
        let context = match consume::<I, R, P>(scope, self.token, HOOK_NAME) {
            Ok(context) => context,
            Err(err) => panic!("{err}"),
        };

        let last = Cell::new(context.is_authorized(&requirement, mode));
        context.subscribe(move |snapshot| {
            let now = snapshot.is_authorized(&requirement, mode);
            if last.replace(now) != now {
                on_change(now);
            }
        })
    }
}
