//! Explicit scoped provisioning.
//!
//! A [`Scope`] is what a UI runtime's context tree would give you: values
//! provided at some node are visible to everything beneath it, and a lookup
//! finds the nearest enclosing provider. Scopes are immutable chains, so
//! providing a value never affects siblings or parents, and handing a scope
//! down a call stack is a cheap `Rc` clone.
//!
//! Frames are keyed by [`ScopeToken`], not by type, so two independently
//! created instances storing the same value type never see each other.

use std::any::Any;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Process-unique key for values provided into a [`Scope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeToken(u64);

impl ScopeToken {
    /// Allocate a token no other call has returned.
    pub fn fresh() -> Self {
        Self(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

struct Frame {
    token: ScopeToken,
    value: Rc<dyn Any>,
    parent: Scope,
}

/// A position in the provisioning tree.
#[derive(Clone, Default)]
pub struct Scope {
    frame: Option<Rc<Frame>>,
}

impl Scope {
    /// The empty scope: nothing is provided.
    pub fn root() -> Self {
        Self::default()
    }

    /// A child scope where `value` is visible under `token`.
    pub fn provide<T: 'static>(&self, token: ScopeToken, value: T) -> Scope {
        Scope {
            frame: Some(Rc::new(Frame {
                token,
                value: Rc::new(value),
                parent: self.clone(),
            })),
        }
    }

    /// The nearest value provided under `token`, if any.
    pub fn lookup<T: 'static>(&self, token: ScopeToken) -> Option<&T> {
        self.frames()
            .find(|frame| frame.token == token)
            .and_then(|frame| frame.value.downcast_ref::<T>())
    }

    /// True when some enclosing frame was provided under `token`.
    pub fn contains(&self, token: ScopeToken) -> bool {
        self.frames().any(|frame| frame.token == token)
    }

    /// Number of frames between this scope and the root.
    pub fn depth(&self) -> usize {
        self.frames().count()
    }

    fn frames(&self) -> impl Iterator<Item = &Frame> {
        std::iter::successors(self.frame.as_deref(), |frame| frame.parent.frame.as_deref())
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens: Vec<u64> = self.frames().map(|frame| frame.token.id()).collect();
        f.debug_struct("Scope").field("tokens", &tokens).finish()
    }
}
