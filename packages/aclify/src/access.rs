//! Pure access evaluation.
//!
//! A requirement names the roles and permissions a piece of UI needs. Each
//! axis is matched against what the user actually holds under its own
//! [`MatchMode`], and both axes must pass. An empty requirement on an axis
//! is vacuously satisfied; an empty user side fails any non-empty
//! requirement.

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Marker for role and permission tokens.
///
/// Tokens are opaque: only set membership matters.
pub trait Token: Clone + Eq + Hash + 'static {}

impl<T: Clone + Eq + Hash + 'static> Token for T {}

/// How required tokens on one axis are matched against the user's tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Every required token must be held
    #[default]
    All,
    /// At least one required token must be held
    Some,
}

impl MatchMode {
    fn is_satisfied<T: Eq + Hash>(self, required: &HashSet<T>, actual: &HashSet<T>) -> bool {
        if required.is_empty() {
            return true;
        }

        match self {
            MatchMode::All => required.is_subset(actual),
            MatchMode::Some => !required.is_disjoint(actual),
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMode::All => write!(f, "all"),
            MatchMode::Some => write!(f, "some"),
        }
    }
}

impl FromStr for MatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(MatchMode::All),
            "some" => Ok(MatchMode::Some),
            other => Err(format!("unknown match mode '{other}' (expected 'all' or 'some')")),
        }
    }
}

/// Per-axis matching policy. Defaults to [`MatchMode::All`] on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ValidationMode {
    #[serde(default)]
    pub roles: MatchMode,
    #[serde(default)]
    pub permissions: MatchMode,
}

impl ValidationMode {
    /// Same mode on both axes.
    pub fn uniform(mode: MatchMode) -> Self {
        Self {
            roles: mode,
            permissions: mode,
        }
    }

    pub fn with_roles(mut self, mode: MatchMode) -> Self {
        self.roles = mode;
        self
    }

    pub fn with_permissions(mut self, mode: MatchMode) -> Self {
        self.permissions = mode;
        self
    }
}

/// Roles and permissions required for access.
#[derive(Debug, Clone)]
pub struct AccessRequirement<R = String, P = String> {
    pub roles: HashSet<R>,
    pub permissions: HashSet<P>,
}

impl<R, P> Default for AccessRequirement<R, P> {
    fn default() -> Self {
        Self {
            roles: HashSet::new(),
            permissions: HashSet::new(),
        }
    }
}

impl<R: Token, P: Token> PartialEq for AccessRequirement<R, P> {
    fn eq(&self, other: &Self) -> bool {
        self.roles == other.roles && self.permissions == other.permissions
    }
}

impl<R: Token, P: Token> Eq for AccessRequirement<R, P> {}

impl<R: Token, P: Token> AccessRequirement<R, P> {
    /// A requirement with nothing specified. Always satisfied.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_roles<T: Into<R>>(mut self, roles: impl IntoIterator<Item = T>) -> Self {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn with_permissions<T: Into<P>>(mut self, permissions: impl IntoIterator<Item = T>) -> Self {
        self.permissions
            .extend(permissions.into_iter().map(Into::into));
        self
    }

    /// True when neither axis requires anything.
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty() && self.permissions.is_empty()
    }
}

/// Roles and permissions a user actually holds.
#[derive(Debug, Clone)]
pub struct UserAccess<R = String, P = String> {
    pub user_roles: HashSet<R>,
    pub user_permissions: HashSet<P>,
}

impl<R, P> Default for UserAccess<R, P> {
    fn default() -> Self {
        Self {
            user_roles: HashSet::new(),
            user_permissions: HashSet::new(),
        }
    }
}

impl<R: Token, P: Token> PartialEq for UserAccess<R, P> {
    fn eq(&self, other: &Self) -> bool {
        self.user_roles == other.user_roles && self.user_permissions == other.user_permissions
    }
}

impl<R: Token, P: Token> Eq for UserAccess<R, P> {}

impl<R: Token, P: Token> UserAccess<R, P> {
    pub fn new<A: Into<R>, B: Into<P>>(
        roles: impl IntoIterator<Item = A>,
        permissions: impl IntoIterator<Item = B>,
    ) -> Self {
        Self {
            user_roles: roles.into_iter().map(Into::into).collect(),
            user_permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }

    /// A user who holds nothing.
    pub fn none() -> Self {
        Self::default()
    }
}

/// Decide whether `actual` satisfies `required` under `mode`.
///
/// Deterministic and side-effect free.
pub fn evaluate<R: Token, P: Token>(
    required: &AccessRequirement<R, P>,
    actual: &UserAccess<R, P>,
    mode: ValidationMode,
) -> bool {
    let has_role = mode.roles.is_satisfied(&required.roles, &actual.user_roles);
    let has_permission = mode
        .permissions
        .is_satisfied(&required.permissions, &actual.user_permissions);

    has_role && has_permission
}

#[cfg(test)]
mod tests {
    use super::*;

    fn require(roles: &[&str], permissions: &[&str]) -> AccessRequirement {
        AccessRequirement::new()
            .with_roles(roles.iter().copied())
            .with_permissions(permissions.iter().copied())
    }

    fn user(roles: &[&str], permissions: &[&str]) -> UserAccess {
        UserAccess::new(roles.iter().copied(), permissions.iter().copied())
    }

    #[test]
    fn test_no_matching_role_or_permission_denies() {
        let required = require(&["admin"], &["read"]);
        let actual = user(&["user"], &["write"]);

        assert!(!evaluate(&required, &actual, ValidationMode::default()));
    }

    #[test]
    fn test_only_permissions_required() {
        let required = require(&[], &["read"]);
        let actual = user(&["user"], &["read"]);

        assert!(evaluate(&required, &actual, ValidationMode::default()));
    }

    #[test]
    fn test_only_roles_required() {
        let required = require(&["user"], &[]);
        let actual = user(&["user"], &["write"]);

        assert!(evaluate(&required, &actual, ValidationMode::default()));
    }

    #[test]
    fn test_nothing_required_is_authorized() {
        let actual = user(&["admin"], &["read"]);
        assert!(evaluate(&AccessRequirement::new(), &actual, ValidationMode::default()));

        // Nothing held either
        assert!(evaluate(
            &AccessRequirement::<String, String>::new(),
            &UserAccess::none(),
            ValidationMode::default()
        ));
    }

    #[test]
    fn test_user_without_tokens_is_denied() {
        let required = require(&["admin"], &["read"]);

        assert!(!evaluate(&required, &UserAccess::none(), ValidationMode::default()));
    }

    #[test]
    fn test_role_axis_alone_is_not_enough() {
        let required = require(&["admin"], &["read"]);
        let actual = user(&["admin"], &["write"]);

        assert!(!evaluate(&required, &actual, ValidationMode::uniform(MatchMode::Some)));
    }

    #[test]
    fn test_all_mode_requires_every_role() {
        let required = require(&["admin", "user"], &[]);
        let mode = ValidationMode::default().with_roles(MatchMode::All);

        assert!(evaluate(&required, &user(&["admin", "user"], &[]), mode));
        assert!(!evaluate(&required, &user(&["admin"], &[]), mode));
    }

    #[test]
    fn test_some_mode_accepts_any_role() {
        let required = require(&["admin", "user"], &[]);
        let mode = ValidationMode::default().with_roles(MatchMode::Some);

        assert!(evaluate(&required, &user(&["admin"], &[]), mode));
        assert!(!evaluate(&required, &user(&["guest"], &[]), mode));
    }

    #[test]
    fn test_permission_modes() {
        let required = require(&[], &["read", "write"]);
        let actual = user(&[], &["read"]);

        let some = ValidationMode::default().with_permissions(MatchMode::Some);
        let all = ValidationMode::default().with_permissions(MatchMode::All);

        assert!(evaluate(&required, &actual, some));
        assert!(!evaluate(&required, &actual, all));
    }

    #[test]
    fn test_admin_required_user_held_is_denied() {
        assert!(!evaluate(
            &require(&["admin"], &[]),
            &user(&["user"], &[]),
            ValidationMode::default()
        ));
    }

    #[test]
    fn test_match_mode_parsing() {
        assert_eq!("ALL".parse::<MatchMode>().unwrap(), MatchMode::All);
        assert_eq!("some".parse::<MatchMode>().unwrap(), MatchMode::Some);
        assert!("any".parse::<MatchMode>().is_err());
        assert_eq!(MatchMode::Some.to_string(), "some");
    }

    #[test]
    fn test_validation_mode_deserializes_partial() {
        let mode: ValidationMode = serde_json::from_str(r#"{"roles":"some"}"#).unwrap();

        assert_eq!(mode.roles, MatchMode::Some);
        assert_eq!(mode.permissions, MatchMode::All);
    }
}
