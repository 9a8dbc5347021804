//! Lifetime scope definitions and the access rule between them.

use crate::error::{DiError, DiResult};

/// Lifetime scope kinds, ordered by nesting depth (outermost first).
///
/// A scope decides how long a resolved instance is retained and who is
/// allowed to depend on it. `Root`, `Session` and `Component` form a total
/// order; `Unscoped` is special: it never caches and takes on the scope of
/// whoever resolves it first.
///
/// # Examples
///
/// ```rust
/// use ferrous_lazy::Scope;
///
/// // A component may depend on anything with an equal or broader lifetime
/// assert!(Scope::Component.can_access(Scope::Session));
/// assert!(Scope::Component.can_access(Scope::Root));
///
/// // ...but a root-lived object can't hold on to a component-lived one
/// assert!(!Scope::Root.can_access(Scope::Component));
///
/// // Everyone may depend on unscoped objects
/// assert!(Scope::Root.can_access(Scope::Unscoped));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub enum Scope {
    /// Lives for the whole process.
    Root,
    /// Lives for one session (a screen, a window, a connection).
    Session,
    /// Lives for one component nested inside a session.
    Component,
    /// Never cached; lives as long as whoever holds it.
    Unscoped,
}

impl Scope {
    /// Scopes that own cache partitions, outermost first.
    pub const NESTED: [Scope; 3] = [Scope::Root, Scope::Session, Scope::Component];

    /// Nesting depth. `Unscoped` has depth zero and sits outside the order.
    #[inline]
    pub const fn depth(self) -> u8 {
        match self {
            Scope::Unscoped => 0,
            Scope::Root => 1,
            Scope::Session => 2,
            Scope::Component => 3,
        }
    }

    /// Can an object living in `self` depend on an object living in `target`?
    ///
    /// Think of it as a one-to-many relationship: one root cannot pick among
    /// many sessions, but many components can all see the one session that
    /// encloses them.
    #[inline]
    pub fn can_access(self, target: Scope) -> bool {
        if target == Scope::Root || target == Scope::Unscoped {
            return true;
        }
        if self == Scope::Unscoped {
            return false;
        }
        self.depth() >= target.depth()
    }

    /// Returns true for the scopes that own a cache partition.
    #[inline]
    pub fn is_nested(self) -> bool {
        self != Scope::Unscoped
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Scope::Root => "Root",
            Scope::Session => "Session",
            Scope::Component => "Component",
            Scope::Unscoped => "Unscoped",
        };
        f.write_str(name)
    }
}

/// Fails with [`DiError::ScopeViolation`] unless `requester` may depend on `target`.
pub(crate) fn validate_scope(requester: Scope, target: Scope, type_name: &'static str) -> DiResult<()> {
    if requester.can_access(target) {
        Ok(())
    } else {
        Err(DiError::ScopeViolation {
            requester,
            target,
            type_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_and_unscoped_are_open_to_everyone() {
        for requester in [Scope::Root, Scope::Session, Scope::Component, Scope::Unscoped] {
            assert!(requester.can_access(Scope::Root));
            assert!(requester.can_access(Scope::Unscoped));
        }
    }

    #[test]
    fn unscoped_requester_cannot_reach_narrow_scopes() {
        assert!(!Scope::Unscoped.can_access(Scope::Session));
        assert!(!Scope::Unscoped.can_access(Scope::Component));
    }

    #[test]
    fn narrower_may_depend_on_broader_only() {
        assert!(Scope::Session.can_access(Scope::Session));
        assert!(Scope::Component.can_access(Scope::Session));
        assert!(!Scope::Session.can_access(Scope::Component));
        assert!(!Scope::Root.can_access(Scope::Session));
    }

    #[test]
    fn validate_reports_both_sides() {
        let err = validate_scope(Scope::Root, Scope::Component, "Widget").unwrap_err();
        match err {
            DiError::ScopeViolation { requester, target, type_name } => {
                assert_eq!(requester, Scope::Root);
                assert_eq!(target, Scope::Component);
                assert_eq!(type_name, "Widget");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
