//! Error types for the lazy injector.

use thiserror::Error;

use crate::lifetime::Scope;

/// Dependency resolution errors
///
/// Every failure the injector can report. None of them are swallowed where
/// they originate: they travel up to the failure hook
/// ([`InjectorHooks::on_failure`](crate::InjectorHooks::on_failure)) and from
/// there, by default, back to whoever called `attain`, `get` or `announce`.
///
/// # Examples
///
/// ```rust
/// use ferrous_lazy::{DiError, Scope};
///
/// let violation = DiError::ScopeViolation {
///     requester: Scope::Root,
///     target: Scope::Component,
///     type_name: "Toolbar",
/// };
/// assert_eq!(violation.to_string(), "Scope violation: Root cannot access Component (Toolbar)");
///
/// let cycle = DiError::Circular(vec!["A", "B", "A"]);
/// assert_eq!(cycle.to_string(), "Circular dependency: A -> B -> A");
/// ```
#[derive(Debug, Clone, Error)]
pub enum DiError {
    /// `get()` ran on a handle whose consumer was never announced, or whose
    /// scope has since been closed.
    #[error("Unable to obtain context for {type_name}: {reason}")]
    UnableToObtainContext {
        type_name: &'static str,
        reason: &'static str,
    },
    /// A dependency lives in a narrower scope than its requester.
    #[error("Scope violation: {requester} cannot access {target} ({type_name})")]
    ScopeViolation {
        requester: Scope,
        target: Scope,
        type_name: &'static str,
    },
    /// No binding produced a value, or producing it failed.
    #[error("Unable to obtain instance of {type_name}: {reason}")]
    UnableToObtainInstance {
        type_name: &'static str,
        reason: String,
        #[source]
        source: Option<Box<DiError>>,
    },
    /// A pending queue was replayed for a parent that has no instance.
    #[error("Invalid parent {0}: no instance to replay pending handles against")]
    InvalidParent(&'static str),
    /// Configuration error in the bindings.
    #[error("Bind failure: {0}")]
    Bind(String),
    /// Type downcast failed
    #[error("Type mismatch for: {0}")]
    TypeMismatch(&'static str),
    /// Circular construction detected (includes path)
    #[error("Circular dependency: {}", .0.join(" -> "))]
    Circular(Vec<&'static str>),
    /// Maximum recursion depth exceeded
    #[error("Max depth {0} exceeded")]
    DepthExceeded(usize),
}

impl DiError {
    pub(crate) fn unattainable(type_name: &'static str, reason: impl Into<String>) -> Self {
        DiError::UnableToObtainInstance {
            type_name,
            reason: reason.into(),
            source: None,
        }
    }

    /// Wraps a failure met while constructing `type_name`. Cycles, depth
    /// overflows and errors already about `type_name` pass through.
    pub(crate) fn wrap_construction(type_name: &'static str, source: DiError) -> Self {
        match source {
            DiError::Circular(_) | DiError::DepthExceeded(_) => source,
            DiError::UnableToObtainInstance { type_name: inner, .. } if inner == type_name => source,
            other => DiError::UnableToObtainInstance {
                type_name,
                reason: "construction failed".to_string(),
                source: Some(Box::new(other)),
            },
        }
    }

    /// Returns true for the context failure a hook may recover from.
    pub fn is_missing_context(&self) -> bool {
        matches!(self, DiError::UnableToObtainContext { .. })
    }
}

/// Result type for resolution operations
///
/// A convenience alias for `Result<T, DiError>`.
///
/// # Examples
///
/// ```rust
/// use ferrous_lazy::{DiResult, DiError};
///
/// fn configure() -> DiResult<()> {
///     Err(DiError::Bind("redirect cycle".to_string()))
/// }
///
/// assert!(configure().is_err());
/// ```
pub type DiResult<T> = Result<T, DiError>;
