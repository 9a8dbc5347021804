//! Override points for applications embedding the injector.

use std::sync::Arc;

use crate::error::DiError;
use crate::handle::HandleInfo;
use crate::internal::Instance;
use crate::key::{BindingKey, TypeKey};
use crate::provider::{Injection, ScopeId};

/// What to do with a failure that reached the top of the injector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Return the error to the caller.
    Propagate,
    /// Resolve the failing handle in this scope instead. Only honoured for
    /// `UnableToObtainContext` failures of a handle.
    UseContext(ScopeId),
}

/// A failure on its way out of the injector.
#[derive(Debug)]
pub struct FailureContext<'a> {
    pub error: &'a DiError,
    /// The handle that failed, when there is one.
    pub handle: Option<HandleInfo>,
}

/// A value handed to the injector by [`InjectorHooks::on_unattainable`].
///
/// Must be an instance of the leaf type the key names, or of a type the
/// requested type redirects to.
pub struct Supplied(pub(crate) Instance);

impl Supplied {
    pub fn new<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self(Instance::new(value))
    }
}

/// A consumer that attained dependencies but was never announced.
///
/// Handed to [`InjectorHooks::provide_context`] so the application can map
/// it to the scope it lives in.
pub struct Unannounced<'a>(pub(crate) &'a Instance);

impl Unannounced<'_> {
    /// Type the consumer was created as.
    pub fn type_key(&self) -> TypeKey {
        self.0.type_key()
    }

    /// The consumer itself, if it is a `T`.
    pub fn downcast<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.0.downcast::<T>()
    }
}

/// Application callbacks. Every method has a default.
///
/// # Examples
///
/// ```
/// use ferrous_lazy::{
///     Bindings, DiError, FailureContext, InjectorHooks, Recovery, Resolver,
/// };
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// #[derive(Default)]
/// struct CountFailures(AtomicUsize);
///
/// impl InjectorHooks for CountFailures {
///     fn on_failure(&self, _failure: &FailureContext<'_>) -> Recovery {
///         self.0.fetch_add(1, Ordering::SeqCst);
///         Recovery::Propagate
///     }
/// }
///
/// struct Unbuildable;
///
/// let hooks = Arc::new(CountFailures::default());
/// let mut bindings = Bindings::new();
/// bindings.with_hooks(hooks.clone());
/// let injector = bindings.build().unwrap();
///
/// assert!(injector.get::<Unbuildable>().is_err());
/// assert_eq!(hooks.0.load(Ordering::SeqCst), 1);
/// ```
pub trait InjectorHooks: Send + Sync {
    /// Called for every failure reaching the top of `attain`, `get` or
    /// `announce`. The default propagates.
    fn on_failure(&self, failure: &FailureContext<'_>) -> Recovery {
        let _ = failure;
        Recovery::Propagate
    }

    /// Last chance to produce a value when no binding, provider or
    /// constructor applies.
    fn on_unattainable(&self, key: &BindingKey, injection: &Injection<'_>) -> Option<Supplied> {
        let _ = (key, injection);
        None
    }

    /// Scope a consumer lives in, for consumers the application never
    /// announces. Consulted when such a consumer attains a dependency and
    /// again when one of its handles is resolved. A returned scope counts
    /// as an announcement of the consumer in that scope.
    fn provide_context(&self, consumer: &Unannounced<'_>) -> Option<ScopeId> {
        let _ = consumer;
        None
    }

    /// A scope singleton was just built and cached.
    fn on_new_singleton(&self, key: &BindingKey) {
        let _ = key;
    }

    /// An external type was requested before anything announced it. The
    /// application should start it; `get()` waits for the announcement.
    fn on_start_requested(&self, key: &BindingKey) {
        let _ = key;
    }
}

pub(crate) struct DefaultHooks;

impl InjectorHooks for DefaultHooks {}
