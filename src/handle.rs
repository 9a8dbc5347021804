//! Deferred handles and the consumers that request them.

use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::cache::Lineage;
use crate::error::{DiError, DiResult};
use crate::internal::{Instance, WeakInstance};
use crate::key::{BindingKey, Flavor, TypeKey};
use crate::lifetime::Scope;
use crate::provider::{Injection, Injector, ScopeHandle, ScopeId};

/// Lifecycle of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Requested type known, nothing else. The consumer's context was not
    /// known yet, so the handle waits in the pending queue.
    Created,
    /// Leaf type and scope resolved and validated against the consumer.
    PreProcessed,
    /// An instance was obtained and the handles waiting on it were replayed.
    PostProcessed,
}

/// Reference a handle keeps to its resolved instance.
#[derive(Clone)]
pub(crate) enum Slot {
    Strong(Instance),
    /// Scope-owner-like instances are not kept alive by their dependents.
    Weak(WeakInstance),
}

impl Slot {
    fn get(&self) -> Option<Instance> {
        match self {
            Slot::Strong(instance) => Some(instance.clone()),
            Slot::Weak(weak) => weak.upgrade(),
        }
    }
}

/// Whoever asked for a handle.
#[derive(Clone)]
pub(crate) enum ParentRef {
    Scope(ScopeId),
    Instance(WeakInstance),
    /// A handle whose instance is being built right now.
    Handle(Weak<HandleCell>),
}

pub(crate) struct HandleState {
    pub(crate) phase: Phase,
    pub(crate) leaf: Option<TypeKey>,
    pub(crate) scope: Scope,
    pub(crate) context: Option<ScopeId>,
    pub(crate) weak_ref: bool,
    pub(crate) instance: Option<Slot>,
    pub(crate) parent: Option<ParentRef>,
    pub(crate) failure: Option<DiError>,
}

/// Shared state behind a [`Lazy`].
pub(crate) struct HandleCell {
    requested: TypeKey,
    flavor: Option<Flavor>,
    state: Mutex<HandleState>,
}

impl HandleCell {
    pub(crate) fn new(requested: TypeKey, flavor: Option<Flavor>) -> Self {
        Self {
            requested,
            flavor,
            state: Mutex::new(HandleState {
                phase: Phase::Created,
                leaf: None,
                scope: Scope::Unscoped,
                context: None,
                weak_ref: false,
                instance: None,
                parent: None,
                failure: None,
            }),
        }
    }

    pub(crate) fn with_parent(requested: TypeKey, flavor: Option<Flavor>, parent: ParentRef) -> Self {
        let cell = Self::new(requested, flavor);
        cell.state.lock().parent = Some(parent);
        cell
    }

    #[inline]
    pub(crate) fn requested(&self) -> TypeKey {
        self.requested
    }

    #[inline]
    pub(crate) fn flavor(&self) -> Option<Flavor> {
        self.flavor
    }

    pub(crate) fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    pub(crate) fn parent(&self) -> Option<ParentRef> {
        self.state.lock().parent.clone()
    }

    /// Cache key, once the leaf is known.
    pub(crate) fn key(&self) -> Option<BindingKey> {
        self.state.lock().leaf.map(|leaf| BindingKey::new(leaf, self.flavor))
    }

    /// Scope and context of a handle that got past `Created`.
    pub(crate) fn lineage(&self) -> Option<Lineage> {
        let state = self.state.lock();
        match (state.phase, state.context) {
            (Phase::Created, _) | (_, None) => None,
            (_, Some(context)) => Some(Lineage { scope: state.scope, context }),
        }
    }

    pub(crate) fn instance(&self) -> Option<Instance> {
        self.state.lock().instance.as_ref().and_then(Slot::get)
    }

    pub(crate) fn failure(&self) -> Option<DiError> {
        self.state.lock().failure.clone()
    }

    pub(crate) fn set_failure(&self, error: DiError) {
        self.state.lock().failure = Some(error);
    }

    pub(crate) fn preprocessed(&self, leaf: TypeKey, lineage: Lineage, weak_ref: bool) {
        let mut state = self.state.lock();
        state.leaf = Some(leaf);
        state.scope = lineage.scope;
        state.context = Some(lineage.context);
        state.weak_ref = weak_ref;
        state.failure = None;
        if state.phase == Phase::Created {
            state.phase = Phase::PreProcessed;
        }
    }

    /// Stores the instance (already projected to the requested type).
    pub(crate) fn fill(&self, instance: Instance) {
        let mut state = self.state.lock();
        state.instance = Some(if state.weak_ref {
            Slot::Weak(instance.downgrade())
        } else {
            Slot::Strong(instance)
        });
    }

    pub(crate) fn postprocessed(&self) {
        self.state.lock().phase = Phase::PostProcessed;
    }

    pub(crate) fn info(&self) -> HandleInfo {
        let state = self.state.lock();
        HandleInfo {
            requested: self.requested,
            flavor: self.flavor,
            phase: state.phase,
            leaf: state.leaf,
            scope: (state.phase != Phase::Created).then_some(state.scope),
            context: state.context,
            failed: state.failure.is_some(),
        }
    }
}

/// Snapshot of a handle's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleInfo {
    pub requested: TypeKey,
    pub flavor: Option<Flavor>,
    pub phase: Phase,
    /// Concrete type the requested type resolved to.
    pub leaf: Option<TypeKey>,
    /// Scope the handle resolved to; `None` while `Created`.
    pub scope: Option<Scope>,
    /// Scope instance the handle resolves in.
    pub context: Option<ScopeId>,
    /// A replay failure is recorded on the handle.
    pub failed: bool,
}

/// A deferred dependency.
///
/// Returned at once by every `attain` call, before anything is built. The
/// first successful [`get`](Lazy::get) resolves the instance and every later
/// call returns the same one. The handle holds no reference to the injector,
/// so it can be stored in the consumer that requested it.
///
/// # Examples
///
/// ```
/// use ferrous_lazy::{Bindings, Lazy, Phase, Resolver};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Clock;
///
/// let mut bindings = Bindings::new();
/// bindings.constructible::<Clock>();
/// let injector = bindings.build().unwrap();
///
/// let clock: Lazy<Clock> = injector.attain::<Clock>().unwrap();
/// assert_eq!(clock.phase(), Phase::PreProcessed);
///
/// let a = clock.get(&injector).unwrap();
/// let b = clock.get(&injector).unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// assert_eq!(clock.phase(), Phase::PostProcessed);
/// ```
pub struct Lazy<T: ?Sized> {
    pub(crate) cell: Arc<HandleCell>,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> Lazy<T> {
    pub(crate) fn from_cell(cell: Arc<HandleCell>) -> Self {
        Self {
            cell,
            _marker: PhantomData,
        }
    }

    /// Resolves the instance, building it if needed.
    ///
    /// Fails with `UnableToObtainContext` while the consumer that requested
    /// this handle has not been announced and the hooks cannot place it
    /// (see [`InjectorHooks::provide_context`](crate::InjectorHooks::provide_context)).
    pub fn get(&self, injector: &Injector) -> DiResult<Arc<T>> {
        let instance = injector.resolve_handle(&self.cell)?;
        instance
            .downcast::<T>()
            .ok_or(DiError::TypeMismatch(std::any::type_name::<T>()))
    }

    /// [`get`](Lazy::get) against the process-wide injector.
    pub fn get_installed(&self) -> DiResult<Arc<T>> {
        self.get(&crate::global::installed()?)
    }

    /// The instance, if one has been obtained and is still alive. Never builds.
    pub fn peek(&self) -> Option<Arc<T>> {
        self.cell.instance()?.downcast::<T>()
    }

    pub fn phase(&self) -> Phase {
        self.cell.phase()
    }

    /// True once the handle knows where it resolves.
    pub fn is_ready(&self) -> bool {
        self.phase() >= Phase::PreProcessed
    }

    pub fn info(&self) -> HandleInfo {
        self.cell.info()
    }
}

impl<T: ?Sized> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.cell.state.lock();
        f.debug_struct("Lazy")
            .field("requested", &self.cell.requested)
            .field("flavor", &self.cell.flavor)
            .field("phase", &state.phase)
            .field("scope", &state.scope)
            .finish()
    }
}

/// Opaque identity of a consumer, produced by [`Consumer::requester`].
#[derive(Clone)]
pub struct Requester(pub(crate) ParentRef);

/// Anything that can request dependencies.
///
/// Implemented for `Arc<C>` and `Weak<C>` of any type (a `Weak` lets a
/// value attain its dependencies inside `Arc::new_cyclic`, before it
/// exists), for scopes ([`ScopeHandle`], [`ScopeId`], the [`Injector`] as the
/// root scope) and for the factory context [`Injection`].
///
/// # Examples
///
/// ```
/// use ferrous_lazy::{Bindings, Lazy, Phase, Scope};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Clock;
///
/// struct Screen {
///     clock: Lazy<Clock>,
/// }
///
/// let mut bindings = Bindings::new();
/// bindings.constructible::<Clock>();
/// let injector = bindings.build().unwrap();
/// let session = injector.open_scope(injector.root(), Scope::Session).unwrap();
///
/// let screen = Arc::new_cyclic(|me| Screen {
///     clock: injector.attain_for::<Clock, _>(me).unwrap(),
/// });
/// assert_eq!(screen.clock.phase(), Phase::Created);
///
/// session.announce(&screen).unwrap();
/// assert!(screen.clock.get(&injector).is_ok());
/// ```
pub trait Consumer {
    fn requester(&self) -> Requester;
}

impl<C: ?Sized + Send + Sync + 'static> Consumer for Arc<C> {
    fn requester(&self) -> Requester {
        Requester(ParentRef::Instance(WeakInstance::from_weak(Arc::downgrade(self))))
    }
}

impl<C: ?Sized + Send + Sync + 'static> Consumer for Weak<C> {
    fn requester(&self) -> Requester {
        Requester(ParentRef::Instance(WeakInstance::from_weak(self.clone())))
    }
}

impl Consumer for ScopeId {
    fn requester(&self) -> Requester {
        Requester(ParentRef::Scope(*self))
    }
}

impl Consumer for ScopeHandle {
    fn requester(&self) -> Requester {
        Requester(ParentRef::Scope(self.id()))
    }
}

impl Consumer for Injector {
    fn requester(&self) -> Requester {
        Requester(ParentRef::Scope(self.root()))
    }
}

impl Consumer for Injection<'_> {
    fn requester(&self) -> Requester {
        Requester(ParentRef::Handle(Arc::downgrade(self.cell())))
    }
}
