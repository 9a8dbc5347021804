//! The injector: attain, resolve, announce.
//!
//! Resolution runs in two phases per handle. *PreProcess* decides where a
//! handle resolves (leaf type, scope, scope instance) as soon as its consumer
//! is known. *PostProcess* runs once an instance exists: it records the
//! instance's lineage and replays every handle that was waiting for it.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Instant;

use crate::cache::{Lineage, ScopeCache};
use crate::config::InjectorConfig;
use crate::error::{DiError, DiResult};
use crate::handle::{Consumer, HandleCell, Lazy, ParentRef, Requester};
use crate::internal::{with_circular_catch, Instance, WeakInstance};
use crate::key::{BindingKey, Flavor, TypeKey};
use crate::lifetime::{validate_scope, Scope};
use crate::observer::Observers;
use crate::registration::{BindingRegistry, FactoryFn, Terminal};
use crate::traits::{FailureContext, InjectorHooks, Recovery, Unannounced};

pub mod context;
pub mod scope;

pub use context::Injection;
pub use scope::{ScopeHandle, ScopeId};
pub(crate) use scope::ScopeArena;

/// Lazy, scope-aware resolver.
///
/// Built by [`Bindings::build`](crate::Bindings::build). Cloning is cheap
/// (the state is shared behind an `Arc`), and every clone sees the same
/// scopes and caches.
///
/// The thread that builds the injector is its *affinity thread*: lookups of
/// external instances on that thread never wait.
///
/// # Examples
///
/// ```
/// use ferrous_lazy::{Bindings, Marker, Resolver, Scope};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// #[derive(Default)]
/// struct English;
///
/// impl Greeter for English {
///     fn greet(&self) -> String {
///         "hello".to_string()
///     }
/// }
///
/// let mut bindings = Bindings::new();
/// bindings
///     .bind::<dyn Greeter, English, _>(|e| e as Arc<dyn Greeter>)
///     .constructible::<English>()
///     .declare::<English>(Marker::Singleton(Scope::Root));
/// let injector = bindings.build().unwrap();
///
/// let a = injector.get::<dyn Greeter>().unwrap();
/// let b = injector.get::<English>().unwrap();
/// assert_eq!(a.greet(), "hello");
/// assert_eq!(Arc::as_ptr(&a) as *const (), Arc::as_ptr(&b) as *const ());
/// ```
pub struct Injector {
    inner: Arc<InjectorInner>,
}

pub(crate) struct InjectorInner {
    pub(crate) registry: BindingRegistry,
    pub(crate) scopes: ScopeArena,
    pub(crate) cache: ScopeCache,
    pub(crate) observers: Observers,
    pub(crate) hooks: Arc<dyn InjectorHooks>,
    pub(crate) config: InjectorConfig,
    root: ScopeId,
    affinity: ThreadId,
}

impl Injector {
    pub(crate) fn new(
        registry: BindingRegistry,
        observers: Observers,
        hooks: Arc<dyn InjectorHooks>,
        config: InjectorConfig,
    ) -> Self {
        let scopes = ScopeArena::new();
        let root = scopes.open_root();
        Self {
            inner: Arc::new(InjectorInner {
                registry,
                scopes,
                cache: ScopeCache::new(),
                observers,
                hooks,
                config,
                root,
                affinity: thread::current().id(),
            }),
        }
    }

    /// Convenience accessor for the shared state
    #[inline]
    pub(crate) fn inner(&self) -> &InjectorInner {
        &self.inner
    }

    /// The root scope. Lives as long as the injector.
    #[inline]
    pub fn root(&self) -> ScopeId {
        self.inner.root
    }

    #[inline]
    pub fn config(&self) -> &InjectorConfig {
        &self.inner.config
    }

    /// True on the thread that built this injector.
    #[inline]
    pub fn in_affinity_thread(&self) -> bool {
        thread::current().id() == self.inner.affinity
    }

    /// Opens a `kind` scope nested in `parent`. `kind` must be strictly
    /// narrower than the parent's kind.
    pub fn open_scope(&self, parent: ScopeId, kind: Scope) -> DiResult<ScopeHandle> {
        let id = self.inner.scopes.open(parent, kind)?;
        log::trace!("opened {} scope {:?} under {:?}", kind, id, parent);
        Ok(ScopeHandle {
            id,
            kind,
            injector: self.clone(),
        })
    }

    pub(crate) fn close_scope(&self, id: ScopeId) {
        let closed = self.inner.scopes.close(id);
        if closed.is_empty() {
            return;
        }
        let evicted = self.inner.cache.evict(&closed);
        self.inner.cache.sweep();
        log::trace!("closed {} scope(s) from {:?}, evicted {} partition(s)", closed.len(), id, evicted);
    }

    /// Deferred handle for `T` requested by `consumer`.
    ///
    /// Never blocks. When the consumer's context is known the handle comes
    /// back preprocessed; otherwise it waits until the consumer is announced
    /// or resolved.
    pub fn attain_for<T, C>(&self, consumer: &C) -> DiResult<Lazy<T>>
    where
        T: ?Sized + Send + Sync + 'static,
        C: Consumer + ?Sized,
    {
        self.attain_for_flavored::<T, C>(consumer, None)
    }

    pub fn attain_for_flavored<T, C>(&self, consumer: &C, flavor: Option<Flavor>) -> DiResult<Lazy<T>>
    where
        T: ?Sized + Send + Sync + 'static,
        C: Consumer + ?Sized,
    {
        let cell = self.attain_cell(consumer.requester(), TypeKey::of::<T>(), flavor)?;
        Ok(Lazy::from_cell(cell))
    }

    fn attain_cell(&self, requester: Requester, requested: TypeKey, flavor: Option<Flavor>) -> DiResult<Arc<HandleCell>> {
        let inner = self.inner();
        let cell = Arc::new(HandleCell::with_parent(requested, flavor, requester.0.clone()));

        let lineage = match &requester.0 {
            ParentRef::Scope(id) => match inner.scopes.kind(*id) {
                Some(kind) => Some(Lineage { scope: kind, context: *id }),
                None => {
                    let error = DiError::UnableToObtainContext {
                        type_name: requested.name(),
                        reason: "consumer scope is closed",
                    };
                    return self.recover_into(&cell, error).map(|()| cell);
                }
            },
            ParentRef::Handle(parent) => parent.upgrade().and_then(|p| p.lineage()),
            ParentRef::Instance(parent) => inner.cache.lineage_or_enqueue(parent, &cell),
        };

        if let Some(lineage) = lineage {
            if inner.observers.has_observers() {
                inner.observers.attained(requested, false);
            }
            if let Err(error) = self.preprocess(&cell, lineage) {
                self.recover_into(&cell, error)?;
            }
            return Ok(cell);
        }

        if let ParentRef::Instance(parent) = &requester.0 {
            if let Some(Err(error)) = self.ignite_unannounced(parent) {
                if cell.lineage().is_none() && cell.failure().is_none() {
                    self.recover_into(&cell, error)?;
                }
            }
        }
        let deferred = cell.lineage().is_none();
        if deferred {
            log::trace!("deferred {} until its consumer is known", requested.name());
        }
        if inner.observers.has_observers() {
            inner.observers.attained(requested, deferred);
        }
        Ok(cell)
    }

    /// Asks the hooks where a consumer nobody announced lives, and announces
    /// it there. `None` when the consumer is gone or the hooks don't know.
    fn ignite_unannounced(&self, parent: &WeakInstance) -> Option<DiResult<()>> {
        let consumer = parent.upgrade()?;
        let context = self.inner.hooks.provide_context(&Unannounced(&consumer))?;
        log::debug!("hooks placed unannounced {:?} in {:?}", consumer, context);
        Some(self.announce_instance(context, consumer))
    }

    /// Leaf, scope and scope instance of `cell`, given its consumer's lineage.
    fn preprocess(&self, cell: &Arc<HandleCell>, parent: Lineage) -> DiResult<()> {
        let inner = self.inner();
        let requested = cell.requested();
        let leaf = inner.registry.resolve_leaf(requested, cell.flavor())?;
        let declaration = inner.registry.declaration(leaf);

        // Lineages always name a nested scope, so unscoped types land in one.
        let scope = match declaration.map_or(Scope::Unscoped, |d| d.scope()) {
            Scope::Unscoped => parent.scope,
            declared => declared,
        };
        validate_scope(parent.scope, scope, requested.name())?;

        let context = inner
            .scopes
            .ancestor_of_kind(parent.context, scope)
            .ok_or(DiError::UnableToObtainContext {
                type_name: requested.name(),
                reason: "no enclosing scope of the required kind is open",
            })?;

        let weak_ref = declaration.is_some_and(|d| d.is_owner_like());
        cell.preprocessed(leaf, Lineage { scope, context }, weak_ref);

        if declaration.is_some_and(|d| d.is_external()) {
            let key = BindingKey::new(leaf, cell.flavor());
            if inner.cache.get(scope, context, &key).is_none() {
                log::debug!("requesting start of external {}", key);
                inner.hooks.on_start_requested(&key);
            }
        }
        Ok(())
    }

    /// Routes `error` through the failure hook. `Ok(())` means the hook
    /// supplied a context and `cell` was preprocessed in it.
    fn recover_into(&self, cell: &Arc<HandleCell>, error: DiError) -> DiResult<()> {
        let context = self.recover(cell, error)?;
        let kind = self.inner.scopes.kind(context).ok_or(DiError::UnableToObtainContext {
            type_name: cell.requested().name(),
            reason: "recovery scope is closed",
        })?;
        self.preprocess(cell, Lineage { scope: kind, context })
    }

    fn recover(&self, cell: &Arc<HandleCell>, error: DiError) -> DiResult<ScopeId> {
        match self.notify_failure(Some(cell), &error) {
            Recovery::UseContext(context) if error.is_missing_context() => {
                log::debug!("recovering from `{}` in {:?}", error, context);
                Ok(context)
            }
            _ => Err(error),
        }
    }

    fn notify_failure(&self, cell: Option<&Arc<HandleCell>>, error: &DiError) -> Recovery {
        let inner = self.inner();
        if inner.observers.has_observers() {
            inner.observers.failure(error);
        }
        inner.hooks.on_failure(&FailureContext {
            error,
            handle: cell.map(|c| c.info()),
        })
    }

    /// Resolves a handle to an instance of its requested type.
    pub(crate) fn resolve_handle(&self, cell: &Arc<HandleCell>) -> DiResult<Instance> {
        match self.try_resolve(cell) {
            Ok(instance) => Ok(instance),
            Err(error) => {
                self.recover_into(cell, error)?;
                self.try_resolve(cell).inspect_err(|e| {
                    if self.inner.observers.has_observers() {
                        self.inner.observers.failure(e);
                    }
                })
            }
        }
    }

    fn try_resolve(&self, cell: &Arc<HandleCell>) -> DiResult<Instance> {
        if let Some(instance) = cell.instance() {
            return Ok(instance);
        }
        if let Some(error) = cell.failure() {
            return Err(error);
        }

        if cell.lineage().is_none() {
            // The consumer may have become known after this handle was queued.
            if let Some(ParentRef::Instance(parent)) = cell.parent() {
                match self.inner.cache.lineage_of(parent.addr()) {
                    Some(lineage) => self.preprocess(cell, lineage)?,
                    None if !parent.is_alive() => {
                        return Err(DiError::InvalidParent(parent.type_key().name()));
                    }
                    None => {
                        if let Some(ignited) = self.ignite_unannounced(&parent) {
                            if let Some(error) = cell.failure() {
                                return Err(error);
                            }
                            if cell.lineage().is_none() {
                                ignited?;
                                if let Some(lineage) = self.inner.cache.lineage_of(parent.addr()) {
                                    self.preprocess(cell, lineage)?;
                                }
                            }
                        }
                    }
                }
            }
        }
        let lineage = cell.lineage().ok_or(DiError::UnableToObtainContext {
            type_name: cell.requested().name(),
            reason: "consumer was never announced",
        })?;
        if !self.inner.scopes.is_open(lineage.context) {
            return Err(DiError::UnableToObtainContext {
                type_name: cell.requested().name(),
                reason: "scope was closed before the handle resolved",
            });
        }

        let instance = self.attain_instance(cell, lineage)?;
        let projected = self
            .inner
            .registry
            .project(cell.requested(), cell.flavor(), instance)?;
        cell.fill(projected.clone());
        cell.postprocessed();
        Ok(projected)
    }

    fn is_cacheable(&self, scope: Scope) -> bool {
        match scope {
            Scope::Root | Scope::Session => true,
            Scope::Component => self.inner.config.cache_component_scope,
            Scope::Unscoped => false,
        }
    }

    fn attain_instance(&self, cell: &Arc<HandleCell>, lineage: Lineage) -> DiResult<Instance> {
        let inner = self.inner();
        let key = cell.key().ok_or(DiError::UnableToObtainContext {
            type_name: cell.requested().name(),
            reason: "handle was not preprocessed",
        })?;
        let declaration = inner.registry.declaration(key.leaf());

        if let Some(kind) = declaration.and_then(|d| d.owner_kind()) {
            let owner = inner
                .scopes
                .ancestor_of_kind(lineage.context, kind)
                .and_then(|id| inner.scopes.owner(id));
            match owner {
                Some(owner) => return Ok(owner),
                None if !declaration.is_some_and(|d| d.is_external()) => {
                    return Err(DiError::unattainable(
                        key.display_name(),
                        format!("no owner announced for the enclosing {} scope", kind),
                    ));
                }
                None => {}
            }
        }

        if declaration.is_some_and(|d| d.is_external()) {
            return self.await_external(&key, lineage);
        }

        let cacheable = self.is_cacheable(lineage.scope);
        if cacheable {
            if let Some(hit) = inner.cache.get(lineage.scope, lineage.context, &key) {
                return Ok(hit);
            }
        }

        if !declaration.is_some_and(|d| d.is_singleton()) {
            return with_circular_catch(key, || self.obtain(cell, key, lineage));
        }

        with_circular_catch(key, || {
            let lock = inner.cache.build_lock(key);
            let _guard = lock.lock();

            // Another thread may have finished while this one waited.
            if cacheable {
                if let Some(hit) = inner.cache.get(lineage.scope, lineage.context, &key) {
                    return Ok(hit);
                }
            }

            let fresh = self.obtain(cell, key, lineage)?;
            let stored = if cacheable {
                inner.cache.put(lineage.scope, lineage.context, key, fresh)
            } else {
                fresh
            };
            inner.hooks.on_new_singleton(&key);
            Ok(stored)
        })
    }

    /// Waits for an external instance to be announced. The affinity thread
    /// never waits.
    fn await_external(&self, key: &BindingKey, lineage: Lineage) -> DiResult<Instance> {
        let inner = self.inner();
        if let Some(hit) = inner.cache.get(lineage.scope, lineage.context, key) {
            return Ok(hit);
        }
        if self.in_affinity_thread() {
            return Err(DiError::unattainable(key.display_name(), "external instance not started yet"));
        }

        let interval = inner.config.poll_interval();
        let ceiling = inner.config.poll_ceiling();
        let started = Instant::now();
        while started.elapsed() < ceiling {
            thread::sleep(interval);
            if let Some(hit) = inner.cache.get(lineage.scope, lineage.context, key) {
                return Ok(hit);
            }
        }
        Err(DiError::unattainable(
            key.display_name(),
            format!("external instance not announced within {:?}", ceiling),
        ))
    }

    /// Produces a fresh instance for `cell` and postprocesses it.
    fn obtain(&self, cell: &Arc<HandleCell>, key: BindingKey, lineage: Lineage) -> DiResult<Instance> {
        let inner = self.inner();
        let observed = inner.observers.has_observers();
        if observed {
            inner.observers.resolving(&key);
        }
        let started = Instant::now();
        let injection = Injection::new(self, cell);

        let (produced, fresh) = match inner.registry.terminal(cell.requested(), cell.flavor())? {
            Terminal::Literal { instance, .. } => (instance.clone(), false),
            Terminal::Provider { factory, .. } => (self.construct(&key, factory, &injection)?, true),
            Terminal::Leaf { ty, redirected } => {
                let permitted = redirected || inner.registry.is_singleton(ty) || inner.config.allow_anonymous;
                match inner.registry.constructor(ty).filter(|_| permitted) {
                    Some(constructor) => (self.construct(&key, constructor, &injection)?, true),
                    None => match inner.hooks.on_unattainable(&key, &injection) {
                        Some(supplied) => (supplied.0, true),
                        None if permitted => {
                            return Err(DiError::unattainable(ty.name(), "no binding or constructor registered"));
                        }
                        None => {
                            return Err(DiError::unattainable(ty.name(), "anonymous construction is disabled"));
                        }
                    },
                }
            }
        };

        self.postprocess(cell, &produced, lineage);
        if fresh {
            self.notify_ready(&produced);
        }
        if observed {
            inner.observers.resolved(&key, started.elapsed());
        }
        Ok(produced)
    }

    /// Runs the ready callbacks registered for `instance`'s type.
    fn notify_ready(&self, instance: &Instance) {
        for callback in self.inner.registry.ready(instance.type_key()) {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(instance))) {
                log::error!("ready callback for {:?} panicked: {}", instance, panic_message(&*payload));
            }
        }
    }

    fn construct(&self, key: &BindingKey, factory: &FactoryFn, injection: &Injection<'_>) -> DiResult<Instance> {
        match panic::catch_unwind(AssertUnwindSafe(|| factory(injection))) {
            Ok(Ok(instance)) => Ok(instance),
            Ok(Err(error)) => Err(DiError::wrap_construction(key.display_name(), error)),
            Err(payload) => {
                let message = panic_message(&*payload);
                self.inner.observers.factory_panic(key, &message);
                Err(DiError::unattainable(key.display_name(), format!("constructor panicked: {}", message)))
            }
        }
    }

    /// Records where `instance` lives and replays the handles waiting on it.
    /// Replay failures stay on the replayed handles.
    fn postprocess(&self, cell: &Arc<HandleCell>, instance: &Instance, lineage: Lineage) {
        let (effective, waiting) = self.inner.cache.record(&instance.downgrade(), lineage);
        cell.postprocessed();
        if let Some(error) = self.replay(waiting, effective) {
            log::warn!("replay after building {} failed: {}", cell.requested().name(), error);
        }
    }

    /// Preprocesses each waiting handle against `lineage`. Returns the first
    /// failure; every failure is also recorded on its handle.
    fn replay(&self, waiting: crate::cache::Waiting, lineage: Lineage) -> Option<DiError> {
        let mut first = None;
        for child in waiting.iter().filter_map(|w| w.upgrade()) {
            match self.preprocess(&child, lineage) {
                Ok(()) => {
                    if self.inner.observers.has_observers() {
                        self.inner.observers.replayed(child.requested(), lineage.scope);
                    }
                }
                Err(error) => {
                    child.set_failure(error.clone());
                    first.get_or_insert(error);
                }
            }
        }
        first
    }

    /// Reports that `instance` already exists and lives in `context`.
    ///
    /// Handles that were waiting on `instance` as their consumer are
    /// replayed. An instance of a type declared `Owner(kind)` announced in a
    /// scope of that kind becomes the scope's owner; an external instance is
    /// stored in the cache.
    pub fn announce<C>(&self, context: ScopeId, instance: &Arc<C>) -> DiResult<()>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.announce_instance(context, Instance::new(instance.clone()))
            .inspect_err(|error| {
                self.notify_failure(None, error);
            })
    }

    fn announce_instance(&self, context: ScopeId, instance: Instance) -> DiResult<()> {
        let inner = self.inner();
        let ty = instance.type_key();
        let kind = inner.scopes.kind(context).ok_or(DiError::UnableToObtainContext {
            type_name: ty.name(),
            reason: "announced into a closed scope",
        })?;

        let declaration = inner.registry.declaration(ty);
        let scope = match declaration.map_or(Scope::Unscoped, |d| d.scope()) {
            Scope::Unscoped => kind,
            declared => declared,
        };
        // The announcing scope must be allowed to hold the instance.
        validate_scope(kind, scope, ty.name())?;
        let owner_scope = inner
            .scopes
            .ancestor_of_kind(context, scope)
            .ok_or(DiError::UnableToObtainContext {
                type_name: ty.name(),
                reason: "no enclosing scope of the declared kind is open",
            })?;

        if declaration.and_then(|d| d.owner_kind()) == Some(kind) {
            inner.scopes.set_owner(context, instance.downgrade())?;
        }
        if declaration.is_some_and(|d| d.is_external()) {
            inner.cache.put(scope, owner_scope, BindingKey::new(ty, None), instance.clone());
        }

        let (lineage, waiting) = inner.cache.record(
            &instance.downgrade(),
            Lineage {
                scope,
                context: owner_scope,
            },
        );
        log::trace!("announced {:?} in {:?}, replaying {} handle(s)", instance, owner_scope, waiting.len());
        let replayed = self.replay(waiting, lineage);
        self.notify_ready(&instance);
        match replayed {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Cached instance of `T` visible from `context`. Never builds anything.
    pub fn find<T>(&self, context: ScopeId, flavor: Option<Flavor>) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let inner = self.inner();
        let requested = TypeKey::of::<T>();
        let leaf = inner.registry.resolve_leaf(requested, flavor).ok()?;
        let scope = inner.registry.scope_of(leaf);
        if !scope.is_nested() {
            return None;
        }
        let owner_scope = inner.scopes.ancestor_of_kind(context, scope)?;
        let cached = inner.cache.get(scope, owner_scope, &BindingKey::new(leaf, flavor))?;
        inner.registry.project(requested, flavor, cached).ok()?.downcast::<T>()
    }

    /// Handles waiting for a consumer to be announced.
    pub fn pending_count(&self) -> usize {
        self.inner.cache.pending_count()
    }

    /// Number of instances currently cached across all scopes.
    pub fn cached_count(&self) -> usize {
        self.inner.cache.entry_count()
    }

    /// Number of open scopes, the root included.
    pub fn scope_count(&self) -> usize {
        self.inner.scopes.open_count()
    }

    /// Human-readable dump of bindings, declarations and cache state.
    #[cfg(feature = "diagnostics")]
    pub fn to_debug_string(&self) -> String {
        use std::fmt::Write;

        let inner = self.inner();
        let mut s = String::new();
        s.push_str("=== Injector Debug ===\n");
        s.push_str("Bindings:\n");
        for ((from, flavor), binding) in inner.registry.rules() {
            match flavor {
                Some(flavor) => {
                    let _ = writeln!(s, "  {}#{}: {}", from.name(), flavor, binding.kind());
                }
                None => {
                    let _ = writeln!(s, "  {}: {}", from.name(), binding.kind());
                }
            }
        }
        s.push_str("Constructors:\n");
        for ty in inner.registry.constructors() {
            let _ = writeln!(s, "  {}", ty.name());
        }
        s.push_str("Declarations:\n");
        for (ty, declaration) in inner.registry.declarations() {
            let _ = writeln!(s, "  {}: {:?}", ty.name(), declaration.markers());
        }
        let _ = writeln!(
            s,
            "Scopes: {} open, {} partition(s), {} cached, {} pending",
            inner.scopes.open_count(),
            inner.cache.partition_count(),
            inner.cache.entry_count(),
            inner.cache.pending_count()
        );
        s
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

impl Clone for Injector {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl std::fmt::Debug for Injector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Injector")
            .field("bindings", &self.inner.registry.rule_count())
            .field("scopes", &self.inner.scopes.open_count())
            .field("observers", &self.inner.observers.len())
            .finish()
    }
}
