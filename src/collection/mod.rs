//! Bindings builder.
//!
//! This module contains the [`Bindings`] type: the place where binding
//! rules, constructors and scope declarations are registered before an
//! [`Injector`] is built from them.

use std::sync::Arc;

use crate::config::InjectorConfig;
use crate::descriptors::BindingDescriptor;
use crate::error::DiResult;
use crate::internal::Instance;
use crate::key::{Flavor, TypeKey};
use crate::observer::{InjectionObserver, Observers};
use crate::provider::{Injection, Injector};
use crate::registration::{Binding, BindingRegistry, FactoryFn, Marker, ReadyFn};
use crate::traits::{DefaultHooks, InjectorHooks};

pub mod module_system;
pub use module_system::*;

/// Registration layer of the injector.
///
/// Every method returns `&mut Self` for chaining. Registering a second rule
/// for the same type and flavor replaces the first one.
///
/// # Examples
///
/// ```
/// use ferrous_lazy::{Bindings, Marker, Resolver, Scope};
/// use std::sync::Arc;
///
/// struct Config {
///     url: String,
/// }
///
/// struct Client {
///     config: Arc<Config>,
/// }
///
/// let mut bindings = Bindings::new();
/// bindings
///     .bind_instance(Arc::new(Config { url: "https://example.org".to_string() }))
///     .constructor::<Client, _>(|inj| Ok(Client { config: inj.get::<Config>()? }))
///     .declare::<Client>(Marker::Singleton(Scope::Root));
///
/// let injector = bindings.build().unwrap();
/// let client = injector.get::<Client>().unwrap();
/// assert_eq!(client.config.url, "https://example.org");
/// assert!(Arc::ptr_eq(&client, &injector.get::<Client>().unwrap()));
/// ```
pub struct Bindings {
    registry: BindingRegistry,
    observers: Observers,
    hooks: Option<Arc<dyn InjectorHooks>>,
    config: InjectorConfig,
}

impl Bindings {
    /// Creates an empty set of bindings with the default configuration.
    pub fn new() -> Self {
        Self {
            registry: BindingRegistry::new(),
            observers: Observers::new(),
            hooks: None,
            config: InjectorConfig::default(),
        }
    }

    // ----- Binding rules -----

    /// Redirects requests for `From` to `To`.
    ///
    /// `cast` turns the resolved `To` back into a `From`; for a trait object
    /// it is the unsizing coercion `|t| t as Arc<dyn Trait>`.
    pub fn bind<From, To, F>(&mut self, cast: F) -> &mut Self
    where
        From: ?Sized + Send + Sync + 'static,
        To: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<To>) -> Arc<From> + Send + Sync + 'static,
    {
        self.insert_redirect::<From, To, F>(None, cast)
    }

    /// [`bind`](Bindings::bind) for one flavor of `From`.
    pub fn bind_flavored<From, To, F>(&mut self, flavor: Flavor, cast: F) -> &mut Self
    where
        From: ?Sized + Send + Sync + 'static,
        To: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<To>) -> Arc<From> + Send + Sync + 'static,
    {
        self.insert_redirect::<From, To, F>(Some(flavor), cast)
    }

    fn insert_redirect<From, To, F>(&mut self, flavor: Option<Flavor>, cast: F) -> &mut Self
    where
        From: ?Sized + Send + Sync + 'static,
        To: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<To>) -> Arc<From> + Send + Sync + 'static,
    {
        let binding = Binding::Redirect {
            to: TypeKey::of::<To>(),
            cast: Arc::new(move |instance: &Instance| instance.downcast::<To>().map(|to| Instance::new(cast(to)))),
        };
        self.insert(TypeKey::of::<From>(), flavor, binding)
    }

    /// Binds `T` to one shared value.
    pub fn bind_instance<T>(&mut self, value: Arc<T>) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.insert(TypeKey::of::<T>(), None, Binding::Instance(Instance::new(value)))
    }

    pub fn bind_instance_flavored<T>(&mut self, flavor: Flavor, value: Arc<T>) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.insert(TypeKey::of::<T>(), Some(flavor), Binding::Instance(Instance::new(value)))
    }

    /// Binds `T` to a closure called whenever a new `T` is needed.
    ///
    /// The closure gets the [`Injection`] for the handle being resolved:
    /// it can resolve further dependencies and look at the consumer that
    /// asked. Whether the result is shared is up to the closure and to
    /// the scope declared for `T`.
    pub fn bind_provider<T, F>(&mut self, provider: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Injection<'_>) -> DiResult<Arc<T>> + Send + Sync + 'static,
    {
        self.insert(TypeKey::of::<T>(), None, Binding::Provider(erase(provider)))
    }

    pub fn bind_provider_flavored<T, F>(&mut self, flavor: Flavor, provider: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Injection<'_>) -> DiResult<Arc<T>> + Send + Sync + 'static,
    {
        self.insert(TypeKey::of::<T>(), Some(flavor), Binding::Provider(erase(provider)))
    }

    fn insert(&mut self, from: TypeKey, flavor: Option<Flavor>, binding: Binding) -> &mut Self {
        let kind = binding.kind();
        if let Some(previous) = self.registry.insert(from, flavor, binding) {
            log::warn!(
                "rebinding {}{}: {} replaces {}",
                from.name(),
                flavor.map(|f| format!("#{}", f)).unwrap_or_default(),
                kind,
                previous.kind()
            );
        }
        self
    }

    // ----- Construction -----

    /// Registers how to build a `T` when nothing else produces one.
    pub fn constructor<T, F>(&mut self, constructor: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Injection<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        let factory: FactoryFn = Arc::new(move |injection: &Injection<'_>| {
            constructor(injection).map(|value| Instance::new(Arc::new(value)))
        });
        if self.registry.insert_constructor(TypeKey::of::<T>(), factory) {
            log::warn!("constructor for {} registered twice", std::any::type_name::<T>());
        }
        self
    }

    /// Builds `T` with `T::default()`.
    pub fn constructible<T>(&mut self) -> &mut Self
    where
        T: Default + Send + Sync + 'static,
    {
        self.constructor::<T, _>(|_| Ok(T::default()))
    }

    // ----- Declarations -----

    /// Attaches a scope marker to `T`. A type may carry several markers;
    /// the most specific one decides its scope.
    pub fn declare<T>(&mut self, marker: Marker) -> &mut Self
    where
        T: ?Sized + 'static,
    {
        self.registry.declare(TypeKey::of::<T>(), marker);
        self
    }

    /// Runs `callback` on every `T` the injector builds, and on every `T`
    /// announced to it, once the instance's handles have been replayed.
    ///
    /// Runs on the resolving thread before the instance is handed out. A
    /// panicking callback is logged and does not fail the resolution.
    pub fn on_ready<T, F>(&mut self, callback: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Arc<T>) + Send + Sync + 'static,
    {
        let ready: ReadyFn = Arc::new(move |instance: &Instance| {
            if let Some(value) = instance.downcast::<T>() {
                callback(&value);
            }
        });
        self.registry.insert_ready(TypeKey::of::<T>(), ready);
        self
    }

    // ----- Composition and runtime -----

    /// Applies a [`BindingModule`].
    pub fn add_module<M: BindingModule>(&mut self, module: M) -> DiResult<&mut Self> {
        module.configure(self)?;
        Ok(self)
    }

    /// Adds an observer notified of resolution events.
    ///
    /// # Examples
    ///
    /// ```
    /// use ferrous_lazy::{Bindings, LoggingObserver};
    /// use std::sync::Arc;
    ///
    /// let mut bindings = Bindings::new();
    /// bindings.add_observer(Arc::new(LoggingObserver::new()));
    /// ```
    pub fn add_observer(&mut self, observer: Arc<dyn InjectionObserver>) -> &mut Self {
        self.observers.add(observer);
        self
    }

    /// Replaces the default hooks.
    pub fn with_hooks(&mut self, hooks: Arc<dyn InjectorHooks>) -> &mut Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn with_config(&mut self, config: InjectorConfig) -> &mut Self {
        self.config = config;
        self
    }

    /// Every registration so far, ordered by type name.
    pub fn descriptors(&self) -> Vec<BindingDescriptor> {
        BindingDescriptor::collect(&self.registry)
    }

    /// Builds the injector.
    ///
    /// With `strict` configuration (the default) the bindings are validated
    /// first: redirect cycles, self-redirects, literal instances of the wrong
    /// type and conflicting declarations fail with `DiError::Bind`.
    pub fn build(self) -> DiResult<Injector> {
        if self.config.strict {
            self.registry.validate()?;
        }
        log::debug!(
            "building injector with {} binding rule(s) and {} observer(s)",
            self.registry.rule_count(),
            self.observers.len()
        );
        let hooks = self.hooks.unwrap_or_else(|| Arc::new(DefaultHooks));
        Ok(Injector::new(self.registry, self.observers, hooks, self.config))
    }
}

impl Default for Bindings {
    fn default() -> Self {
        Self::new()
    }
}

fn erase<T, F>(provider: F) -> FactoryFn
where
    T: ?Sized + Send + Sync + 'static,
    F: Fn(&Injection<'_>) -> DiResult<Arc<T>> + Send + Sync + 'static,
{
    Arc::new(move |injection: &Injection<'_>| provider(injection).map(Instance::new))
}
