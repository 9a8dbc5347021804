//! Resolver trait: request dependencies on behalf of a scope or a factory.

use std::sync::Arc;

use crate::error::DiResult;
use crate::handle::{Consumer, Lazy};
use crate::key::Flavor;
use crate::provider::{Injection, Injector, ScopeHandle};

/// Requests dependencies with `self` as the consumer.
///
/// Implemented by the [`Injector`] (the root scope), by every
/// [`ScopeHandle`] and by the factory context [`Injection`]. Since each of
/// these already knows its own context, handles they attain are always
/// preprocessed on the spot.
///
/// # Examples
///
/// ```
/// use ferrous_lazy::{Bindings, Marker, Resolver, Scope};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Registry;
///
/// struct Cart {
///     registry: Arc<Registry>,
/// }
///
/// let mut bindings = Bindings::new();
/// bindings
///     .constructible::<Registry>()
///     .declare::<Registry>(Marker::Singleton(Scope::Root))
///     .constructor::<Cart, _>(|inj| Ok(Cart { registry: inj.get::<Registry>()? }));
/// let injector = bindings.build().unwrap();
///
/// let cart = injector.get::<Cart>().unwrap();
/// assert!(Arc::ptr_eq(&cart.registry, &injector.get::<Registry>().unwrap()));
/// ```
pub trait Resolver: Consumer {
    /// The injector requests are sent to.
    fn injector(&self) -> &Injector;

    /// Deferred handle for `T` with an optional flavor.
    fn attain_flavored<T>(&self, flavor: Option<Flavor>) -> DiResult<Lazy<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.injector().attain_for_flavored::<T, Self>(self, flavor)
    }

    /// Deferred handle for `T`.
    fn attain<T>(&self) -> DiResult<Lazy<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.attain_flavored::<T>(None)
    }

    /// Resolves `T` with an optional flavor right away.
    fn get_flavored<T>(&self, flavor: Option<Flavor>) -> DiResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.attain_flavored::<T>(flavor)?.get(self.injector())
    }

    /// Resolves `T` right away.
    fn get<T>(&self) -> DiResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.get_flavored::<T>(None)
    }
}

impl Resolver for Injector {
    #[inline]
    fn injector(&self) -> &Injector {
        self
    }
}

impl Resolver for ScopeHandle {
    #[inline]
    fn injector(&self) -> &Injector {
        &self.injector
    }
}

impl Resolver for Injection<'_> {
    #[inline]
    fn injector(&self) -> &Injector {
        Injection::injector(self)
    }
}
