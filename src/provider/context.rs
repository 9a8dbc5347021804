//! Factory context handed to providers and constructors.

use std::sync::Arc;

use crate::handle::{HandleCell, HandleInfo, ParentRef};
use crate::key::BindingKey;
use crate::lifetime::Scope;
use super::{Injector, ScopeId};

/// Context passed to providers and constructors.
///
/// Dependencies requested through it (see [`Resolver`](crate::Resolver))
/// have the instance under construction as their consumer, so they resolve
/// in its scope and are checked against it.
///
/// # Examples
///
/// ```
/// use ferrous_lazy::{Bindings, Marker, Resolver, Scope};
/// use std::sync::Arc;
///
/// struct Screen {
///     title: String,
/// }
///
/// struct Toolbar {
///     label: String,
/// }
///
/// let mut bindings = Bindings::new();
/// bindings
///     .declare::<Screen>(Marker::Owner(Scope::Session))
///     .bind_provider::<Toolbar, _>(|inj| {
///         let screen = inj.parent::<Screen>().expect("requested by a screen");
///         Ok(Arc::new(Toolbar { label: format!("{} toolbar", screen.title) }))
///     });
/// let injector = bindings.build().unwrap();
///
/// let session = injector.open_scope(injector.root(), Scope::Session).unwrap();
/// let screen = Arc::new(Screen { title: "Inbox".to_string() });
/// session.announce(&screen).unwrap();
///
/// let toolbar = injector.attain_for::<Toolbar, _>(&screen).unwrap();
/// assert_eq!(toolbar.get(&injector).unwrap().label, "Inbox toolbar");
/// ```
pub struct Injection<'a> {
    injector: &'a Injector,
    cell: &'a Arc<HandleCell>,
}

impl<'a> Injection<'a> {
    pub(crate) fn new(injector: &'a Injector, cell: &'a Arc<HandleCell>) -> Self {
        Self { injector, cell }
    }

    #[inline]
    pub fn injector(&self) -> &'a Injector {
        self.injector
    }

    #[inline]
    pub(crate) fn cell(&self) -> &'a Arc<HandleCell> {
        self.cell
    }

    /// The handle being resolved.
    pub fn handle(&self) -> HandleInfo {
        self.cell.info()
    }

    /// Cache key of the instance being built.
    pub fn key(&self) -> Option<BindingKey> {
        self.cell.key()
    }

    /// Scope the instance being built will live in.
    pub fn scope(&self) -> Scope {
        self.cell.lineage().map_or(Scope::Unscoped, |l| l.scope)
    }

    /// Scope instance the instance being built will live in.
    pub fn context(&self) -> Option<ScopeId> {
        self.cell.lineage().map(|l| l.context)
    }

    /// The consumer that requested the instance being built, if it is a `P`
    /// and still alive. A scope consumer stands for its announced owner.
    pub fn parent<P: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<P>> {
        let instance = match self.cell.parent()? {
            ParentRef::Instance(weak) => weak.upgrade()?,
            ParentRef::Scope(id) => self.injector.inner().scopes.owner(id)?,
            ParentRef::Handle(cell) => cell.upgrade()?.instance()?,
        };
        instance.downcast::<P>()
    }
}
