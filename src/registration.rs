//! Binding rules, scope declarations and the registry that holds them.

use std::sync::Arc;

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::error::{DiError, DiResult};
use crate::internal::Instance;
use crate::key::{Flavor, TypeKey};
use crate::lifetime::Scope;
use crate::provider::Injection;

/// Turns an instance of a redirect's target into the redirect's source type.
pub(crate) type CastFn = Arc<dyn Fn(&Instance) -> Option<Instance> + Send + Sync>;

/// Builds an instance. Shared by providers and constructors.
pub(crate) type FactoryFn = Arc<dyn for<'a> Fn(&Injection<'a>) -> DiResult<Instance> + Send + Sync>;

/// Called with a fresh or announced instance once its dependencies are wired.
pub(crate) type ReadyFn = Arc<dyn Fn(&Instance) + Send + Sync>;

/// One binding rule for a requested type.
#[derive(Clone)]
pub(crate) enum Binding {
    /// Resolve `to` instead, then cast the result back.
    Redirect { to: TypeKey, cast: CastFn },
    /// Always the same value.
    Instance(Instance),
    /// Built on demand by a closure. A provider is its own leaf.
    Provider(FactoryFn),
}

impl Binding {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Binding::Redirect { .. } => "redirect",
            Binding::Instance(_) => "instance",
            Binding::Provider(_) => "provider",
        }
    }
}

/// Scope marker attached to a type.
///
/// # Examples
///
/// ```
/// use ferrous_lazy::{Bindings, Marker, Scope};
///
/// struct Settings;
/// struct Screen;
///
/// let mut bindings = Bindings::new();
/// bindings
///     .declare::<Settings>(Marker::Singleton(Scope::Root))
///     .declare::<Screen>(Marker::Owner(Scope::Session));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    /// One instance per scope owner of this kind.
    Singleton(Scope),
    /// The type *is* the owner of scopes of this kind (the session object,
    /// the component object). Resolving it yields the owner of the nearest
    /// enclosing scope of that kind.
    Owner(Scope),
    /// Cannot be constructed on request: something outside the injector
    /// starts it and then announces it.
    External,
}

/// Every marker declared for one type.
#[derive(Debug, Clone, Default)]
pub(crate) struct Declaration {
    markers: SmallVec<[Marker; 2]>,
}

impl Declaration {
    pub(crate) fn add(&mut self, marker: Marker) {
        if !self.markers.contains(&marker) {
            self.markers.push(marker);
        }
    }

    pub(crate) fn markers(&self) -> &[Marker] {
        &self.markers
    }

    #[inline]
    pub(crate) fn is_singleton(&self) -> bool {
        self.markers.iter().any(|m| matches!(m, Marker::Singleton(_)))
    }

    #[inline]
    pub(crate) fn owner_kind(&self) -> Option<Scope> {
        self.markers.iter().find_map(|m| match m {
            Marker::Owner(kind) => Some(*kind),
            _ => None,
        })
    }

    #[inline]
    pub(crate) fn is_external(&self) -> bool {
        self.markers.contains(&Marker::External)
    }

    /// Owner-like types are referenced weakly by the handles that resolve them.
    #[inline]
    pub(crate) fn is_owner_like(&self) -> bool {
        self.is_external() || self.owner_kind().is_some()
    }

    /// Most specific marker wins: `Component` singleton, `Component` owner,
    /// `Session` singleton, `Session` owner, `Root` singleton, `Root` owner.
    pub(crate) fn scope(&self) -> Scope {
        for kind in [Scope::Component, Scope::Session, Scope::Root] {
            if self.markers.contains(&Marker::Singleton(kind)) || self.markers.contains(&Marker::Owner(kind)) {
                return kind;
            }
        }
        Scope::Unscoped
    }

    fn validate(&self, ty: TypeKey) -> DiResult<()> {
        let mut owner: Option<Scope> = None;
        for marker in &self.markers {
            match marker {
                Marker::Singleton(Scope::Unscoped) => {
                    return Err(DiError::Bind(format!("{} declared singleton of Unscoped", ty.name())));
                }
                Marker::Owner(Scope::Unscoped) => {
                    return Err(DiError::Bind(format!("{} declared owner of Unscoped", ty.name())));
                }
                Marker::Owner(kind) => match owner {
                    Some(previous) if previous != *kind => {
                        return Err(DiError::Bind(format!(
                            "{} declared owner of both {} and {}",
                            ty.name(),
                            previous,
                            kind
                        )));
                    }
                    _ => owner = Some(*kind),
                },
                _ => {}
            }
        }
        Ok(())
    }
}

/// Where a requested type's binding chain ends.
pub(crate) enum Terminal<'a> {
    /// A literal instance bound to `at`.
    Literal { at: TypeKey, instance: &'a Instance },
    /// A provider bound to `at`.
    Provider { at: TypeKey, factory: &'a FactoryFn },
    /// A type with no further rule. `redirected` is true when at least one
    /// redirect was followed to get here.
    Leaf { ty: TypeKey, redirected: bool },
}

impl Terminal<'_> {
    /// Concrete type used for caching.
    pub(crate) fn leaf(&self) -> TypeKey {
        match self {
            Terminal::Literal { instance, .. } => instance.type_key(),
            Terminal::Provider { at, .. } => *at,
            Terminal::Leaf { ty, .. } => *ty,
        }
    }
}

/// Binding rules, constructors and scope declarations.
///
/// Frozen once the injector is built: every lookup goes through `&self`.
#[derive(Default)]
pub(crate) struct BindingRegistry {
    rules: AHashMap<(TypeKey, Option<Flavor>), Binding>,
    constructors: AHashMap<TypeKey, FactoryFn>,
    declarations: AHashMap<TypeKey, Declaration>,
    ready: AHashMap<TypeKey, SmallVec<[ReadyFn; 1]>>,
}

impl BindingRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a rule. Returns the rule it replaced, if any.
    pub(crate) fn insert(&mut self, from: TypeKey, flavor: Option<Flavor>, binding: Binding) -> Option<Binding> {
        self.rules.insert((from, flavor), binding)
    }

    pub(crate) fn insert_constructor(&mut self, ty: TypeKey, factory: FactoryFn) -> bool {
        self.constructors.insert(ty, factory).is_some()
    }

    pub(crate) fn declare(&mut self, ty: TypeKey, marker: Marker) {
        self.declarations.entry(ty).or_default().add(marker);
    }

    pub(crate) fn insert_ready(&mut self, ty: TypeKey, callback: ReadyFn) {
        self.ready.entry(ty).or_default().push(callback);
    }

    /// Ready callbacks for instances whose own type is `ty`, in registration order.
    pub(crate) fn ready(&self, ty: TypeKey) -> &[ReadyFn] {
        self.ready.get(&ty).map(|callbacks| callbacks.as_slice()).unwrap_or(&[])
    }

    /// Rule for `(ty, flavor)`, falling back to the unflavored rule.
    #[inline]
    pub(crate) fn rule(&self, ty: TypeKey, flavor: Option<Flavor>) -> Option<&Binding> {
        if flavor.is_some() {
            if let Some(binding) = self.rules.get(&(ty, flavor)) {
                return Some(binding);
            }
        }
        self.rules.get(&(ty, None))
    }

    #[inline]
    pub(crate) fn constructor(&self, ty: TypeKey) -> Option<&FactoryFn> {
        self.constructors.get(&ty)
    }

    pub(crate) fn declaration(&self, ty: TypeKey) -> Option<&Declaration> {
        self.declarations.get(&ty)
    }

    pub(crate) fn scope_of(&self, ty: TypeKey) -> Scope {
        self.declarations.get(&ty).map_or(Scope::Unscoped, Declaration::scope)
    }

    pub(crate) fn is_singleton(&self, ty: TypeKey) -> bool {
        self.declarations.get(&ty).is_some_and(Declaration::is_singleton)
    }

    pub(crate) fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub(crate) fn rules(&self) -> impl Iterator<Item = (&(TypeKey, Option<Flavor>), &Binding)> {
        self.rules.iter()
    }

    pub(crate) fn constructors(&self) -> impl Iterator<Item = &TypeKey> {
        self.constructors.keys()
    }

    pub(crate) fn declarations(&self) -> impl Iterator<Item = (&TypeKey, &Declaration)> {
        self.declarations.iter()
    }

    /// Follows redirects from `requested` to the end of its chain.
    pub(crate) fn terminal(&self, requested: TypeKey, flavor: Option<Flavor>) -> DiResult<Terminal<'_>> {
        let mut current = requested;
        let mut redirected = false;
        // A chain longer than the rule table must revisit a type.
        for _ in 0..=self.rules.len() {
            match self.rule(current, flavor) {
                Some(Binding::Instance(instance)) => {
                    return Ok(Terminal::Literal { at: current, instance });
                }
                Some(Binding::Provider(factory)) => {
                    return Ok(Terminal::Provider { at: current, factory });
                }
                Some(Binding::Redirect { to, .. }) => {
                    current = *to;
                    redirected = true;
                }
                None => return Ok(Terminal::Leaf { ty: current, redirected }),
            }
        }
        Err(DiError::Bind(format!("redirect cycle reached from {}", requested.name())))
    }

    /// Concrete type `requested` resolves to.
    #[inline]
    pub(crate) fn resolve_leaf(&self, requested: TypeKey, flavor: Option<Flavor>) -> DiResult<TypeKey> {
        self.terminal(requested, flavor).map(|t| t.leaf())
    }

    /// Casts `instance`, built for somewhere along `requested`'s chain, back
    /// to `requested` by applying the redirect casts in reverse.
    pub(crate) fn project(&self, requested: TypeKey, flavor: Option<Flavor>, instance: Instance) -> DiResult<Instance> {
        let mut casts: SmallVec<[&CastFn; 4]> = SmallVec::new();
        let mut current = requested;
        for _ in 0..=self.rules.len() {
            if instance.type_key() == current {
                let mut value = instance;
                for cast in casts.iter().rev() {
                    value = cast(&value).ok_or(DiError::TypeMismatch(requested.name()))?;
                }
                return Ok(value);
            }
            match self.rule(current, flavor) {
                Some(Binding::Redirect { to, cast }) => {
                    casts.push(cast);
                    current = *to;
                }
                _ => return Err(DiError::TypeMismatch(requested.name())),
            }
        }
        Err(DiError::Bind(format!("redirect cycle reached from {}", requested.name())))
    }

    /// Build-time checks: declarations are consistent, no redirect points at
    /// itself or loops back, literal instances really are of the bound type.
    pub(crate) fn validate(&self) -> DiResult<()> {
        for (ty, declaration) in &self.declarations {
            declaration.validate(*ty)?;
        }

        for ((from, flavor), binding) in &self.rules {
            match binding {
                Binding::Redirect { to, .. } if to == from => {
                    return Err(DiError::Bind(format!("{} redirects to itself", from.name())));
                }
                Binding::Redirect { .. } => {
                    self.terminal(*from, *flavor)?;
                }
                Binding::Instance(instance) if instance.type_key() != *from => {
                    return Err(DiError::Bind(format!(
                        "instance of {} bound to {}",
                        instance.type_key().name(),
                        from.name()
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}
