//! Type and cache keys for the lazy injector.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Secondary discriminator that lets several bindings share one requested type.
pub type Flavor = &'static str;

/// Identity of a Rust type, with its name kept for diagnostics.
///
/// Equality and hashing use the `TypeId` only; the name never takes part.
///
/// # Examples
///
/// ```rust
/// use ferrous_lazy::TypeKey;
///
/// trait Greeter {}
///
/// let a = TypeKey::of::<String>();
/// let b = TypeKey::of::<String>();
/// assert_eq!(a, b);
/// assert_ne!(a, TypeKey::of::<dyn Greeter>());
/// assert_eq!(a.name(), "alloc::string::String");
/// ```
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key of `T`, which may be unsized (`dyn Trait`, `str`, ...).
    #[inline(always)]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The underlying `TypeId`.
    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Full type name, as reported by `std::any::type_name`.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path.
    pub fn short_name(&self) -> &'static str {
        let head = self.name.split('<').next().unwrap_or(self.name);
        match head.rfind("::") {
            Some(pos) if !self.name.contains('<') => &self.name[pos + 2..],
            _ => self.name,
        }
    }
}

impl PartialEq for TypeKey {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Cache key: the leaf (concrete) type plus an optional flavor.
///
/// The default flavor (`None`) is its own dimension: it never equals a
/// flavored key, whatever the flavor's value. Flavors themselves compare by
/// string value, so two `&'static str` flavors spelled the same are the same
/// flavor even when they live at different addresses.
///
/// # Examples
///
/// ```rust
/// use ferrous_lazy::BindingKey;
///
/// struct Camera;
///
/// let plain = BindingKey::of::<Camera>();
/// let front = BindingKey::flavored::<Camera>("front");
///
/// assert_eq!(plain, BindingKey::of::<Camera>());
/// assert_ne!(plain, front);
/// assert_eq!(front.flavor(), Some("front"));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingKey {
    leaf: TypeKey,
    flavor: Option<Flavor>,
}

impl BindingKey {
    /// Key with the default flavor.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new(TypeKey::of::<T>(), None)
    }

    /// Key with an explicit flavor.
    #[inline]
    pub fn flavored<T: ?Sized + 'static>(flavor: Flavor) -> Self {
        Self::new(TypeKey::of::<T>(), Some(flavor))
    }

    #[inline]
    pub fn new(leaf: TypeKey, flavor: Option<Flavor>) -> Self {
        Self { leaf, flavor }
    }

    #[inline]
    pub fn leaf(&self) -> TypeKey {
        self.leaf
    }

    #[inline]
    pub fn flavor(&self) -> Option<Flavor> {
        self.flavor
    }

    /// Get the type name for display
    #[inline]
    pub fn display_name(&self) -> &'static str {
        self.leaf.name()
    }
}

impl fmt::Debug for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.flavor {
            Some(flavor) => write!(f, "{}#{}", self.leaf.name(), flavor),
            None => f.write_str(self.leaf.name()),
        }
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
