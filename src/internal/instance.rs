//! Type-erased shared instances.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::key::TypeKey;

// Type-erased Arc for storage: the box always holds an `Arc<X>`
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

/// Weak side of an erased instance. Lets the runtime tell when an instance
/// died without knowing its type.
pub(crate) trait ErasedWeak: Send + Sync {
    fn upgrade(&self) -> Option<Instance>;
    fn is_alive(&self) -> bool;
}

struct WeakOf<X: ?Sized>(Weak<X>);

impl<X: ?Sized + Send + Sync + 'static> ErasedWeak for WeakOf<X> {
    fn upgrade(&self) -> Option<Instance> {
        self.0.upgrade().map(Instance::new)
    }

    fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

/// A resolved value with its type erased.
///
/// Wraps an `Arc<X>` for any `X`, sized or not. Identity is the address of
/// the shared allocation, so two `Instance`s made from clones of one `Arc`
/// compare as the same object.
#[derive(Clone)]
pub(crate) struct Instance {
    cell: AnyArc,
    addr: usize,
    ty: TypeKey,
    weak: Arc<dyn ErasedWeak>,
}

impl Instance {
    pub(crate) fn new<X: ?Sized + Send + Sync + 'static>(value: Arc<X>) -> Self {
        let addr = Arc::as_ptr(&value) as *const () as usize;
        let weak: Arc<dyn ErasedWeak> = Arc::new(WeakOf(Arc::downgrade(&value)));
        Self {
            cell: Arc::new(value),
            addr,
            ty: TypeKey::of::<X>(),
            weak,
        }
    }

    /// Identity of the wrapped allocation.
    #[inline]
    pub(crate) fn addr(&self) -> usize {
        self.addr
    }

    /// Type the instance was erased from.
    #[inline]
    pub(crate) fn type_key(&self) -> TypeKey {
        self.ty
    }

    pub(crate) fn downcast<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.cell.downcast_ref::<Arc<T>>().cloned()
    }

    pub(crate) fn downgrade(&self) -> WeakInstance {
        WeakInstance {
            addr: self.addr,
            ty: self.ty,
            weak: self.weak.clone(),
        }
    }

    #[inline]
    pub(crate) fn same(&self, other: &Instance) -> bool {
        self.addr == other.addr
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:#x}", self.ty.name(), self.addr)
    }
}

/// A non-owning reference to an erased instance.
#[derive(Clone)]
pub(crate) struct WeakInstance {
    addr: usize,
    ty: TypeKey,
    weak: Arc<dyn ErasedWeak>,
}

impl WeakInstance {
    /// Works for allocations that are not fully built yet (`Arc::new_cyclic`).
    pub(crate) fn from_weak<X: ?Sized + Send + Sync + 'static>(weak: Weak<X>) -> Self {
        Self {
            addr: weak.as_ptr() as *const () as usize,
            ty: TypeKey::of::<X>(),
            weak: Arc::new(WeakOf(weak)),
        }
    }

    pub(crate) fn upgrade(&self) -> Option<Instance> {
        self.weak.upgrade()
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.weak.is_alive()
    }

    #[inline]
    pub(crate) fn addr(&self) -> usize {
        self.addr
    }

    #[inline]
    pub(crate) fn type_key(&self) -> TypeKey {
        self.ty
    }
}

impl fmt::Debug for WeakInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Weak({}@{:#x})", self.ty.name(), self.addr)
    }
}

/// Anchor that keeps an address from being reused while some entry is keyed on it.
pub(crate) type Anchor = Arc<dyn ErasedWeak>;

impl WeakInstance {
    pub(crate) fn anchor(&self) -> Anchor {
        self.weak.clone()
    }
}
