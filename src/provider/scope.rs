//! Scope tree: arena-backed scope records and the RAII handles that own them.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use smallvec::SmallVec;

use crate::error::{DiError, DiResult};
use crate::internal::{Instance, WeakInstance};
use crate::lifetime::Scope;
use super::Injector;

/// Identifier of one open scope.
///
/// Indices are recycled once a scope closes; the generation tells a stale id
/// apart from the scope that reused its slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId {
    index: u32,
    generation: u32,
}

impl fmt::Debug for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScopeId({}v{})", self.index, self.generation)
    }
}

struct ScopeRecord {
    kind: Scope,
    parent: Option<ScopeId>,
    children: SmallVec<[ScopeId; 4]>,
    owner: Option<WeakInstance>,
}

struct ScopeSlot {
    generation: u32,
    record: Option<ScopeRecord>,
}

#[derive(Default)]
struct ArenaInner {
    slots: Vec<ScopeSlot>,
    free: Vec<u32>,
    live: usize,
}

impl ArenaInner {
    fn record(&self, id: ScopeId) -> Option<&ScopeRecord> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.record.as_ref())
    }

    fn record_mut(&mut self, id: ScopeId) -> Option<&mut ScopeRecord> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.record.as_mut())
    }

    fn insert(&mut self, record: ScopeRecord) -> ScopeId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.record = Some(record);
            return ScopeId { index, generation: slot.generation };
        }
        let index = self.slots.len() as u32;
        self.slots.push(ScopeSlot { generation: 0, record: Some(record) });
        ScopeId { index, generation: 0 }
    }

    fn release(&mut self, id: ScopeId) -> Option<ScopeRecord> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let record = slot.record.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(record)
    }
}

/// Every open scope, indexed by [`ScopeId`].
#[derive(Default)]
pub(crate) struct ScopeArena {
    inner: RwLock<ArenaInner>,
}

impl ScopeArena {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn open_root(&self) -> ScopeId {
        self.inner.write().insert(ScopeRecord {
            kind: Scope::Root,
            parent: None,
            children: SmallVec::new(),
            owner: None,
        })
    }

    /// Opens a `kind` scope under `parent`, which must be strictly broader.
    pub(crate) fn open(&self, parent: ScopeId, kind: Scope) -> DiResult<ScopeId> {
        let mut inner = self.inner.write();
        let parent_kind = inner
            .record(parent)
            .map(|r| r.kind)
            .ok_or(DiError::UnableToObtainContext {
                type_name: "scope",
                reason: "parent scope is closed",
            })?;

        if kind == Scope::Root || !kind.is_nested() || parent_kind.depth() >= kind.depth() {
            return Err(DiError::Bind(format!("cannot open a {} scope inside a {} scope", kind, parent_kind)));
        }

        let id = inner.insert(ScopeRecord {
            kind,
            parent: Some(parent),
            children: SmallVec::new(),
            owner: None,
        });
        if let Some(record) = inner.record_mut(parent) {
            record.children.push(id);
        }
        Ok(id)
    }

    pub(crate) fn kind(&self, id: ScopeId) -> Option<Scope> {
        self.inner.read().record(id).map(|r| r.kind)
    }

    pub(crate) fn is_open(&self, id: ScopeId) -> bool {
        self.inner.read().record(id).is_some()
    }

    pub(crate) fn parent(&self, id: ScopeId) -> Option<ScopeId> {
        self.inner.read().record(id).and_then(|r| r.parent)
    }

    /// `id` itself or its nearest enclosing scope of `kind`.
    pub(crate) fn ancestor_of_kind(&self, id: ScopeId, kind: Scope) -> Option<ScopeId> {
        let inner = self.inner.read();
        let mut current = Some(id);
        while let Some(cursor) = current {
            let record = inner.record(cursor)?;
            if record.kind == kind {
                return Some(cursor);
            }
            current = record.parent;
        }
        None
    }

    /// Records `owner` as the object that owns scope `id`.
    pub(crate) fn set_owner(&self, id: ScopeId, owner: WeakInstance) -> DiResult<()> {
        let mut inner = self.inner.write();
        let record = inner.record_mut(id).ok_or(DiError::UnableToObtainContext {
            type_name: owner.type_key().name(),
            reason: "scope is closed",
        })?;
        if let Some(previous) = &record.owner {
            if previous.is_alive() && previous.addr() != owner.addr() {
                log::warn!(
                    "scope {:?} already owned by a live {}; replacing it",
                    id,
                    previous.type_key().name()
                );
            }
        }
        record.owner = Some(owner);
        Ok(())
    }

    pub(crate) fn owner(&self, id: ScopeId) -> Option<Instance> {
        self.inner.read().record(id)?.owner.as_ref()?.upgrade()
    }

    /// Closes `id` and every scope nested in it. Returns the ids closed,
    /// innermost first.
    pub(crate) fn close(&self, id: ScopeId) -> SmallVec<[ScopeId; 8]> {
        let mut inner = self.inner.write();
        let mut closed: SmallVec<[ScopeId; 8]> = SmallVec::new();

        let parent = match inner.record(id) {
            Some(record) => record.parent,
            None => return closed,
        };
        if let Some(parent) = parent.and_then(|p| inner.record_mut(p)) {
            parent.children.retain(|c| *c != id);
        }

        let mut stack: SmallVec<[ScopeId; 8]> = SmallVec::new();
        stack.push(id);
        while let Some(cursor) = stack.pop() {
            if let Some(record) = inner.release(cursor) {
                stack.extend(record.children);
                closed.push(cursor);
            }
        }
        closed.reverse();
        closed
    }

    pub(crate) fn open_count(&self) -> usize {
        self.inner.read().live
    }
}

/// RAII owner of one open scope.
///
/// Dropping the handle (or calling [`close`](ScopeHandle::close)) closes the
/// scope and every scope nested in it, and evicts their cached instances.
/// Handles requested inside a closed scope fail with
/// `UnableToObtainContext` from then on.
///
/// # Examples
///
/// ```
/// use ferrous_lazy::{Bindings, Marker, Resolver, Scope};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Basket;
///
/// let mut bindings = Bindings::new();
/// bindings
///     .constructible::<Basket>()
///     .declare::<Basket>(Marker::Singleton(Scope::Session));
/// let injector = bindings.build().unwrap();
///
/// let session = injector.open_scope(injector.root(), Scope::Session).unwrap();
/// let a = session.get::<Basket>().unwrap();
/// let b = session.get::<Basket>().unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
///
/// let other = injector.open_scope(injector.root(), Scope::Session).unwrap();
/// assert!(!Arc::ptr_eq(&a, &other.get::<Basket>().unwrap()));
/// ```
pub struct ScopeHandle {
    pub(crate) id: ScopeId,
    pub(crate) kind: Scope,
    pub(crate) injector: Injector,
}

impl ScopeHandle {
    #[inline]
    pub fn id(&self) -> ScopeId {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> Scope {
        self.kind
    }

    pub fn injector(&self) -> &Injector {
        &self.injector
    }

    /// Opens a narrower scope nested in this one.
    pub fn open(&self, kind: Scope) -> DiResult<ScopeHandle> {
        self.injector.open_scope(self.id, kind)
    }

    /// Reports that `instance` lives in this scope.
    pub fn announce<C: ?Sized + Send + Sync + 'static>(&self, instance: &Arc<C>) -> DiResult<()> {
        self.injector.announce(self.id, instance)
    }

    /// The enclosing scope, `None` once this scope is closed.
    pub fn parent(&self) -> Option<ScopeId> {
        self.injector.inner().scopes.parent(self.id)
    }

    /// True until this scope or an enclosing one is closed.
    pub fn is_open(&self) -> bool {
        self.injector.inner().scopes.is_open(self.id)
    }

    /// Closes the scope now instead of at drop.
    pub fn close(self) {}
}

impl Drop for ScopeHandle {
    fn drop(&mut self) {
        self.injector.close_scope(self.id);
    }
}

impl fmt::Debug for ScopeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeHandle")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}
