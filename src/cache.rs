//! Scope cache: per-scope instance partitions, the lineage index and the
//! pending queue.
//!
//! Three structures share one file because two of them must move together:
//! a consumer's lineage (the scope it was resolved in) and the handles
//! waiting on that consumer are stored in the same striped slot, so that
//! "look up lineage or enqueue" and "record lineage and drain" can never
//! interleave for one consumer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use ahash::AHashMap;
use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;

use crate::handle::HandleCell;
use crate::internal::{Anchor, Instance, WeakInstance};
use crate::key::BindingKey;
use crate::lifetime::Scope;
use crate::provider::ScopeId;

const STRIPES: usize = 64;
const SWEEP_EVERY: usize = 1024;

/// Where a resolved or announced instance lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Lineage {
    pub(crate) scope: Scope,
    pub(crate) context: ScopeId,
}

pub(crate) type Waiting = SmallVec<[Weak<HandleCell>; 4]>;

struct LineageSlot {
    anchor: Anchor,
    lineage: Option<Lineage>,
    pending: Waiting,
}

impl LineageSlot {
    fn new(anchor: Anchor) -> Self {
        Self {
            anchor,
            lineage: None,
            pending: SmallVec::new(),
        }
    }
}

type Stripe = Mutex<AHashMap<usize, LineageSlot>>;

/// Instances cached for one scope owner.
#[derive(Default)]
struct Partition {
    entries: RwLock<AHashMap<BindingKey, Instance>>,
}

pub(crate) struct ScopeCache {
    partitions: RwLock<AHashMap<Scope, AHashMap<ScopeId, Arc<Partition>>>>,
    lineage: Box<[Stripe; STRIPES]>,
    build_locks: Mutex<AHashMap<BindingKey, Arc<Mutex<()>>>>,
    records: AtomicUsize,
}

impl ScopeCache {
    pub(crate) fn new() -> Self {
        Self {
            partitions: RwLock::new(AHashMap::new()),
            lineage: Box::new(std::array::from_fn(|_| Mutex::new(AHashMap::new()))),
            build_locks: Mutex::new(AHashMap::new()),
            records: AtomicUsize::new(0),
        }
    }

    #[inline]
    fn stripe(&self, addr: usize) -> &Stripe {
        // Allocations are at least word aligned; drop the always-zero bits.
        &self.lineage[(addr >> 4) % STRIPES]
    }

    fn partition(&self, scope: Scope, context: ScopeId) -> Option<Arc<Partition>> {
        self.partitions.read().get(&scope)?.get(&context).cloned()
    }

    /// Cached instance for `key` in the `scope` partition owned by `context`.
    pub(crate) fn get(&self, scope: Scope, context: ScopeId, key: &BindingKey) -> Option<Instance> {
        self.partition(scope, context)?.entries.read().get(key).cloned()
    }

    /// Stores `instance` unless the key is already cached. Returns whichever
    /// instance is cached afterwards.
    pub(crate) fn put(&self, scope: Scope, context: ScopeId, key: BindingKey, instance: Instance) -> Instance {
        let partition = match self.partition(scope, context) {
            Some(partition) => partition,
            None => self
                .partitions
                .write()
                .entry(scope)
                .or_default()
                .entry(context)
                .or_default()
                .clone(),
        };
        let mut entries = partition.entries.write();
        entries.entry(key).or_insert(instance).clone()
    }

    /// Drops the partitions owned by `contexts`.
    pub(crate) fn evict(&self, contexts: &[ScopeId]) -> usize {
        let mut partitions = self.partitions.write();
        let mut evicted = 0;
        for by_owner in partitions.values_mut() {
            for context in contexts {
                if by_owner.remove(context).is_some() {
                    evicted += 1;
                }
            }
        }
        partitions.retain(|_, by_owner| !by_owner.is_empty());
        evicted
    }

    pub(crate) fn partition_count(&self) -> usize {
        self.partitions.read().values().map(|by_owner| by_owner.len()).sum()
    }

    pub(crate) fn entry_count(&self) -> usize {
        self.partitions
            .read()
            .values()
            .flat_map(|by_owner| by_owner.values())
            .map(|partition| partition.entries.read().len())
            .sum()
    }

    /// Lock serializing construction of the singleton cached under `key`.
    ///
    /// Keyed like the construction stack, so a thread only ever waits on a
    /// lock it does not hold.
    pub(crate) fn build_lock(&self, key: BindingKey) -> Arc<Mutex<()>> {
        self.build_locks.lock().entry(key).or_default().clone()
    }

    /// Lineage of `parent` if known, otherwise `child` is queued until it is.
    pub(crate) fn lineage_or_enqueue(&self, parent: &WeakInstance, child: &Arc<HandleCell>) -> Option<Lineage> {
        let mut stripe = self.stripe(parent.addr()).lock();
        // The slot's anchor pins the allocation, so an existing slot always
        // belongs to this very consumer, born or not.
        let slot = stripe
            .entry(parent.addr())
            .or_insert_with(|| LineageSlot::new(parent.anchor()));
        if let Some(lineage) = slot.lineage {
            return Some(lineage);
        }
        slot.pending.push(Arc::downgrade(child));
        None
    }

    /// Lineage of the live instance at `addr`.
    pub(crate) fn lineage_of(&self, addr: usize) -> Option<Lineage> {
        let stripe = self.stripe(addr).lock();
        stripe
            .get(&addr)
            .filter(|slot| slot.anchor.is_alive())
            .and_then(|slot| slot.lineage)
    }

    /// Records where `instance` lives and takes every handle waiting on it.
    ///
    /// The first live lineage for an address wins: an instance shared by
    /// several handles (a bound literal, a cached singleton) keeps the scope
    /// it was first seen in.
    pub(crate) fn record(&self, instance: &WeakInstance, lineage: Lineage) -> (Lineage, Waiting) {
        if self.records.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.sweep();
        }

        let mut stripe = self.stripe(instance.addr()).lock();
        let slot = stripe
            .entry(instance.addr())
            .or_insert_with(|| LineageSlot::new(instance.anchor()));
        let effective = *slot.lineage.get_or_insert(lineage);
        (effective, std::mem::take(&mut slot.pending))
    }

    /// Forgets dead instances and handles nobody holds any more.
    pub(crate) fn sweep(&self) -> usize {
        let mut removed = 0;
        for stripe in self.lineage.iter() {
            let mut stripe = stripe.lock();
            let before = stripe.len();
            stripe.retain(|_, slot| {
                slot.pending.retain(|child| child.strong_count() > 0);
                slot.anchor.is_alive() || !slot.pending.is_empty()
            });
            removed += before - stripe.len();
        }
        removed
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.lineage
            .iter()
            .map(|stripe| stripe.lock().values().map(|slot| slot.pending.len()).sum::<usize>())
            .sum()
    }
}
