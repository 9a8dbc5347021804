//! Re-entrant construction detection.

use std::cell::RefCell;

use crate::error::{DiError, DiResult};
use crate::key::BindingKey;

const MAX_DEPTH: usize = 1024;

// Thread-local stack of keys currently being constructed
thread_local! {
    static CONSTRUCTION_TLS: RefCell<ConstructionTls> = RefCell::new(ConstructionTls::default());
}

#[derive(Default)]
struct ConstructionTls {
    stack: Vec<BindingKey>,
}

/// Guard for managing the thread-local construction stack
pub(crate) struct StackGuard {
    key: BindingKey,
}

impl StackGuard {
    /// Pushes `key`, failing if it is already under construction on this
    /// thread. Must run before any per-type lock is taken: those locks are
    /// not re-entrant.
    pub(crate) fn enter(key: BindingKey) -> DiResult<Self> {
        CONSTRUCTION_TLS.with(|tls| {
            let mut tls = tls.borrow_mut();

            if tls.stack.iter().any(|k| *k == key) {
                let mut path: Vec<&'static str> = tls
                    .stack
                    .iter()
                    .skip_while(|k| **k != key)
                    .map(|k| k.display_name())
                    .collect();
                path.push(key.display_name());
                return Err(DiError::Circular(path));
            }

            if tls.stack.len() >= MAX_DEPTH {
                return Err(DiError::DepthExceeded(tls.stack.len()));
            }

            tls.stack.push(key);
            Ok(())
        })?;

        Ok(Self { key })
    }
}

impl Drop for StackGuard {
    fn drop(&mut self) {
        CONSTRUCTION_TLS.with(|tls| {
            let mut tls = tls.borrow_mut();
            if let Some(last) = tls.stack.pop() {
                debug_assert_eq!(last, self.key);
            }
        });
    }
}

/// Runs `f` with `key` on the construction stack.
pub(crate) fn with_circular_catch<T, F>(key: BindingKey, f: F) -> DiResult<T>
where
    F: FnOnce() -> DiResult<T>,
{
    let _guard = StackGuard::enter(key)?;
    f()
}
