//! Observers for resolution events.
//!
//! Hooks for watching what the injector does: which handles get attained,
//! which keys get built and how long that takes, which deferred handles get
//! replayed, and which failures reach the top. Useful for tracing startup
//! order and for spotting a scope that never gets announced.

use std::sync::Arc;
use std::time::Duration;

use crate::error::DiError;
use crate::key::{BindingKey, TypeKey};
use crate::lifetime::Scope;

/// Observer trait for injector events.
///
/// Every method has an empty default body, so an observer only implements
/// what it cares about.
///
/// # Performance
///
/// Observer calls are made synchronously while resolving, some of them with
/// a per-type build lock held. Keep implementations lightweight.
///
/// # Examples
///
/// ```
/// use ferrous_lazy::{Bindings, InjectionObserver, BindingKey};
/// use std::sync::{Arc, Mutex};
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct Recorder {
///     built: Mutex<Vec<String>>,
/// }
///
/// impl InjectionObserver for Recorder {
///     fn resolved(&self, key: &BindingKey, _elapsed: Duration) {
///         self.built.lock().unwrap().push(key.to_string());
///     }
/// }
///
/// let recorder = Arc::new(Recorder::default());
/// let mut bindings = Bindings::new();
/// bindings.add_observer(recorder.clone());
/// let _injector = bindings.build().unwrap();
/// ```
pub trait InjectionObserver: Send + Sync {
    /// A handle was created. `deferred` is true when its consumer's context
    /// was still unknown and the handle went onto the pending queue.
    fn attained(&self, requested: TypeKey, deferred: bool) {
        let _ = (requested, deferred);
    }

    /// A key is about to be built (cache miss).
    fn resolving(&self, key: &BindingKey) {
        let _ = key;
    }

    /// A key was built.
    fn resolved(&self, key: &BindingKey, elapsed: Duration) {
        let _ = (key, elapsed);
    }

    /// A deferred handle was replayed once its consumer became known.
    fn replayed(&self, requested: TypeKey, scope: Scope) {
        let _ = (requested, scope);
    }

    /// A provider or constructor panicked.
    fn factory_panic(&self, key: &BindingKey, message: &str) {
        let _ = (key, message);
    }

    /// A failure reached the top of the injector.
    fn failure(&self, error: &DiError) {
        let _ = error;
    }
}

/// Container for registered observers.
///
/// Designed to have minimal overhead when no observers are registered.
#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn InjectionObserver>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn InjectionObserver>) {
        self.observers.push(observer);
    }

    /// Returns true if any observers are registered.
    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.observers.len()
    }

    #[inline]
    pub(crate) fn attained(&self, requested: TypeKey, deferred: bool) {
        for observer in &self.observers {
            observer.attained(requested, deferred);
        }
    }

    #[inline]
    pub(crate) fn resolving(&self, key: &BindingKey) {
        for observer in &self.observers {
            observer.resolving(key);
        }
    }

    #[inline]
    pub(crate) fn resolved(&self, key: &BindingKey, elapsed: Duration) {
        for observer in &self.observers {
            observer.resolved(key, elapsed);
        }
    }

    #[inline]
    pub(crate) fn replayed(&self, requested: TypeKey, scope: Scope) {
        for observer in &self.observers {
            observer.replayed(requested, scope);
        }
    }

    #[inline]
    pub(crate) fn factory_panic(&self, key: &BindingKey, message: &str) {
        for observer in &self.observers {
            observer.factory_panic(key, message);
        }
    }

    #[inline]
    pub(crate) fn failure(&self, error: &DiError) {
        for observer in &self.observers {
            observer.failure(error);
        }
    }
}

/// Built-in observer that writes events through the `log` facade.
///
/// Construction events go out at `debug`, attain and replay breadcrumbs at
/// `trace`, panics and failures at `error` and `warn`. Hook it up to any
/// `log` backend (`env_logger`, ...).
///
/// # Examples
///
/// ```
/// use ferrous_lazy::{Bindings, LoggingObserver};
/// use std::sync::Arc;
///
/// let mut bindings = Bindings::new();
/// bindings.add_observer(Arc::new(LoggingObserver::new()));
/// let injector = bindings.build().unwrap();
/// ```
pub struct LoggingObserver {
    prefix: String,
}

impl LoggingObserver {
    /// Creates a new logging observer with default prefix.
    pub fn new() -> Self {
        Self {
            prefix: "[ferrous-lazy]".to_string(),
        }
    }

    /// Creates a new logging observer with a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl InjectionObserver for LoggingObserver {
    fn attained(&self, requested: TypeKey, deferred: bool) {
        if deferred {
            log::trace!("{} Deferred: {}", self.prefix, requested.name());
        } else {
            log::trace!("{} Attained: {}", self.prefix, requested.name());
        }
    }

    fn resolving(&self, key: &BindingKey) {
        log::debug!("{} Resolving: {}", self.prefix, key);
    }

    fn resolved(&self, key: &BindingKey, elapsed: Duration) {
        log::debug!("{} Resolved: {} in {:?}", self.prefix, key, elapsed);
    }

    fn replayed(&self, requested: TypeKey, scope: Scope) {
        log::trace!("{} Replayed: {} in {}", self.prefix, requested.name(), scope);
    }

    fn factory_panic(&self, key: &BindingKey, message: &str) {
        log::error!("{} FACTORY PANIC in {}: {}", self.prefix, key, message);
    }

    fn failure(&self, error: &DiError) {
        log::warn!("{} {}", self.prefix, error);
    }
}
