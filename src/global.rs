//! Process-wide default injector.
//!
//! For code that cannot be handed an [`Injector`]: install one at startup,
//! reach it with [`installed`], drop it with [`teardown`].

use once_cell::sync::Lazy as SyncLazy;
use parking_lot::RwLock;

use crate::error::{DiError, DiResult};
use crate::provider::Injector;

static INSTALLED: SyncLazy<RwLock<Option<Injector>>> = SyncLazy::new(|| RwLock::new(None));

/// Makes `injector` the process-wide default. Returns the previous one.
///
/// # Examples
///
/// ```
/// use ferrous_lazy::{install, installed, teardown, Bindings};
///
/// let injector = Bindings::new().build().unwrap();
/// install(injector);
/// assert!(installed().is_ok());
///
/// teardown();
/// assert!(installed().is_err());
/// ```
pub fn install(injector: Injector) -> Option<Injector> {
    let previous = INSTALLED.write().replace(injector);
    if previous.is_some() {
        log::warn!("install called again; replacing the previously installed injector");
    }
    previous
}

/// The process-wide default injector.
pub fn installed() -> DiResult<Injector> {
    INSTALLED.read().clone().ok_or(DiError::UnableToObtainContext {
        type_name: "Injector",
        reason: "no injector installed",
    })
}

/// Uninstalls the process-wide default injector and returns it.
pub fn teardown() -> Option<Injector> {
    INSTALLED.write().take()
}
