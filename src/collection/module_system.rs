//! Binding modules for grouping related bindings.

use crate::collection::Bindings;
use crate::error::DiResult;

/// A reusable group of bindings.
///
/// An application usually has one module per feature, plus per-flavor
/// modules (test, debug, release) that override a few of the bindings.
///
/// # Example
///
/// ```rust
/// use ferrous_lazy::{BindingModule, Bindings, DiResult, Marker, Resolver, Scope};
/// use std::sync::Arc;
///
/// trait Storage: Send + Sync {
///     fn name(&self) -> &'static str;
/// }
///
/// #[derive(Default)]
/// struct Disk;
/// impl Storage for Disk {
///     fn name(&self) -> &'static str { "disk" }
/// }
///
/// struct StorageModule;
///
/// impl BindingModule for StorageModule {
///     fn configure(self, bindings: &mut Bindings) -> DiResult<()> {
///         bindings
///             .bind::<dyn Storage, Disk, _>(|d| d as Arc<dyn Storage>)
///             .constructible::<Disk>()
///             .declare::<Disk>(Marker::Singleton(Scope::Root));
///         Ok(())
///     }
/// }
///
/// # fn main() -> DiResult<()> {
/// let mut bindings = Bindings::new();
/// bindings.add_module(StorageModule)?;
/// let injector = bindings.build()?;
/// assert_eq!(injector.get::<dyn Storage>()?.name(), "disk");
/// # Ok(())
/// # }
/// ```
pub trait BindingModule {
    /// Register this module's bindings.
    fn configure(self, bindings: &mut Bindings) -> DiResult<()>;
}

impl<F> BindingModule for F
where
    F: FnOnce(&mut Bindings) -> DiResult<()>,
{
    fn configure(self, bindings: &mut Bindings) -> DiResult<()> {
        self(bindings)
    }
}
