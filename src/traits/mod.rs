//! Core traits for the lazy injector.

mod hooks;
mod resolver;

pub use hooks::{FailureContext, InjectorHooks, Recovery, Supplied, Unannounced};
pub(crate) use hooks::DefaultHooks;
pub use resolver::Resolver;
