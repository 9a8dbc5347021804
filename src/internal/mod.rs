//! Internal implementation details.

pub(crate) mod circular;
pub(crate) mod instance;

pub(crate) use circular::with_circular_catch;
pub(crate) use instance::{Anchor, AnyArc, Instance, WeakInstance};
