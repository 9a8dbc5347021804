//! Binding descriptors for introspection and diagnostics.

use crate::key::{Flavor, TypeKey};
use crate::registration::{Binding, BindingRegistry, Marker};

/// What a descriptor describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorKind {
    /// Redirect to another type.
    Redirect(TypeKey),
    /// Literal instance.
    Instance,
    /// Provider closure.
    Provider,
    /// Constructor for the type itself.
    Constructor,
    /// Scope marker.
    Declaration(Marker),
}

/// One registration, as seen from outside.
///
/// # Use Cases
///
/// - **Debugging**: list what is bound to what
/// - **Health checks**: verify at startup that every required type is covered
///
/// # Examples
///
/// ```rust
/// use ferrous_lazy::{Bindings, DescriptorKind, Marker, Scope, TypeKey};
/// use std::sync::Arc;
///
/// trait Feed: Send + Sync {}
/// #[derive(Default)]
/// struct Rss;
/// impl Feed for Rss {}
///
/// let mut bindings = Bindings::new();
/// bindings
///     .bind_flavored::<dyn Feed, Rss, _>("news", |r| r as Arc<dyn Feed>)
///     .constructible::<Rss>()
///     .declare::<Rss>(Marker::Singleton(Scope::Session));
///
/// let descriptors = bindings.descriptors();
/// assert_eq!(descriptors.len(), 3);
///
/// let redirect = descriptors.iter().find(|d| d.is_flavored()).unwrap();
/// assert_eq!(redirect.flavor, Some("news"));
/// assert_eq!(redirect.kind, DescriptorKind::Redirect(TypeKey::of::<Rss>()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingDescriptor {
    /// Type the registration is for.
    pub ty: TypeKey,
    /// Flavor of a binding rule, `None` for the default flavor.
    pub flavor: Option<Flavor>,
    pub kind: DescriptorKind,
}

impl BindingDescriptor {
    /// Get the type name
    pub fn type_name(&self) -> &'static str {
        self.ty.name()
    }

    pub fn is_flavored(&self) -> bool {
        self.flavor.is_some()
    }

    /// Lists every registration in `registry`, ordered by type name.
    pub(crate) fn collect(registry: &BindingRegistry) -> Vec<BindingDescriptor> {
        let mut descriptors = Vec::new();
        for ((ty, flavor), binding) in registry.rules() {
            let kind = match binding {
                Binding::Redirect { to, .. } => DescriptorKind::Redirect(*to),
                Binding::Instance(_) => DescriptorKind::Instance,
                Binding::Provider(_) => DescriptorKind::Provider,
            };
            descriptors.push(BindingDescriptor { ty: *ty, flavor: *flavor, kind });
        }
        for ty in registry.constructors() {
            descriptors.push(BindingDescriptor {
                ty: *ty,
                flavor: None,
                kind: DescriptorKind::Constructor,
            });
        }
        for (ty, declaration) in registry.declarations() {
            for marker in declaration.markers() {
                descriptors.push(BindingDescriptor {
                    ty: *ty,
                    flavor: None,
                    kind: DescriptorKind::Declaration(*marker),
                });
            }
        }
        descriptors.sort_by(|a, b| a.ty.name().cmp(b.ty.name()).then(a.flavor.cmp(&b.flavor)));
        descriptors
    }
}
