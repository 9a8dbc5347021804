/// Property-based tests for resolution
///
/// These tests verify that resolution follows the scope rules and caching
/// behaviour regardless of the specific scopes, flavors or request counts used.

use ferrous_lazy::{Bindings, DiError, InjectorConfig, Marker, Resolver, Scope};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Service;

#[derive(Debug)]
struct Tagged(&'static str);

fn nested_scope() -> impl Strategy<Value = Scope> {
    prop::sample::select(Scope::NESTED.to_vec())
}

// Property: a request succeeds exactly when the requester may access the target scope
proptest! {
    #[test]
    fn access_follows_scope_order(declared in nested_scope(), requester in nested_scope()) {
        let mut bindings = Bindings::new();
        bindings
            .constructible::<Service>()
            .declare::<Service>(Marker::Singleton(declared));
        let injector = bindings.build().unwrap();

        let session = injector.open_scope(injector.root(), Scope::Session).unwrap();
        let component = session.open(Scope::Component).unwrap();
        let consumer = match requester {
            Scope::Root => injector.root(),
            Scope::Session => session.id(),
            _ => component.id(),
        };

        let result = injector.attain_for::<Service, _>(&consumer).and_then(|h| h.get(&injector));
        if requester.can_access(declared) {
            prop_assert!(result.is_ok());
        } else {
            let is_violation = matches!(result, Err(DiError::ScopeViolation { .. }));
            prop_assert!(is_violation);
        }
    }
}

// Property: a cached singleton is constructed once however often it is requested
proptest! {
    #[test]
    fn cached_singleton_built_once(
        declared in nested_scope(),
        requests in 1usize..40,
    ) {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();

        let mut bindings = Bindings::new();
        bindings
            .constructor::<Service, _>(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Service)
            })
            .declare::<Service>(Marker::Singleton(declared))
            .with_config(InjectorConfig::default().with_cache_component_scope(true));
        let injector = bindings.build().unwrap();

        let session = injector.open_scope(injector.root(), Scope::Session).unwrap();
        let component = session.open(Scope::Component).unwrap();

        let first = component.get::<Service>().unwrap();
        for _ in 1..requests {
            let again = component.get::<Service>().unwrap();
            prop_assert!(Arc::ptr_eq(&first, &again));
        }
        prop_assert_eq!(built.load(Ordering::SeqCst), 1);
    }
}

// Property: unscoped types are never shared
proptest! {
    #[test]
    fn unscoped_never_shared(requests in 2usize..20) {
        let mut bindings = Bindings::new();
        bindings.constructible::<Service>();
        let injector = bindings.build().unwrap();

        let resolved: Vec<_> = (0..requests).map(|_| injector.get::<Service>().unwrap()).collect();
        for pair in resolved.windows(2) {
            prop_assert!(!Arc::ptr_eq(&pair[0], &pair[1]));
        }
        prop_assert_eq!(injector.cached_count(), 0);
    }
}

// Property: a flavored request uses its own rule when bound and the default otherwise
proptest! {
    #[test]
    fn flavor_falls_back_to_default(
        bound in prop::collection::hash_set(prop::sample::select(vec!["red", "green", "blue"]), 0..3),
        asked in prop::sample::select(vec!["red", "green", "blue", "violet"]),
    ) {
        let mut bindings = Bindings::new();
        bindings.bind_instance(Arc::new(Tagged("default")));
        for flavor in bound.iter().copied() {
            bindings.bind_instance_flavored(flavor, Arc::new(Tagged(flavor)));
        }
        let injector = bindings.build().unwrap();

        let tagged = injector.get_flavored::<Tagged>(Some(asked)).unwrap();
        if bound.contains(&asked) {
            prop_assert_eq!(tagged.0, asked);
        } else {
            prop_assert_eq!(tagged.0, "default");
        }
    }
}

// Property: closing every scope in any order leaves only the root
proptest! {
    #[test]
    fn scopes_close_in_any_order(
        sessions in 1usize..6,
        components in 0usize..4,
        order in any::<prop::sample::Index>(),
    ) {
        let mut bindings = Bindings::new();
        bindings
            .constructible::<Service>()
            .declare::<Service>(Marker::Singleton(Scope::Session));
        let injector = bindings.build().unwrap();

        let mut handles = Vec::new();
        for _ in 0..sessions {
            let session = injector.open_scope(injector.root(), Scope::Session).unwrap();
            session.get::<Service>().unwrap();
            for _ in 0..components {
                handles.push(session.open(Scope::Component).unwrap());
            }
            handles.push(session);
        }
        prop_assert_eq!(injector.scope_count(), 1 + sessions * (components + 1));
        prop_assert_eq!(injector.cached_count(), sessions);

        let rotate = order.index(handles.len());
        handles.rotate_left(rotate);
        drop(handles);

        prop_assert_eq!(injector.scope_count(), 1);
        prop_assert_eq!(injector.cached_count(), 0);
    }
}
