use ferrous_lazy::{Bindings, DiError, InjectorConfig, Marker, Resolver, Scope};
use std::sync::{Arc, Mutex};

#[derive(Debug)]
struct Basket {
    id: String,
}

fn basket_bindings(counter: Arc<Mutex<u32>>) -> Bindings {
    let mut bindings = Bindings::new();
    bindings
        .constructor::<Basket, _>(move |_| {
            let mut c = counter.lock().unwrap();
            *c += 1;
            Ok(Basket {
                id: format!("basket-{}", *c),
            })
        })
        .declare::<Basket>(Marker::Singleton(Scope::Session));
    bindings
}

#[test]
fn test_session_singleton_lifetime() {
    let counter = Arc::new(Mutex::new(0));
    let injector = basket_bindings(counter.clone()).build().unwrap();

    let session1 = injector.open_scope(injector.root(), Scope::Session).unwrap();
    let session2 = injector.open_scope(injector.root(), Scope::Session).unwrap();

    let b1a = session1.get::<Basket>().unwrap();
    let b1b = session1.get::<Basket>().unwrap();
    let b2a = session2.get::<Basket>().unwrap();
    let b2b = session2.get::<Basket>().unwrap();

    // Same instance within a session
    assert!(Arc::ptr_eq(&b1a, &b1b));
    assert!(Arc::ptr_eq(&b2a, &b2b));

    // Different instances across sessions
    assert!(!Arc::ptr_eq(&b1a, &b2a));
    assert_eq!(b1a.id, "basket-1");
    assert_eq!(b2a.id, "basket-2");
    assert_eq!(*counter.lock().unwrap(), 2);
}

#[test]
fn test_component_sees_enclosing_session_singleton() {
    let injector = basket_bindings(Arc::new(Mutex::new(0))).build().unwrap();

    let session = injector.open_scope(injector.root(), Scope::Session).unwrap();
    let component = session.open(Scope::Component).unwrap();

    let from_session = session.get::<Basket>().unwrap();
    let from_component = component.get::<Basket>().unwrap();
    assert!(Arc::ptr_eq(&from_session, &from_component));
}

#[test]
fn test_cannot_resolve_session_singleton_from_root() {
    let injector = basket_bindings(Arc::new(Mutex::new(0))).build().unwrap();

    match injector.get::<Basket>() {
        Err(DiError::ScopeViolation { requester, target, .. }) => {
            assert_eq!(requester, Scope::Root);
            assert_eq!(target, Scope::Session);
        }
        other => panic!("expected ScopeViolation, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_root_singleton_cannot_depend_on_session_singleton() {
    struct Catalog {
        _basket: Arc<Basket>,
    }

    let mut bindings = basket_bindings(Arc::new(Mutex::new(0)));
    bindings
        .constructor::<Catalog, _>(|inj| Ok(Catalog { _basket: inj.get::<Basket>()? }))
        .declare::<Catalog>(Marker::Singleton(Scope::Root));
    let injector = bindings.build().unwrap();
    let session = injector.open_scope(injector.root(), Scope::Session).unwrap();

    // Catalog lives in Root no matter who asks, so it can't hold a Basket
    match session.get::<Catalog>() {
        Err(DiError::UnableToObtainInstance { source: Some(source), .. }) => {
            assert!(matches!(*source, DiError::ScopeViolation { .. }));
        }
        other => panic!("expected wrapped ScopeViolation, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_unscoped_inherits_consumer_scope() {
    struct Widget {
        scope: Scope,
    }

    let mut bindings = Bindings::new();
    bindings.constructor::<Widget, _>(|inj| Ok(Widget { scope: inj.scope() }));
    let injector = bindings.build().unwrap();

    let session = injector.open_scope(injector.root(), Scope::Session).unwrap();
    let component = session.open(Scope::Component).unwrap();

    assert_eq!(injector.get::<Widget>().unwrap().scope, Scope::Root);
    assert_eq!(session.get::<Widget>().unwrap().scope, Scope::Session);
    assert_eq!(component.get::<Widget>().unwrap().scope, Scope::Component);
}

#[test]
fn test_unscoped_chain_inherits_outer_scope() {
    #[derive(Default)]
    struct Leaf;
    struct Branch {
        leaf_scope: Scope,
    }

    let mut bindings = Bindings::new();
    bindings
        .constructible::<Leaf>()
        .constructor::<Branch, _>(|inj| {
            let leaf = inj.attain::<Leaf>()?;
            Ok(Branch {
                leaf_scope: leaf.info().scope.unwrap_or(Scope::Unscoped),
            })
        });
    let injector = bindings.build().unwrap();
    let session = injector.open_scope(injector.root(), Scope::Session).unwrap();

    // Branch inherits Session, Leaf inherits Session from Branch
    assert_eq!(session.get::<Branch>().unwrap().leaf_scope, Scope::Session);
    assert_eq!(injector.get::<Branch>().unwrap().leaf_scope, Scope::Root);
}

#[test]
fn test_component_singletons_are_not_cached_by_default() {
    let counter = Arc::new(Mutex::new(0u32));
    let counter_clone = counter.clone();

    #[derive(Debug)]
    struct Panel(u32);

    let mut bindings = Bindings::new();
    bindings
        .constructor::<Panel, _>(move |_| {
            let mut c = counter_clone.lock().unwrap();
            *c += 1;
            Ok(Panel(*c))
        })
        .declare::<Panel>(Marker::Singleton(Scope::Component));
    let injector = bindings.build().unwrap();

    let session = injector.open_scope(injector.root(), Scope::Session).unwrap();
    let component = session.open(Scope::Component).unwrap();

    let a = component.get::<Panel>().unwrap();
    let b = component.get::<Panel>().unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(*counter.lock().unwrap(), 2);
}

#[test]
fn test_component_caching_can_be_enabled() {
    #[derive(Default)]
    struct Panel;

    let mut bindings = Bindings::new();
    bindings
        .constructible::<Panel>()
        .declare::<Panel>(Marker::Singleton(Scope::Component))
        .with_config(InjectorConfig::default().with_cache_component_scope(true));
    let injector = bindings.build().unwrap();

    let session = injector.open_scope(injector.root(), Scope::Session).unwrap();
    let component1 = session.open(Scope::Component).unwrap();
    let component2 = session.open(Scope::Component).unwrap();

    let a = component1.get::<Panel>().unwrap();
    assert!(Arc::ptr_eq(&a, &component1.get::<Panel>().unwrap()));
    assert!(!Arc::ptr_eq(&a, &component2.get::<Panel>().unwrap()));
}

#[test]
fn test_scope_kinds_must_nest() {
    let injector = Bindings::new().build().unwrap();
    let session = injector.open_scope(injector.root(), Scope::Session).unwrap();
    let component = session.open(Scope::Component).unwrap();
    assert_eq!(component.parent(), Some(session.id()));
    assert_eq!(session.parent(), Some(injector.root()));

    assert!(matches!(session.open(Scope::Session), Err(DiError::Bind(_))));
    assert!(matches!(component.open(Scope::Session), Err(DiError::Bind(_))));
    assert!(matches!(injector.open_scope(injector.root(), Scope::Root), Err(DiError::Bind(_))));
    assert!(matches!(
        injector.open_scope(injector.root(), Scope::Unscoped),
        Err(DiError::Bind(_))
    ));
}

#[test]
fn test_closing_scope_evicts_its_instances() {
    let injector = basket_bindings(Arc::new(Mutex::new(0))).build().unwrap();
    assert_eq!(injector.scope_count(), 1);

    let session = injector.open_scope(injector.root(), Scope::Session).unwrap();
    let component = session.open(Scope::Component).unwrap();
    let basket = session.get::<Basket>().unwrap();
    let weak = Arc::downgrade(&basket);
    drop(basket);

    assert_eq!(injector.scope_count(), 3);
    assert_eq!(injector.cached_count(), 1);
    assert!(weak.upgrade().is_some(), "the cache keeps the singleton alive");

    session.close();

    // Nested scopes close with their parent
    assert!(!component.is_open());
    assert_eq!(injector.scope_count(), 1);
    assert_eq!(injector.cached_count(), 0);
    assert!(weak.upgrade().is_none());
}

#[test]
fn test_closed_scope_rejects_new_requests() {
    let injector = basket_bindings(Arc::new(Mutex::new(0))).build().unwrap();
    let session = injector.open_scope(injector.root(), Scope::Session).unwrap();
    let id = session.id();
    let lazy = session.attain::<Basket>().unwrap();
    drop(session);

    assert!(matches!(
        injector.attain_for::<Basket, _>(&id),
        Err(DiError::UnableToObtainContext { .. })
    ));
    assert!(matches!(lazy.get(&injector), Err(DiError::UnableToObtainContext { .. })));
}

#[test]
fn test_find_only_returns_cached_instances() {
    let injector = basket_bindings(Arc::new(Mutex::new(0))).build().unwrap();
    let session = injector.open_scope(injector.root(), Scope::Session).unwrap();
    let other = injector.open_scope(injector.root(), Scope::Session).unwrap();
    let component = session.open(Scope::Component).unwrap();

    assert!(injector.find::<Basket>(session.id(), None).is_none());

    let basket = session.get::<Basket>().unwrap();
    let found = injector.find::<Basket>(component.id(), None).unwrap();
    assert!(Arc::ptr_eq(&basket, &found));
    assert!(injector.find::<Basket>(other.id(), None).is_none());
}

#[test]
fn test_owner_resolves_to_announced_instance() {
    struct Screen {
        title: &'static str,
    }
    struct Toolbar {
        screen: Arc<Screen>,
    }

    let mut bindings = Bindings::new();
    bindings
        .declare::<Screen>(Marker::Owner(Scope::Session))
        .constructor::<Toolbar, _>(|inj| Ok(Toolbar { screen: inj.get::<Screen>()? }));
    let injector = bindings.build().unwrap();

    let session = injector.open_scope(injector.root(), Scope::Session).unwrap();
    let component = session.open(Scope::Component).unwrap();

    // Nobody owns the session yet
    assert!(component.get::<Toolbar>().is_err());

    let screen = Arc::new(Screen { title: "Inbox" });
    session.announce(&screen).unwrap();

    let toolbar = component.get::<Toolbar>().unwrap();
    assert!(Arc::ptr_eq(&toolbar.screen, &screen));
    assert_eq!(toolbar.screen.title, "Inbox");
}

#[test]
fn test_announce_checks_context_against_declared_scope() {
    struct App;
    struct Widget;
    #[derive(Default)]
    struct Logger;

    let mut bindings = Bindings::new();
    bindings
        .declare::<App>(Marker::Singleton(Scope::Root))
        .declare::<Widget>(Marker::Singleton(Scope::Component))
        .constructible::<Logger>();
    let injector = bindings.build().unwrap();
    let session = injector.open_scope(injector.root(), Scope::Session).unwrap();

    // A session may hold a root-lived instance; it lives in the root
    let app = Arc::new(App);
    session.announce(&app).unwrap();
    let logger = injector.attain_for::<Logger, _>(&app).unwrap();
    assert_eq!(logger.info().scope, Some(Scope::Root));
    assert_eq!(logger.info().context, Some(injector.root()));
    assert!(logger.get(&injector).is_ok());

    // ...but not one that needs a component
    let widget = Arc::new(Widget);
    match session.announce(&widget) {
        Err(DiError::ScopeViolation { requester, target, .. }) => {
            assert_eq!(requester, Scope::Session);
            assert_eq!(target, Scope::Component);
        }
        other => panic!("expected ScopeViolation, got {:?}", other),
    }

    let component = session.open(Scope::Component).unwrap();
    component.announce(&widget).unwrap();
    let logger = injector.attain_for::<Logger, _>(&widget).unwrap();
    assert_eq!(logger.info().context, Some(component.id()));
}
