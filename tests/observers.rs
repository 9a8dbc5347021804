use ferrous_lazy::{
    BindingKey, Bindings, DiError, InjectionObserver, Lazy, LoggingObserver, Marker, Resolver, Scope, TypeKey,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl Recorder {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl InjectionObserver for Recorder {
    fn attained(&self, requested: TypeKey, deferred: bool) {
        self.events
            .lock()
            .unwrap()
            .push(format!("attained {} deferred={}", requested.short_name(), deferred));
    }

    fn resolving(&self, key: &BindingKey) {
        self.events.lock().unwrap().push(format!("resolving {}", key.leaf().short_name()));
    }

    fn resolved(&self, key: &BindingKey, _elapsed: Duration) {
        self.events.lock().unwrap().push(format!("resolved {}", key.leaf().short_name()));
    }

    fn replayed(&self, requested: TypeKey, scope: Scope) {
        self.events
            .lock()
            .unwrap()
            .push(format!("replayed {} in {}", requested.short_name(), scope));
    }

    fn factory_panic(&self, key: &BindingKey, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push(format!("panic {}: {}", key.leaf().short_name(), message));
    }

    fn failure(&self, error: &DiError) {
        self.events.lock().unwrap().push(format!("failure {}", error));
    }
}

#[derive(Default)]
struct Engine;

struct Car {
    engine: Lazy<Engine>,
}

struct Wreck;

fn bindings_with(recorder: Arc<Recorder>) -> Bindings {
    let mut bindings = Bindings::new();
    bindings
        .constructible::<Engine>()
        .declare::<Engine>(Marker::Singleton(Scope::Root))
        .constructor::<Wreck, _>(|_| -> ferrous_lazy::DiResult<Wreck> { panic!("engine fire") })
        .add_observer(recorder);
    bindings
}

#[test]
fn test_observer_sees_build_events() {
    let recorder = Arc::new(Recorder::default());
    let injector = bindings_with(recorder.clone()).build().unwrap();

    injector.get::<Engine>().unwrap();
    // Second request is a cache hit
    injector.get::<Engine>().unwrap();

    let events = recorder.events();
    assert_eq!(
        events,
        vec![
            "attained Engine deferred=false",
            "resolving Engine",
            "resolved Engine",
            "attained Engine deferred=false",
        ]
    );
}

#[test]
fn test_observer_sees_deferred_replay() {
    let recorder = Arc::new(Recorder::default());
    let injector = bindings_with(recorder.clone()).build().unwrap();
    let session = injector.open_scope(injector.root(), Scope::Session).unwrap();

    let car = Arc::new_cyclic(|me| Car {
        engine: injector.attain_for::<Engine, _>(me).unwrap(),
    });
    session.announce(&car).unwrap();
    car.engine.get(&injector).unwrap();

    let events = recorder.events();
    assert_eq!(events[0], "attained Engine deferred=true");
    assert_eq!(events[1], "replayed Engine in Session");
    assert!(events.contains(&"resolved Engine".to_string()));
}

#[test]
fn test_observer_sees_panics_and_failures() {
    let recorder = Arc::new(Recorder::default());
    let injector = bindings_with(recorder.clone()).build().unwrap();

    assert!(injector.get::<Wreck>().is_err());

    let events = recorder.events();
    assert!(events.iter().any(|e| e == "panic Wreck: engine fire"));
    assert!(events.iter().any(|e| e.starts_with("failure ") && e.contains("engine fire")));
}

#[test]
fn test_logging_observer_writes_through_log() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut bindings = Bindings::new();
    bindings
        .constructible::<Engine>()
        .add_observer(Arc::new(LoggingObserver::with_prefix("[test]")));
    let injector = bindings.build().unwrap();

    assert!(injector.get::<Engine>().is_ok());
    assert!(injector.get::<Wreck>().is_err());
}
