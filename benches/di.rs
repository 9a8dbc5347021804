use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ferrous_lazy::*;
use std::sync::Arc;

// ===== Micro Benchmarks =====

fn bench_singleton_hit(c: &mut Criterion) {
    let mut bindings = Bindings::new();
    bindings
        .constructor::<u64, _>(|_| Ok(42))
        .declare::<u64>(Marker::Singleton(Scope::Root));
    let injector = bindings.build().unwrap();

    // Prime the singleton
    let _ = injector.get::<u64>().unwrap();

    c.bench_function("singleton_hit_u64", |b| {
        b.iter(|| {
            let v = injector.get::<u64>().unwrap();
            black_box(v);
        })
    });
}

fn bench_singleton_cold(c: &mut Criterion) {
    struct ExpensiveToCreate {
        data: Vec<u64>,
    }

    c.bench_function("singleton_cold_expensive", |b| {
        b.iter_batched(
            || {
                let mut bindings = Bindings::new();
                bindings
                    .constructor::<ExpensiveToCreate, _>(|_| {
                        Ok(ExpensiveToCreate {
                            data: (0..1000).collect(),
                        })
                    })
                    .declare::<ExpensiveToCreate>(Marker::Singleton(Scope::Root));
                bindings.build().unwrap()
            },
            |injector| {
                let v = injector.get::<ExpensiveToCreate>().unwrap();
                black_box(v.data.len());
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_session_vs_unscoped(c: &mut Criterion) {
    #[derive(Clone)]
    struct Service {
        data: [u8; 64],
    }

    let mut group = c.benchmark_group("session_vs_unscoped");

    let mut session_bindings = Bindings::new();
    session_bindings
        .constructor::<Service, _>(|_| Ok(Service { data: [0; 64] }))
        .declare::<Service>(Marker::Singleton(Scope::Session));
    let session_injector = session_bindings.build().unwrap();
    let session = session_injector
        .open_scope(session_injector.root(), Scope::Session)
        .unwrap();
    let _ = session.get::<Service>().unwrap();

    group.bench_function("session_hit", |b| {
        b.iter(|| {
            let v = session.get::<Service>().unwrap();
            black_box(v.data[0]);
        })
    });

    let mut unscoped_bindings = Bindings::new();
    unscoped_bindings.constructor::<Service, _>(|_| Ok(Service { data: [0; 64] }));
    let unscoped_injector = unscoped_bindings.build().unwrap();

    group.bench_function("unscoped_build", |b| {
        b.iter(|| {
            let v = unscoped_injector.get::<Service>().unwrap();
            black_box(v.data[0]);
        })
    });

    group.finish();
}

fn bench_concrete_vs_redirect(c: &mut Criterion) {
    trait Greeter: Send + Sync {
        fn greet(&self) -> &'static str;
    }

    #[derive(Default)]
    struct English;
    impl Greeter for English {
        fn greet(&self) -> &'static str {
            "hello"
        }
    }

    let mut bindings = Bindings::new();
    bindings
        .bind::<dyn Greeter, English, _>(|e| e as Arc<dyn Greeter>)
        .constructible::<English>()
        .declare::<English>(Marker::Singleton(Scope::Root));
    let injector = bindings.build().unwrap();
    let _ = injector.get::<English>().unwrap();

    let mut group = c.benchmark_group("concrete_vs_redirect");
    group.bench_function("concrete", |b| {
        b.iter(|| {
            let v = injector.get::<English>().unwrap();
            black_box(v.greet());
        })
    });
    group.bench_function("redirect", |b| {
        b.iter(|| {
            let v = injector.get::<dyn Greeter>().unwrap();
            black_box(v.greet());
        })
    });
    group.finish();
}

fn bench_deferred_replay(c: &mut Criterion) {
    #[derive(Default)]
    struct Clock;

    struct Widget {
        clock: Lazy<Clock>,
    }

    let mut bindings = Bindings::new();
    bindings
        .constructible::<Clock>()
        .declare::<Clock>(Marker::Singleton(Scope::Root));
    let injector = bindings.build().unwrap();

    let mut group = c.benchmark_group("deferred");
    for &count in &[1usize, 16, 256] {
        group.bench_with_input(BenchmarkId::new("attain_announce_get", count), &count, |b, &count| {
            b.iter(|| {
                let widgets: Vec<_> = (0..count)
                    .map(|_| {
                        Arc::new_cyclic(|me| Widget {
                            clock: injector.attain_for::<Clock, _>(me).unwrap(),
                        })
                    })
                    .collect();
                for widget in &widgets {
                    injector.announce(injector.root(), widget).unwrap();
                    black_box(widget.clock.get(&injector).unwrap());
                }
            })
        });
    }
    group.finish();
}

fn bench_scope_lifecycle(c: &mut Criterion) {
    #[derive(Default)]
    struct Basket;

    let mut bindings = Bindings::new();
    bindings
        .constructible::<Basket>()
        .declare::<Basket>(Marker::Singleton(Scope::Session));
    let injector = bindings.build().unwrap();

    let mut group = c.benchmark_group("scope_lifecycle");
    group.bench_function("open_close_empty", |b| {
        b.iter(|| {
            let session = injector.open_scope(injector.root(), Scope::Session).unwrap();
            black_box(session.id());
        })
    });
    group.bench_function("open_resolve_close", |b| {
        b.iter(|| {
            let session = injector.open_scope(injector.root(), Scope::Session).unwrap();
            let component = session.open(Scope::Component).unwrap();
            black_box(component.get::<Basket>().unwrap());
        })
    });
    group.finish();
}

fn bench_circular_detection_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("circular_detection");

    // Non-circular chain of depth 8
    #[derive(Default)]
    struct Service1;
    struct Service2 { _s1: Arc<Service1> }
    struct Service3 { _s2: Arc<Service2> }
    struct Service4 { _s3: Arc<Service3> }
    struct Service5 { _s4: Arc<Service4> }
    struct Service6 { _s5: Arc<Service5> }
    struct Service7 { _s6: Arc<Service6> }
    struct Service8 { _s7: Arc<Service7> }

    // Unscoped, so every resolution walks the whole chain
    let mut bindings = Bindings::new();
    bindings
        .constructible::<Service1>()
        .constructor::<Service2, _>(|inj| Ok(Service2 { _s1: inj.get()? }))
        .constructor::<Service3, _>(|inj| Ok(Service3 { _s2: inj.get()? }))
        .constructor::<Service4, _>(|inj| Ok(Service4 { _s3: inj.get()? }))
        .constructor::<Service5, _>(|inj| Ok(Service5 { _s4: inj.get()? }))
        .constructor::<Service6, _>(|inj| Ok(Service6 { _s5: inj.get()? }))
        .constructor::<Service7, _>(|inj| Ok(Service7 { _s6: inj.get()? }))
        .constructor::<Service8, _>(|inj| Ok(Service8 { _s7: inj.get()? }));
    let injector = bindings.build().unwrap();

    group.bench_function("chain_depth_8", |b| {
        b.iter(|| {
            let service = injector.get::<Service8>().unwrap();
            black_box(&service);
        })
    });

    group.finish();
}

fn bench_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("contention");

    let mut bindings = Bindings::new();
    bindings
        .constructor::<u64, _>(|_| Ok(42))
        .declare::<u64>(Marker::Singleton(Scope::Root));
    let injector = bindings.build().unwrap();

    // Prime the singleton
    let _ = injector.get::<u64>().unwrap();

    for &thread_count in &[1, 2, 4, 8] {
        group.bench_with_input(
            BenchmarkId::new("singleton_threads", thread_count),
            &thread_count,
            |b, &threads| {
                b.iter_custom(|iters| {
                    let start = std::time::Instant::now();
                    crossbeam_utils::thread::scope(|s| {
                        for _ in 0..threads {
                            let injector_ref = &injector;
                            s.spawn(move |_| {
                                for _ in 0..iters / threads as u64 {
                                    let v = injector_ref.get::<u64>().unwrap();
                                    black_box(v);
                                }
                            });
                        }
                    })
                    .unwrap();
                    start.elapsed()
                })
            },
        );
    }

    group.finish();
}

// ===== Macro Benchmarks =====

fn bench_mixed_workload(c: &mut Criterion) {
    // Simulate realistic workload: 70% root hits, 20% session hits, 10% unscoped
    struct RootService(u64);
    struct SessionService(u64);
    struct UnscopedService(u64);

    let mut bindings = Bindings::new();
    bindings
        .bind_instance(Arc::new(RootService(1)))
        .constructor::<SessionService, _>(|_| Ok(SessionService(2)))
        .declare::<SessionService>(Marker::Singleton(Scope::Session))
        .constructor::<UnscopedService, _>(|_| Ok(UnscopedService(3)));
    let injector = bindings.build().unwrap();
    let session = injector.open_scope(injector.root(), Scope::Session).unwrap();

    // Prime services
    let _ = injector.get::<RootService>().unwrap();
    let _ = session.get::<SessionService>().unwrap();

    c.bench_function("mixed_workload_realistic", |b| {
        b.iter(|| {
            for _ in 0..7 {
                let v = injector.get::<RootService>().unwrap();
                black_box(v.0);
            }

            for _ in 0..2 {
                let v = session.get::<SessionService>().unwrap();
                black_box(v.0);
            }

            let v = session.get::<UnscopedService>().unwrap();
            black_box(v.0);
        })
    });
}

criterion_group!(
    micro_benches,
    bench_singleton_hit,
    bench_singleton_cold,
    bench_session_vs_unscoped,
    bench_concrete_vs_redirect,
    bench_deferred_replay,
    bench_scope_lifecycle,
    bench_circular_detection_depth,
    bench_contention
);

criterion_group!(macro_benches, bench_mixed_workload);

criterion_main!(micro_benches, macro_benches);
