#![no_main]

use ferrous_lazy::{Bindings, DiError, Marker, Resolver, Scope};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

trait Node: Send + Sync {
    fn id(&self) -> u8;
}

macro_rules! nodes {
    ($($name:ident = $id:expr),* $(,)?) => {
        $(
            #[derive(Default)]
            struct $name;
            impl Node for $name {
                fn id(&self) -> u8 {
                    $id
                }
            }
        )*
    };
}

nodes!(N0 = 0, N1 = 1, N2 = 2, N3 = 3);

const SCOPES: [Scope; 4] = [Scope::Root, Scope::Session, Scope::Component, Scope::Unscoped];

fn declare(bindings: &mut Bindings, node: u8, scope: Scope) {
    let marker = Marker::Singleton(scope);
    match node % 4 {
        0 => bindings.declare::<N0>(marker),
        1 => bindings.declare::<N1>(marker),
        2 => bindings.declare::<N2>(marker),
        _ => bindings.declare::<N3>(marker),
    };
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 6 {
        return;
    }

    // Byte 0 picks what `dyn Node` redirects to; bytes 1..5 pick each node's scope.
    let mut bindings = Bindings::new();
    match data[0] % 4 {
        0 => bindings.bind::<dyn Node, N0, _>(|n| n as Arc<dyn Node>),
        1 => bindings.bind::<dyn Node, N1, _>(|n| n as Arc<dyn Node>),
        2 => bindings.bind::<dyn Node, N2, _>(|n| n as Arc<dyn Node>),
        _ => bindings.bind::<dyn Node, N3, _>(|n| n as Arc<dyn Node>),
    };
    bindings
        .constructible::<N0>()
        .constructible::<N1>()
        .constructible::<N2>()
        .constructible::<N3>();
    for node in 0..4u8 {
        let scope = SCOPES[(data[1 + node as usize] % 4) as usize];
        if scope != Scope::Unscoped {
            declare(&mut bindings, node, scope);
        }
    }

    let injector = match bindings.build() {
        Ok(injector) => injector,
        Err(_) => return,
    };
    let session = injector.open_scope(injector.root(), Scope::Session).unwrap();
    let component = session.open(Scope::Component).unwrap();

    for &op in &data[5..] {
        let requester = match op % 3 {
            0 => injector.root(),
            1 => session.id(),
            _ => component.id(),
        };
        match injector.attain_for::<dyn Node, _>(&requester).and_then(|h| h.get(&injector)) {
            Ok(node) => assert_eq!(node.id(), data[0] % 4),
            Err(DiError::ScopeViolation { .. }) => {}
            Err(other) => panic!("unexpected failure: {}", other),
        }
    }
});
