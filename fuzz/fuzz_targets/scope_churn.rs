#![no_main]

use ferrous_lazy::{Bindings, Lazy, Marker, Resolver, Scope, ScopeHandle};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

#[derive(Default)]
struct Basket;

struct Widget {
    basket: Lazy<Basket>,
}

fuzz_target!(|data: &[u8]| {
    let mut bindings = Bindings::new();
    bindings
        .constructible::<Basket>()
        .declare::<Basket>(Marker::Singleton(Scope::Session));
    let injector = bindings.build().unwrap();

    let mut sessions: Vec<ScopeHandle> = Vec::new();
    let mut widgets: Vec<Arc<Widget>> = Vec::new();

    for &op in data {
        let arg = (op >> 3) as usize;
        match op & 0x7 {
            0 => sessions.push(injector.open_scope(injector.root(), Scope::Session).unwrap()),
            1 if !sessions.is_empty() => {
                let index = arg % sessions.len();
                sessions.remove(index);
            }
            2 => widgets.push(Arc::new_cyclic(|me| Widget {
                basket: injector.attain_for::<Basket, _>(me).unwrap(),
            })),
            3 if !sessions.is_empty() && !widgets.is_empty() => {
                let session = &sessions[arg % sessions.len()];
                let _ = session.announce(&widgets[arg % widgets.len()]);
            }
            4 if !widgets.is_empty() => {
                let widget = &widgets[arg % widgets.len()];
                let _ = widget.basket.get(&injector);
            }
            5 if !widgets.is_empty() => {
                let index = arg % widgets.len();
                widgets.remove(index);
            }
            6 if !sessions.is_empty() => {
                let session = &sessions[arg % sessions.len()];
                let _ = session.get::<Basket>().unwrap();
            }
            _ => {}
        }
    }

    drop(sessions);
    assert_eq!(injector.scope_count(), 1);
    assert_eq!(injector.cached_count(), 0);
});
