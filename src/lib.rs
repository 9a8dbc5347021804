//! # ferrous-lazy
//!
//! Lazy, scope-aware dependency resolution for applications built from
//! nested lifetimes.
//!
//! ## Features
//!
//! - **Nested scopes**: Root, Session and Component scopes, each a narrower
//!   lifetime inside the previous one
//! - **Deferred handles**: [`Lazy<T>`] can be requested before the consumer
//!   asking for it is fully constructed, and resolves on first use
//! - **Binding rules**: redirect interfaces to implementations, bind
//!   literal instances or provider closures, per flavor
//! - **Scope singletons**: one instance per scope instance, built exactly
//!   once even under contention
//! - **Failure hook**: observe every failure and optionally recover a
//!   missing context
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_lazy::{Bindings, Marker, Resolver, Scope};
//! use std::sync::Arc;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let mut bindings = Bindings::new();
//! bindings
//!     .bind_instance(Arc::new(Database { url: "postgres://localhost".to_string() }))
//!     .constructor::<UserService, _>(|inj| Ok(UserService { db: inj.get::<Database>()? }))
//!     .declare::<UserService>(Marker::Singleton(Scope::Root));
//!
//! let injector = bindings.build().unwrap();
//! let users = injector.get::<UserService>().unwrap();
//! assert_eq!(users.db.url, "postgres://localhost");
//! ```
//!
//! ## Scopes
//!
//! A `Session` singleton is shared inside one session and fresh in the next:
//!
//! ```rust
//! use ferrous_lazy::{Bindings, Marker, Resolver, Scope};
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct Account;
//!
//! let mut bindings = Bindings::new();
//! bindings
//!     .constructible::<Account>()
//!     .declare::<Account>(Marker::Singleton(Scope::Session));
//! let injector = bindings.build().unwrap();
//!
//! let first = injector.open_scope(injector.root(), Scope::Session).unwrap();
//! let second = injector.open_scope(injector.root(), Scope::Session).unwrap();
//!
//! let a = first.get::<Account>().unwrap();
//! assert!(Arc::ptr_eq(&a, &first.get::<Account>().unwrap()));
//! assert!(!Arc::ptr_eq(&a, &second.get::<Account>().unwrap()));
//! ```
//!
//! ## Deferred Handles
//!
//! A consumer that is still being built can request its dependencies
//! through a weak reference to itself. The handles wait until the consumer
//! is announced in a scope:
//!
//! ```rust
//! use ferrous_lazy::{Bindings, Lazy, Marker, Phase, Scope};
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct Clock;
//!
//! struct Screen {
//!     clock: Lazy<Clock>,
//! }
//!
//! let mut bindings = Bindings::new();
//! bindings
//!     .constructible::<Clock>()
//!     .declare::<Clock>(Marker::Singleton(Scope::Root));
//! let injector = bindings.build().unwrap();
//!
//! let screen = Arc::new_cyclic(|me| Screen {
//!     clock: injector.attain_for::<Clock, _>(me).unwrap(),
//! });
//! assert_eq!(screen.clock.phase(), Phase::Created);
//!
//! injector.announce(injector.root(), &screen).unwrap();
//! assert_eq!(screen.clock.phase(), Phase::PreProcessed);
//! assert!(screen.clock.get(&injector).is_ok());
//! ```

pub mod collection;
pub mod config;
pub mod descriptors;
pub mod error;
pub mod global;
pub mod key;
pub mod lifetime;
pub mod observer;
pub mod provider;
pub mod traits;

// Internal modules
mod cache;
mod handle;
mod internal;
mod registration;

// Re-export core types
pub use collection::{BindingModule, Bindings};
pub use config::InjectorConfig;
pub use descriptors::{BindingDescriptor, DescriptorKind};
pub use error::{DiError, DiResult};
pub use global::{install, installed, teardown};
pub use handle::{Consumer, HandleInfo, Lazy, Phase, Requester};
pub use key::{BindingKey, Flavor, TypeKey};
pub use lifetime::Scope;
pub use observer::{InjectionObserver, LoggingObserver};
pub use provider::{Injection, Injector, ScopeHandle, ScopeId};
pub use registration::Marker;
pub use traits::{FailureContext, InjectorHooks, Recovery, Resolver, Supplied, Unannounced};
