//! # anvil-di
//!
//! Runtime dependency resolution with covariant generic matching and
//! pluggable instance lifetimes.
//!
//! ## Features
//!
//! - **Lazy discovery**: the first request for a type finds the best way
//!   to construct it and caches a compiled factory
//! - **Covariant generics**: open-abstraction to open-concrete mappings
//!   with per-argument constraints, ranked by specificity
//! - **Lifetime strategies**: transient, singleton, per-thread,
//!   per-scope, and per-resolution-tree instance policies
//! - **Thread-safe**: concurrent first-use races publish exactly one
//!   self-consistent registry entry
//! - **Explicit metadata**: types describe their constructors and
//!   ancestry through a capability trait, no ambient reflection
//!
//! ## Quick Start
//!
//! ```rust
//! use anvil_di::{Ctor, ConstructionPlan, Injectable, Injector, TypeInfo};
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! impl Injectable for Database {
//!     fn type_info() -> TypeInfo {
//!         TypeInfo::concrete::<Self>().plan(
//!             ConstructionPlan::builder::<Self>()
//!                 .constructor(Ctor::new("new", 0, |_cx| {
//!                     Ok(Database {
//!                         connection_string: "postgres://localhost".to_string(),
//!                     })
//!                 }))
//!                 .build(),
//!         )
//!     }
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! impl Injectable for UserService {
//!     fn type_info() -> TypeInfo {
//!         TypeInfo::concrete::<Self>().plan(
//!             ConstructionPlan::builder::<Self>()
//!                 .constructor(Ctor::new("new", 1, |cx| {
//!                     Ok(UserService {
//!                         db: cx.get::<Database>()?,
//!                     })
//!                 }))
//!                 .build(),
//!         )
//!     }
//! }
//!
//! let injector = Injector::new();
//! let users = injector.get_required::<UserService>();
//! assert_eq!(users.db.connection_string, "postgres://localhost");
//! ```
//!
//! ## Lifetimes
//!
//! Registrations default to transient behavior: every resolution runs
//! the factory. Wrapping a registration in a lifetime manager changes
//! how results are cached:
//!
//! ```rust
//! use anvil_di::{
//!     Ctor, ConstructionPlan, Injectable, Injector, Singleton, TypeInfo,
//! };
//! use std::sync::Arc;
//!
//! struct Cache;
//!
//! impl Injectable for Cache {
//!     fn type_info() -> TypeInfo {
//!         TypeInfo::concrete::<Self>().plan(
//!             ConstructionPlan::builder::<Self>()
//!                 .constructor(Ctor::new("new", 0, |_cx| Ok(Cache)))
//!                 .build(),
//!         )
//!     }
//! }
//!
//! let injector = Injector::new();
//! injector.set_factory_lifetime(|_cx| Ok(Cache), Arc::new(Singleton::new()));
//!
//! let a = injector.get_required::<Cache>();
//! let b = injector.get_required::<Cache>();
//! assert!(Arc::ptr_eq(&a, &b));
//! ```
//!
//! ## Trait registrations
//!
//! ```rust
//! use anvil_di::{Ctor, ConstructionPlan, Injectable, Injector, TypeInfo};
//! use std::sync::Arc;
//!
//! trait Logger: Send + Sync {
//!     fn log(&self, message: &str);
//! }
//!
//! struct ConsoleLogger;
//!
//! impl Logger for ConsoleLogger {
//!     fn log(&self, message: &str) {
//!         println!("[LOG] {}", message);
//!     }
//! }
//!
//! impl Injectable for ConsoleLogger {
//!     fn type_info() -> TypeInfo {
//!         TypeInfo::concrete::<Self>().plan(
//!             ConstructionPlan::builder::<Self>()
//!                 .constructor(Ctor::new("new", 0, |_cx| Ok(ConsoleLogger)))
//!                 .build(),
//!         )
//!     }
//! }
//!
//! let injector = Injector::new();
//! injector.set_trait_resolver::<dyn Logger, ConsoleLogger, _>(|c| c);
//!
//! let logger = injector.get_required_trait::<dyn Logger>();
//! logger.log("resolved");
//! ```

// Module declarations
pub mod construct;
pub mod error;
pub mod key;
pub mod lifetime;
pub mod metadata;
pub mod observer;
pub mod scope;

// Internal modules
mod context;
mod covariant;
mod fluent;
mod injector;
mod registration;

// Re-export core types
pub use construct::{ConstructionPlan, Ctor, MemberTag, PlanBuilder};
pub use context::ResolverContext;
pub use error::{DiError, DiResult};
pub use fluent::Fluent;
pub use injector::Injector;
pub use key::{OpenType, TypeKey};
pub use lifetime::{
    Activation, LifetimeManager, PerResolve, PerScope, PerThread, Singleton, Transient,
};
pub use metadata::{GenericInfo, Implements, Injectable, TypeInfo};
pub use observer::{DiObserver, LoggingObserver};
pub use registration::AnyHandle;
pub use scope::{MemoryScope, ScopeProvider};
