//! Per-resolution context threaded through one top-level resolve call.

use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::key::{short_type_name, TypeKey};
use crate::metadata::Injectable;
use crate::registration::{AnyHandle, Map};
use crate::Injector;

/// Ephemeral state of one top-level resolution call: the in-progress
/// key stack (recursion detection) and the per-resolution-tree cache.
/// Created fresh per call, shared by the whole dependency sub-graph,
/// discarded when the call returns.
pub(crate) struct Frame {
    stack: Vec<TypeKey>,
    tree: Map<TypeKey, AnyHandle>,
}

impl Frame {
    pub(crate) fn new() -> Self {
        Self {
            stack: Vec::new(),
            tree: Map::default(),
        }
    }

    /// Marks a resolution of `key` as in progress. Re-entering a key
    /// already on the stack is a dependency cycle and fails explicitly.
    pub(crate) fn enter(&mut self, key: TypeKey) -> DiResult<()> {
        if self.stack.contains(&key) {
            return Err(DiError::ResolutionRecursion(short_type_name(key.type_name())));
        }
        self.stack.push(key);
        Ok(())
    }

    pub(crate) fn exit(&mut self) {
        self.stack.pop();
    }

    pub(crate) fn tree_get(&self, key: &TypeKey) -> Option<AnyHandle> {
        self.tree.get(key).cloned()
    }

    pub(crate) fn tree_put(&mut self, key: TypeKey, value: AnyHandle) {
        self.tree.insert(key, value);
    }
}

/// Context passed to factory closures, constructor descriptors, and
/// initializers for resolving their dependencies.
///
/// Nested resolutions share the calling frame, so recursion detection
/// and per-resolution-tree caching span the whole dependency sub-graph
/// of one top-level call.
///
/// # Examples
///
/// ```rust
/// use anvil_di::{Ctor, ConstructionPlan, Injectable, Injector, TypeInfo};
/// use std::sync::Arc;
///
/// struct Config {
///     port: u16,
/// }
///
/// impl Injectable for Config {
///     fn type_info() -> TypeInfo {
///         TypeInfo::concrete::<Self>().plan(
///             ConstructionPlan::builder::<Self>()
///                 .constructor(Ctor::new("new", 0, |cx| {
///                     // value-typed parameter: zero value, not the registry
///                     Ok(Config { port: cx.zero() })
///                 }))
///                 .build(),
///         )
///     }
/// }
///
/// struct Server {
///     config: Arc<Config>,
/// }
///
/// impl Injectable for Server {
///     fn type_info() -> TypeInfo {
///         TypeInfo::concrete::<Self>().plan(
///             ConstructionPlan::builder::<Self>()
///                 .constructor(Ctor::new("new", 1, |cx| {
///                     Ok(Server { config: cx.get::<Config>()? })
///                 }))
///                 .build(),
///         )
///     }
/// }
///
/// let injector = Injector::new();
/// let server = injector.get_required::<Server>();
/// assert_eq!(server.config.port, 0);
/// ```
pub struct ResolverContext<'a> {
    injector: &'a Injector,
    frame: &'a mut Frame,
}

impl<'a> ResolverContext<'a> {
    pub(crate) fn new(injector: &'a Injector, frame: &'a mut Frame) -> Self {
        Self { injector, frame }
    }

    /// Recursively resolve a dependency within the current call tree.
    pub fn get<T: Injectable>(&mut self) -> DiResult<Arc<T>> {
        self.injector.resolve_with::<T>(self.frame)
    }

    /// Recursively resolve a trait-object dependency.
    pub fn get_trait<T: ?Sized + std::any::Any + Send + Sync>(&mut self) -> DiResult<Arc<T>> {
        self.injector.resolve_trait_with::<T>(self.frame)
    }

    /// Zero value for a value-typed parameter. Value types are never
    /// resolved through the registry.
    pub fn zero<V: Default>(&self) -> V {
        V::default()
    }

    /// The engine this context resolves against.
    pub fn injector(&self) -> &Injector {
        self.injector
    }
}
