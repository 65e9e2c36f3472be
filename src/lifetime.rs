//! Instance lifetime strategies.
//!
//! A lifetime manager wraps the compiled factory of one registration and
//! decides how often it may run and where its results are cached. The
//! manager never touches the factory itself, only the caching of its
//! results; replacing a registration replaces its manager.

use std::sync::Arc;
use std::thread::ThreadId;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::context::Frame;
use crate::error::{DiError, DiResult};
use crate::key::TypeKey;
use crate::registration::{AnyHandle, Map};
use crate::scope::ScopeProvider;
use crate::Injector;

/// One in-flight application of a lifetime policy: the registration
/// being resolved and the means to run its inner factory.
///
/// [`construct`](Activation::construct) invokes the inner factory
/// (creator, initializers, freeze); a manager calls it at most as often
/// as its policy allows and caches the result as it sees fit.
pub struct Activation<'a> {
    key: &'a TypeKey,
    display: &'a str,
    injector: &'a Injector,
    frame: &'a mut Frame,
    build: &'a dyn Fn(&mut Frame) -> DiResult<AnyHandle>,
}

impl<'a> Activation<'a> {
    pub(crate) fn new(
        key: &'a TypeKey,
        display: &'a str,
        injector: &'a Injector,
        frame: &'a mut Frame,
        build: &'a dyn Fn(&mut Frame) -> DiResult<AnyHandle>,
    ) -> Self {
        Self {
            key,
            display,
            injector,
            frame,
            build,
        }
    }

    /// Run the inner factory once. Errors propagate to the caller and
    /// must not be cached as a permanent empty value.
    pub fn construct(&mut self) -> DiResult<AnyHandle> {
        (self.build)(self.frame)
    }

    /// Registry key of the registration being resolved.
    pub fn key(&self) -> &TypeKey {
        self.key
    }

    /// Canonical display name of the type being resolved.
    pub fn type_name(&self) -> &str {
        self.display
    }

    /// The host-provided scope store, if one is installed.
    pub fn scope_provider(&self) -> Option<Arc<dyn ScopeProvider>> {
        self.injector.scope_provider()
    }

    /// Instance cached earlier in this resolution tree, if any.
    pub fn cached_for_tree(&self, key: &TypeKey) -> Option<AnyHandle> {
        self.frame.tree_get(key)
    }

    /// Cache an instance for the remainder of this resolution tree.
    pub fn cache_for_tree(&mut self, key: TypeKey, value: AnyHandle) {
        self.frame.tree_put(key, value);
    }
}

/// Caching/reuse policy applied around one registration's factory.
///
/// Implementations must be safe under concurrent `get_value` calls from
/// multiple threads; if the inner factory fails, the failure propagates
/// and the next call retries construction.
pub trait LifetimeManager: Send + Sync + 'static {
    /// Return a value after the lifetime criteria have been applied.
    fn get_value(&self, activation: &mut Activation<'_>) -> DiResult<AnyHandle>;
}

/// No caching: every resolution invokes the inner factory.
#[derive(Default)]
pub struct Transient;

impl Transient {
    pub fn new() -> Self {
        Transient
    }
}

impl LifetimeManager for Transient {
    fn get_value(&self, activation: &mut Activation<'_>) -> DiResult<AnyHandle> {
        activation.construct()
    }
}

/// One instance for the lifetime of the registration.
///
/// First use initializes under the cell's lock, so concurrent first
/// calls observe exactly one factory invocation; afterwards reads are
/// lock-free. A failed construction leaves the cell empty and the next
/// call retries.
#[derive(Default)]
pub struct Singleton {
    cell: OnceCell<AnyHandle>,
}

impl Singleton {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LifetimeManager for Singleton {
    fn get_value(&self, activation: &mut Activation<'_>) -> DiResult<AnyHandle> {
        if let Some(value) = self.cell.get() {
            return Ok(value.clone());
        }
        self.cell
            .get_or_try_init(|| activation.construct())
            .map(Clone::clone)
    }
}

/// One cached instance per worker thread, created lazily on first
/// access per thread and reused for that thread's lifetime.
#[derive(Default)]
pub struct PerThread {
    slots: Mutex<Map<ThreadId, AnyHandle>>,
}

impl PerThread {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LifetimeManager for PerThread {
    fn get_value(&self, activation: &mut Activation<'_>) -> DiResult<AnyHandle> {
        let thread = std::thread::current().id();
        if let Some(value) = self.slots.lock().get(&thread) {
            return Ok(value.clone());
        }
        // Not held across construction: the factory may recurse into the
        // engine, and only this thread can write this slot anyway.
        let value = activation.construct()?;
        self.slots.lock().insert(thread, value.clone());
        Ok(value)
    }
}

/// One instance per host scope (network connection, web request, ...).
///
/// Storage is delegated to the externally installed [`ScopeProvider`],
/// keyed by a name derived from the type. Resolving without an
/// installed provider fails.
#[derive(Default)]
pub struct PerScope;

impl PerScope {
    pub fn new() -> Self {
        PerScope
    }
}

impl LifetimeManager for PerScope {
    fn get_value(&self, activation: &mut Activation<'_>) -> DiResult<AnyHandle> {
        let provider = match activation.scope_provider() {
            Some(provider) => provider,
            None => {
                return Err(DiError::ResolutionFailure {
                    type_name: activation.type_name().to_string(),
                    message: "no scope provider is installed; per-scope lifetimes require a host-supplied scope".to_string(),
                })
            }
        };
        let slot = format!("anvil_di.instance.{}", activation.type_name());
        if let Some(value) = provider.get_scoped(&slot) {
            return Ok(value);
        }
        let value = activation.construct()?;
        provider.set_scoped(&slot, value.clone());
        Ok(value)
    }
}

/// One instance per resolution tree: repeated requests within a single
/// top-level resolve call share the first constructed instance, while
/// separate calls construct anew. Reentrant access during construction
/// is a dependency cycle and fails with
/// [`DiError::ResolutionRecursion`] before this manager is reached.
#[derive(Default)]
pub struct PerResolve;

impl PerResolve {
    pub fn new() -> Self {
        PerResolve
    }
}

impl LifetimeManager for PerResolve {
    fn get_value(&self, activation: &mut Activation<'_>) -> DiResult<AnyHandle> {
        let key = *activation.key();
        if let Some(value) = activation.cached_for_tree(&key) {
            return Ok(value);
        }
        let value = activation.construct()?;
        activation.cache_for_tree(key, value.clone());
        Ok(value)
    }
}
