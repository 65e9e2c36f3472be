//! The resolution engine.

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use crate::construct::{finish_fn, select_constructor, trait_finish_fn, BoxedAny, InitFn};
use crate::context::{Frame, ResolverContext};
use crate::covariant::{self, CovariantMapping, CovariantRegistry};
use crate::error::{DiError, DiResult};
use crate::fluent::Fluent;
use crate::key::{OpenType, TypeKey};
use crate::lifetime::{LifetimeManager, Singleton};
use crate::metadata::{Implements, Injectable, TypeInfo};
use crate::observer::{DiObserver, Observers};
use crate::registration::{
    compile, AnyHandle, Creator, RegistrationRecord, Registry, ResolverEntry, ResolverInfo,
};
use crate::scope::ScopeProvider;

type ErrorDecorator = Arc<dyn Fn(DiError) -> DiError + Send + Sync>;

/// The resolution engine: a type-to-compiled-factory registry plus the
/// covariant mapping list, owned as one explicit state object.
///
/// An injector starts empty; resolution is lazy and on-demand. The
/// first request for a type discovers how to build it (explicit
/// registration, covariant mapping, or default construction), compiles
/// a factory, and caches it; later requests run the cached factory
/// directly. Cloning an injector is cheap and yields a handle to the
/// same registry, so independent engines never share state unless
/// cloned from one another.
///
/// # Examples
///
/// ```rust
/// use anvil_di::{Ctor, ConstructionPlan, Injectable, Injector, TypeInfo};
///
/// struct Counter {
///     start: u32,
/// }
///
/// impl Injectable for Counter {
///     fn type_info() -> TypeInfo {
///         TypeInfo::concrete::<Self>().plan(
///             ConstructionPlan::builder::<Self>()
///                 .constructor(Ctor::new("new", 0, |cx| {
///                     Ok(Counter { start: cx.zero() })
///                 }))
///                 .build(),
///         )
///     }
/// }
///
/// let injector = Injector::new();
/// let counter = injector.get_required::<Counter>();
/// assert_eq!(counter.start, 0);
/// ```
pub struct Injector {
    inner: Arc<InjectorShared>,
}

struct InjectorShared {
    registry: RwLock<Registry>,
    /// Serializes first-time compilation and configuration so every
    /// record is built off to the side and published whole.
    publish: Mutex<()>,
    covariants: Mutex<CovariantRegistry>,
    scope_provider: RwLock<Option<Arc<dyn ScopeProvider>>>,
    error_decorator: RwLock<Option<ErrorDecorator>>,
    observers: Observers,
}

impl Injector {
    /// A new engine with an empty registry and no mappings.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(InjectorShared {
                registry: RwLock::new(Registry::new()),
                publish: Mutex::new(()),
                covariants: Mutex::new(CovariantRegistry::new()),
                scope_provider: RwLock::new(None),
                error_decorator: RwLock::new(None),
                observers: Observers::new(),
            }),
        }
    }

    // ===== Resolution =====

    /// Resolve an instance of `T`.
    pub fn get<T: Injectable>(&self) -> DiResult<Arc<T>> {
        self.run_observed(std::any::type_name::<T>(), |injector, frame| {
            injector.resolve_with::<T>(frame)
        })
    }

    /// Resolve an instance of `T`, panicking on failure.
    pub fn get_required<T: Injectable>(&self) -> Arc<T> {
        self.get::<T>().unwrap_or_else(|error| {
            panic!(
                "failed to resolve {}: {:?}",
                std::any::type_name::<T>(),
                error
            )
        })
    }

    /// Resolve a trait-object registration for `T`.
    pub fn get_trait<T: ?Sized + Any + Send + Sync>(&self) -> DiResult<Arc<T>> {
        self.run_observed(std::any::type_name::<T>(), |injector, frame| {
            injector.resolve_trait_with::<T>(frame)
        })
    }

    /// Resolve a trait-object registration for `T`, panicking on failure.
    pub fn get_required_trait<T: ?Sized + Any + Send + Sync>(&self) -> Arc<T> {
        self.get_trait::<T>().unwrap_or_else(|error| {
            panic!(
                "failed to resolve trait {}: {:?}",
                std::any::type_name::<T>(),
                error
            )
        })
    }

    /// Resolve by key, type-erased. Serves already-compiled entries
    /// only: first-time discovery needs the typed entry points.
    pub fn get_untyped(&self, key: &TypeKey) -> DiResult<AnyHandle> {
        let key = *key;
        self.run_observed(key.type_name(), move |injector, frame| {
            let entry = match injector.lookup(&key) {
                Some(entry) => entry,
                None => {
                    return Err(DiError::ResolutionFailure {
                        type_name: key.short_name(),
                        message: "type has not been resolved or configured; first-time discovery requires the typed entry point".to_string(),
                    })
                }
            };
            frame.enter(key)?;
            let result = (entry.compiled)(injector, frame);
            frame.exit();
            result
        })
    }

    // ===== Configuration =====

    /// Register `C` as the concrete type resolved for requests of `T`.
    /// `C` may have further dependencies of its own; they resolve
    /// recursively when `T` is requested.
    pub fn set_resolver<T, C>(&self) -> Fluent<'_, T>
    where
        T: Injectable,
        C: Implements<T>,
    {
        self.install::<T>(concrete_creator::<T, C>(), None)
    }

    /// Like [`set_resolver`](Self::set_resolver), wrapped by the given
    /// lifetime manager.
    pub fn set_resolver_lifetime<T, C>(&self, manager: Arc<dyn LifetimeManager>) -> Fluent<'_, T>
    where
        T: Injectable,
        C: Implements<T>,
    {
        self.install::<T>(concrete_creator::<T, C>(), Some(manager))
    }

    /// Register `C` for `T` under a singleton lifetime.
    pub fn set_singleton_resolver<T, C>(&self) -> Fluent<'_, T>
    where
        T: Injectable,
        C: Implements<T>,
    {
        self.set_resolver_lifetime::<T, C>(Arc::new(Singleton::new()))
    }

    /// Register a factory closure producing `T`.
    pub fn set_factory<T, F>(&self, factory: F) -> Fluent<'_, T>
    where
        T: Injectable,
        F: Fn(&mut ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.install::<T>(factory_creator::<T, F>(factory), None)
    }

    /// Register a factory closure for `T`, wrapped by the given
    /// lifetime manager.
    pub fn set_factory_lifetime<T, F>(
        &self,
        factory: F,
        manager: Arc<dyn LifetimeManager>,
    ) -> Fluent<'_, T>
    where
        T: Injectable,
        F: Fn(&mut ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.install::<T>(factory_creator::<T, F>(factory), Some(manager))
    }

    /// Register one specific instance returned for every resolution of
    /// `T`. Initializers do not apply to instance registrations: the
    /// value is frozen behind a shared handle.
    pub fn set_instance<T: Injectable>(&self, instance: T) -> Fluent<'_, T> {
        self.install::<T>(Creator::Instance(Arc::new(instance) as AnyHandle), None)
    }

    /// Register `C` as the implementation behind trait requests for
    /// `T`. The upcast closure is where the compiler proves the
    /// coercion: `|c| c` suffices when `C: T`.
    pub fn set_trait_resolver<T, C, F>(&self, upcast: F)
    where
        T: ?Sized + Any + Send + Sync,
        C: Injectable,
        F: Fn(Arc<C>) -> Arc<T> + Send + Sync + 'static,
    {
        let key = TypeKey::of::<T>();
        self.install_raw(key, TypeInfo::opaque(key), trait_creator::<T, C, F>(upcast), None);
    }

    /// Like [`set_trait_resolver`](Self::set_trait_resolver), wrapped
    /// by the given lifetime manager.
    pub fn set_trait_resolver_lifetime<T, C, F>(&self, upcast: F, manager: Arc<dyn LifetimeManager>)
    where
        T: ?Sized + Any + Send + Sync,
        C: Injectable,
        F: Fn(Arc<C>) -> Arc<T> + Send + Sync + 'static,
    {
        let key = TypeKey::of::<T>();
        self.install_raw(
            key,
            TypeInfo::opaque(key),
            trait_creator::<T, C, F>(upcast),
            Some(manager),
        );
    }

    /// Register one specific trait object returned for every trait
    /// resolution of `T`.
    pub fn set_trait_instance<T: ?Sized + Any + Send + Sync>(&self, instance: Arc<T>) {
        let key = TypeKey::of::<T>();
        let handle: AnyHandle = Arc::new(instance);
        self.install_raw(key, TypeInfo::opaque(key), Creator::Instance(handle), None);
    }

    /// Declare that closed requests for the open abstraction resolve
    /// through the open concrete family, optionally constrained per
    /// type argument.
    ///
    /// Adding a mapping re-evaluates every cached closed-generic entry
    /// that was produced by first-use discovery or a previous covariant
    /// match; entries the new mapping matches are rebuilt against the
    /// now-best mapping and republished.
    ///
    /// Fails with [`DiError::InvalidGenericConstraint`] before anything
    /// is stored when a non-empty constraint set does not cover every
    /// generic parameter, or the two open types disagree on arity.
    pub fn set_generic_resolver(
        &self,
        open_type: OpenType,
        concrete_type: OpenType,
        constraints: Vec<TypeKey>,
    ) -> DiResult<()> {
        covariant::validate(&open_type, &concrete_type, &constraints)?;

        let _guard = self.inner.publish.lock();
        let mut covariants = self.inner.covariants.lock();
        covariants.upsert(open_type, concrete_type, constraints.clone());

        let probe = CovariantMapping {
            open_type,
            concrete_type,
            constraints,
            seq: 0,
        };
        let snapshot = self.inner.registry.read().snapshot();
        for (key, entry) in snapshot {
            if !(entry.info.is_default_registration || entry.info.is_covariant_registration) {
                continue;
            }
            let generic = match entry.type_info.generic_info() {
                Some(generic) => generic,
                None => continue,
            };
            if !covariant::matches(&probe, generic).unwrap_or(false) {
                continue;
            }
            let candidate =
                match covariants.best_match(generic, entry.type_info.candidate_list()) {
                    Ok(Some(candidate)) => candidate,
                    _ => continue,
                };
            let record = RegistrationRecord {
                creator: Creator::Build {
                    make: candidate.make.clone(),
                    finish: candidate.finish.clone(),
                },
                lifetime: None,
                initializers: entry.record.initializers.clone(),
            };
            let resolver_info = ResolverInfo {
                is_default_registration: false,
                is_covariant_registration: true,
            };
            self.publish_entry(key, record, resolver_info, entry.type_info.clone());
        }
        Ok(())
    }

    /// Fluent handle for `T` without disturbing its current
    /// configuration (or lack of one).
    pub fn for_type<T: Injectable>(&self) -> Fluent<'_, T> {
        Fluent::new(self)
    }

    /// Append an explicit post-construction initializer for `T` and
    /// recompile its factory. Explicit initializers run after the
    /// automatically discovered ones, so for properties the explicit
    /// assignment wins.
    pub fn add_initializer<T, F>(&self, initializer: F)
    where
        T: Injectable,
        F: Fn(&mut T, &mut ResolverContext<'_>) -> DiResult<()> + Send + Sync + 'static,
    {
        let key = TypeKey::of::<T>();
        let initializer: InitFn = Arc::new(move |value, cx| {
            let value = value
                .downcast_mut::<T>()
                .ok_or_else(|| DiError::ResolutionFailure {
                    type_name: key.short_name(),
                    message: "initializer target had an unexpected type".to_string(),
                })?;
            initializer(value, cx)
        });

        let _guard = self.inner.publish.lock();
        let entry = match self.lookup(&key) {
            Some(entry) => entry,
            None => self.first_time_locked(key, T::type_info()),
        };
        let mut record = entry.record.clone();
        record.initializers.push(initializer);
        let resolver_info = ResolverInfo {
            is_default_registration: false,
            is_covariant_registration: entry.info.is_covariant_registration,
        };
        self.publish_entry(key, record, resolver_info, entry.type_info.clone());
    }

    // ===== Host integration =====

    /// Install the host's per-scope store used by the per-scope
    /// lifetime manager.
    pub fn set_scope_provider(&self, provider: Arc<dyn ScopeProvider>) {
        *self.inner.scope_provider.write() = Some(provider);
    }

    /// Substitute host error construction: every error surfaced from a
    /// public entry point passes through the decorator.
    pub fn set_error_decorator<F>(&self, decorator: F)
    where
        F: Fn(DiError) -> DiError + Send + Sync + 'static,
    {
        *self.inner.error_decorator.write() = Some(Arc::new(decorator));
    }

    /// Attach a resolution observer.
    pub fn add_observer(&self, observer: Arc<dyn DiObserver>) {
        self.inner.observers.add(observer);
    }

    #[cfg(feature = "diagnostics")]
    pub fn to_debug_string(&self) -> String {
        use std::fmt::Write as _;

        let mut out = String::new();
        out.push_str("=== Injector Debug ===\nRegistrations:\n");
        for (_, entry) in self.inner.registry.read().snapshot() {
            let _ = writeln!(
                out,
                "  {}: default={} covariant={} lifetime={} initializers={}",
                entry.display,
                entry.info.is_default_registration,
                entry.info.is_covariant_registration,
                if entry.record.lifetime.is_some() { "managed" } else { "none" },
                entry.record.initializers.len(),
            );
            if let Some(plan) = entry.type_info.construction_plan() {
                for ctor in &plan.ctors {
                    let _ = writeln!(out, "    ctor {}({} params, {:?})", ctor.name, ctor.arity, ctor.tag);
                }
                for member in &plan.members {
                    let _ = writeln!(out, "    inject {}", member.name);
                }
            }
        }
        out.push_str("Covariant mappings:\n");
        for mapping in self.inner.covariants.lock().mappings() {
            let _ = writeln!(out, "  {}", mapping);
        }
        out
    }

    // ===== Internals =====

    pub(crate) fn scope_provider(&self) -> Option<Arc<dyn ScopeProvider>> {
        self.inner.scope_provider.read().clone()
    }

    pub(crate) fn resolve_with<T: Injectable>(&self, frame: &mut Frame) -> DiResult<Arc<T>> {
        let key = TypeKey::of::<T>();
        let any = self.resolve_erased(key, frame, T::type_info)?;
        any.downcast::<T>().map_err(|_| DiError::ResolutionFailure {
            type_name: key.short_name(),
            message: "resolved value had an unexpected type".to_string(),
        })
    }

    pub(crate) fn resolve_trait_with<T: ?Sized + Any + Send + Sync>(
        &self,
        frame: &mut Frame,
    ) -> DiResult<Arc<T>> {
        let key = TypeKey::of::<T>();
        let any = self.resolve_erased(key, frame, || TypeInfo::opaque(key))?;
        any.downcast::<Arc<T>>()
            .map(|handle| (*handle).clone())
            .map_err(|_| DiError::ResolutionFailure {
                type_name: key.short_name(),
                message: "resolved value had an unexpected type".to_string(),
            })
    }

    fn resolve_erased(
        &self,
        key: TypeKey,
        frame: &mut Frame,
        info: impl FnOnce() -> TypeInfo,
    ) -> DiResult<AnyHandle> {
        frame.enter(key)?;
        let entry = match self.lookup(&key) {
            Some(entry) => entry,
            None => self.publish_first_time(key, info),
        };
        let result = (entry.compiled)(self, frame);
        frame.exit();
        result
    }

    #[inline(always)]
    fn lookup(&self, key: &TypeKey) -> Option<Arc<ResolverEntry>> {
        self.inner.registry.read().get(key)
    }

    fn publish_first_time(
        &self,
        key: TypeKey,
        info: impl FnOnce() -> TypeInfo,
    ) -> Arc<ResolverEntry> {
        let _guard = self.inner.publish.lock();
        if let Some(existing) = self.lookup(&key) {
            // Lost a first-use race; the winner's entry stands.
            return existing;
        }
        self.first_time_locked(key, info())
    }

    /// First-time resolution with the publish lock held: covariant
    /// match for closed generics, else default construction, else a
    /// poison factory. The poison is cached like any other entry and
    /// re-raises until the type is explicitly reconfigured.
    fn first_time_locked(&self, key: TypeKey, info: TypeInfo) -> Arc<ResolverEntry> {
        let info = Arc::new(info);
        let (creator, resolver_info, initializers) = self.discover(&info);
        let record = RegistrationRecord {
            creator,
            lifetime: None,
            initializers,
        };
        self.publish_entry(key, record, resolver_info, info)
    }

    fn discover(&self, info: &TypeInfo) -> (Creator, ResolverInfo, Vec<InitFn>) {
        let discovered = ResolverInfo {
            is_default_registration: true,
            is_covariant_registration: false,
        };

        if let Some(generic) = info.generic_info() {
            let covariants = self.inner.covariants.lock();
            match covariants.best_match(generic, info.candidate_list()) {
                Ok(Some(candidate)) => {
                    return (
                        Creator::Build {
                            make: candidate.make.clone(),
                            finish: candidate.finish.clone(),
                        },
                        ResolverInfo {
                            is_default_registration: true,
                            is_covariant_registration: true,
                        },
                        Vec::new(),
                    )
                }
                Ok(None) => {}
                Err(error) => return (Creator::Poison(error), discovered, Vec::new()),
            }
        }

        if info.is_abstraction() {
            return (
                Creator::Poison(DiError::UnresolvableAbstraction(info.display_name())),
                discovered,
                Vec::new(),
            );
        }

        let plan = match info.construction_plan() {
            Some(plan) => plan,
            None => {
                return (
                    Creator::Poison(DiError::MissingConstructor(info.display_name())),
                    discovered,
                    Vec::new(),
                )
            }
        };
        match select_constructor(plan) {
            Some(ctor) => (
                Creator::Build {
                    make: ctor.make.clone(),
                    finish: plan.finish.clone(),
                },
                discovered,
                plan.members.iter().map(|m| m.apply.clone()).collect(),
            ),
            None => (
                Creator::Poison(DiError::MissingConstructor(info.display_name())),
                discovered,
                Vec::new(),
            ),
        }
    }

    fn install<T: Injectable>(
        &self,
        creator: Creator,
        lifetime: Option<Arc<dyn LifetimeManager>>,
    ) -> Fluent<'_, T> {
        let key = TypeKey::of::<T>();
        let _guard = self.inner.publish.lock();
        let record = RegistrationRecord {
            creator,
            lifetime,
            initializers: Vec::new(),
        };
        self.publish_entry(key, record, ResolverInfo::default(), Arc::new(T::type_info()));
        Fluent::new(self)
    }

    fn install_raw(
        &self,
        key: TypeKey,
        info: TypeInfo,
        creator: Creator,
        lifetime: Option<Arc<dyn LifetimeManager>>,
    ) {
        let _guard = self.inner.publish.lock();
        let record = RegistrationRecord {
            creator,
            lifetime,
            initializers: Vec::new(),
        };
        self.publish_entry(key, record, ResolverInfo::default(), Arc::new(info));
    }

    /// Builds the compiled entry off to the side and publishes it with
    /// one atomic store; concurrent readers see the old entry or the
    /// new one, never a partial record.
    fn publish_entry(
        &self,
        key: TypeKey,
        record: RegistrationRecord,
        resolver_info: ResolverInfo,
        type_info: Arc<TypeInfo>,
    ) -> Arc<ResolverEntry> {
        let display = type_info.display_name();
        let compiled = compile(key, &display, &record);
        let entry = Arc::new(ResolverEntry {
            record,
            compiled,
            info: resolver_info,
            type_info,
            display,
        });
        self.inner.registry.write().insert(key, entry.clone());
        entry
    }

    fn run_observed<R>(
        &self,
        type_name: &str,
        run: impl FnOnce(&Self, &mut Frame) -> DiResult<R>,
    ) -> DiResult<R> {
        let mut frame = Frame::new();
        if !self.inner.observers.has_observers() {
            return run(self, &mut frame).map_err(|error| self.decorate(error));
        }
        self.inner.observers.resolving(type_name);
        let start = Instant::now();
        let result = run(self, &mut frame);
        match &result {
            Ok(_) => self.inner.observers.resolved(type_name, start.elapsed()),
            Err(error) => self.inner.observers.failed(type_name, error),
        }
        result.map_err(|error| self.decorate(error))
    }

    fn decorate(&self, error: DiError) -> DiError {
        match self.inner.error_decorator.read().as_ref() {
            Some(decorator) => decorator(error),
            None => error,
        }
    }
}

impl Default for Injector {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Injector {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

fn concrete_creator<T, C>() -> Creator
where
    T: Injectable,
    C: Implements<T>,
{
    Creator::Build {
        make: Arc::new(|cx: &mut ResolverContext<'_>| {
            let concrete = cx.get::<C>()?;
            Ok(Box::new(C::upcast(concrete)) as BoxedAny)
        }),
        finish: finish_fn::<T>(),
    }
}

fn factory_creator<T, F>(factory: F) -> Creator
where
    T: Injectable,
    F: Fn(&mut ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
{
    Creator::Build {
        make: Arc::new(move |cx: &mut ResolverContext<'_>| {
            factory(cx).map(|value| Box::new(value) as BoxedAny)
        }),
        finish: finish_fn::<T>(),
    }
}

fn trait_creator<T, C, F>(upcast: F) -> Creator
where
    T: ?Sized + Any + Send + Sync,
    C: Injectable,
    F: Fn(Arc<C>) -> Arc<T> + Send + Sync + 'static,
{
    Creator::Build {
        make: Arc::new(move |cx: &mut ResolverContext<'_>| {
            let concrete = cx.get::<C>()?;
            Ok(Box::new(upcast(concrete)) as BoxedAny)
        }),
        finish: trait_finish_fn::<T>(),
    }
}
