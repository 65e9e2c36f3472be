//! Registration records and the compiled-resolver registry.

use std::any::Any;
use std::sync::Arc;

use crate::construct::{FinishFn, InitFn, MakeFn};
use crate::context::{Frame, ResolverContext};
use crate::error::{DiError, DiResult};
use crate::key::TypeKey;
use crate::lifetime::{Activation, LifetimeManager};
use crate::metadata::TypeInfo;
use crate::Injector;

/// Type-erased shared handle to a resolved instance.
pub type AnyHandle = Arc<dyn Any + Send + Sync>;

#[cfg(feature = "ahash")]
pub(crate) type Map<K, V> = ahash::AHashMap<K, V>;
#[cfg(not(feature = "ahash"))]
pub(crate) type Map<K, V> = std::collections::HashMap<K, V>;

/// A directly-callable compiled resolver: creator, initializers, and
/// lifetime policy folded into one function.
pub(crate) type CompiledFn =
    Arc<dyn Fn(&Injector, &mut Frame) -> DiResult<AnyHandle> + Send + Sync>;

/// How a registration produces its raw value.
#[derive(Clone)]
pub(crate) enum Creator {
    /// Construct a fresh value, then freeze it behind a shared handle.
    Build { make: MakeFn, finish: FinishFn },
    /// Hand out one shared instance.
    Instance(AnyHandle),
    /// Deterministically raise the same error on every invocation.
    Poison(DiError),
}

/// One registration: the creator, the lifetime policy wrapping it, and
/// the ordered post-construction initializers. Replaced wholesale on
/// reconfiguration, never merged.
#[derive(Clone)]
pub(crate) struct RegistrationRecord {
    pub(crate) creator: Creator,
    pub(crate) lifetime: Option<Arc<dyn LifetimeManager>>,
    pub(crate) initializers: Vec<InitFn>,
}

/// How the current registration for a type came to be; drives the
/// covariant override sweep.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ResolverInfo {
    /// No explicit configuration occurred; the entry was produced by
    /// first-use discovery.
    pub(crate) is_default_registration: bool,
    /// The entry is currently satisfied through a covariant mapping.
    pub(crate) is_covariant_registration: bool,
}

/// Published registry entry: the record it was compiled from, the
/// compiled function, provenance flags, and the retained metadata the
/// override sweep rebuilds from.
pub(crate) struct ResolverEntry {
    pub(crate) record: RegistrationRecord,
    pub(crate) compiled: CompiledFn,
    pub(crate) info: ResolverInfo,
    pub(crate) type_info: Arc<TypeInfo>,
    pub(crate) display: String,
}

/// The type-key to compiled-resolver map. Grows monotonically; entries
/// are replaced, never evicted.
pub(crate) struct Registry {
    entries: Map<TypeKey, Arc<ResolverEntry>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            entries: Map::default(),
        }
    }

    #[inline(always)]
    pub(crate) fn get(&self, key: &TypeKey) -> Option<Arc<ResolverEntry>> {
        self.entries.get(key).cloned()
    }

    pub(crate) fn insert(&mut self, key: TypeKey, entry: Arc<ResolverEntry>) {
        self.entries.insert(key, entry);
    }

    /// Clones out the current entry set, so callers can walk it without
    /// holding the registry lock.
    pub(crate) fn snapshot(&self) -> Vec<(TypeKey, Arc<ResolverEntry>)> {
        self.entries
            .iter()
            .map(|(key, entry)| (*key, entry.clone()))
            .collect()
    }
}

/// Folds a record into one directly-callable function: run the creator,
/// apply the initializers in order against the not-yet-frozen value,
/// freeze it, all wrapped by the lifetime policy.
pub(crate) fn compile(key: TypeKey, display: &str, record: &RegistrationRecord) -> CompiledFn {
    let display: Arc<str> = Arc::from(display);
    let creator = record.creator.clone();
    let initializers = record.initializers.clone();
    let lifetime = record.lifetime.clone();

    Arc::new(move |injector: &Injector, frame: &mut Frame| match &creator {
        Creator::Poison(error) => Err(error.clone()),
        Creator::Instance(value) => match &lifetime {
            None => Ok(value.clone()),
            Some(manager) => {
                let value = value.clone();
                let build =
                    move |_frame: &mut Frame| -> DiResult<AnyHandle> { Ok(value.clone()) };
                let mut activation =
                    Activation::new(&key, display.as_ref(), injector, frame, &build);
                manager.get_value(&mut activation)
            }
        },
        Creator::Build { make, finish } => {
            let build = |frame: &mut Frame| -> DiResult<AnyHandle> {
                let mut cx = ResolverContext::new(injector, frame);
                let mut value = make(&mut cx)?;
                for initializer in &initializers {
                    initializer(value.as_mut(), &mut cx)?;
                }
                finish(value)
            };
            match &lifetime {
                None => build(frame),
                Some(manager) => {
                    let mut activation =
                        Activation::new(&key, display.as_ref(), injector, frame, &build);
                    manager.get_value(&mut activation)
                }
            }
        }
    })
}
