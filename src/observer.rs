//! Resolution observers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::error::DiError;

/// Hooks into top-level resolution events, for logging and metrics.
///
/// Observers see only the public entry points, not every recursive
/// dependency resolution; an engine with no observers pays a single
/// atomic load per resolve.
pub trait DiObserver: Send + Sync {
    /// A top-level resolution of `type_name` is starting.
    fn resolving(&self, _type_name: &str) {}

    /// A top-level resolution completed successfully.
    fn resolved(&self, _type_name: &str, _elapsed: Duration) {}

    /// A top-level resolution failed.
    fn failed(&self, _type_name: &str, _error: &DiError) {}
}

/// Observer that prints resolution events to stderr.
///
/// # Examples
///
/// ```rust
/// use anvil_di::{Injector, LoggingObserver};
/// use std::sync::Arc;
///
/// let injector = Injector::new();
/// injector.add_observer(Arc::new(LoggingObserver));
/// ```
pub struct LoggingObserver;

impl DiObserver for LoggingObserver {
    fn resolving(&self, type_name: &str) {
        eprintln!("[anvil-di] resolving {}", type_name);
    }

    fn resolved(&self, type_name: &str, elapsed: Duration) {
        eprintln!("[anvil-di] resolved {} in {:?}", type_name, elapsed);
    }

    fn failed(&self, type_name: &str, error: &DiError) {
        eprintln!("[anvil-di] failed to resolve {}: {}", type_name, error);
    }
}

/// Fan-out over the installed observers.
pub(crate) struct Observers {
    list: RwLock<Vec<Arc<dyn DiObserver>>>,
    active: AtomicBool,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self {
            list: RwLock::new(Vec::new()),
            active: AtomicBool::new(false),
        }
    }

    pub(crate) fn add(&self, observer: Arc<dyn DiObserver>) {
        self.list.write().push(observer);
        self.active.store(true, Ordering::Release);
    }

    #[inline(always)]
    pub(crate) fn has_observers(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn resolving(&self, type_name: &str) {
        for observer in self.list.read().iter() {
            observer.resolving(type_name);
        }
    }

    pub(crate) fn resolved(&self, type_name: &str, elapsed: Duration) {
        for observer in self.list.read().iter() {
            observer.resolved(type_name, elapsed);
        }
    }

    pub(crate) fn failed(&self, type_name: &str, error: &DiError) {
        for observer in self.list.read().iter() {
            observer.failed(type_name, error);
        }
    }
}
