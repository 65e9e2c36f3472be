//! Host-provided per-scope storage.

use parking_lot::Mutex;

use crate::registration::{AnyHandle, Map};

/// External key/value store scoped to the host's current unit of work
/// (a web request, a connection, a job).
///
/// The per-scope lifetime manager reads and writes through this
/// interface and nothing else; what "the current scope" means is
/// entirely the host's business. Install one with
/// [`Injector::set_scope_provider`](crate::Injector::set_scope_provider).
pub trait ScopeProvider: Send + Sync {
    /// Value previously stored under `key` in the current scope.
    fn get_scoped(&self, key: &str) -> Option<AnyHandle>;

    /// Store `value` under `key` in the current scope.
    fn set_scoped(&self, key: &str, value: AnyHandle);
}

/// In-memory [`ScopeProvider`] for hosts with a single unit of work at
/// a time, and for tests. Swapping the installed provider starts a new
/// scope; the old provider keeps its values.
///
/// # Examples
///
/// ```rust
/// use anvil_di::{MemoryScope, ScopeProvider};
/// use std::sync::Arc;
///
/// let scope = MemoryScope::new();
/// assert!(scope.get_scoped("greeting").is_none());
///
/// scope.set_scoped("greeting", Arc::new("hello".to_string()));
/// let value = scope.get_scoped("greeting").unwrap();
/// assert_eq!(*value.downcast::<String>().unwrap(), "hello");
/// ```
#[derive(Default)]
pub struct MemoryScope {
    items: Mutex<Map<String, AnyHandle>>,
}

impl MemoryScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every stored value, emptying the scope.
    pub fn clear(&self) {
        self.items.lock().clear();
    }
}

impl ScopeProvider for MemoryScope {
    fn get_scoped(&self, key: &str) -> Option<AnyHandle> {
        self.items.lock().get(key).cloned()
    }

    fn set_scoped(&self, key: &str, value: AnyHandle) {
        self.items.lock().insert(key.to_string(), value);
    }
}
