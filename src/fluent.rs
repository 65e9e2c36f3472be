//! Fluent configuration handle.

use std::marker::PhantomData;

use crate::context::ResolverContext;
use crate::error::DiResult;
use crate::metadata::Injectable;
use crate::Injector;

/// Borrow-scoped configuration handle for one type, returned by the
/// `set_resolver` family and [`Injector::for_type`]. Obtaining a handle
/// never disturbs the type's current configuration.
///
/// # Examples
///
/// ```rust
/// use anvil_di::{Ctor, ConstructionPlan, Injectable, Injector, TypeInfo};
/// use std::sync::Arc;
///
/// struct Widget {
///     label: String,
/// }
///
/// impl Injectable for Widget {
///     fn type_info() -> TypeInfo {
///         TypeInfo::concrete::<Self>().plan(
///             ConstructionPlan::builder::<Self>()
///                 .constructor(Ctor::new("new", 0, |_cx| {
///                     Ok(Widget { label: String::new() })
///                 }))
///                 .build(),
///         )
///     }
/// }
///
/// let injector = Injector::new();
/// injector
///     .for_type::<Widget>()
///     .add_property_injector(|widget, _cx| {
///         widget.label = "configured".to_string();
///         Ok(())
///     });
///
/// assert_eq!(injector.get_required::<Widget>().label, "configured");
/// ```
pub struct Fluent<'a, T: Injectable> {
    injector: &'a Injector,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Injectable> Fluent<'a, T> {
    pub(crate) fn new(injector: &'a Injector) -> Self {
        Self {
            injector,
            _marker: PhantomData,
        }
    }

    /// Append a property injector to the resolution of `T`, resolving
    /// the assigned value through the passed context. Runs after any
    /// automatically discovered injection members, so it wins for
    /// properties both touch.
    pub fn add_property_injector<F>(self, assign: F) -> Self
    where
        F: Fn(&mut T, &mut ResolverContext<'_>) -> DiResult<()> + Send + Sync + 'static,
    {
        self.injector.add_initializer::<T, F>(assign);
        self
    }
}
