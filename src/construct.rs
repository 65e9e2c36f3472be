//! Constructor descriptors and the default construction builder.
//!
//! A [`ConstructionPlan`] is the `Constructable` capability of a type:
//! an ordered list of constructor descriptors plus the members tagged
//! for automatic injection. The engine picks the best constructor at
//! first-time resolution and assembles a factory around it; the plan
//! itself never runs anything.

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::context::ResolverContext;
use crate::error::{DiError, DiResult};
use crate::key::TypeKey;
use crate::metadata::Injectable;
use crate::registration::AnyHandle;

/// Type-erased constructed value, before initializers run and before it
/// is frozen behind a shared handle.
pub(crate) type BoxedAny = Box<dyn Any + Send + Sync>;

/// Factory step: construct the raw value.
pub(crate) type MakeFn =
    Arc<dyn Fn(&mut ResolverContext<'_>) -> DiResult<BoxedAny> + Send + Sync>;

/// Final step: freeze the constructed value into a shared handle.
pub(crate) type FinishFn = Arc<dyn Fn(BoxedAny) -> DiResult<AnyHandle> + Send + Sync>;

/// Post-construction step: a property assignment or method invocation
/// against the not-yet-frozen value.
pub(crate) type InitFn = Arc<
    dyn Fn(&mut (dyn Any + Send + Sync), &mut ResolverContext<'_>) -> DiResult<()>
        + Send
        + Sync,
>;

pub(crate) fn finish_fn<T: Injectable>() -> FinishFn {
    Arc::new(|boxed: BoxedAny| {
        let value = boxed.downcast::<T>().map_err(|_| DiError::ResolutionFailure {
            type_name: TypeKey::of::<T>().short_name(),
            message: "constructed value had an unexpected type".to_string(),
        })?;
        Ok(Arc::new(*value) as AnyHandle)
    })
}

/// Freeze step for trait registrations: the constructed value is the
/// upcast `Arc<dyn Trait>` itself, stored behind a second handle.
pub(crate) fn trait_finish_fn<T: ?Sized + Any + Send + Sync>() -> FinishFn {
    Arc::new(|boxed: BoxedAny| {
        let value = boxed
            .downcast::<Arc<T>>()
            .map_err(|_| DiError::ResolutionFailure {
                type_name: TypeKey::of::<T>().short_name(),
                message: "constructed value had an unexpected type".to_string(),
            })?;
        Ok(Arc::new(*value) as AnyHandle)
    })
}

/// Selection tag on a constructor or injection member.
///
/// The tagged-descriptor counterpart of inject-here / ignore markers:
/// `Preferred` constructors are selected ahead of all others, `Ignored`
/// ones are never eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberTag {
    /// Select this constructor ahead of any untagged one.
    Preferred,
    /// Ordinary member, ranked by parameter count.
    Normal,
    /// Never consider this member during automatic discovery.
    Ignored,
}

/// One constructor of a type: a name and arity for diagnostics and
/// ranking, a selection tag, and the closure that builds the value by
/// resolving its parameters through the passed context.
///
/// Reference-typed parameters resolve recursively via
/// [`ResolverContext::get`]; value-typed parameters take their zero
/// value via [`ResolverContext::zero`] and never touch the registry.
pub struct Ctor<T> {
    name: &'static str,
    tag: MemberTag,
    arity: usize,
    make: Arc<dyn Fn(&mut ResolverContext<'_>) -> DiResult<T> + Send + Sync>,
}

impl<T: Injectable> Ctor<T> {
    /// Describe a constructor. `arity` is the parameter count used for
    /// ranking; the closure performs the actual parameter resolution.
    pub fn new<F>(name: &'static str, arity: usize, make: F) -> Self
    where
        F: Fn(&mut ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        Self {
            name,
            tag: MemberTag::Normal,
            arity,
            make: Arc::new(make),
        }
    }

    /// Tag this constructor as the one automatic discovery must pick.
    /// With several preferred constructors the first declared wins,
    /// deterministically and without error.
    pub fn preferred(mut self) -> Self {
        self.tag = MemberTag::Preferred;
        self
    }

    /// Exclude this constructor from automatic discovery.
    pub fn ignored(mut self) -> Self {
        self.tag = MemberTag::Ignored;
        self
    }
}

#[derive(Clone)]
pub(crate) struct CtorDescriptor {
    pub(crate) name: &'static str,
    pub(crate) tag: MemberTag,
    pub(crate) arity: usize,
    pub(crate) make: MakeFn,
}

#[derive(Clone)]
pub(crate) struct MemberInjector {
    pub(crate) name: &'static str,
    pub(crate) apply: InitFn,
}

/// The `Constructable` capability of a type: its constructors, in
/// declaration order, and the members tagged for automatic injection.
#[derive(Clone)]
pub struct ConstructionPlan {
    pub(crate) ctors: Vec<CtorDescriptor>,
    pub(crate) members: Vec<MemberInjector>,
    pub(crate) finish: FinishFn,
}

impl ConstructionPlan {
    /// Start describing how `T` is constructed.
    pub fn builder<T: Injectable>() -> PlanBuilder<T> {
        PlanBuilder {
            ctors: Vec::new(),
            members: Vec::new(),
            _marker: PhantomData,
        }
    }
}

/// Builder for a [`ConstructionPlan`]; see [`Injectable`] for a worked
/// example.
pub struct PlanBuilder<T: Injectable> {
    ctors: Vec<CtorDescriptor>,
    members: Vec<MemberInjector>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Injectable> PlanBuilder<T> {
    /// Add a constructor descriptor.
    pub fn constructor(mut self, ctor: Ctor<T>) -> Self {
        let make = ctor.make;
        self.ctors.push(CtorDescriptor {
            name: ctor.name,
            tag: ctor.tag,
            arity: ctor.arity,
            make: Arc::new(move |cx| make(cx).map(|value| Box::new(value) as BoxedAny)),
        });
        self
    }

    /// Tag a property for automatic injection: the closure assigns the
    /// resolved dependency to the freshly constructed value.
    pub fn inject_property<F>(mut self, name: &'static str, apply: F) -> Self
    where
        F: Fn(&mut T, &mut ResolverContext<'_>) -> DiResult<()> + Send + Sync + 'static,
    {
        self.members.push(member_injector(name, apply));
        self
    }

    /// Tag a method for automatic invocation after construction, each of
    /// its arguments resolved through the context.
    pub fn inject_method<F>(mut self, name: &'static str, apply: F) -> Self
    where
        F: Fn(&mut T, &mut ResolverContext<'_>) -> DiResult<()> + Send + Sync + 'static,
    {
        self.members.push(member_injector(name, apply));
        self
    }

    /// Finish the plan.
    pub fn build(self) -> ConstructionPlan {
        ConstructionPlan {
            ctors: self.ctors,
            members: self.members,
            finish: finish_fn::<T>(),
        }
    }
}

fn member_injector<T, F>(name: &'static str, apply: F) -> MemberInjector
where
    T: Injectable,
    F: Fn(&mut T, &mut ResolverContext<'_>) -> DiResult<()> + Send + Sync + 'static,
{
    MemberInjector {
        name,
        apply: Arc::new(move |value, cx| {
            let value = value.downcast_mut::<T>().ok_or_else(|| DiError::ResolutionFailure {
                type_name: TypeKey::of::<T>().short_name(),
                message: "initializer target had an unexpected type".to_string(),
            })?;
            apply(value, cx)
        }),
    }
}

/// Pick the constructor automatic discovery uses: eligible descriptors
/// ordered preferred-first, then by descending parameter count; the
/// sort is stable, so declaration order breaks ties.
pub(crate) fn select_constructor(plan: &ConstructionPlan) -> Option<&CtorDescriptor> {
    let mut eligible: Vec<&CtorDescriptor> = plan
        .ctors
        .iter()
        .filter(|ctor| ctor.tag != MemberTag::Ignored)
        .collect();
    eligible.sort_by_key(|ctor| {
        (
            if ctor.tag == MemberTag::Preferred { 0 } else { 1 },
            std::cmp::Reverse(ctor.arity),
        )
    });
    eligible.first().copied()
}
