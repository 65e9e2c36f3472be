//! Capability metadata for resolvable types.
//!
//! The engine never inspects types ambiently; every participating type
//! describes itself through [`Injectable::type_info`]: its identity, its
//! closed-generic structure, the base chain and abstractions it is
//! assignable to, how it can be constructed, and (for generic
//! abstractions) which concrete families may serve it.

use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::construct::{finish_fn, BoxedAny, ConstructionPlan, MakeFn};
use crate::context::ResolverContext;
use crate::key::{short_type_name, OpenType, TypeKey};

/// A type the engine can resolve.
///
/// `type_info` is the capability query: it is consulted once, at
/// first-time resolution (or at explicit configuration), and the result
/// is retained with the compiled registry entry.
///
/// # Examples
///
/// ```rust
/// use anvil_di::{Ctor, ConstructionPlan, Injectable, Injector, TypeInfo};
///
/// struct Greeter {
///     greeting: String,
/// }
///
/// impl Injectable for Greeter {
///     fn type_info() -> TypeInfo {
///         TypeInfo::concrete::<Self>().plan(
///             ConstructionPlan::builder::<Self>()
///                 .constructor(Ctor::new("new", 0, |_cx| {
///                     Ok(Greeter { greeting: "hello".to_string() })
///                 }))
///                 .build(),
///         )
///     }
/// }
///
/// let injector = Injector::new();
/// let greeter = injector.get_required::<Greeter>();
/// assert_eq!(greeter.greeting, "hello");
/// ```
pub trait Injectable: Any + Send + Sync + Sized {
    /// Describe this type to the resolution engine.
    fn type_info() -> TypeInfo;
}

/// Declares that `Self` can satisfy requests for the abstraction `A`.
///
/// The upcast runs after `Self` has been resolved and is the
/// monomorphization point where the concrete-to-abstract conversion is
/// proven by the compiler (the reflection-free counterpart of an
/// assignability check).
pub trait Implements<A: Injectable>: Injectable {
    /// Wrap a resolved instance into the abstraction it serves.
    fn upcast(this: Arc<Self>) -> A;
}

/// Closed-generic structure of a type: its open definition and the
/// metadata of each type argument, recursively.
pub struct GenericInfo {
    pub(crate) definition: OpenType,
    pub(crate) args: Vec<TypeInfo>,
}

impl GenericInfo {
    /// The open definition this type instantiates.
    pub fn definition(&self) -> &OpenType {
        &self.definition
    }

    /// Metadata of the type arguments, in declaration order.
    pub fn args(&self) -> &[TypeInfo] {
        &self.args
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum TypeKind {
    Concrete,
    Abstraction,
}

/// A concrete family able to serve a generic abstraction, carried with
/// the bridge that resolves the closed member and upcasts it.
pub(crate) struct GenericCandidate {
    /// Open definition id of the concrete family.
    pub(crate) family: TypeId,
    /// Closed member key, for diagnostics.
    pub(crate) member: TypeKey,
    pub(crate) make: MakeFn,
    pub(crate) finish: crate::construct::FinishFn,
}

/// Metadata describing one resolvable type.
///
/// Built inside [`Injectable::type_info`] with the chained constructors
/// below; see the trait-level example.
pub struct TypeInfo {
    pub(crate) key: TypeKey,
    pub(crate) kind: TypeKind,
    pub(crate) generic: Option<GenericInfo>,
    /// Base-type chain, nearest first.
    pub(crate) bases: Vec<TypeKey>,
    /// Abstractions this type is assignable to (flat, unordered).
    pub(crate) interfaces: Vec<TypeKey>,
    pub(crate) plan: Option<ConstructionPlan>,
    pub(crate) candidates: Vec<GenericCandidate>,
}

impl TypeInfo {
    /// Metadata for a directly constructable type. Attach a
    /// [`ConstructionPlan`] with [`plan`](Self::plan), or the type
    /// resolves to a missing-constructor error.
    pub fn concrete<T: Injectable>() -> Self {
        Self::with_kind(TypeKey::of::<T>(), TypeKind::Concrete)
    }

    /// Metadata for an abstraction: a type that cannot be constructed
    /// without configuration or a covariant mapping.
    pub fn abstraction<T: Any + Send + Sync>() -> Self {
        Self::with_kind(TypeKey::of::<T>(), TypeKind::Abstraction)
    }

    /// Metadata for a bare key, used for trait-object requests that
    /// carry no declared structure.
    pub(crate) fn opaque(key: TypeKey) -> Self {
        Self::with_kind(key, TypeKind::Abstraction)
    }

    fn with_kind(key: TypeKey, kind: TypeKind) -> Self {
        Self {
            key,
            kind,
            generic: None,
            bases: Vec::new(),
            interfaces: Vec::new(),
            plan: None,
            candidates: Vec::new(),
        }
    }

    /// Attach the construction plan (the `Constructable` capability).
    pub fn plan(mut self, plan: ConstructionPlan) -> Self {
        self.plan = Some(plan);
        self
    }

    /// Declare the closed-generic structure of this type.
    pub fn generic(mut self, definition: OpenType, args: Vec<TypeInfo>) -> Self {
        self.generic = Some(GenericInfo { definition, args });
        self
    }

    /// Append one link of the base-type chain, nearest base first:
    /// a `Tiger` with `Cat` as its base and `Animal` above that declares
    /// `.base::<Cat>().base::<Animal>()`.
    pub fn base<B: Any + Send + Sync>(mut self) -> Self {
        self.bases.push(TypeKey::of::<B>());
        self
    }

    /// Declare an abstraction this type is assignable to (counts as
    /// inheritance distance 1 in covariant specificity ranking).
    pub fn assignable_to<I: ?Sized + Any>(mut self) -> Self {
        self.interfaces.push(TypeKey::of::<I>());
        self
    }

    /// Declare a concrete family able to serve this generic abstraction.
    ///
    /// `A` is the abstraction itself (`Self` at the declaration site),
    /// `C` the closed member of the candidate family, written with the
    /// same type arguments. Only declared candidates can be produced by
    /// covariant mappings; a mapping to an undeclared family is skipped
    /// at match time. Non-generic `C` is ignored (an open mapping cannot
    /// name it).
    pub fn candidate<A, C>(mut self) -> Self
    where
        A: Injectable,
        C: Implements<A>,
    {
        let family = match C::type_info().generic {
            Some(generic) => generic.definition.id(),
            None => return self,
        };
        let make: MakeFn = Arc::new(|cx: &mut ResolverContext<'_>| {
            let concrete = cx.get::<C>()?;
            Ok(Box::new(C::upcast(concrete)) as BoxedAny)
        });
        self.candidates.push(GenericCandidate {
            family,
            member: TypeKey::of::<C>(),
            make,
            finish: finish_fn::<A>(),
        });
        self
    }

    /// Registry key of the described type.
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Canonical display name: the open definition's name with the
    /// argument names expanded recursively, or the short type name for
    /// non-generic types.
    pub fn display_name(&self) -> String {
        match &self.generic {
            Some(generic) => {
                let args = generic
                    .args
                    .iter()
                    .map(TypeInfo::display_name)
                    .collect::<Vec<_>>()
                    .join(",");
                format!("{}<{}>", generic.definition.name(), args)
            }
            None => short_type_name(self.key.type_name()),
        }
    }

    pub(crate) fn generic_info(&self) -> Option<&GenericInfo> {
        self.generic.as_ref()
    }

    pub(crate) fn construction_plan(&self) -> Option<&ConstructionPlan> {
        self.plan.as_ref()
    }

    pub(crate) fn candidate_list(&self) -> &[GenericCandidate] {
        &self.candidates
    }

    pub(crate) fn is_abstraction(&self) -> bool {
        self.kind == TypeKind::Abstraction
    }

    /// Whether this type equals the target or declares it in its base
    /// chain or abstraction list.
    pub(crate) fn is_assignable_to(&self, target: &TypeKey) -> bool {
        self.key == *target
            || self.bases.contains(target)
            || self.interfaces.contains(target)
    }

    /// Inheritance distance to `target`: 0 for the type itself, the
    /// number of base hops for a declared base, 1 for a declared
    /// abstraction, `None` when not assignable.
    pub(crate) fn inherit_distance(&self, target: &TypeKey) -> Option<usize> {
        if self.key == *target {
            return Some(0);
        }
        if let Some(position) = self.bases.iter().position(|base| base == target) {
            return Some(position + 1);
        }
        if self.interfaces.contains(target) {
            return Some(1);
        }
        None
    }
}
