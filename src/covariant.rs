//! Covariant open-generic matching.
//!
//! Mappings declare "requests for `Abstract<X..>` where `X` satisfies
//! the constraints are built from `Concrete<X..>`". Multiple mappings
//! may target the same open abstraction with different constraint sets;
//! they stay disjoint configuration entries and are ranked at match
//! time by how close their constraints sit to the actual arguments.

use std::fmt;

use crate::error::{DiError, DiResult};
use crate::key::{OpenType, TypeKey};
use crate::metadata::{GenericCandidate, GenericInfo};

/// One open-abstract to open-concrete mapping with optional artificial
/// constraints on the type arguments.
pub(crate) struct CovariantMapping {
    pub(crate) open_type: OpenType,
    pub(crate) concrete_type: OpenType,
    /// Empty, or exactly one constraint per generic parameter.
    pub(crate) constraints: Vec<TypeKey>,
    /// Registration order; recent mappings win specificity ties.
    pub(crate) seq: u64,
}

impl fmt::Display for CovariantMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let constraints = self
            .constraints
            .iter()
            .map(TypeKey::short_name)
            .collect::<Vec<_>>()
            .join(",");
        write!(
            f,
            "{} with constraints [{}] will be resolved by type {}",
            self.open_type.name(),
            constraints,
            self.concrete_type.name()
        )
    }
}

/// The process-wide mapping list, guarded by one lock in the engine.
pub(crate) struct CovariantRegistry {
    mappings: Vec<CovariantMapping>,
    next_seq: u64,
}

impl CovariantRegistry {
    pub(crate) fn new() -> Self {
        Self {
            mappings: Vec::new(),
            next_seq: 0,
        }
    }

    /// Replaces any mapping with the same abstraction and constraint
    /// set, then appends the new one.
    pub(crate) fn upsert(
        &mut self,
        open_type: OpenType,
        concrete_type: OpenType,
        constraints: Vec<TypeKey>,
    ) {
        self.mappings
            .retain(|m| !(m.open_type == open_type && m.constraints == constraints));
        let seq = self.next_seq;
        self.next_seq += 1;
        self.mappings.push(CovariantMapping {
            open_type,
            concrete_type,
            constraints,
            seq,
        });
    }

    /// Best applicable mapping for a closed generic request, restricted
    /// to mappings whose concrete family the request declares a
    /// candidate bridge for. Lower total inheritance distance wins;
    /// ties go to the most recently added mapping.
    pub(crate) fn best_match<'a>(
        &self,
        generic: &GenericInfo,
        candidates: &'a [GenericCandidate],
    ) -> DiResult<Option<&'a GenericCandidate>> {
        let mut best: Option<(usize, u64, &GenericCandidate)> = None;
        for mapping in &self.mappings {
            if !matches(mapping, generic)? {
                continue;
            }
            let candidate = match candidates
                .iter()
                .find(|c| c.family == mapping.concrete_type.id())
            {
                Some(candidate) => candidate,
                None => continue,
            };
            let quality = match_quality(mapping, generic)?;
            let better = match best {
                None => true,
                Some((best_quality, best_seq, _)) => {
                    quality < best_quality || (quality == best_quality && mapping.seq > best_seq)
                }
            };
            if better {
                best = Some((quality, mapping.seq, candidate));
            }
        }
        Ok(best.map(|(_, _, candidate)| candidate))
    }

    #[cfg(feature = "diagnostics")]
    pub(crate) fn mappings(&self) -> &[CovariantMapping] {
        &self.mappings
    }
}

/// Configuration-time validation, performed before any mapping is
/// stored: a non-empty constraint set must cover every generic
/// parameter, and both open types must agree on arity.
pub(crate) fn validate(
    open_type: &OpenType,
    concrete_type: &OpenType,
    constraints: &[TypeKey],
) -> DiResult<()> {
    if !constraints.is_empty() && constraints.len() != open_type.arity() {
        return Err(DiError::InvalidGenericConstraint(format!(
            "if any constraints are specified for {}, then you must specify a constraint for each generic type argument",
            open_type.name()
        )));
    }
    if concrete_type.arity() != open_type.arity() {
        return Err(DiError::InvalidGenericConstraint(format!(
            "{} must accept the same generic arguments as {}",
            concrete_type.name(),
            open_type.name()
        )));
    }
    Ok(())
}

/// Whether a mapping applies to a closed generic request: same open
/// definition, correct arity, and every argument assignable to its
/// constraint (an empty constraint set matches any argument list of
/// the right arity).
pub(crate) fn matches(mapping: &CovariantMapping, generic: &GenericInfo) -> DiResult<bool> {
    if mapping.open_type.id() != generic.definition().id() {
        return Ok(false);
    }
    if generic.args().len() != mapping.open_type.arity() {
        return Ok(false);
    }
    if mapping.constraints.is_empty() {
        return Ok(true);
    }
    for (constraint, arg) in stitch(&mapping.constraints, generic.args())? {
        if !arg.is_assignable_to(constraint) {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Specificity of an applicable mapping: the total inheritance distance
/// from each argument up to its constraint. Unconstrained mappings rank
/// least specific.
fn match_quality(mapping: &CovariantMapping, generic: &GenericInfo) -> DiResult<usize> {
    if mapping.constraints.is_empty() {
        return Ok(usize::MAX);
    }
    let mut total: usize = 0;
    for (constraint, arg) in stitch(&mapping.constraints, generic.args())? {
        total = total.saturating_add(arg.inherit_distance(constraint).unwrap_or(usize::MAX));
    }
    Ok(total)
}

/// Pairs two slices element-wise, refusing mismatched lengths instead
/// of silently truncating.
fn stitch<'a, T, U>(
    left: &'a [T],
    right: &'a [U],
) -> DiResult<impl Iterator<Item = (&'a T, &'a U)>> {
    if left.len() != right.len() {
        return Err(DiError::SequenceLengthMismatch {
            expected: left.len(),
            actual: right.len(),
        });
    }
    Ok(left.iter().zip(right.iter()))
}
