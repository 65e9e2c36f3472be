//! Error types for the resolution engine.

use std::fmt;
use std::sync::Arc;

/// Resolution and configuration errors.
///
/// Every message names the offending type with its canonical,
/// generic-argument-aware display name so misconfiguration is
/// diagnosable without a debugger.
///
/// # Examples
///
/// ```rust
/// use anvil_di::DiError;
///
/// let err = DiError::UnresolvableAbstraction("Sequence<Cat>".to_string());
/// assert!(err.to_string().contains("Sequence<Cat>"));
/// ```
#[derive(Debug, Clone)]
pub enum DiError {
    /// An interface/abstract type was requested with no configuration and
    /// no applicable covariant mapping.
    UnresolvableAbstraction(String),
    /// A concrete type has no eligible constructor.
    MissingConstructor(String),
    /// A covariant mapping was configured with an invalid constraint set.
    InvalidGenericConstraint(String),
    /// A factory or the factory-compilation step itself failed.
    ResolutionFailure {
        /// Display name of the type being resolved.
        type_name: String,
        /// What went wrong.
        message: String,
    },
    /// Constraint and argument lists of different lengths were paired.
    /// Defensive: configuration-time validation should make this
    /// unreachable.
    SequenceLengthMismatch {
        /// Elements expected on the left side of the pairing.
        expected: usize,
        /// Elements actually present on the right side.
        actual: usize,
    },
    /// A resolution of the named type re-entered itself within one
    /// resolution tree.
    ResolutionRecursion(String),
    /// Host-substituted error, produced by an installed error decorator.
    Custom(Arc<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for DiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiError::UnresolvableAbstraction(name) => write!(
                f,
                "error on {}: unable to resolve an interface or abstract type without a configuration",
                name
            ),
            DiError::MissingConstructor(name) => write!(
                f,
                "error on {}: unable to locate a suitable constructor",
                name
            ),
            DiError::InvalidGenericConstraint(msg) => {
                write!(f, "invalid generic constraint: {}", msg)
            }
            DiError::ResolutionFailure { type_name, message } => {
                write!(f, "error resolving {}: {}", type_name, message)
            }
            DiError::SequenceLengthMismatch { expected, actual } => write!(
                f,
                "sequences are not the same size: expected {}, got {}",
                expected, actual
            ),
            DiError::ResolutionRecursion(name) => write!(
                f,
                "resolution recursion detected: resolve of {} is called by a dependency of {}",
                name, name
            ),
            DiError::Custom(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for DiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DiError::Custom(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

/// Result type for engine operations.
pub type DiResult<T> = Result<T, DiError>;
