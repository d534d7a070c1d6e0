//! Error types for condition evaluation and tree resolution.

use thiserror::Error;

/// Errors raised while evaluating a condition expression.
///
/// Both variants are fatal for the device being resolved: a document
/// that references a fact that does not exist, or that carries an
/// unparseable expression, cannot be applied safely. Neither aborts
/// resolution of other devices.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    /// A condition referenced a fact path outside the device namespace.
    #[error("unknown condition variable: {path}")]
    UnknownVariable {
        /// The path as written in the condition (e.g. `device.tag.rol`)
        path: String,
    },

    /// A condition string could not be parsed into the OR/AND/comparison
    /// grammar.
    #[error("malformed condition: {expr}")]
    Malformed {
        /// The offending expression (or sub-expression)
        expr: String,
    },
}

/// Result type for resolution operations.
pub type Result<T> = std::result::Result<T, ConditionError>;
