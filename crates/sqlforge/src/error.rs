//! Error types for sqlforge

use thiserror::Error;

/// Result type alias for sqlforge operations
pub type ForgeResult<T> = Result<T, ForgeError>;

/// Error types for query construction and compilation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ForgeError {
    /// An infix operator outside the fixed whitelist reached the compiler.
    ///
    /// Operators are spliced into the SQL text unescaped, so this is a hard
    /// failure, never a silent pass-through.
    #[error("invalid operator: {0:?}")]
    InvalidOperator(String),

    /// A builder argument had a shape the AST cannot represent
    /// (empty identifier, BETWEEN without exactly two values, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An execution-only operation was called on a builder marked as a
    /// sub-query. Raised by the execution layer, declared here so callers
    /// can tell the three execution mistakes apart.
    #[error("cannot execute a sub-query builder: {0}")]
    SubQueryExecution(String),

    /// An execution-only operation was called on an immutable-mode builder.
    /// Raised by the execution layer.
    #[error("cannot execute an immutable builder: {0}")]
    ImmutableExecution(String),

    /// An execution-only operation was called with no connection configured.
    /// Raised by the execution layer.
    #[error("no connection configured: {0}")]
    MissingConnection(String),
}

impl ForgeError {
    /// Create an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Check if this is an invalid-operator error.
    pub fn is_invalid_operator(&self) -> bool {
        matches!(self, Self::InvalidOperator(_))
    }

    /// Check if this is an invalid-argument error.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}
