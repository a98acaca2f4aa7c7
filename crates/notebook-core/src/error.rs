//! Error types for notebook-core.

use thiserror::Error;

/// Result type for notebook-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The error kinds a cell or a run can produce.
///
/// Variants 1-8 are the cell-scoped error taxonomy; the rest are the
/// ordinary wrappers every crate needs.
#[derive(Debug, Error)]
pub enum Error {
    /// Parse failure in an analyzer, surfaced at execution time, not at graph build.
    #[error("analysis error: {0}")]
    AnalysisError(String),

    /// The same name is defined by two cells at once.
    #[error("duplicate definition of '{name}' with cell {other}")]
    DuplicateDefinition { name: String, other: String },

    /// A cycle was detected among the given cells.
    #[error("cyclic dependency among cells: {}", members.join(", "))]
    Cycle { members: Vec<String> },

    /// An imperative cell referenced a name with no binding in the namespace.
    #[error("name '{0}' is not defined")]
    NameNotDefined(String),

    /// A query cell referenced a `{{name}}` placeholder with no value bound.
    #[error("missing placeholder value for '{0}'")]
    MissingPlaceholder(String),

    /// An executor exceeded its wall-clock deadline.
    #[error("execution timed out")]
    Timeout,

    /// The query driver (or DSN configuration) failed.
    #[error("query execution error: {0}")]
    QueryExecutionError(String),

    /// The event bus dropped a message because a subscriber's queue was full.
    #[error("transport error: {0}")]
    TransportError(String),

    /// The referenced cell does not exist.
    #[error("cell not found: {0}")]
    CellNotFound(String),

    /// A malformed request was made of a component (not a cell-scoped error).
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
