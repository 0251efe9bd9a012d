//! Error types for query execution.

use hexic_index::IndexError;
use hexic_table::TableError;
use thiserror::Error;

/// Query execution errors.
///
/// Every error aborts the operator's in-progress result, evicts its cache
/// entry and propagates to the query root.
#[derive(Debug, Error)]
pub enum EngineError {
    /// User-visible query error (unparseable literal, bad regex, unknown
    /// variable).
    #[error("bad query: {0}")]
    BadQuery(String),

    /// A path that is explicitly unsupported.
    #[error("not yet implemented: {0}")]
    NotYetImplemented(String),

    /// Internal invariant violation.
    #[error("check failed: {0}")]
    CheckFailed(String),

    /// The awaited result was aborted by its producer.
    #[error("query was aborted")]
    Aborted,

    /// Table storage failure (allocation).
    #[error(transparent)]
    Table(#[from] TableError),

    /// Index access failure.
    #[error(transparent)]
    Index(#[from] IndexError),

    /// File access failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
