//! Error types for table storage.

use thiserror::Error;

/// Errors from id-table storage management.
#[derive(Debug, Error)]
pub enum TableError {
    /// Allocation failure while growing a table. The table has been reset
    /// to a valid empty state.
    #[error("failed to allocate id-table storage for {rows} rows of width {cols}")]
    Alloc { rows: usize, cols: usize },
}

/// Result type for table operations.
pub type Result<T> = std::result::Result<T, TableError>;
