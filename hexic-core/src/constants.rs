//! Process-wide tuning constants.

/// Capacity of the process-wide subtree result cache.
pub const NOF_SUBTREES_TO_CACHE: usize = 50;

/// Default row limit when serializing a query result.
pub const MAX_NOF_ROWS_IN_RESULT: usize = 1_000_000;

/// Minimum length of a word prefix in prefix searches.
pub const MIN_WORD_PREFIX_SIZE: usize = 4;

/// The wildcard character terminating a prefix token.
pub const PREFIX_CHAR: char = '*';
