//! The uniform contract every physical operator implements.
//!
//! Besides result computation, an operation answers the planner's
//! questions (width, sort order, size/cost estimates, multiplicities) and
//! names itself canonically: `as_string(0)` is the process-wide cache key.
//!
//! `get_result` is a provided method carrying the caching protocol: the
//! cache atomically hands back either an existing entry or a freshly
//! reserved in-progress one, and the long computation runs without any
//! lock held. Secondary callers block on the result table's own state
//! machine; a failed computation aborts the table and evicts the entry so
//! a retry can compute afresh.

use crate::cache::CacheLookup;
use crate::context::ExecutionContext;
use crate::error::{EngineError, Result};
use crate::tree::QueryExecutionTree;
use hexic_table::{ResultTable, Status};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::debug;

/// A physical operator.
pub trait Operation: Send + Sync {
    /// The shared execution context.
    fn context(&self) -> &Arc<ExecutionContext>;

    /// Number of columns this operation produces.
    fn get_result_width(&self) -> usize;

    /// Column indices the result is sorted by, primary key first; empty if
    /// unsorted.
    fn result_sorted_on(&self) -> Vec<usize>;

    /// Which variable lands in which output column.
    fn get_variable_columns(&self) -> FxHashMap<String, usize>;

    /// Recursively limit text-record expansion.
    fn set_text_limit(&self, limit: usize) {
        for child in self.get_children() {
            child.set_text_limit(limit);
        }
    }

    /// Estimated result rows (memoized by implementations).
    fn get_size_estimate(&self) -> usize;

    /// Estimated total cost of computing this result.
    fn get_cost_estimate(&self) -> usize;

    /// Rows per distinct value of column `col`; always at least one.
    fn get_multiplicity(&self, col: usize) -> f32;

    /// Whether the result is known to be empty without computing it.
    fn known_empty_result(&self) -> bool;

    /// Canonical textual form. With indent zero this is the cache key.
    fn as_string(&self, indent: usize) -> String;

    /// Short human-readable label.
    fn get_descriptor(&self) -> String;

    /// The input subtrees.
    fn get_children(&self) -> Vec<Arc<QueryExecutionTree>>;

    /// Compute the result payload. Called at most once per cache entry.
    fn compute_result(&self) -> Result<hexic_table::ResultData>;

    /// Materialize this operation's result through the cache.
    ///
    /// Only the root of a query passes `pin`, which keeps the entry
    /// permanently.
    fn get_result(&self, pin: bool) -> Result<Arc<ResultTable>> {
        let key = self.as_string(0);
        match self.context().cache().lookup_or_reserve(&key, pin) {
            CacheLookup::Hit(table) => match table.await_finished() {
                Status::Finished => {
                    debug!(descriptor = %self.get_descriptor(), "result cache hit");
                    Ok(table)
                }
                _ => Err(EngineError::Aborted),
            },
            CacheLookup::Reserved(table) => match self.compute_result() {
                Ok(data) => {
                    debug_assert_eq!(data.cols(), self.get_result_width());
                    table.publish(data);
                    Ok(table)
                }
                Err(e) => {
                    table.abort();
                    self.context().cache().evict(&key);
                    Err(e)
                }
            },
        }
    }
}
