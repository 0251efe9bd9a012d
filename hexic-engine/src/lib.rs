//! Physical query execution for Hexic.
//!
//! Operators form a tree of [`QueryExecutionTree`] nodes, each owning one
//! [`Operation`]. Materialization is lazy: `get_result` on the root pulls
//! results from the children, and every subresult is shared read-only
//! through the process-wide [`SubtreeCache`] keyed by the operation's
//! canonical textual form. Inner loops live in [`engine`] and are
//! width-dispatched so the common narrow tables run on statically sized
//! code paths.

pub mod cache;
pub mod context;
pub mod cost_factors;
pub mod engine;
pub mod error;
pub mod filter;
pub mod operation;
pub mod order_by;
pub mod scan;
pub mod tree;
pub mod two_column_join;
pub mod union;

pub use cache::{CacheLookup, SubtreeCache};
pub use context::ExecutionContext;
pub use cost_factors::CostFactors;
pub use error::{EngineError, Result};
pub use filter::{Filter, FilterType};
pub use operation::Operation;
pub use order_by::OrderBy;
pub use scan::{IndexScan, ScanType};
pub use tree::{OperationType, QueryExecutionTree};
pub use two_column_join::TwoColumnJoin;
pub use union::Union;
