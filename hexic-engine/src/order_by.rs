//! Stable multi-key ordering of one input.
//!
//! Keys are `(column, descending)` pairs with a final tiebreak on column
//! zero ascending. Only the leading run of ascending keys is reported as
//! the output sort order: downstream operators assume ascending columns,
//! so a descending key ends the reported prefix.

use crate::context::ExecutionContext;
use crate::engine;
use crate::error::{EngineError, Result};
use crate::operation::Operation;
use crate::tree::QueryExecutionTree;
use hexic_table::ResultData;
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::debug;

/// Unary stable sort operator.
pub struct OrderBy {
    context: Arc<ExecutionContext>,
    subtree: Arc<QueryExecutionTree>,
    /// `(column, descending)` sort keys, primary first.
    sort_indices: Vec<(usize, bool)>,
}

impl OrderBy {
    pub fn new(
        context: Arc<ExecutionContext>,
        subtree: Arc<QueryExecutionTree>,
        sort_indices: Vec<(usize, bool)>,
    ) -> Self {
        assert!(!sort_indices.is_empty(), "ORDER BY without sort keys");
        Self {
            context,
            subtree,
            sort_indices,
        }
    }
}

impl Operation for OrderBy {
    fn context(&self) -> &Arc<ExecutionContext> {
        &self.context
    }

    fn get_result_width(&self) -> usize {
        self.subtree.get_result_width()
    }

    fn result_sorted_on(&self) -> Vec<usize> {
        // Only the leading ascending keys count as sorted.
        self.sort_indices
            .iter()
            .take_while(|(_, descending)| !descending)
            .map(|(col, _)| *col)
            .collect()
    }

    fn get_variable_columns(&self) -> FxHashMap<String, usize> {
        self.subtree.get_variable_columns().clone()
    }

    fn set_text_limit(&self, limit: usize) {
        self.subtree.set_text_limit(limit);
    }

    fn get_size_estimate(&self) -> usize {
        self.subtree.get_size_estimate()
    }

    fn get_cost_estimate(&self) -> usize {
        let size = self.subtree.get_size_estimate();
        let log = usize::BITS - size.max(1).leading_zeros();
        size.saturating_mul(log as usize)
            .saturating_add(self.subtree.get_cost_estimate())
    }

    fn get_multiplicity(&self, col: usize) -> f32 {
        self.subtree.get_multiplicity(col)
    }

    fn known_empty_result(&self) -> bool {
        self.subtree.known_empty_result()
    }

    fn as_string(&self, indent: usize) -> String {
        let pad = " ".repeat(indent);
        let mut s = format!("{pad}ORDER_BY\n{} order on ", self.subtree.as_string(indent));
        for (col, descending) in &self.sort_indices {
            let _ = write!(s, "{}({col}) ", if *descending { "desc" } else { "asc" });
        }
        s
    }

    fn get_descriptor(&self) -> String {
        let vars = self.subtree.get_variable_columns();
        let mut s = "OrderBy on ".to_string();
        for (col, descending) in &self.sort_indices {
            if let Some(var) = vars.iter().find(|(_, c)| *c == col).map(|(v, _)| v) {
                let _ = write!(s, "{}({var}) ", if *descending { "DESC" } else { "ASC" });
            }
        }
        s
    }

    fn get_children(&self) -> Vec<Arc<QueryExecutionTree>> {
        vec![Arc::clone(&self.subtree)]
    }

    fn compute_result(&self) -> Result<ResultData> {
        debug!(descriptor = %self.get_descriptor(), "order-by computation");
        let sub_result = self.subtree.get_result()?;
        let sub = sub_result.data().ok_or(EngineError::Aborted)?;

        let mut table = sub.table.clone();
        let keys = self.sort_indices.clone();
        engine::sort(&mut table, move |a, b| {
            for &(col, descending) in &keys {
                let ord = a[col].cmp(&b[col]);
                if ord != Ordering::Equal {
                    return if descending { ord.reverse() } else { ord };
                }
            }
            a[0].cmp(&b[0])
        })?;

        Ok(ResultData::with_local_vocab(
            table,
            sub.result_types.clone(),
            self.result_sorted_on(),
            Arc::clone(&sub.local_vocab),
        ))
    }
}
