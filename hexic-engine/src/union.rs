//! Set union of two inputs with column alignment.
//!
//! The output schema is the union of both variable sets: left variables
//! keep their columns, right-only variables are appended in their right
//! column order. Each output column records where each side supplies it
//! from (`NO_COLUMN` when a side does not); sides whose columns already
//! line up are copied as one block, everything else is emitted row by row
//! with `ID_NO_VALUE` padding.

use crate::context::ExecutionContext;
use crate::error::{EngineError, Result};
use crate::operation::Operation;
use crate::tree::QueryExecutionTree;
use hexic_core::{ResultType, ID_NO_VALUE};
use hexic_table::{IdTable, ResultData};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::debug;

/// Marks "this side does not supply this column".
pub const NO_COLUMN: usize = usize::MAX;

/// Binary union operator.
pub struct Union {
    context: Arc<ExecutionContext>,
    subtrees: [Arc<QueryExecutionTree>; 2],
    /// Per output column: the source column in the left and right input.
    column_origins: Vec<[usize; 2]>,
}

impl Union {
    pub fn new(
        context: Arc<ExecutionContext>,
        left: Arc<QueryExecutionTree>,
        right: Arc<QueryExecutionTree>,
    ) -> Self {
        let variable_columns = combined_variable_columns(&left, &right);
        let mut column_origins = vec![[NO_COLUMN, NO_COLUMN]; variable_columns.len()];
        for (var, &out_col) in &variable_columns {
            if let Some(&col) = left.get_variable_columns().get(var) {
                column_origins[out_col][0] = col;
            }
            if let Some(&col) = right.get_variable_columns().get(var) {
                column_origins[out_col][1] = col;
            }
        }
        Self {
            context,
            subtrees: [left, right],
            column_origins,
        }
    }

    /// The per-column source table, exposed for unit tests.
    pub fn column_origins(&self) -> &[[usize; 2]] {
        &self.column_origins
    }

    /// Concatenate `left` and `right` into `res` under `column_origins`.
    pub fn compute_union(
        res: &mut IdTable,
        left: &IdTable,
        right: &IdTable,
        column_origins: &[[usize; 2]],
    ) -> Result<()> {
        res.reserve(left.size() + right.size())?;

        if left.size() > 0 {
            let columns_match = left.cols() == column_origins.len()
                && column_origins
                    .iter()
                    .enumerate()
                    .all(|(i, origin)| origin[0] == i);
            if columns_match {
                res.extend_from_range(left, 0..left.size())?;
            } else {
                let mut row_buf = vec![ID_NO_VALUE; column_origins.len()];
                for l in left.iter() {
                    for (i, origin) in column_origins.iter().enumerate() {
                        row_buf[i] = if origin[0] != NO_COLUMN {
                            l[origin[0]]
                        } else {
                            ID_NO_VALUE
                        };
                    }
                    res.push_row(&row_buf)?;
                }
            }
        }

        if right.size() > 0 {
            let columns_match = right.cols() == column_origins.len()
                && column_origins
                    .iter()
                    .enumerate()
                    .all(|(i, origin)| origin[1] == i);
            if columns_match {
                res.extend_from_range(right, 0..right.size())?;
            } else {
                let mut row_buf = vec![ID_NO_VALUE; column_origins.len()];
                for r in right.iter() {
                    for (i, origin) in column_origins.iter().enumerate() {
                        row_buf[i] = if origin[1] != NO_COLUMN {
                            r[origin[1]]
                        } else {
                            ID_NO_VALUE
                        };
                    }
                    res.push_row(&row_buf)?;
                }
            }
        }
        Ok(())
    }
}

/// Left variables at their columns, right-only variables appended in their
/// right column order.
fn combined_variable_columns(
    left: &QueryExecutionTree,
    right: &QueryExecutionTree,
) -> FxHashMap<String, usize> {
    let mut map = left.get_variable_columns().clone();
    let mut right_vars: Vec<(&String, &usize)> = right.get_variable_columns().iter().collect();
    right_vars.sort_by_key(|(_, &col)| col);
    let mut next = map.len();
    for (var, _) in right_vars {
        if !map.contains_key(var) {
            map.insert(var.clone(), next);
            next += 1;
        }
    }
    map
}

impl Operation for Union {
    fn context(&self) -> &Arc<ExecutionContext> {
        &self.context
    }

    fn get_result_width(&self) -> usize {
        // Shared variables from both sides land in one output column.
        self.column_origins.len()
    }

    fn result_sorted_on(&self) -> Vec<usize> {
        Vec::new()
    }

    fn get_variable_columns(&self) -> FxHashMap<String, usize> {
        combined_variable_columns(&self.subtrees[0], &self.subtrees[1])
    }

    fn get_size_estimate(&self) -> usize {
        self.subtrees[0].get_size_estimate() + self.subtrees[1].get_size_estimate()
    }

    fn get_cost_estimate(&self) -> usize {
        self.subtrees[0]
            .get_cost_estimate()
            .saturating_add(self.subtrees[1].get_cost_estimate())
            .saturating_add(self.get_size_estimate())
    }

    fn get_multiplicity(&self, col: usize) -> f32 {
        let Some(origin) = self.column_origins.get(col) else {
            return 1.0;
        };
        match (origin[0] != NO_COLUMN, origin[1] != NO_COLUMN) {
            (true, true) => {
                (self.subtrees[0].get_multiplicity(origin[0])
                    + self.subtrees[1].get_multiplicity(origin[1]))
                    / 2.0
            }
            (true, false) | (false, true) => {
                // The distinct values of the supplying side, plus one for
                // the unbound rows of the other side. Slightly off when
                // the input already contains unbound values.
                let (tree, col) = if origin[0] != NO_COLUMN {
                    (&self.subtrees[0], origin[0])
                } else {
                    (&self.subtrees[1], origin[1])
                };
                let num_distinct =
                    tree.get_size_estimate() as f64 / tree.get_multiplicity(col) as f64 + 1.0;
                (self.get_size_estimate() as f64 / num_distinct) as f32
            }
            (false, false) => 1.0,
        }
    }

    fn known_empty_result(&self) -> bool {
        self.subtrees[0].known_empty_result() && self.subtrees[1].known_empty_result()
    }

    fn as_string(&self, indent: usize) -> String {
        let pad = " ".repeat(indent);
        format!(
            "{}\n{pad}UNION\n{}",
            self.subtrees[0].as_string(indent),
            self.subtrees[1].as_string(indent)
        )
    }

    fn get_descriptor(&self) -> String {
        "Union".to_string()
    }

    fn get_children(&self) -> Vec<Arc<QueryExecutionTree>> {
        vec![
            Arc::clone(&self.subtrees[0]),
            Arc::clone(&self.subtrees[1]),
        ]
    }

    fn compute_result(&self) -> Result<ResultData> {
        debug!("union computation");
        let left_result = self.subtrees[0].get_result()?;
        let right_result = self.subtrees[1].get_result()?;
        let left = left_result.data().ok_or(EngineError::Aborted)?;
        let right = right_result.data().ok_or(EngineError::Aborted)?;

        // Each column's type comes from whichever side supplies it,
        // preferring the left; columns no side supplies default to KB.
        let result_types: Vec<ResultType> = self
            .column_origins
            .iter()
            .map(|origin| {
                if origin[0] != NO_COLUMN {
                    left.result_type(origin[0])
                } else if origin[1] != NO_COLUMN {
                    right.result_type(origin[1])
                } else {
                    ResultType::Kb
                }
            })
            .collect();

        let mut table = IdTable::new(self.get_result_width());
        Self::compute_union(&mut table, &left.table, &right.table, &self.column_origins)?;

        let data = ResultData::new(table, result_types, self.result_sorted_on());
        debug!(rows = data.size(), "union computation done");
        Ok(data)
    }
}
