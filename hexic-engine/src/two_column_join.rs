//! Join on two columns at once.
//!
//! Children are oriented by their canonical textual form so identical
//! queries canonicalize to one cache key, and a width-2 index scan among
//! the children is normalized to join columns `(0, 1)`. The supported
//! shape uses that scan as a mask: the result is the other side, keeping
//! exactly the rows whose join-column pair appears in the mask. The
//! general two-column join is explicitly unimplemented.

use crate::context::ExecutionContext;
use crate::engine;
use crate::error::{EngineError, Result};
use crate::operation::Operation;
use crate::tree::{OperationType, QueryExecutionTree};
use hexic_table::{IdTable, ResultData};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::debug;

/// Binary join operator on two column pairs.
pub struct TwoColumnJoin {
    context: Arc<ExecutionContext>,
    left: Arc<QueryExecutionTree>,
    right: Arc<QueryExecutionTree>,
    jc1_left: usize,
    jc2_left: usize,
    jc1_right: usize,
    jc2_right: usize,
}

/// Which side acts as the width-2 mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MaskSide {
    Left,
    Right,
    None,
}

impl TwoColumnJoin {
    /// `join_columns` holds the two `[left_col, right_col]` pairs.
    pub fn new(
        context: Arc<ExecutionContext>,
        t1: Arc<QueryExecutionTree>,
        t2: Arc<QueryExecutionTree>,
        join_columns: [[usize; 2]; 2],
    ) -> Self {
        // Order the children canonically so identical queries share a
        // cache key.
        let (left, right, jcs) = if t1.as_string(0) < t2.as_string(0) {
            (t1, t2, join_columns)
        } else {
            (
                t2,
                t1,
                [
                    [join_columns[0][1], join_columns[0][0]],
                    [join_columns[1][1], join_columns[1][0]],
                ],
            )
        };
        let mut jc1_left = jcs[0][0];
        let mut jc2_left = jcs[1][0];
        let mut jc1_right = jcs[0][1];
        let mut jc2_right = jcs[1][1];

        // A width-2 scan must join on (0, 1); swap the pairs if needed.
        let left_is_scan =
            left.get_type() == OperationType::Scan && left.get_result_width() == 2;
        let right_is_scan =
            right.get_type() == OperationType::Scan && right.get_result_width() == 2;
        if (left_is_scan && jc1_left > jc2_left) || (right_is_scan && jc1_right > jc2_right) {
            std::mem::swap(&mut jc1_left, &mut jc2_left);
            std::mem::swap(&mut jc1_right, &mut jc2_right);
        }

        Self {
            context,
            left,
            right,
            jc1_left,
            jc2_left,
            jc1_right,
            jc2_right,
        }
    }

    fn mask_side(&self) -> MaskSide {
        if self.right.get_result_width() == 2 && self.jc1_right == 0 && self.jc2_right == 1 {
            MaskSide::Right
        } else if self.left.get_result_width() == 2 && self.jc1_left == 0 && self.jc2_left == 1 {
            MaskSide::Left
        } else {
            MaskSide::None
        }
    }

    /// The side whose rows survive, and its join columns.
    fn kept_side(&self) -> (&Arc<QueryExecutionTree>, usize, usize) {
        match self.mask_side() {
            MaskSide::Right | MaskSide::None => (&self.left, self.jc1_left, self.jc2_left),
            MaskSide::Left => (&self.right, self.jc1_right, self.jc2_right),
        }
    }

    fn mask_tree(&self) -> &Arc<QueryExecutionTree> {
        match self.mask_side() {
            MaskSide::Left => &self.left,
            _ => &self.right,
        }
    }
}

impl Operation for TwoColumnJoin {
    fn context(&self) -> &Arc<ExecutionContext> {
        &self.context
    }

    fn get_result_width(&self) -> usize {
        // The mask contributes no columns beyond the join pair.
        let width = self.left.get_result_width() + self.right.get_result_width() - 2;
        debug_assert!(width > 0);
        width
    }

    fn result_sorted_on(&self) -> Vec<usize> {
        let (_, jc1, _) = self.kept_side();
        vec![jc1]
    }

    fn get_variable_columns(&self) -> FxHashMap<String, usize> {
        // The result schema is the kept side's; the mask's two variables
        // alias the kept side's join columns.
        let (kept, jc1, jc2) = self.kept_side();
        let mut map = kept.get_variable_columns().clone();
        let mask = self.mask_tree();
        for (var, &col) in mask.get_variable_columns() {
            if !map.contains_key(var) {
                map.insert(var.clone(), if col == 0 { jc1 } else { jc2 });
            }
        }
        map
    }

    fn get_size_estimate(&self) -> usize {
        self.left
            .get_size_estimate()
            .min(self.right.get_size_estimate())
    }

    fn get_cost_estimate(&self) -> usize {
        self.left
            .get_size_estimate()
            .saturating_add(self.right.get_size_estimate())
            .saturating_add(self.left.get_cost_estimate())
            .saturating_add(self.right.get_cost_estimate())
    }

    fn get_multiplicity(&self, col: usize) -> f32 {
        // The mask only filters rows: multiplicities of the kept side pass
        // through, capped by the mask's on the two join columns.
        let (kept, jc1, jc2) = self.kept_side();
        let mask = self.mask_tree();
        if col == jc1 {
            kept.get_multiplicity(col).min(mask.get_multiplicity(0))
        } else if col == jc2 {
            kept.get_multiplicity(col).min(mask.get_multiplicity(1))
        } else {
            kept.get_multiplicity(col)
        }
    }

    fn known_empty_result(&self) -> bool {
        self.left.known_empty_result() || self.right.known_empty_result()
    }

    fn as_string(&self, indent: usize) -> String {
        let pad = " ".repeat(indent);
        format!(
            "{pad}TWO_COLUMN_JOIN\n{}\n{pad}join-columns: [{} & {}]\n{pad}|X|\n{}\n{pad}join-columns: [{} & {}]",
            self.left.as_string(indent),
            self.jc1_left,
            self.jc2_left,
            self.right.as_string(indent),
            self.jc1_right,
            self.jc2_right
        )
    }

    fn get_descriptor(&self) -> String {
        let vars = self.left.get_variable_columns();
        let mut join_vars = String::new();
        for (var, &col) in vars {
            if col == self.jc1_left || col == self.jc2_left {
                join_vars.push_str(var);
                join_vars.push(' ');
            }
        }
        format!("TwoColumnJoin on {join_vars}")
    }

    fn get_children(&self) -> Vec<Arc<QueryExecutionTree>> {
        vec![Arc::clone(&self.left), Arc::clone(&self.right)]
    }

    fn compute_result(&self) -> Result<ResultData> {
        debug!(descriptor = %self.get_descriptor(), "two-column join computation");
        if self.mask_side() == MaskSide::None {
            return Err(EngineError::NotYetImplemented(
                "two-column join without a width-2 scan side; prefer resolving \
                 cyclic queries with a single join"
                    .to_string(),
            ));
        }
        let (kept_tree, jc1, jc2) = self.kept_side();
        let kept_result = kept_tree.get_result()?;
        let mask_result = self.mask_tree().get_result()?;
        let kept = kept_result.data().ok_or(EngineError::Aborted)?;
        let mask = mask_result.data().ok_or(EngineError::Aborted)?;

        debug_assert!(kept.cols() >= 2);
        let mut table = IdTable::new(kept.cols());
        engine::mask_filter(&kept.table, jc1, jc2, &mask.table, &mut table)?;

        let data = ResultData::with_local_vocab(
            table,
            kept.result_types.clone(),
            self.result_sorted_on(),
            Arc::clone(&kept.local_vocab),
        );
        debug!(rows = data.size(), "two-column join computation done");
        Ok(data)
    }
}
