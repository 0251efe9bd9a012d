//! The composition node of a query: one operation plus the variable
//! bookkeeping around it.
//!
//! Processed bottom up, the tree gives an ordering to the operations
//! needed to solve a query. The tree also owns result serialization:
//! selected variables are resolved to columns and emitted as JSON rows or
//! separated text, honoring limit and offset.

use crate::context::ExecutionContext;
use crate::error::{EngineError, Result};
use crate::operation::Operation;
use hexic_core::{decode_float, Id, ResultType, ID_NO_VALUE};
use hexic_table::{ResultData, ResultTable};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;

/// Tag for the kind of operation a tree node holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    Undefined,
    Scan,
    Filter,
    OrderBy,
    Union,
    TwoColumnJoin,
}

#[derive(Default)]
struct TreeCaches {
    /// Cached textual form together with the indent it was rendered at.
    as_string: Option<(usize, String)>,
    size_estimate: Option<usize>,
}

/// A query execution tree node.
pub struct QueryExecutionTree {
    context: Arc<ExecutionContext>,
    operation: Option<Arc<dyn Operation>>,
    op_type: OperationType,
    variable_columns: FxHashMap<String, usize>,
    context_vars: FxHashSet<String>,
    is_root: bool,
    caches: Mutex<TreeCaches>,
}

impl QueryExecutionTree {
    pub fn new(context: Arc<ExecutionContext>) -> Self {
        Self {
            context,
            operation: None,
            op_type: OperationType::Undefined,
            variable_columns: FxHashMap::default(),
            context_vars: FxHashSet::default(),
            is_root: false,
            caches: Mutex::new(TreeCaches::default()),
        }
    }

    /// Install the operation this node evaluates.
    pub fn set_operation(&mut self, op_type: OperationType, operation: Arc<dyn Operation>) {
        self.op_type = op_type;
        self.operation = Some(operation);
        *self.caches.lock() = TreeCaches::default();
    }

    /// Mark this node as the query root; only the root pins its cache
    /// entry permanently.
    pub fn set_root(&mut self, is_root: bool) {
        self.is_root = is_root;
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    pub fn context(&self) -> &Arc<ExecutionContext> {
        &self.context
    }

    pub fn get_type(&self) -> OperationType {
        self.op_type
    }

    pub fn is_empty(&self) -> bool {
        self.op_type == OperationType::Undefined || self.operation.is_none()
    }

    pub fn root_operation(&self) -> Option<&Arc<dyn Operation>> {
        self.operation.as_ref()
    }

    // ── Variable bookkeeping ─────────────────────────────────────────────

    pub fn set_variable_column(&mut self, variable: impl Into<String>, col: usize) {
        self.variable_columns.insert(variable.into(), col);
    }

    pub fn set_variable_columns(&mut self, map: FxHashMap<String, usize>) {
        self.variable_columns = map;
    }

    pub fn get_variable_columns(&self) -> &FxHashMap<String, usize> {
        &self.variable_columns
    }

    /// The column of `variable`, or a query error if it is not covered.
    pub fn variable_column(&self, variable: &str) -> Result<usize> {
        self.variable_columns
            .get(variable)
            .copied()
            .ok_or_else(|| EngineError::BadQuery(format!("unknown variable {variable}")))
    }

    pub fn var_covered(&self, variable: &str) -> bool {
        self.variable_columns.contains_key(variable)
    }

    pub fn add_context_var(&mut self, variable: impl Into<String>) {
        self.context_vars.insert(variable.into());
    }

    pub fn is_context_var(&self, variable: &str) -> bool {
        self.context_vars.contains(variable)
    }

    // ── Delegation to the operation ──────────────────────────────────────

    fn op(&self) -> Result<&Arc<dyn Operation>> {
        self.operation
            .as_ref()
            .ok_or_else(|| EngineError::CheckFailed("tree node without an operation".to_string()))
    }

    /// Canonical textual form, cached per indent.
    pub fn as_string(&self, indent: usize) -> String {
        {
            let caches = self.caches.lock();
            if let Some((cached_indent, s)) = &caches.as_string {
                if *cached_indent == indent {
                    return s.clone();
                }
            }
        }
        let s = match &self.operation {
            Some(op) => op.as_string(indent),
            None => format!("{:indent$}<empty>", ""),
        };
        self.caches.lock().as_string = Some((indent, s.clone()));
        s
    }

    pub fn get_result_width(&self) -> usize {
        self.operation.as_ref().map_or(0, |op| op.get_result_width())
    }

    pub fn result_sorted_on(&self) -> Vec<usize> {
        self.operation
            .as_ref()
            .map_or_else(Vec::new, |op| op.result_sorted_on())
    }

    /// Materialize the result; pinned in the cache when this is the root.
    pub fn get_result(&self) -> Result<Arc<ResultTable>> {
        self.op()?.get_result(self.is_root)
    }

    /// Limit text-record expansion; invalidates the cached textual form
    /// and size estimate.
    pub fn set_text_limit(&self, limit: usize) {
        if let Some(op) = &self.operation {
            op.set_text_limit(limit);
        }
        *self.caches.lock() = TreeCaches::default();
    }

    pub fn get_size_estimate(&self) -> usize {
        if let Some(estimate) = self.caches.lock().size_estimate {
            return estimate;
        }
        let estimate = self.operation.as_ref().map_or(0, |op| op.get_size_estimate());
        self.caches.lock().size_estimate = Some(estimate);
        estimate
    }

    pub fn get_cost_estimate(&self) -> usize {
        self.operation.as_ref().map_or(0, |op| op.get_cost_estimate())
    }

    pub fn get_multiplicity(&self, col: usize) -> f32 {
        self.operation
            .as_ref()
            .map_or(1.0, |op| op.get_multiplicity(col))
    }

    /// Estimated distinct values of a column: size over multiplicity.
    pub fn get_distinct_estimate(&self, col: usize) -> usize {
        (self.get_size_estimate() as f32 / self.get_multiplicity(col)) as usize
    }

    pub fn known_empty_result(&self) -> bool {
        self.operation
            .as_ref()
            .is_some_and(|op| op.known_empty_result())
    }

    /// Visit every descendant tree, depth first.
    pub fn for_all_descendants(&self, f: &mut dyn FnMut(&Arc<QueryExecutionTree>)) {
        if let Some(op) = &self.operation {
            for child in op.get_children() {
                f(&child);
                child.for_all_descendants(f);
            }
        }
    }

    // ── Result serialization ─────────────────────────────────────────────

    /// Serialize `select_vars` of the result as a JSON array of rows.
    /// Unbound cells and uncovered variables serialize as `null`.
    pub fn write_result_as_json(
        &self,
        select_vars: &[String],
        limit: usize,
        offset: usize,
    ) -> Result<Value> {
        let result = self.get_result()?;
        let data = result.data().ok_or(EngineError::Aborted)?;
        let valid = self.valid_indices(select_vars, data);

        let upper = data.size().min(offset.saturating_add(limit));
        let mut rows = Vec::with_capacity(upper.saturating_sub(offset));
        for r in offset..upper {
            let row = data.table.row(r);
            let cells: Vec<Value> = valid
                .iter()
                .map(|v| match v {
                    Some((col, ty)) => json_cell(row[*col], *ty, data, self.context()),
                    None => Value::Null,
                })
                .collect();
            rows.push(Value::Array(cells));
        }
        Ok(Value::Array(rows))
    }

    /// Serialize `select_vars` as separated text with the default row
    /// limit and no offset.
    pub fn write_result_to_stream_with_defaults<W: Write>(
        &self,
        out: &mut W,
        select_vars: &[String],
        sep: char,
    ) -> Result<()> {
        self.write_result_to_stream(
            out,
            select_vars,
            hexic_core::constants::MAX_NOF_ROWS_IN_RESULT,
            0,
            sep,
        )
    }

    /// Serialize `select_vars` as separated text, one row per line.
    pub fn write_result_to_stream<W: Write>(
        &self,
        out: &mut W,
        select_vars: &[String],
        limit: usize,
        offset: usize,
        sep: char,
    ) -> Result<()> {
        let result = self.get_result()?;
        let data = result.data().ok_or(EngineError::Aborted)?;
        let valid = self.valid_indices(select_vars, data);

        let upper = data.size().min(offset.saturating_add(limit));
        let mut sep_buf = [0u8; 4];
        let sep = sep.encode_utf8(&mut sep_buf).as_bytes();
        for r in offset..upper {
            let row = data.table.row(r);
            for (i, v) in valid.iter().enumerate() {
                if i > 0 {
                    out.write_all(sep)?;
                }
                if let Some((col, ty)) = v {
                    out.write_all(text_cell(row[*col], *ty, data, self.context()).as_bytes())?;
                }
            }
            out.write_all(b"\n")?;
        }
        Ok(())
    }

    fn valid_indices(
        &self,
        select_vars: &[String],
        data: &ResultData,
    ) -> Vec<Option<(usize, ResultType)>> {
        select_vars
            .iter()
            .map(|var| {
                self.variable_columns
                    .get(var)
                    .map(|&col| (col, data.result_type(col)))
            })
            .collect()
    }
}

fn json_cell(id: Id, ty: ResultType, data: &ResultData, context: &ExecutionContext) -> Value {
    if id == ID_NO_VALUE {
        return Value::Null;
    }
    match ty {
        ResultType::Kb => context
            .index()
            .id_to_optional_string(id)
            .map_or(Value::Null, Value::String),
        ResultType::Verbatim | ResultType::Text => json!(id),
        ResultType::Float => {
            let f = decode_float(id);
            if f.is_finite() {
                json!(f)
            } else {
                Value::Null
            }
        }
        ResultType::LocalVocab => data
            .id_to_optional_string(id)
            .map_or(Value::Null, |s| Value::String(s.to_string())),
    }
}

fn text_cell(id: Id, ty: ResultType, data: &ResultData, context: &ExecutionContext) -> String {
    if id == ID_NO_VALUE {
        return String::new();
    }
    match ty {
        ResultType::Kb => context.index().id_to_optional_string(id).unwrap_or_default(),
        ResultType::Verbatim | ResultType::Text => id.to_string(),
        ResultType::Float => decode_float(id).to_string(),
        ResultType::LocalVocab => data
            .id_to_optional_string(id)
            .unwrap_or_default()
            .to_string(),
    }
}
