//! The filter operator: one comparison predicate over one input.
//!
//! The right-hand side is either another variable (leading `?`) or a
//! literal. Literals are pre-converted into the filtered column's id space
//! once, so the inner loop compares plain ids. When the input is sorted on
//! the filtered column, the relational comparators locate the qualifying
//! range with two binary searches and copy it as a block instead of
//! scanning.

use crate::context::ExecutionContext;
use crate::engine;
use crate::error::{EngineError, Result};
use crate::operation::Operation;
use crate::tree::QueryExecutionTree;
use hexic_core::{
    compare_ids_as, encode_float, ids_equal_as, partial_compare_ids_as, Id, ResultType,
    ID_NO_MATCH,
};
use hexic_index::conversions;
use hexic_table::{IdTable, ResultData};
use regex::RegexBuilder;
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

/// The comparison a filter applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LangMatches,
    Regex,
    Prefix,
}

/// Relational kernels after literal conversion. KB range filters arrive
/// here already mapped onto vocabulary boundary ids (`Lt` against the
/// LE-boundary expresses `<=`, `Ge` against the GT-boundary expresses `>`).
#[derive(Debug, Clone, Copy)]
enum CompareKernel {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Unary operator keeping the rows that satisfy one comparison.
pub struct Filter {
    context: Arc<ExecutionContext>,
    subtree: Arc<QueryExecutionTree>,
    filter_type: FilterType,
    lhs: String,
    rhs: String,
    regex_ignore_case: bool,
}

impl Filter {
    pub fn new(
        context: Arc<ExecutionContext>,
        subtree: Arc<QueryExecutionTree>,
        filter_type: FilterType,
        lhs: impl Into<String>,
        rhs: impl Into<String>,
    ) -> Self {
        Self {
            context,
            subtree,
            filter_type,
            lhs: lhs.into(),
            rhs: rhs.into(),
            regex_ignore_case: false,
        }
    }

    pub fn set_regex_ignore_case(&mut self, ignore_case: bool) {
        self.regex_ignore_case = ignore_case;
    }

    pub fn subtree(&self) -> &Arc<QueryExecutionTree> {
        &self.subtree
    }

    fn op_symbol(&self) -> String {
        match self.filter_type {
            FilterType::Eq => " == ".to_string(),
            FilterType::Ne => " != ".to_string(),
            FilterType::Lt => " < ".to_string(),
            FilterType::Le => " <= ".to_string(),
            FilterType::Gt => " > ".to_string(),
            FilterType::Ge => " >= ".to_string(),
            FilterType::LangMatches => " LANG_MATCHES ".to_string(),
            FilterType::Regex if self.regex_ignore_case => " REGEX ignoring case ".to_string(),
            FilterType::Regex => " REGEX ".to_string(),
            FilterType::Prefix => " PREFIX ".to_string(),
        }
    }

    /// Filter with a variable right-hand side: compare two columns per row.
    fn compute_dynamic(
        &self,
        sub: &ResultData,
        lhs_col: usize,
        rhs_col: usize,
        ty: ResultType,
        out: &mut IdTable,
    ) -> Result<()> {
        let input = &sub.table;
        match self.filter_type {
            FilterType::Eq => {
                engine::filter(input, |e| ids_equal_as(ty, e[lhs_col], e[rhs_col]), out)?
            }
            FilterType::Ne => {
                engine::filter(input, |e| !ids_equal_as(ty, e[lhs_col], e[rhs_col]), out)?
            }
            FilterType::Lt => engine::filter(
                input,
                |e| partial_compare_ids_as(ty, e[lhs_col], e[rhs_col]) == Some(Ordering::Less),
                out,
            )?,
            FilterType::Le => engine::filter(
                input,
                |e| {
                    matches!(
                        partial_compare_ids_as(ty, e[lhs_col], e[rhs_col]),
                        Some(Ordering::Less | Ordering::Equal)
                    )
                },
                out,
            )?,
            FilterType::Gt => engine::filter(
                input,
                |e| partial_compare_ids_as(ty, e[lhs_col], e[rhs_col]) == Some(Ordering::Greater),
                out,
            )?,
            FilterType::Ge => engine::filter(
                input,
                |e| {
                    matches!(
                        partial_compare_ids_as(ty, e[lhs_col], e[rhs_col]),
                        Some(Ordering::Greater | Ordering::Equal)
                    )
                },
                out,
            )?,
            FilterType::LangMatches | FilterType::Regex | FilterType::Prefix => {
                return Err(EngineError::NotYetImplemented(format!(
                    "string filtering with a dynamic right side: {}",
                    self.get_descriptor()
                )))
            }
        }
        Ok(())
    }

    /// Filter with a literal right-hand side: convert it into the column's
    /// id space, then run a relational or string kernel.
    fn compute_fixed(
        &self,
        sub: &ResultData,
        lhs_col: usize,
        ty: ResultType,
        out: &mut IdTable,
    ) -> Result<()> {
        let string_op = matches!(
            self.filter_type,
            FilterType::Prefix | FilterType::LangMatches | FilterType::Regex
        );
        if string_op && !matches!(ty, ResultType::Kb | ResultType::LocalVocab) {
            return Err(EngineError::BadQuery(format!(
                "string based filter on a non string column: {}",
                self.get_descriptor()
            )));
        }
        let sorted = sub.sorted_by.first() == Some(&lhs_col);

        match ty {
            ResultType::Kb => self.compute_fixed_kb(sub, lhs_col, sorted, out),
            ResultType::Verbatim => {
                let rhs: Id = self.rhs.parse().map_err(|_| {
                    EngineError::BadQuery(format!(
                        "filter on an unsigned integer column, but \
                         {:?} is not an unsigned integer",
                        self.rhs
                    ))
                })?;
                self.apply_compare(sub, lhs_col, ty, self.direct_kernel(), rhs, sorted, out)
            }
            ResultType::Float => {
                let f: f32 = self.rhs.parse().map_err(|_| {
                    EngineError::BadQuery(format!(
                        "filter on a float column, but {:?} is not a float",
                        self.rhs
                    ))
                })?;
                self.apply_compare(
                    sub,
                    lhs_col,
                    ty,
                    self.direct_kernel(),
                    encode_float(f),
                    sorted,
                    out,
                )
            }
            ResultType::Text => Err(EngineError::NotYetImplemented(format!(
                "filtering on text type columns: {}",
                self.get_descriptor()
            ))),
            ResultType::LocalVocab => self.compute_fixed_local_vocab(sub, lhs_col, sorted, out),
        }
    }

    fn compute_fixed_kb(
        &self,
        sub: &ResultData,
        lhs_col: usize,
        sorted: bool,
        out: &mut IdTable,
    ) -> Result<()> {
        let vocab = self.context.index().vocab();
        // Value literals compare through their sortable index-word form.
        let word = if conversions::is_xsd_value(&self.rhs) {
            conversions::convert_value_literal_to_index_word(&self.rhs)
        } else if conversions::is_numeric(&self.rhs) {
            conversions::convert_numeric_to_index_word(&self.rhs)
        } else {
            self.rhs.clone()
        };
        match self.filter_type {
            FilterType::Eq | FilterType::Ne => {
                let rhs = vocab.get_id(&self.rhs).unwrap_or(ID_NO_MATCH);
                let kernel = if self.filter_type == FilterType::Eq {
                    CompareKernel::Eq
                } else {
                    CompareKernel::Ne
                };
                self.apply_compare(sub, lhs_col, ResultType::Kb, kernel, rhs, sorted, out)
            }
            // Range filters run against boundary ids: strictly-below the
            // LT/LE boundary, at-least the GE/GT boundary.
            FilterType::Lt => {
                let bound = vocab.get_value_id_for_lt(&word);
                self.apply_compare(sub, lhs_col, ResultType::Kb, CompareKernel::Lt, bound, sorted, out)
            }
            FilterType::Le => {
                let bound = vocab.get_value_id_for_le(&word);
                self.apply_compare(sub, lhs_col, ResultType::Kb, CompareKernel::Lt, bound, sorted, out)
            }
            FilterType::Gt => {
                let bound = vocab.get_value_id_for_gt(&word);
                self.apply_compare(sub, lhs_col, ResultType::Kb, CompareKernel::Ge, bound, sorted, out)
            }
            FilterType::Ge => {
                let bound = vocab.get_value_id_for_ge(&word);
                self.apply_compare(sub, lhs_col, ResultType::Kb, CompareKernel::Ge, bound, sorted, out)
            }
            FilterType::Prefix => self.compute_prefix_kb(sub, lhs_col, sorted, out),
            FilterType::LangMatches => self.compute_lang_matches(sub, lhs_col, ResultType::Kb, out),
            FilterType::Regex => self.compute_regex(sub, lhs_col, ResultType::Kb, out),
        }
    }

    fn compute_fixed_local_vocab(
        &self,
        sub: &ResultData,
        lhs_col: usize,
        sorted: bool,
        out: &mut IdTable,
    ) -> Result<()> {
        match self.filter_type {
            FilterType::Eq | FilterType::Ne => {
                // The local vocabulary is unsorted; a linear search finds
                // the id, and a miss yields the vocabulary size, which
                // matches no row.
                let rhs = sub
                    .local_vocab
                    .iter()
                    .position(|entry| entry == &self.rhs)
                    .unwrap_or(sub.local_vocab.len()) as Id;
                let kernel = if self.filter_type == FilterType::Eq {
                    CompareKernel::Eq
                } else {
                    CompareKernel::Ne
                };
                self.apply_compare(sub, lhs_col, ResultType::LocalVocab, kernel, rhs, sorted, out)
            }
            FilterType::LangMatches => {
                self.compute_lang_matches(sub, lhs_col, ResultType::LocalVocab, out)
            }
            FilterType::Regex => self.compute_regex(sub, lhs_col, ResultType::LocalVocab, out),
            FilterType::Prefix => Err(EngineError::NotYetImplemented(format!(
                "prefix filtering on dynamically assembled strings: {}",
                self.get_descriptor()
            ))),
            _ => Err(EngineError::NotYetImplemented(format!(
                "only equality, inequality and string based filters are \
                 allowed on dynamically assembled strings: {}",
                self.get_descriptor()
            ))),
        }
    }

    /// The kernel for columns whose rhs literal converts to a directly
    /// comparable id (verbatim, float).
    fn direct_kernel(&self) -> CompareKernel {
        match self.filter_type {
            FilterType::Eq => CompareKernel::Eq,
            FilterType::Ne => CompareKernel::Ne,
            FilterType::Lt => CompareKernel::Lt,
            FilterType::Le => CompareKernel::Le,
            FilterType::Gt => CompareKernel::Gt,
            FilterType::Ge => CompareKernel::Ge,
            _ => unreachable!("string filters never reach the relational kernel"),
        }
    }

    /// Relational kernel with the binary-search fast path on sorted input.
    #[allow(clippy::too_many_arguments)]
    fn apply_compare(
        &self,
        sub: &ResultData,
        lhs_col: usize,
        ty: ResultType,
        kernel: CompareKernel,
        rhs: Id,
        sorted: bool,
        out: &mut IdTable,
    ) -> Result<()> {
        let input = &sub.table;
        if sorted {
            let n = input.rows();
            let lower = || {
                engine::lower_bound_row(input, |row| {
                    compare_ids_as(ty, row[lhs_col], rhs) == Ordering::Less
                })
            };
            let upper = || {
                engine::lower_bound_row(input, |row| {
                    compare_ids_as(ty, row[lhs_col], rhs) != Ordering::Greater
                })
            };
            match kernel {
                CompareKernel::Eq => {
                    let lo = lower();
                    if lo < n && ids_equal_as(ty, input.at(lo, lhs_col), rhs) {
                        out.extend_from_range(input, lo..upper())?;
                    }
                }
                CompareKernel::Ne => {
                    let lo = lower();
                    if lo < n && ids_equal_as(ty, input.at(lo, lhs_col), rhs) {
                        out.extend_from_range(input, 0..lo)?;
                        out.extend_from_range(input, upper()..n)?;
                    } else {
                        out.extend_from_range(input, 0..n)?;
                    }
                }
                CompareKernel::Lt => out.extend_from_range(input, 0..lower())?,
                CompareKernel::Le => out.extend_from_range(input, 0..upper())?,
                CompareKernel::Gt => out.extend_from_range(input, upper()..n)?,
                CompareKernel::Ge => out.extend_from_range(input, lower()..n)?,
            }
            return Ok(());
        }
        match kernel {
            CompareKernel::Eq => {
                engine::filter(input, |e| ids_equal_as(ty, e[lhs_col], rhs), out)?
            }
            CompareKernel::Ne => {
                engine::filter(input, |e| !ids_equal_as(ty, e[lhs_col], rhs), out)?
            }
            CompareKernel::Lt => engine::filter(
                input,
                |e| partial_compare_ids_as(ty, e[lhs_col], rhs) == Some(Ordering::Less),
                out,
            )?,
            CompareKernel::Le => engine::filter(
                input,
                |e| {
                    matches!(
                        partial_compare_ids_as(ty, e[lhs_col], rhs),
                        Some(Ordering::Less | Ordering::Equal)
                    )
                },
                out,
            )?,
            CompareKernel::Gt => engine::filter(
                input,
                |e| partial_compare_ids_as(ty, e[lhs_col], rhs) == Some(Ordering::Greater),
                out,
            )?,
            CompareKernel::Ge => engine::filter(
                input,
                |e| {
                    matches!(
                        partial_compare_ids_as(ty, e[lhs_col], rhs),
                        Some(Ordering::Greater | Ordering::Equal)
                    )
                },
                out,
            )?,
        }
        Ok(())
    }

    /// PREFIX over a vocabulary column: the qualifying ids form the range
    /// between the prefix itself and the lexicographically next string
    /// after incrementing its last character.
    fn compute_prefix_kb(
        &self,
        sub: &ResultData,
        lhs_col: usize,
        sorted: bool,
        out: &mut IdTable,
    ) -> Result<()> {
        let vocab = self.context.index().vocab();
        let prefix = self.rhs.strip_prefix('^').unwrap_or(&self.rhs);
        let mut upper_str = prefix.to_string();
        match upper_str.pop() {
            Some(last) => {
                let bumped = char::from_u32(last as u32 + 1).unwrap_or(last);
                upper_str.push(bumped);
            }
            None => {
                return Err(EngineError::BadQuery(format!(
                    "empty prefix in filter: {}",
                    self.get_descriptor()
                )))
            }
        }
        let lower_bound = vocab.get_value_id_for_ge(prefix);
        let upper_bound = vocab.get_value_id_for_lt(&upper_str);

        let input = &sub.table;
        if sorted {
            let lo = engine::lower_bound_row(input, |row| row[lhs_col] < lower_bound);
            let hi = engine::lower_bound_row(input, |row| row[lhs_col] < upper_bound);
            out.extend_from_range(input, lo..hi)?;
        } else {
            engine::filter(
                input,
                |e| lower_bound <= e[lhs_col] && e[lhs_col] < upper_bound,
                out,
            )?;
        }
        Ok(())
    }

    /// Rows whose entity string carries the requested language suffix;
    /// rows without any string pass.
    fn compute_lang_matches(
        &self,
        sub: &ResultData,
        lhs_col: usize,
        ty: ResultType,
        out: &mut IdTable,
    ) -> Result<()> {
        let index = self.context.index();
        engine::filter(
            &sub.table,
            |e| match resolve_entity(e[lhs_col], ty, sub, index) {
                Some(entity) => entity.ends_with(&self.rhs),
                None => true,
            },
            out,
        )
    }

    /// Rows whose entity string matches the regex; rows without any string
    /// pass. Compilation failure is a user-visible query error.
    fn compute_regex(
        &self,
        sub: &ResultData,
        lhs_col: usize,
        ty: ResultType,
        out: &mut IdTable,
    ) -> Result<()> {
        let re = RegexBuilder::new(&self.rhs)
            .case_insensitive(self.regex_ignore_case)
            .build()
            .map_err(|e| {
                EngineError::BadQuery(format!("the regex {:?} could not be compiled: {e}", self.rhs))
            })?;
        let index = self.context.index();
        engine::filter(
            &sub.table,
            |e| match resolve_entity(e[lhs_col], ty, sub, index) {
                Some(entity) => re.is_match(&entity),
                None => true,
            },
            out,
        )
    }
}

fn resolve_entity(
    id: Id,
    ty: ResultType,
    sub: &ResultData,
    index: &hexic_index::Index,
) -> Option<String> {
    match ty {
        ResultType::Kb => index.id_to_optional_string(id),
        ResultType::LocalVocab => sub.id_to_optional_string(id).map(str::to_string),
        _ => None,
    }
}

impl Operation for Filter {
    fn context(&self) -> &Arc<ExecutionContext> {
        &self.context
    }

    fn get_result_width(&self) -> usize {
        self.subtree.get_result_width()
    }

    fn result_sorted_on(&self) -> Vec<usize> {
        self.subtree.result_sorted_on()
    }

    fn get_variable_columns(&self) -> FxHashMap<String, usize> {
        self.subtree.get_variable_columns().clone()
    }

    fn set_text_limit(&self, limit: usize) {
        self.subtree.set_text_limit(limit);
    }

    fn get_size_estimate(&self) -> usize {
        if self.filter_type == FilterType::Regex {
            return usize::MAX;
        }
        let sub = self.subtree.get_size_estimate();
        if self.rhs.starts_with('?') {
            match self.filter_type {
                FilterType::Eq => sub / 1000,
                FilterType::Ne => sub / 4,
                _ => sub / 2,
            }
        } else {
            match self.filter_type {
                FilterType::Eq => sub / 1000,
                FilterType::Ne => sub,
                _ => sub / 50,
            }
        }
    }

    fn get_cost_estimate(&self) -> usize {
        if self.filter_type == FilterType::Regex {
            return usize::MAX;
        }
        self.get_size_estimate()
            .saturating_add(self.subtree.get_size_estimate())
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
        format!(
            "{pad}FILTER {}\n{pad} with {}{}{}",
            self.subtree.as_string(indent),
            self.lhs,
            self.op_symbol(),
            self.rhs
        )
    }

    fn get_descriptor(&self) -> String {
        format!("FILTER {}{}{}", self.lhs, self.op_symbol(), self.rhs)
    }

    fn get_children(&self) -> Vec<Arc<QueryExecutionTree>> {
        vec![Arc::clone(&self.subtree)]
    }

    fn compute_result(&self) -> Result<ResultData> {
        debug!(descriptor = %self.get_descriptor(), "filter computation");
        let sub_result = self.subtree.get_result()?;
        let sub = sub_result.data().ok_or(EngineError::Aborted)?;
        let lhs_col = self.subtree.variable_column(&self.lhs)?;
        let lhs_type = sub.result_type(lhs_col);

        let mut out = IdTable::new(sub.cols());
        if self.rhs.starts_with('?') {
            let rhs_col = self.subtree.variable_column(&self.rhs)?;
            self.compute_dynamic(sub, lhs_col, rhs_col, lhs_type, &mut out)?;
        } else {
            self.compute_fixed(sub, lhs_col, lhs_type, &mut out)?;
        }
        let data = ResultData::with_local_vocab(
            out,
            sub.result_types.clone(),
            self.result_sorted_on(),
            Arc::clone(&sub.local_vocab),
        );
        debug!(rows = data.size(), "filter computation done");
        Ok(data)
    }
}
