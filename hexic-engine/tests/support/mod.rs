//! Shared fixtures: an on-disk index built from a triple list, and a
//! fixed-table leaf operator for driving unary and binary operators.

#![allow(dead_code)]

use hexic_core::{Id, ResultType};
use hexic_engine::{ExecutionContext, Operation, OperationType, QueryExecutionTree};
use hexic_index::{
    Index, MetaMode, PermutationKind, PermutationSet, PermutationWriter, SimpleVocabulary,
};
use hexic_table::{IdTable, ResultData};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// A temp-dir backed index plus the execution context over it.
pub struct Fixture {
    _dir: tempfile::TempDir,
    pub ctx: Arc<ExecutionContext>,
    pub vocab: Arc<SimpleVocabulary>,
}

impl Fixture {
    pub fn id(&self, word: &str) -> Id {
        use hexic_index::Vocabulary;
        self.vocab.get_id(word).unwrap()
    }
}

/// Build all six permutations from `triples` (plus `extra_words` in the
/// vocabulary) and open them preloaded.
pub fn fixture(triples: &[(&str, &str, &str)], extra_words: &[&str]) -> Fixture {
    use hexic_index::Vocabulary;

    let mut words: Vec<String> = triples
        .iter()
        .flat_map(|(s, p, o)| [s.to_string(), p.to_string(), o.to_string()])
        .chain(extra_words.iter().map(|w| w.to_string()))
        .collect();
    words.sort();
    words.dedup();
    let vocab = Arc::new(SimpleVocabulary::new(words));

    let dir = tempfile::tempdir().unwrap();
    let mut writers = [
        (PermutationKind::Pso, PermutationWriter::new("PSO")),
        (PermutationKind::Pos, PermutationWriter::new("POS")),
        (PermutationKind::Spo, PermutationWriter::new("SPO")),
        (PermutationKind::Sop, PermutationWriter::new("SOP")),
        (PermutationKind::Osp, PermutationWriter::new("OSP")),
        (PermutationKind::Ops, PermutationWriter::new("OPS")),
    ];
    for (s, p, o) in triples {
        let s = vocab.get_id(s).unwrap();
        let p = vocab.get_id(p).unwrap();
        let o = vocab.get_id(o).unwrap();
        writers[0].1.add_pair(p, s, o);
        writers[1].1.add_pair(p, o, s);
        writers[2].1.add_pair(s, p, o);
        writers[3].1.add_pair(s, o, p);
        writers[4].1.add_pair(o, s, p);
        writers[5].1.add_pair(o, p, s);
    }
    for (kind, writer) in &writers {
        writer
            .write_to_file(&dir.path().join(kind.file_name()))
            .unwrap();
    }

    let index = Arc::new(
        Index::open(
            dir.path(),
            PermutationSet::all(),
            MetaMode::Preload,
            vocab.clone(),
        )
        .unwrap(),
    );
    Fixture {
        _dir: dir,
        ctx: Arc::new(ExecutionContext::new(index)),
        vocab,
    }
}

/// A leaf operator producing a preset table; used to feed operators with
/// hand-built inputs.
pub struct FixedTable {
    ctx: Arc<ExecutionContext>,
    name: String,
    table: IdTable,
    result_types: Vec<ResultType>,
    sorted_by: Vec<usize>,
    variables: FxHashMap<String, usize>,
}

impl Operation for FixedTable {
    fn context(&self) -> &Arc<ExecutionContext> {
        &self.ctx
    }

    fn get_result_width(&self) -> usize {
        self.table.cols()
    }

    fn result_sorted_on(&self) -> Vec<usize> {
        self.sorted_by.clone()
    }

    fn get_variable_columns(&self) -> FxHashMap<String, usize> {
        self.variables.clone()
    }

    fn get_size_estimate(&self) -> usize {
        self.table.rows()
    }

    fn get_cost_estimate(&self) -> usize {
        self.table.rows()
    }

    fn get_multiplicity(&self, _col: usize) -> f32 {
        1.0
    }

    fn known_empty_result(&self) -> bool {
        self.table.is_empty()
    }

    fn as_string(&self, indent: usize) -> String {
        format!(
            "{:indent$}VALUES {} ({}x{})",
            "",
            self.name,
            self.table.rows(),
            self.table.cols()
        )
    }

    fn get_descriptor(&self) -> String {
        format!("Values {}", self.name)
    }

    fn get_children(&self) -> Vec<Arc<QueryExecutionTree>> {
        Vec::new()
    }

    fn compute_result(&self) -> hexic_engine::Result<ResultData> {
        Ok(ResultData::new(
            self.table.clone(),
            self.result_types.clone(),
            self.sorted_by.clone(),
        ))
    }
}

/// Wrap a preset table in a tree node (tagged as a scan, so width-2
/// tables qualify as join masks).
pub fn values_tree(
    ctx: &Arc<ExecutionContext>,
    name: &str,
    rows: &[&[Id]],
    result_types: Vec<ResultType>,
    sorted_by: Vec<usize>,
    variables: &[(&str, usize)],
) -> Arc<QueryExecutionTree> {
    let cols = result_types.len();
    let mut table = IdTable::new(cols);
    for row in rows {
        table.push_row(row).unwrap();
    }
    let variables: FxHashMap<String, usize> = variables
        .iter()
        .map(|(v, c)| (v.to_string(), *c))
        .collect();

    let mut tree = QueryExecutionTree::new(Arc::clone(ctx));
    tree.set_variable_columns(variables.clone());
    tree.set_operation(
        OperationType::Scan,
        Arc::new(FixedTable {
            ctx: Arc::clone(ctx),
            name: name.to_string(),
            table,
            result_types,
            sorted_by,
            variables,
        }),
    );
    Arc::new(tree)
}

/// A context over an empty index, for tests that never touch it.
pub fn empty_context() -> Arc<ExecutionContext> {
    fixture(&[("<s>", "<p>", "<o>")], &[]).ctx
}
