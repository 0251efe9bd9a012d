//! The read-side facade the engine talks to: loaded permutations plus the
//! vocabulary.
//!
//! Scan keys are strings; the facade resolves them through the vocabulary
//! and an unresolvable key yields an empty scan rather than an error (a
//! word that is not in the vocabulary matches nothing). PSO and POS are
//! always loaded; the other four permutations are a load-time choice.

use crate::error::{IndexError, Result};
use crate::permutation::{MetaMode, Permutation};
use crate::vocab::Vocabulary;
use hexic_core::Id;
use hexic_table::IdTable;
use std::path::Path;
use std::sync::Arc;

/// One of the six triple orderings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermutationKind {
    Pso,
    Pos,
    Spo,
    Sop,
    Osp,
    Ops,
}

impl PermutationKind {
    /// Canonical upper-case name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Pso => "PSO",
            Self::Pos => "POS",
            Self::Spo => "SPO",
            Self::Sop => "SOP",
            Self::Osp => "OSP",
            Self::Ops => "OPS",
        }
    }

    /// File name of the permutation within an index directory.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Pso => "pso.index",
            Self::Pos => "pos.index",
            Self::Spo => "spo.index",
            Self::Sop => "sop.index",
            Self::Osp => "osp.index",
            Self::Ops => "ops.index",
        }
    }
}

/// Which optional permutations to load. PSO and POS are always loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermutationSet {
    pub spo: bool,
    pub sop: bool,
    pub osp: bool,
    pub ops: bool,
}

impl PermutationSet {
    /// Only PSO and POS.
    pub fn standard() -> Self {
        Self {
            spo: false,
            sop: false,
            osp: false,
            ops: false,
        }
    }

    /// All six permutations.
    pub fn all() -> Self {
        Self {
            spo: true,
            sop: true,
            osp: true,
            ops: true,
        }
    }
}

impl Default for PermutationSet {
    fn default() -> Self {
        Self::standard()
    }
}

/// Process-wide, read-only after load.
pub struct Index {
    vocab: Arc<dyn Vocabulary>,
    pso: Permutation,
    pos: Permutation,
    spo: Option<Permutation>,
    sop: Option<Permutation>,
    osp: Option<Permutation>,
    ops: Option<Permutation>,
}

impl Index {
    /// Open the permutation files of `dir` per `set`.
    pub fn open(
        dir: &Path,
        set: PermutationSet,
        mode: MetaMode,
        vocab: Arc<dyn Vocabulary>,
    ) -> Result<Self> {
        let open = |kind: PermutationKind| Permutation::open(&dir.join(kind.file_name()), mode);
        let optional = |kind: PermutationKind, wanted: bool| -> Result<Option<Permutation>> {
            if wanted {
                Ok(Some(open(kind)?))
            } else {
                Ok(None)
            }
        };
        Ok(Self {
            vocab,
            pso: open(PermutationKind::Pso)?,
            pos: open(PermutationKind::Pos)?,
            spo: optional(PermutationKind::Spo, set.spo)?,
            sop: optional(PermutationKind::Sop, set.sop)?,
            osp: optional(PermutationKind::Osp, set.osp)?,
            ops: optional(PermutationKind::Ops, set.ops)?,
        })
    }

    /// The vocabulary.
    pub fn vocab(&self) -> &Arc<dyn Vocabulary> {
        &self.vocab
    }

    /// Exact vocabulary lookup.
    pub fn get_id(&self, word: &str) -> Option<Id> {
        self.vocab.get_id(word)
    }

    /// The word of a vocabulary id.
    pub fn id_to_optional_string(&self, id: Id) -> Option<String> {
        self.vocab.id_to_optional_string(id)
    }

    /// The loaded permutation of `kind`, or an error if it was not loaded.
    pub fn permutation(&self, kind: PermutationKind) -> Result<&Permutation> {
        let p = match kind {
            PermutationKind::Pso => Some(&self.pso),
            PermutationKind::Pos => Some(&self.pos),
            PermutationKind::Spo => self.spo.as_ref(),
            PermutationKind::Sop => self.sop.as_ref(),
            PermutationKind::Osp => self.osp.as_ref(),
            PermutationKind::Ops => self.ops.as_ref(),
        };
        p.ok_or(IndexError::MissingPermutation(kind.name()))
    }

    /// Whether `kind` was loaded.
    pub fn has_permutation(&self, kind: PermutationKind) -> bool {
        self.permutation(kind).is_ok()
    }

    // ── Scans ────────────────────────────────────────────────────────────
    //
    // One-key scans emit two columns (free primary, free secondary); two-key
    // scans emit the single remaining column. Output columns are sorted.

    pub fn scan_pso(&self, predicate: &str, out: &mut IdTable) -> Result<()> {
        self.scan_free(PermutationKind::Pso, predicate, out)
    }

    pub fn scan_pso_bound(&self, predicate: &str, subject: &str, out: &mut IdTable) -> Result<()> {
        self.scan_bound(PermutationKind::Pso, predicate, subject, out)
    }

    pub fn scan_pos(&self, predicate: &str, out: &mut IdTable) -> Result<()> {
        self.scan_free(PermutationKind::Pos, predicate, out)
    }

    pub fn scan_pos_bound(&self, predicate: &str, object: &str, out: &mut IdTable) -> Result<()> {
        self.scan_bound(PermutationKind::Pos, predicate, object, out)
    }

    pub fn scan_spo(&self, subject: &str, out: &mut IdTable) -> Result<()> {
        self.scan_free(PermutationKind::Spo, subject, out)
    }

    pub fn scan_sop(&self, subject: &str, out: &mut IdTable) -> Result<()> {
        self.scan_free(PermutationKind::Sop, subject, out)
    }

    pub fn scan_sop_bound(&self, subject: &str, object: &str, out: &mut IdTable) -> Result<()> {
        self.scan_bound(PermutationKind::Sop, subject, object, out)
    }

    pub fn scan_osp(&self, object: &str, out: &mut IdTable) -> Result<()> {
        self.scan_free(PermutationKind::Osp, object, out)
    }

    pub fn scan_ops(&self, object: &str, out: &mut IdTable) -> Result<()> {
        self.scan_free(PermutationKind::Ops, object, out)
    }

    fn scan_free(&self, kind: PermutationKind, key: &str, out: &mut IdTable) -> Result<()> {
        let perm = self.permutation(kind)?;
        let Some(rel_id) = self.vocab.get_id(key) else {
            return Ok(());
        };
        perm.scan_free(rel_id, out)
    }

    fn scan_bound(
        &self,
        kind: PermutationKind,
        key: &str,
        key2: &str,
        out: &mut IdTable,
    ) -> Result<()> {
        let perm = self.permutation(kind)?;
        let (Some(rel_id), Some(lhs)) = (self.vocab.get_id(key), self.vocab.get_id(key2)) else {
            return Ok(());
        };
        perm.scan_bound(rel_id, lhs, out)
    }

    // ── Estimates ────────────────────────────────────────────────────────

    /// Estimated number of triples matching the pattern; empty strings are
    /// wildcards. Exact for one bound element (the relation's recorded
    /// count); with several bound elements the minimum of the single-bound
    /// estimates (exact counts come from materializing the scan).
    pub fn size_estimate(&self, subject: &str, predicate: &str, object: &str) -> Result<usize> {
        let mut estimates = Vec::new();
        if !predicate.is_empty() {
            estimates.push(self.relation_size(PermutationKind::Pso, predicate)?);
        }
        if !subject.is_empty() {
            estimates.push(self.keyed_or_total(PermutationKind::Spo, PermutationKind::Sop, subject)?);
        }
        if !object.is_empty() {
            estimates.push(self.keyed_or_total(PermutationKind::Osp, PermutationKind::Ops, object)?);
        }
        match estimates.into_iter().min() {
            Some(min) => Ok(min),
            None => Ok(self.pso.nof_triples() as usize),
        }
    }

    fn relation_size(&self, kind: PermutationKind, key: &str) -> Result<usize> {
        let perm = self.permutation(kind)?;
        let Some(rel_id) = self.vocab.get_id(key) else {
            return Ok(0);
        };
        Ok(perm
            .relation_meta(rel_id)?
            .map_or(0, |rmd| rmd.nof_elements() as usize))
    }

    /// The relation size under whichever of the two permutations is
    /// loaded; with neither loaded the total triple count is the only
    /// available (pessimistic) bound.
    fn keyed_or_total(
        &self,
        first: PermutationKind,
        second: PermutationKind,
        key: &str,
    ) -> Result<usize> {
        for kind in [first, second] {
            if self.has_permutation(kind) {
                return self.relation_size(kind, key);
            }
        }
        Ok(self.pso.nof_triples() as usize)
    }

    // ── Multiplicities ───────────────────────────────────────────────────

    pub fn get_pso_multiplicities(&self, predicate: &str) -> Result<Vec<f32>> {
        self.keyed_multiplicities(PermutationKind::Pso, predicate)
    }

    pub fn get_pos_multiplicities(&self, predicate: &str) -> Result<Vec<f32>> {
        self.keyed_multiplicities(PermutationKind::Pos, predicate)
    }

    pub fn get_spo_multiplicities(&self, subject: &str) -> Result<Vec<f32>> {
        self.keyed_multiplicities(PermutationKind::Spo, subject)
    }

    pub fn get_sop_multiplicities(&self, subject: &str) -> Result<Vec<f32>> {
        self.keyed_multiplicities(PermutationKind::Sop, subject)
    }

    pub fn get_osp_multiplicities(&self, object: &str) -> Result<Vec<f32>> {
        self.keyed_multiplicities(PermutationKind::Osp, object)
    }

    pub fn get_ops_multiplicities(&self, object: &str) -> Result<Vec<f32>> {
        self.keyed_multiplicities(PermutationKind::Ops, object)
    }

    /// Estimated column multiplicities of a full dump of `kind`.
    pub fn full_scan_multiplicities(&self, kind: PermutationKind) -> Result<Vec<f32>> {
        Ok(self.permutation(kind)?.full_scan_multiplicities())
    }

    fn keyed_multiplicities(&self, kind: PermutationKind, key: &str) -> Result<Vec<f32>> {
        let perm = self.permutation(kind)?;
        let Some(rel_id) = self.vocab.get_id(key) else {
            return Ok(vec![1.0, 1.0]);
        };
        Ok(match perm.multiplicities(rel_id)? {
            Some((c1, c2)) => vec![c1, c2],
            None => vec![1.0, 1.0],
        })
    }

    /// Per-permutation statistics of everything loaded.
    pub fn statistics(&self) -> String {
        let mut s = self.pso.statistics();
        s.push_str(&self.pos.statistics());
        for perm in [&self.spo, &self.sop, &self.osp, &self.ops].into_iter().flatten() {
            s.push_str(&perm.statistics());
        }
        s
    }
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("vocab_len", &self.vocab.len())
            .field("pso_relations", &self.pso.nof_relations())
            .field("pos_relations", &self.pos.nof_relations())
            .field("spo", &self.spo.is_some())
            .field("sop", &self.sop.is_some())
            .field("osp", &self.osp.is_some())
            .field("ops", &self.ops.is_some())
            .finish()
    }
}
