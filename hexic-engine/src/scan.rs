//! The leaf operator: scans of one permutation.
//!
//! Fifteen scan types parameterize which of subject/predicate/object are
//! bound. Two bound elements leave one output column, one bound element
//! leaves two (free primary, then free secondary), and the six full-index
//! types describe a whole permutation dump. The full-index types exist for
//! planner bookkeeping only and refuse to execute, as a full dump is never
//! an acceptable plan leaf.

use crate::context::ExecutionContext;
use crate::error::{EngineError, Result};
use crate::operation::Operation;
use crate::tree::QueryExecutionTree;
use hexic_core::ResultType;
use hexic_index::{conversions, PermutationKind};
use hexic_table::{IdTable, ResultData};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Which triple elements are bound, and in which permutation the free ones
/// are enumerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanType {
    PsoBoundS,
    PosBoundO,
    PsoFreeS,
    PosFreeO,
    SpoFreeP,
    SopBoundO,
    SopFreeO,
    OpsFreeP,
    OspFreeS,
    FullIndexScanSpo,
    FullIndexScanSop,
    FullIndexScanPso,
    FullIndexScanPos,
    FullIndexScanOsp,
    FullIndexScanOps,
}

impl ScanType {
    fn is_full(self) -> bool {
        matches!(
            self,
            Self::FullIndexScanSpo
                | Self::FullIndexScanSop
                | Self::FullIndexScanPso
                | Self::FullIndexScanPos
                | Self::FullIndexScanOsp
                | Self::FullIndexScanOps
        )
    }

    fn permutation(self) -> PermutationKind {
        match self {
            Self::PsoBoundS | Self::PsoFreeS | Self::FullIndexScanPso => PermutationKind::Pso,
            Self::PosBoundO | Self::PosFreeO | Self::FullIndexScanPos => PermutationKind::Pos,
            Self::SpoFreeP | Self::FullIndexScanSpo => PermutationKind::Spo,
            Self::SopBoundO | Self::SopFreeO | Self::FullIndexScanSop => PermutationKind::Sop,
            Self::OspFreeS | Self::FullIndexScanOsp => PermutationKind::Osp,
            Self::OpsFreeP | Self::FullIndexScanOps => PermutationKind::Ops,
        }
    }
}

/// Leaf operator delegating to the index facade.
pub struct IndexScan {
    context: Arc<ExecutionContext>,
    scan_type: ScanType,
    subject: String,
    predicate: String,
    object: String,
    size_estimate: OnceLock<usize>,
    multiplicity: OnceLock<Vec<f32>>,
}

impl IndexScan {
    pub fn new(context: Arc<ExecutionContext>, scan_type: ScanType) -> Self {
        Self {
            context,
            scan_type,
            subject: String::new(),
            predicate: String::new(),
            object: String::new(),
            size_estimate: OnceLock::new(),
            multiplicity: OnceLock::new(),
        }
    }

    pub fn set_subject(&mut self, subject: impl Into<String>) {
        self.subject = subject.into();
    }

    pub fn set_predicate(&mut self, predicate: impl Into<String>) {
        self.predicate = predicate.into();
    }

    /// Set the object; typed value literals are converted to their
    /// index-word form so they resolve in the vocabulary.
    pub fn set_object(&mut self, object: impl Into<String>) {
        let object = object.into();
        self.object = if conversions::is_xsd_value(&object) {
            conversions::convert_value_literal_to_index_word(&object)
        } else {
            object
        };
    }

    pub fn get_type(&self) -> ScanType {
        self.scan_type
    }

    /// Compute the size estimate eagerly (planners call this before
    /// building the tree around the scan).
    pub fn precompute_size_estimate(&self) {
        let _ = self.get_size_estimate();
    }

    fn compute_size_estimate(&self) -> usize {
        // A scan with two bound elements is cheap; materialize and report
        // the exact count.
        if self.get_result_width() == 1 {
            return match self.get_result(false) {
                Ok(table) => table.size(),
                Err(e) => {
                    warn!(error = %e, "size estimation scan failed");
                    1000 + self.subject.len() + self.predicate.len() + self.object.len()
                }
            };
        }
        let estimate = match self.scan_type {
            ScanType::SpoFreeP | ScanType::SopFreeO => {
                self.context.index().size_estimate(&self.subject, "", "")
            }
            ScanType::PsoFreeS | ScanType::PosFreeO => {
                self.context.index().size_estimate("", &self.predicate, "")
            }
            ScanType::OspFreeS | ScanType::OpsFreeP => {
                self.context.index().size_estimate("", "", &self.object)
            }
            _ => self.context.index().size_estimate("", "", ""),
        };
        match estimate {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "size estimation failed");
                1000 + self.subject.len() + self.predicate.len() + self.object.len()
            }
        }
    }

    fn determine_multiplicities(&self) -> Vec<f32> {
        if self.get_result_width() == 1 {
            return vec![1.0];
        }
        let index = self.context.index();
        let result = if self.scan_type.is_full() {
            index.full_scan_multiplicities(self.scan_type.permutation())
        } else {
            match self.scan_type {
                ScanType::PsoFreeS => index.get_pso_multiplicities(&self.predicate),
                ScanType::PosFreeO => index.get_pos_multiplicities(&self.predicate),
                ScanType::SpoFreeP => index.get_spo_multiplicities(&self.subject),
                ScanType::SopFreeO => index.get_sop_multiplicities(&self.subject),
                ScanType::OspFreeS => index.get_osp_multiplicities(&self.object),
                ScanType::OpsFreeP => index.get_ops_multiplicities(&self.object),
                _ => unreachable!("bound scans were handled above"),
            }
        };
        match result {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "multiplicity lookup failed");
                vec![1.0; self.get_result_width()]
            }
        }
    }

    fn scan_into(&self, out: &mut IdTable) -> Result<()> {
        let index = self.context.index();
        match self.scan_type {
            ScanType::PsoBoundS => index.scan_pso_bound(&self.predicate, &self.subject, out)?,
            ScanType::PosBoundO => index.scan_pos_bound(&self.predicate, &self.object, out)?,
            ScanType::SopBoundO => index.scan_sop_bound(&self.subject, &self.object, out)?,
            ScanType::PsoFreeS => index.scan_pso(&self.predicate, out)?,
            ScanType::PosFreeO => index.scan_pos(&self.predicate, out)?,
            ScanType::SpoFreeP => index.scan_spo(&self.subject, out)?,
            ScanType::SopFreeO => index.scan_sop(&self.subject, out)?,
            ScanType::OspFreeS => index.scan_osp(&self.object, out)?,
            ScanType::OpsFreeP => index.scan_ops(&self.object, out)?,
            _ => {
                return Err(EngineError::CheckFailed(
                    "asked to execute a scan for the full index".to_string(),
                ))
            }
        }
        Ok(())
    }

    /// The free elements in output-column order, with the variables among
    /// them.
    fn free_elements(&self) -> Vec<&str> {
        match self.scan_type {
            ScanType::PsoBoundS => vec![&self.object],
            ScanType::PosBoundO => vec![&self.subject],
            ScanType::SopBoundO => vec![&self.predicate],
            ScanType::PsoFreeS => vec![&self.subject, &self.object],
            ScanType::PosFreeO => vec![&self.object, &self.subject],
            ScanType::SpoFreeP => vec![&self.predicate, &self.object],
            ScanType::SopFreeO => vec![&self.object, &self.predicate],
            ScanType::OspFreeS => vec![&self.subject, &self.predicate],
            ScanType::OpsFreeP => vec![&self.predicate, &self.subject],
            ScanType::FullIndexScanSpo => vec![&self.subject, &self.predicate, &self.object],
            ScanType::FullIndexScanSop => vec![&self.subject, &self.object, &self.predicate],
            ScanType::FullIndexScanPso => vec![&self.predicate, &self.subject, &self.object],
            ScanType::FullIndexScanPos => vec![&self.predicate, &self.object, &self.subject],
            ScanType::FullIndexScanOsp => vec![&self.object, &self.subject, &self.predicate],
            ScanType::FullIndexScanOps => vec![&self.object, &self.predicate, &self.subject],
        }
    }
}

impl Operation for IndexScan {
    fn context(&self) -> &Arc<ExecutionContext> {
        &self.context
    }

    fn get_result_width(&self) -> usize {
        match self.scan_type {
            ScanType::PsoBoundS | ScanType::PosBoundO | ScanType::SopBoundO => 1,
            ScanType::PsoFreeS
            | ScanType::PosFreeO
            | ScanType::SpoFreeP
            | ScanType::SopFreeO
            | ScanType::OspFreeS
            | ScanType::OpsFreeP => 2,
            _ => 3,
        }
    }

    fn result_sorted_on(&self) -> Vec<usize> {
        (0..self.get_result_width()).collect()
    }

    fn get_variable_columns(&self) -> FxHashMap<String, usize> {
        let mut map = FxHashMap::default();
        for (col, element) in self.free_elements().into_iter().enumerate() {
            if element.starts_with('?') {
                map.insert(element.to_string(), col);
            }
        }
        map
    }

    fn set_text_limit(&self, _limit: usize) {}

    fn get_size_estimate(&self) -> usize {
        *self.size_estimate.get_or_init(|| self.compute_size_estimate())
    }

    fn get_cost_estimate(&self) -> usize {
        self.get_size_estimate()
    }

    fn get_multiplicity(&self, col: usize) -> f32 {
        let mults = self.multiplicity.get_or_init(|| self.determine_multiplicities());
        mults.get(col).copied().unwrap_or(1.0)
    }

    fn known_empty_result(&self) -> bool {
        self.get_size_estimate() == 0
    }

    fn as_string(&self, indent: usize) -> String {
        let pad = " ".repeat(indent);
        match self.scan_type {
            ScanType::PsoBoundS => format!(
                "{pad}SCAN PSO with P = \"{}\", S = \"{}\"",
                self.predicate, self.subject
            ),
            ScanType::PosBoundO => format!(
                "{pad}SCAN POS with P = \"{}\", O = \"{}\"",
                self.predicate, self.object
            ),
            ScanType::SopBoundO => format!(
                "{pad}SCAN SOP with S = \"{}\", O = \"{}\"",
                self.subject, self.object
            ),
            ScanType::PsoFreeS => format!("{pad}SCAN PSO with P = \"{}\"", self.predicate),
            ScanType::PosFreeO => format!("{pad}SCAN POS with P = \"{}\"", self.predicate),
            ScanType::SpoFreeP => format!("{pad}SCAN SPO with S = \"{}\"", self.subject),
            ScanType::SopFreeO => format!("{pad}SCAN SOP with S = \"{}\"", self.subject),
            ScanType::OpsFreeP => format!("{pad}SCAN OPS with O = \"{}\"", self.object),
            ScanType::OspFreeS => format!("{pad}SCAN OSP with O = \"{}\"", self.object),
            full => format!(
                "{pad}SCAN FOR FULL INDEX {} (DUMMY OPERATION)",
                full.permutation().name()
            ),
        }
    }

    fn get_descriptor(&self) -> String {
        format!("IndexScan {} {} {}", self.subject, self.predicate, self.object)
    }

    fn get_children(&self) -> Vec<Arc<QueryExecutionTree>> {
        Vec::new()
    }

    fn compute_result(&self) -> Result<ResultData> {
        debug!(descriptor = %self.get_descriptor(), "index scan computation");
        let width = self.get_result_width();
        let mut table = IdTable::new(width);
        self.scan_into(&mut table)?;
        let data = ResultData::new(
            table,
            vec![ResultType::Kb; width],
            self.result_sorted_on(),
        );
        debug!(rows = data.size(), "index scan computation done");
        Ok(data)
    }
}
