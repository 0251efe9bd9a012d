//! Read side of one on-disk permutation.
//!
//! A permutation file pairs the metadata of [`crate::index_meta`] with the
//! relation data it describes. Relation bodies come in two shapes:
//!
//! - plain: the pair list only, `nof_elements` consecutive `(lhs, rhs)`
//!   pairs sorted by `(lhs, rhs)`;
//! - block-based: the pair list, then an LHS region of
//!   `(lhs, rhs_offset)` records (one per distinct lhs, sorted), then the
//!   RHS region holding every group's rhs ids back to back. Blocks index
//!   the LHS region so a bound scan touches one block (plus its follower
//!   when a group ends at a block boundary) instead of the whole relation.
//!
//! The file is memory-mapped; scans read straight out of the map.

use crate::error::{IndexError, Result};
use crate::index_meta::{read_u64, IndexMetaData};
use crate::meta::RelationMetaData;
use hexic_core::Id;
use hexic_table::IdTable;
use memmap2::Mmap;
use parking_lot::Mutex;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Whether to load a permutation's relation map eagerly or on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaMode {
    Preload,
    Lazy,
}

/// One memory-mapped permutation file and its metadata.
#[derive(Debug)]
pub struct Permutation {
    mmap: Arc<Mmap>,
    meta: Mutex<IndexMetaData>,
}

impl Permutation {
    /// Open a permutation file.
    pub fn open(path: &Path, mode: MetaMode) -> Result<Self> {
        let file = File::open(path)?;
        // Safety: index files are immutable after being written.
        let mmap = Arc::new(unsafe { Mmap::map(&file)? });
        let meta = match mode {
            MetaMode::Preload => IndexMetaData::create_from_byte_buffer_with_preload(&mmap[..])?,
            MetaMode::Lazy => IndexMetaData::create_without_preload(Arc::clone(&mmap))?,
        };
        debug!(name = %meta.name(), ?mode, relations = meta.nof_relations(), "opened permutation");
        Ok(Self {
            mmap,
            meta: Mutex::new(meta),
        })
    }

    /// Permutation name as recorded in the file.
    pub fn name(&self) -> String {
        self.meta.lock().name().to_string()
    }

    /// Total pairs across loaded relations.
    pub fn nof_triples(&self) -> u64 {
        self.meta.lock().nof_triples()
    }

    /// Number of relations.
    pub fn nof_relations(&self) -> u64 {
        self.meta.lock().nof_relations()
    }

    /// Human-readable summary of the loaded metadata.
    pub fn statistics(&self) -> String {
        self.meta.lock().statistics()
    }

    /// The record for `rel_id`, loading it lazily if necessary.
    pub fn relation_meta(&self, rel_id: Id) -> Result<Option<RelationMetaData>> {
        let mut meta = self.meta.lock();
        if !meta.relation_exists(rel_id)? {
            return Ok(None);
        }
        Ok(meta.get_rmd(rel_id).copied())
    }

    /// Free-scan: append every `(lhs, rhs)` pair of the relation to `out`
    /// (two columns, sorted by both).
    pub fn scan_free(&self, rel_id: Id, out: &mut IdTable) -> Result<()> {
        debug_assert_eq!(out.cols(), 2);
        let Some(rmd) = self.relation_meta(rel_id)? else {
            return Ok(());
        };
        let nof = rmd.nof_elements() as usize;
        out.reserve(out.rows() + nof)?;
        let base = rmd.start_full_index as usize;
        for i in 0..nof {
            let lhs = read_u64(&self.mmap, base + i * 16)?;
            let rhs = read_u64(&self.mmap, base + i * 16 + 8)?;
            out.push_row(&[lhs, rhs])?;
        }
        Ok(())
    }

    /// Bound scan: append the rhs ids of the group `lhs` within the
    /// relation to `out` (one column, sorted).
    pub fn scan_bound(&self, rel_id: Id, lhs: Id, out: &mut IdTable) -> Result<()> {
        debug_assert_eq!(out.cols(), 1);
        let Some(rmd) = self.relation_meta(rel_id)? else {
            return Ok(());
        };
        if !rmd.has_blocks() {
            return self.scan_bound_in_pairs(&rmd, lhs, out);
        }

        // Copy the handful of offsets we need while holding the lock.
        let (span, follow, offset_after) = {
            let meta = self.meta.lock();
            let block_meta = meta.get_block_data(rel_id).ok_or_else(|| {
                IndexError::Decode(format!("relation {rel_id} lost its block metadata"))
            })?;
            (
                block_meta.block_span_for_lhs(lhs),
                block_meta.follow_block_for_lhs(lhs),
                block_meta.offset_after,
            )
        };
        let Some((span_start, span_len)) = span else {
            // lhs precedes the first block: not present.
            return Ok(());
        };

        // Find the group's LHS record within the block.
        let mut pos = span_start as usize;
        let span_end = (span_start + span_len) as usize;
        let mut group: Option<(u64, u64)> = None;
        while pos < span_end {
            let entry_lhs = read_u64(&self.mmap, pos)?;
            if entry_lhs == lhs {
                let rhs_start = read_u64(&self.mmap, pos + 8)?;
                // The group ends at the next LHS record's rhs offset. When
                // the record is the last of its block, that next record is
                // the first of the follow block; with no follow block the
                // group runs to the end of the relation.
                let rhs_end = if pos + 16 < span_end {
                    read_u64(&self.mmap, pos + 16 + 8)?
                } else if let Some((follow_start, follow_len)) = follow {
                    debug_assert!(follow_len >= 16);
                    read_u64(&self.mmap, follow_start as usize + 8)?
                } else {
                    offset_after
                };
                group = Some((rhs_start, rhs_end));
                break;
            }
            if entry_lhs > lhs {
                break;
            }
            pos += 16;
        }
        let Some((rhs_start, rhs_end)) = group else {
            return Ok(());
        };

        let count = ((rhs_end - rhs_start) / 8) as usize;
        out.reserve(out.rows() + count)?;
        for i in 0..count {
            let rhs = read_u64(&self.mmap, rhs_start as usize + i * 8)?;
            out.push_row(&[rhs])?;
        }
        Ok(())
    }

    /// Bound scan over a plain pair list: binary search the lhs range,
    /// then emit its rhs values.
    fn scan_bound_in_pairs(&self, rmd: &RelationMetaData, lhs: Id, out: &mut IdTable) -> Result<()> {
        let nof = rmd.nof_elements() as usize;
        let base = rmd.start_full_index as usize;
        let pair_lhs = |i: usize| read_u64(&self.mmap, base + i * 16);

        // partition_point over the sorted pair list.
        let (mut lo, mut hi) = (0usize, nof);
        while lo < hi {
            let mid = (lo + hi) / 2;
            if pair_lhs(mid)? < lhs {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        let mut i = lo;
        while i < nof && pair_lhs(i)? == lhs {
            let rhs = read_u64(&self.mmap, base + i * 16 + 8)?;
            out.push_row(&[rhs])?;
            i += 1;
        }
        Ok(())
    }

    /// Multiplicities of the two free columns of a bound-free scan over
    /// this relation, decoded from the packed statistics.
    pub fn multiplicities(&self, rel_id: Id) -> Result<Option<(f32, f32)>> {
        Ok(self
            .relation_meta(rel_id)?
            .map(|rmd| (rmd.col1_multiplicity(), rmd.col2_multiplicity())))
    }

    /// Estimated multiplicities of the three columns of a full dump of
    /// this permutation, derived from the loaded metadata. Falls back to
    /// neutral estimates when the metadata is not preloaded.
    pub fn full_scan_multiplicities(&self) -> Vec<f32> {
        let meta = self.meta.lock();
        if !meta.is_preloaded() || meta.nof_relations() == 0 {
            return vec![1.0, 1.0, 1.0];
        }
        let total = meta.nof_triples() as f64;
        let distinct_c0 = meta.nof_distinct_c1() as f64;
        // Per-relation distinct counts estimated from the stored
        // multiplicities; cross-relation overlap makes this an estimate.
        let mut distinct_c1 = 0.0f64;
        let mut distinct_c2 = 0.0f64;
        for rmd in meta.relations() {
            let n = rmd.nof_elements() as f64;
            distinct_c1 += n / rmd.col1_multiplicity() as f64;
            distinct_c2 += n / rmd.col2_multiplicity() as f64;
        }
        let mult = |d: f64| if d > 0.0 { (total / d).max(1.0) as f32 } else { 1.0 };
        vec![mult(distinct_c0), mult(distinct_c1), mult(distinct_c2)]
    }

    /// Run `f` under the metadata lock (fixture and test support).
    pub fn with_meta<R>(&self, f: impl FnOnce(&mut IndexMetaData) -> R) -> R {
        f(&mut self.meta.lock())
    }
}
