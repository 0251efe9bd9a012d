//! Building permutation files.
//!
//! The writer collects `(rel_id, lhs, rhs)` pairs, then lays the file out
//! in one shot: metadata header and records first (their sizes are known
//! up front), the relation bodies, and the relId→offset table last.
//! Relations above a pair-count threshold are written block-based (pair
//! list + LHS region + RHS region); smaller relations stay plain pair
//! lists.

use crate::error::Result;
use crate::index_meta::IndexMetaData;
use crate::meta::{
    BlockBasedRelationMetaData, BlockMetaData, RelationMetaData, BLOCK_BASED_HEADER_WIRE_SIZE,
    BLOCK_META_WIRE_SIZE, RELATION_META_WIRE_SIZE,
};
use hexic_core::Id;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Default number of distinct lhs values per block.
pub const DEFAULT_BLOCK_SIZE: usize = 1 << 10;

/// Default minimum pair count for switching a relation to block-based form.
pub const DEFAULT_BLOCK_THRESHOLD: usize = 1 << 7;

/// Accumulates the pairs of one permutation and writes the file.
#[derive(Debug)]
pub struct PermutationWriter {
    name: String,
    block_size: usize,
    block_threshold: usize,
    relations: BTreeMap<Id, Vec<(Id, Id)>>,
}

impl PermutationWriter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            block_size: DEFAULT_BLOCK_SIZE,
            block_threshold: DEFAULT_BLOCK_THRESHOLD,
            relations: BTreeMap::new(),
        }
    }

    /// Override the block layout parameters (fixtures use tiny blocks to
    /// exercise boundary handling).
    pub fn with_block_params(mut self, block_size: usize, block_threshold: usize) -> Self {
        assert!(block_size > 0);
        self.block_size = block_size;
        self.block_threshold = block_threshold;
        self
    }

    /// Add one pair to a relation.
    pub fn add_pair(&mut self, rel_id: Id, lhs: Id, rhs: Id) {
        self.relations.entry(rel_id).or_default().push((lhs, rhs));
    }

    /// Serialize the whole permutation. Returns the file bytes and the
    /// metadata describing them.
    pub fn write(&self) -> Result<(Vec<u8>, IndexMetaData)> {
        let header_size = 8 + self.name.len() + 8 + 8;

        // First pass: sort and measure every relation.
        struct Layout {
            rel_id: Id,
            pairs: Vec<(Id, Id)>,
            distinct_lhs: usize,
            distinct_rhs: usize,
            block_based: bool,
        }
        let mut layouts = Vec::with_capacity(self.relations.len());
        let mut meta_size = header_size;
        for (&rel_id, pairs) in &self.relations {
            let mut pairs = pairs.clone();
            pairs.sort_unstable();
            pairs.dedup();
            let distinct_lhs = count_distinct(pairs.iter().map(|p| p.0));
            let distinct_rhs = {
                let mut rhs: Vec<Id> = pairs.iter().map(|p| p.1).collect();
                rhs.sort_unstable();
                count_distinct(rhs.into_iter())
            };
            let block_based = pairs.len() >= self.block_threshold;
            meta_size += RELATION_META_WIRE_SIZE;
            if block_based {
                let nof_blocks = distinct_lhs.div_ceil(self.block_size);
                meta_size += BLOCK_BASED_HEADER_WIRE_SIZE + nof_blocks * BLOCK_META_WIRE_SIZE;
            }
            layouts.push(Layout {
                rel_id,
                pairs,
                distinct_lhs,
                distinct_rhs,
                block_based,
            });
        }

        // Second pass: assign absolute offsets and build the metadata.
        let mut meta = IndexMetaData::new(self.name.clone());
        let mut cursor = meta_size as u64;
        for l in &layouts {
            let nof = l.pairs.len() as u64;
            let start_full_index = cursor;
            let col1_mult = (nof as f64 / l.distinct_lhs.max(1) as f64).max(1.0);
            let col2_mult = (nof as f64 / l.distinct_rhs.max(1) as f64).max(1.0);
            let functional = l.distinct_lhs == l.pairs.len();
            let rmd = RelationMetaData::new(
                l.rel_id,
                start_full_index,
                nof,
                col1_mult,
                col2_mult,
                functional,
                l.block_based,
            );
            if l.block_based {
                let lhs_start = start_full_index + nof * 16;
                let start_rhs = lhs_start + l.distinct_lhs as u64 * 16;
                let offset_after = start_rhs + nof * 8;
                let mut blocks = Vec::new();
                let mut entry_idx = 0usize;
                let mut prev_lhs = None;
                for &(lhs, _) in &l.pairs {
                    if prev_lhs == Some(lhs) {
                        continue;
                    }
                    prev_lhs = Some(lhs);
                    if entry_idx % self.block_size == 0 {
                        blocks.push(BlockMetaData {
                            first_lhs: lhs,
                            start_offset: lhs_start + entry_idx as u64 * 16,
                        });
                    }
                    entry_idx += 1;
                }
                meta.add(
                    rmd,
                    Some(BlockBasedRelationMetaData::new(
                        start_rhs,
                        offset_after,
                        blocks,
                    )),
                );
                cursor = offset_after;
            } else {
                meta.add(rmd, None);
                cursor = start_full_index + nof * 16;
            }
        }

        // Emit: header + records, bodies, relId→offset table.
        meta.bump_offset_after(cursor);
        let mut buf = Vec::with_capacity(cursor as usize);
        let pair_table = meta.write_to(&mut buf, 0);
        debug_assert_eq!(buf.len(), meta_size, "metadata layout mismatch");

        for l in &layouts {
            for &(lhs, rhs) in &l.pairs {
                buf.extend_from_slice(&lhs.to_le_bytes());
                buf.extend_from_slice(&rhs.to_le_bytes());
            }
            if l.block_based {
                // LHS region: one (lhs, rhs_offset) record per distinct lhs.
                let rhs_region_start = meta
                    .get_block_data(l.rel_id)
                    .expect("block-based relation without block metadata")
                    .start_rhs;
                let mut group_start = rhs_region_start;
                let mut prev_lhs = None;
                for &(lhs, _) in &l.pairs {
                    if prev_lhs == Some(lhs) {
                        group_start += 8;
                        continue;
                    }
                    prev_lhs = Some(lhs);
                    buf.extend_from_slice(&lhs.to_le_bytes());
                    buf.extend_from_slice(&group_start.to_le_bytes());
                    group_start += 8;
                }
                // RHS region: every group's rhs values back to back.
                for &(_, rhs) in &l.pairs {
                    buf.extend_from_slice(&rhs.to_le_bytes());
                }
            }
        }
        debug_assert_eq!(buf.len() as u64, meta.offset_after());

        for (rel_id, record_offset) in &pair_table {
            buf.extend_from_slice(&rel_id.to_le_bytes());
            buf.extend_from_slice(&record_offset.to_le_bytes());
        }

        debug!(
            name = %self.name,
            relations = meta.nof_relations(),
            triples = meta.nof_triples(),
            bytes = buf.len(),
            "wrote permutation"
        );
        Ok((buf, meta))
    }

    /// Serialize and write to `path`.
    pub fn write_to_file(&self, path: &Path) -> Result<IndexMetaData> {
        let (bytes, meta) = self.write()?;
        std::fs::write(path, bytes)?;
        Ok(meta)
    }
}

fn count_distinct(sorted: impl Iterator<Item = Id>) -> usize {
    let mut count = 0;
    let mut prev = None;
    for v in sorted {
        if prev != Some(v) {
            count += 1;
            prev = Some(v);
        }
    }
    count
}
