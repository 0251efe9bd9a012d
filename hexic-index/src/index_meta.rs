//! Per-permutation metadata: the relation map and its on-disk header.
//!
//! ## File layout
//!
//! ```text
//! [ name length : u64 | name bytes
//!   nof_relations : u64
//!   offset_after  : u64                  first byte past the relation data
//!   per relation, ascending rel_id:
//!     RelationMetaData
//!     BlockBasedRelationMetaData         iff has_blocks
//!   ... concatenated relation data ...   ends at offset_after
//!   relId-to-offset table                nof_relations × (rel_id: u64, record_offset: u64)
//! ]
//! ```
//!
//! The relId→offset table is kept separate from the variable-length records
//! so a lazy reader can binary-search it with fixed-width steps and decode
//! exactly one record on demand. Two lifecycle modes exist: *preloaded*
//! (the whole relation map resident) and *lazy* (map filled one relation at
//! a time from the memory-mapped file).

use crate::error::{IndexError, Result};
use crate::meta::{BlockBasedRelationMetaData, RelationMetaData};
use hexic_core::Id;
use memmap2::Mmap;
use rustc_hash::FxHashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::debug;

/// Wire size of one relId→offset table entry.
pub const PAIR_RECORD_SIZE: u64 = 16;

#[derive(Debug)]
struct LazySource {
    mmap: Arc<Mmap>,
    /// Start of the relId→offset table (== `offset_after`).
    start_rel_id_to_offset: u64,
    /// First byte past the table (the file length).
    end_meta: u64,
}

/// The metadata of one permutation.
#[derive(Debug)]
pub struct IndexMetaData {
    name: String,
    data: FxHashMap<Id, RelationMetaData>,
    block_data: FxHashMap<Id, BlockBasedRelationMetaData>,
    offset_after: u64,
    nof_relations: u64,
    nof_triples: u64,
    preloaded: bool,
    lazy: Option<LazySource>,
}

impl IndexMetaData {
    /// Empty, preloaded metadata (the builder's starting point).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: FxHashMap::default(),
            block_data: FxHashMap::default(),
            offset_after: 0,
            nof_relations: 0,
            nof_triples: 0,
            preloaded: true,
            lazy: None,
        }
    }

    /// Register a relation. `block_meta` must be present exactly when the
    /// record's `has_blocks` flag is set.
    pub fn add(&mut self, rmd: RelationMetaData, block_meta: Option<BlockBasedRelationMetaData>) {
        debug_assert_eq!(rmd.has_blocks(), block_meta.is_some());
        let after_expected = match &block_meta {
            Some(b) => b.offset_after,
            None => rmd.start_full_index + rmd.pair_index_bytes(),
        };
        if self.data.insert(rmd.rel_id, rmd).is_none() {
            self.nof_relations += 1;
            self.nof_triples += rmd.nof_elements();
        }
        if let Some(b) = block_meta {
            self.block_data.insert(rmd.rel_id, b);
        }
        if after_expected > self.offset_after {
            self.offset_after = after_expected;
        }
    }

    /// Raise `offset_after` to at least `bound`. The writer uses this so a
    /// permutation without relations still records the end of its (empty)
    /// data section.
    pub fn bump_offset_after(&mut self, bound: u64) {
        if bound > self.offset_after {
            self.offset_after = bound;
        }
    }

    /// Parse a full metadata header (name, counts, every record) from a
    /// byte buffer starting at the header.
    pub fn create_from_byte_buffer_with_preload(buf: &[u8]) -> Result<Self> {
        let (name, nof_relations, offset_after, mut pos) = parse_header(buf)?;
        let mut meta = Self::new(name);
        for _ in 0..nof_relations {
            let rmd = RelationMetaData::read_le(&buf[pos..])?;
            pos += rmd.bytes_required();
            let block_meta = if rmd.has_blocks() {
                let b = BlockBasedRelationMetaData::read_le(&buf[pos..])?;
                pos += b.bytes_required();
                Some(b)
            } else {
                None
            };
            meta.add(rmd, block_meta);
        }
        // The header's offset_after also covers trailing padding the add()
        // accumulation cannot see.
        meta.offset_after = meta.offset_after.max(offset_after);
        Ok(meta)
    }

    /// Open in lazy mode: parse only the header and keep the mapped file
    /// for on-demand record loads via the relId→offset table.
    pub fn create_without_preload(mmap: Arc<Mmap>) -> Result<Self> {
        let (name, nof_relations, offset_after, _) = parse_header(&mmap[..])?;
        let end_meta = mmap.len() as u64;
        if offset_after > end_meta
            || (end_meta - offset_after) != nof_relations * PAIR_RECORD_SIZE
        {
            return Err(IndexError::Decode(format!(
                "relId-to-offset table of {name} has inconsistent bounds"
            )));
        }
        Ok(Self {
            name,
            data: FxHashMap::default(),
            block_data: FxHashMap::default(),
            offset_after,
            nof_relations,
            nof_triples: 0,
            preloaded: false,
            lazy: Some(LazySource {
                mmap,
                start_rel_id_to_offset: offset_after,
                end_meta,
            }),
        })
    }

    /// Whether the relation exists in this permutation. In lazy mode this
    /// may load and cache the relation's record.
    pub fn relation_exists(&mut self, rel_id: Id) -> Result<bool> {
        if self.data.contains_key(&rel_id) {
            return Ok(true);
        }
        if self.preloaded {
            return Ok(false);
        }
        self.load_and_add_relation_meta_data(rel_id)
    }

    /// The record for `rel_id`, if loaded.
    pub fn get_rmd(&self, rel_id: Id) -> Option<&RelationMetaData> {
        self.data.get(&rel_id)
    }

    /// The blockwise sub-index for `rel_id`, if loaded and block-based.
    pub fn get_block_data(&self, rel_id: Id) -> Option<&BlockBasedRelationMetaData> {
        self.block_data.get(&rel_id)
    }

    /// Binary-search the on-disk relId→offset table and, on a hit, decode
    /// and register the relation's record. Returns whether the relation
    /// was found.
    pub fn load_and_add_relation_meta_data(&mut self, rel_id: Id) -> Result<bool> {
        let Some((record_offset, bound)) = self.binary_search_pair_table(rel_id)? else {
            return Ok(false);
        };
        let lazy = self.lazy.as_ref().expect("lazy load without a source");
        let end = bound.min(lazy.mmap.len() as u64) as usize;
        let blob = &lazy.mmap[record_offset as usize..end];
        let rmd = RelationMetaData::read_le(blob)?;
        let block_meta = if rmd.has_blocks() {
            Some(BlockBasedRelationMetaData::read_le(
                &blob[rmd.bytes_required()..],
            )?)
        } else {
            None
        };
        debug!(name = %self.name, rel_id, "lazily loaded relation metadata");
        self.add(rmd, block_meta);
        Ok(true)
    }

    /// Binary search over the fixed-width pair table. Returns the matching
    /// record's offset plus an exclusive upper bound for its blob (the next
    /// entry's record offset, or the end of the mapped file for the entry
    /// with the highest record offset).
    fn binary_search_pair_table(&self, rel_id: Id) -> Result<Option<(u64, u64)>> {
        let lazy = self
            .lazy
            .as_ref()
            .ok_or_else(|| IndexError::Decode("pair-table search on preloaded metadata".into()))?;
        let n = (lazy.end_meta - lazy.start_rel_id_to_offset) / PAIR_RECORD_SIZE;
        let entry = |i: u64| -> Result<(Id, u64)> {
            let off = (lazy.start_rel_id_to_offset + i * PAIR_RECORD_SIZE) as usize;
            let id = read_u64(&lazy.mmap, off)?;
            let rec = read_u64(&lazy.mmap, off + 8)?;
            Ok((id, rec))
        };
        let (mut lo, mut hi) = (0u64, n);
        while lo < hi {
            let mid = (lo + hi) / 2;
            let (id, rec) = entry(mid)?;
            match id.cmp(&rel_id) {
                std::cmp::Ordering::Equal => {
                    let bound = if mid + 1 < n {
                        entry(mid + 1)?.1
                    } else {
                        lazy.end_meta
                    };
                    return Ok(Some((rec, bound)));
                }
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
            }
        }
        Ok(None)
    }

    /// Serialize header and records, ascending by rel_id. `meta_start` is
    /// the absolute file offset the header will be written at; the returned
    /// pair-table entries carry absolute record offsets and are ready to be
    /// appended after the relation data.
    pub fn write_to(&self, out: &mut Vec<u8>, meta_start: u64) -> Vec<(Id, u64)> {
        out.extend_from_slice(&(self.name.len() as u64).to_le_bytes());
        out.extend_from_slice(self.name.as_bytes());
        out.extend_from_slice(&(self.data.len() as u64).to_le_bytes());
        out.extend_from_slice(&self.offset_after.to_le_bytes());

        let mut rel_ids: Vec<Id> = self.data.keys().copied().collect();
        rel_ids.sort_unstable();

        let mut pair_table = Vec::with_capacity(rel_ids.len());
        for rel_id in rel_ids {
            let rmd = &self.data[&rel_id];
            pair_table.push((rel_id, meta_start + out.len() as u64));
            rmd.write_le(out);
            if rmd.has_blocks() {
                self.block_data
                    .get(&rel_id)
                    .expect("has_blocks set without block metadata")
                    .write_le(out);
            }
        }
        pair_table
    }

    /// Permutation name (e.g. "PSO").
    pub fn name(&self) -> &str {
        &self.name
    }

    /// First byte past the relation data.
    pub fn offset_after(&self) -> u64 {
        self.offset_after
    }

    /// Number of relations in the permutation.
    pub fn nof_relations(&self) -> u64 {
        self.nof_relations
    }

    /// Total pairs across loaded relations. Zero in lazy mode until
    /// relations are loaded.
    pub fn nof_triples(&self) -> u64 {
        self.nof_triples
    }

    /// Distinct values of the pivot column; equals the relation count.
    pub fn nof_distinct_c1(&self) -> u64 {
        self.nof_relations
    }

    /// Whether the whole relation map is resident.
    pub fn is_preloaded(&self) -> bool {
        self.preloaded
    }

    /// Iterate over the loaded relation records.
    pub fn relations(&self) -> impl Iterator<Item = &RelationMetaData> {
        self.data.values()
    }

    /// Number of blocks of a relation (zero when not block-based).
    pub fn nof_blocks_for_relation(&self, rel_id: Id) -> usize {
        self.block_data.get(&rel_id).map_or(0, |b| b.blocks.len())
    }

    /// Total bytes of a relation's data, including auxiliary regions.
    pub fn total_bytes_for_relation(&self, rmd: &RelationMetaData) -> u64 {
        match self.block_data.get(&rmd.rel_id) {
            Some(b) => b.offset_after - rmd.start_full_index,
            None => rmd.pair_index_bytes(),
        }
    }

    /// Human-readable per-permutation summary.
    pub fn statistics(&self) -> String {
        let mut total_bytes = 0u64;
        let mut total_blocks = 0usize;
        for rmd in self.data.values() {
            total_bytes += self.total_bytes_for_relation(rmd);
            total_blocks += self.nof_blocks_for_relation(rmd.rel_id);
        }
        let mut s = String::new();
        let _ = writeln!(s, "Statistics for permutation {}:", self.name);
        let _ = writeln!(s, "# Relations: {}", self.nof_relations);
        let _ = writeln!(s, "# Elements:  {}", self.nof_triples);
        let _ = writeln!(s, "# Blocks:    {}", total_blocks);
        let _ = writeln!(
            s,
            "Size of pair index: {} bytes",
            self.nof_triples * 2 * 8
        );
        let _ = writeln!(s, "Total size:         {} bytes", total_bytes);
        s
    }
}

fn parse_header(buf: &[u8]) -> Result<(String, u64, u64, usize)> {
    let name_len = read_u64(buf, 0)? as usize;
    let mut pos = 8;
    if buf.len() < pos + name_len {
        return Err(IndexError::Decode("metadata name truncated".to_string()));
    }
    let name = String::from_utf8(buf[pos..pos + name_len].to_vec())
        .map_err(|e| IndexError::Decode(format!("metadata name is not UTF-8: {e}")))?;
    pos += name_len;
    let nof_relations = read_u64(buf, pos)?;
    pos += 8;
    let offset_after = read_u64(buf, pos)?;
    pos += 8;
    Ok((name, nof_relations, offset_after, pos))
}

pub(crate) fn read_u64(buf: &[u8], off: usize) -> Result<u64> {
    buf.get(off..off + 8)
        .map(|b| u64::from_le_bytes(b.try_into().unwrap()))
        .ok_or_else(|| IndexError::Decode(format!("read past end of index file at {off}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::BlockMetaData;

    fn sample_meta() -> IndexMetaData {
        let mut meta = IndexMetaData::new("PSO");
        meta.add(
            RelationMetaData::new(3, 100, 4, 2.0, 1.0, false, false),
            None,
        );
        meta.add(
            RelationMetaData::new(7, 164, 1000, 16.0, 4.0, false, true),
            Some(BlockBasedRelationMetaData::new(
                40_000,
                48_000,
                vec![
                    BlockMetaData {
                        first_lhs: 1,
                        start_offset: 16_164,
                    },
                    BlockMetaData {
                        first_lhs: 500,
                        start_offset: 24_000,
                    },
                ],
            )),
        );
        meta
    }

    #[test]
    fn test_add_tracks_totals() {
        let meta = sample_meta();
        assert_eq!(meta.nof_relations(), 2);
        assert_eq!(meta.nof_triples(), 1004);
        assert_eq!(meta.nof_distinct_c1(), 2);
        // offset_after is the max over per-relation ends.
        assert_eq!(meta.offset_after(), 48_000);
    }

    #[test]
    fn test_header_round_trip_with_preload() {
        let meta = sample_meta();
        let mut buf = Vec::new();
        let pair_table = meta.write_to(&mut buf, 0);
        assert_eq!(pair_table.len(), 2);
        // Entries ascend by rel_id and point at the records.
        assert!(pair_table[0].0 < pair_table[1].0);

        let back = IndexMetaData::create_from_byte_buffer_with_preload(&buf).unwrap();
        assert_eq!(back.name(), "PSO");
        assert_eq!(back.nof_relations(), 2);
        assert_eq!(back.nof_triples(), 1004);
        assert_eq!(back.get_rmd(3), meta.get_rmd(3));
        assert_eq!(back.get_rmd(7), meta.get_rmd(7));
        assert_eq!(back.get_block_data(7), meta.get_block_data(7));
        assert!(back.get_block_data(3).is_none());
    }

    #[test]
    fn test_statistics_renders() {
        let stats = sample_meta().statistics();
        assert!(stats.contains("# Relations: 2"));
        assert!(stats.contains("# Elements:  1004"));
        assert!(stats.contains("# Blocks:    2"));
    }
}
