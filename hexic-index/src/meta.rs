//! Fixed-width relation metadata records.
//!
//! Each relation of a permutation (all pairs sharing one pivot id) is
//! described by a [`RelationMetaData`] record; large relations additionally
//! carry a [`BlockBasedRelationMetaData`] with a blockwise sub-index for
//! skip access. All records are little-endian fixed-width and decode from
//! plain byte buffers.
//!
//! ## Wire layouts (little-endian)
//!
//! `RelationMetaData` (24 bytes):
//!
//! ```text
//! rel_id:                    u64  [0..8]
//! start_full_index:          u64  [8..16]   file offset of the pair list
//! type_mult_and_nof_elements:u64  [16..24]  packed, see below
//! ```
//!
//! Packed field:
//!
//! ```text
//! bit 63      is_functional
//! bit 62      has_blocks
//! bits 48..56 floor(log2(col1 multiplicity)), clamped to 255
//! bits 40..48 floor(log2(col2 multiplicity)), clamped to 255
//! bits  0..40 element count
//! ```
//!
//! `BlockMetaData` (16 bytes): `first_lhs: u64 [0..8]`,
//! `start_offset: u64 [8..16]`.
//!
//! `BlockBasedRelationMetaData`: `start_rhs: u64 [0..8]`,
//! `offset_after: u64 [8..16]`, `nof_blocks: u64 [16..24]`, then the blocks.

use crate::error::{IndexError, Result};
use hexic_core::Id;

const IS_FUNCTIONAL_MASK: u64 = 1 << 63;
const HAS_BLOCKS_MASK: u64 = 1 << 62;
const COL1_LOG_MULT_MASK: u64 = 0x00FF_0000_0000_0000;
const COL2_LOG_MULT_MASK: u64 = 0x0000_FF00_0000_0000;
const NOF_ELEMENTS_MASK: u64 = 0x0000_00FF_FFFF_FFFF;

/// Wire size of a [`RelationMetaData`] record.
pub const RELATION_META_WIRE_SIZE: usize = 24;

/// Wire size of a [`BlockMetaData`] record.
pub const BLOCK_META_WIRE_SIZE: usize = 16;

/// Wire size of a [`BlockBasedRelationMetaData`] header (without blocks).
pub const BLOCK_BASED_HEADER_WIRE_SIZE: usize = 24;

/// Per-relation descriptor: where the relation's pair list starts, how many
/// pairs it has, and its packed statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelationMetaData {
    /// Pivot id of this relation.
    pub rel_id: Id,
    /// Absolute file offset of the pair list.
    pub start_full_index: u64,
    /// Packed flags, log multiplicities and element count.
    pub type_mult_and_nof_elements: u64,
}

impl RelationMetaData {
    /// Build a record from unpacked statistics. Multiplicities must be ≥ 1;
    /// their base-2 logarithms are truncated and clamped to 255.
    pub fn new(
        rel_id: Id,
        start_full_index: u64,
        nof_elements: u64,
        col1_mult: f64,
        col2_mult: f64,
        is_functional: bool,
        has_blocks: bool,
    ) -> Self {
        debug_assert!(col1_mult >= 1.0 && col2_mult >= 1.0);
        debug_assert!(nof_elements <= NOF_ELEMENTS_MASK);
        let c1 = (col1_mult.log2().min(255.0)) as u64;
        let c2 = (col2_mult.log2().min(255.0)) as u64;
        let mut packed = nof_elements & NOF_ELEMENTS_MASK;
        if is_functional {
            packed |= IS_FUNCTIONAL_MASK;
        }
        if has_blocks {
            packed |= HAS_BLOCKS_MASK;
        }
        packed |= c1 << 48;
        packed |= c2 << 40;
        Self {
            rel_id,
            start_full_index,
            type_mult_and_nof_elements: packed,
        }
    }

    /// Number of pairs in the relation.
    #[inline]
    pub fn nof_elements(&self) -> u64 {
        self.type_mult_and_nof_elements & NOF_ELEMENTS_MASK
    }

    /// Whether the first column uniquely determines the second.
    #[inline]
    pub fn is_functional(&self) -> bool {
        self.type_mult_and_nof_elements & IS_FUNCTIONAL_MASK != 0
    }

    /// Whether a blockwise sub-index follows this record.
    #[inline]
    pub fn has_blocks(&self) -> bool {
        self.type_mult_and_nof_elements & HAS_BLOCKS_MASK != 0
    }

    /// floor(log2) of the first column's multiplicity.
    #[inline]
    pub fn col1_log_multiplicity(&self) -> u8 {
        ((self.type_mult_and_nof_elements & COL1_LOG_MULT_MASK) >> 48) as u8
    }

    /// floor(log2) of the second column's multiplicity.
    #[inline]
    pub fn col2_log_multiplicity(&self) -> u8 {
        ((self.type_mult_and_nof_elements & COL2_LOG_MULT_MASK) >> 40) as u8
    }

    /// Multiplicity of the first column, recovered from its stored log.
    #[inline]
    pub fn col1_multiplicity(&self) -> f32 {
        (1u64 << self.col1_log_multiplicity().min(62)) as f32
    }

    /// Multiplicity of the second column, recovered from its stored log.
    #[inline]
    pub fn col2_multiplicity(&self) -> f32 {
        (1u64 << self.col2_log_multiplicity().min(62)) as f32
    }

    /// Byte size of the pair list.
    #[inline]
    pub fn pair_index_bytes(&self) -> u64 {
        self.nof_elements() * 2 * 8
    }

    /// File offset of the LHS region. Only meaningful for block-based
    /// relations, where the LHS region follows the pair list.
    pub fn start_of_lhs(&self) -> u64 {
        debug_assert!(self.has_blocks());
        self.start_full_index + self.pair_index_bytes()
    }

    /// Wire size of this record.
    pub fn bytes_required(&self) -> usize {
        RELATION_META_WIRE_SIZE
    }

    /// Serialize to the wire format.
    pub fn write_le(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.rel_id.to_le_bytes());
        buf.extend_from_slice(&self.start_full_index.to_le_bytes());
        buf.extend_from_slice(&self.type_mult_and_nof_elements.to_le_bytes());
    }

    /// Deserialize from the wire format.
    pub fn read_le(buf: &[u8]) -> Result<Self> {
        if buf.len() < RELATION_META_WIRE_SIZE {
            return Err(IndexError::Decode(format!(
                "relation metadata record truncated ({} bytes)",
                buf.len()
            )));
        }
        Ok(Self {
            rel_id: u64::from_le_bytes(buf[0..8].try_into().unwrap()),
            start_full_index: u64::from_le_bytes(buf[8..16].try_into().unwrap()),
            type_mult_and_nof_elements: u64::from_le_bytes(buf[16..24].try_into().unwrap()),
        })
    }
}

/// One block of a block-based relation: the first lhs id it contains and
/// the absolute file offset of its first LHS-region record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockMetaData {
    pub first_lhs: Id,
    pub start_offset: u64,
}

impl BlockMetaData {
    pub fn write_le(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.first_lhs.to_le_bytes());
        buf.extend_from_slice(&self.start_offset.to_le_bytes());
    }

    pub fn read_le(buf: &[u8]) -> Result<Self> {
        if buf.len() < BLOCK_META_WIRE_SIZE {
            return Err(IndexError::Decode("block metadata truncated".to_string()));
        }
        Ok(Self {
            first_lhs: u64::from_le_bytes(buf[0..8].try_into().unwrap()),
            start_offset: u64::from_le_bytes(buf[8..16].try_into().unwrap()),
        })
    }
}

/// Blockwise sub-index of a large relation.
///
/// Invariants: `blocks` is sorted by `first_lhs`; every block's
/// `start_offset` lies below `start_rhs`; `offset_after` (first byte past
/// the relation) is above `start_rhs`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockBasedRelationMetaData {
    /// Absolute file offset of the RHS region (end of the LHS region).
    pub start_rhs: u64,
    /// First byte past this relation's data.
    pub offset_after: u64,
    /// Blocks, sorted by `first_lhs`.
    pub blocks: Vec<BlockMetaData>,
}

impl BlockBasedRelationMetaData {
    pub fn new(start_rhs: u64, offset_after: u64, blocks: Vec<BlockMetaData>) -> Self {
        debug_assert!(blocks.windows(2).all(|w| w[0].first_lhs < w[1].first_lhs));
        Self {
            start_rhs,
            offset_after,
            blocks,
        }
    }

    /// Locate the block that can contain `lhs`: the last block whose
    /// `first_lhs <= lhs`. Returns the byte span of the block's LHS-region
    /// records as `(start_offset, length)`; the span ends at the next
    /// block's start, or at `start_rhs` for the last block. `None` when
    /// `lhs` precedes the first block (no block can contain it).
    pub fn block_span_for_lhs(&self, lhs: Id) -> Option<(u64, u64)> {
        let idx = self.candidate_block(lhs)?;
        let start = self.blocks[idx].start_offset;
        let after = match self.blocks.get(idx + 1) {
            Some(next) => next.start_offset,
            None => self.start_rhs,
        };
        Some((start, after - start))
    }

    /// The span of the block following the one `lhs` falls into, under the
    /// same rule as [`block_span_for_lhs`](Self::block_span_for_lhs). Used
    /// to read on when an lhs group straddles a block boundary. `None`
    /// when there is no candidate block or no following block.
    pub fn follow_block_for_lhs(&self, lhs: Id) -> Option<(u64, u64)> {
        let idx = self.candidate_block(lhs)?;
        let next = self.blocks.get(idx + 1)?;
        let after = match self.blocks.get(idx + 2) {
            Some(b) => b.start_offset,
            None => self.start_rhs,
        };
        Some((next.start_offset, after - next.start_offset))
    }

    /// Index of the last block with `first_lhs <= lhs`: lower bound, then
    /// one step back unless it is an exact match.
    fn candidate_block(&self, lhs: Id) -> Option<usize> {
        let lb = self.blocks.partition_point(|b| b.first_lhs < lhs);
        match self.blocks.get(lb) {
            Some(b) if b.first_lhs == lhs => Some(lb),
            _ => lb.checked_sub(1),
        }
    }

    /// Wire size of this record including its blocks.
    pub fn bytes_required(&self) -> usize {
        BLOCK_BASED_HEADER_WIRE_SIZE + self.blocks.len() * BLOCK_META_WIRE_SIZE
    }

    /// Serialize to the wire format.
    pub fn write_le(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.start_rhs.to_le_bytes());
        buf.extend_from_slice(&self.offset_after.to_le_bytes());
        buf.extend_from_slice(&(self.blocks.len() as u64).to_le_bytes());
        for block in &self.blocks {
            block.write_le(buf);
        }
    }

    /// Deserialize from the wire format.
    pub fn read_le(buf: &[u8]) -> Result<Self> {
        if buf.len() < BLOCK_BASED_HEADER_WIRE_SIZE {
            return Err(IndexError::Decode(
                "block-based relation metadata truncated".to_string(),
            ));
        }
        let start_rhs = u64::from_le_bytes(buf[0..8].try_into().unwrap());
        let offset_after = u64::from_le_bytes(buf[8..16].try_into().unwrap());
        let nof_blocks = u64::from_le_bytes(buf[16..24].try_into().unwrap()) as usize;
        let need = BLOCK_BASED_HEADER_WIRE_SIZE + nof_blocks * BLOCK_META_WIRE_SIZE;
        if buf.len() < need {
            return Err(IndexError::Decode(format!(
                "block list truncated: need {need} bytes, have {}",
                buf.len()
            )));
        }
        let mut blocks = Vec::with_capacity(nof_blocks);
        for i in 0..nof_blocks {
            let off = BLOCK_BASED_HEADER_WIRE_SIZE + i * BLOCK_META_WIRE_SIZE;
            blocks.push(BlockMetaData::read_le(&buf[off..])?);
        }
        Ok(Self {
            start_rhs,
            offset_after,
            blocks,
        })
    }
}
