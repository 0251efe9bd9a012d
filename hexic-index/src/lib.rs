//! On-disk permutation index formats and the read-side runtime.
//!
//! A triple set is materialized as up to six permutations (SPO, SOP, PSO,
//! POS, OSP, OPS), one file each. Every file carries a binary-searchable
//! metadata header describing each relation (offset, element count, packed
//! multiplicities, optional blockwise sub-index), the concatenated relation
//! data, and a sorted relId→offset table for lazy metadata loading.
//!
//! The [`Index`] facade owns the loaded permutations plus a [`Vocabulary`]
//! and exposes the scans, estimates and lookups the engine consumes.

pub mod conversions;
pub mod error;
pub mod index;
pub mod index_meta;
pub mod meta;
pub mod permutation;
pub mod vocab;
pub mod writer;

pub use error::{IndexError, Result};
pub use index::{Index, PermutationKind, PermutationSet};
pub use index_meta::IndexMetaData;
pub use meta::{BlockBasedRelationMetaData, BlockMetaData, RelationMetaData};
pub use permutation::{MetaMode, Permutation};
pub use vocab::{SimpleVocabulary, Vocabulary};
pub use writer::PermutationWriter;
