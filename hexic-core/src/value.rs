//! Column result types and type-aware id comparison.

use crate::id::{decode_float, Id};
use std::cmp::Ordering;

/// Describes how the ids of a result column are to be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultType {
    /// An entry in the knowledge-base vocabulary.
    Kb,
    /// An unsigned integer stored literally.
    Verbatim,
    /// A byte offset into the text index.
    Text,
    /// An `f32` packed into the low four bytes (see [`crate::encode_float`]).
    Float,
    /// An entry in the result's local vocabulary.
    LocalVocab,
}

/// Compare two ids under a column type, with a total order.
///
/// Float columns compare by decoded value; incomparable floats (NaN) are
/// treated as equal, which keeps binary searches over sorted columns sane.
/// All other types compare by raw id.
#[inline]
pub fn compare_ids_as(ty: ResultType, a: Id, b: Id) -> Ordering {
    partial_compare_ids_as(ty, a, b).unwrap_or(Ordering::Equal)
}

/// Compare two ids under a column type. `None` only for NaN float operands,
/// so relational filters can mirror IEEE semantics (every comparison with
/// NaN is false).
#[inline]
pub fn partial_compare_ids_as(ty: ResultType, a: Id, b: Id) -> Option<Ordering> {
    match ty {
        ResultType::Float => decode_float(a).partial_cmp(&decode_float(b)),
        _ => Some(a.cmp(&b)),
    }
}

/// Equality of two ids under a column type. Float columns compare by value,
/// so `0.0 == -0.0` and `NaN != NaN`.
#[inline]
pub fn ids_equal_as(ty: ResultType, a: Id, b: Id) -> bool {
    match ty {
        ResultType::Float => decode_float(a) == decode_float(b),
        _ => a == b,
    }
}
