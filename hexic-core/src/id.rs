//! The 64-bit id and its sentinel values.

/// A single cell of an intermediate result.
///
/// Interpretation depends on the column's [`ResultType`](crate::ResultType):
/// a vocabulary index, a verbatim unsigned integer, a packed `f32`, a text
/// index offset, or a local-vocabulary index.
pub type Id = u64;

/// Marks an unbound cell (e.g. a column one side of a UNION does not supply).
pub const ID_NO_VALUE: Id = Id::MAX;

/// Returned when an equality filter's literal has no vocabulary entry.
///
/// Distinct from [`ID_NO_VALUE`] so that `?x != <unknown>` keeps rows whose
/// cell is unbound.
pub const ID_NO_MATCH: Id = Id::MAX - 1;

/// Pack an `f32` into the low four bytes of an id. The high four bytes are
/// zero.
#[inline]
pub fn encode_float(f: f32) -> Id {
    f.to_bits() as Id
}

/// Read back an `f32` packed with [`encode_float`].
#[inline]
pub fn decode_float(id: Id) -> f32 {
    f32::from_bits(id as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_round_trip() {
        for f in [0.0f32, -0.0, 1.5, -273.15, f32::MAX, f32::MIN_POSITIVE] {
            let id = encode_float(f);
            assert_eq!(id >> 32, 0, "high four bytes must stay zero");
            assert_eq!(decode_float(id).to_bits(), f.to_bits());
        }
    }

    #[test]
    fn test_sentinels_are_distinct() {
        assert_ne!(ID_NO_VALUE, ID_NO_MATCH);
        assert!(ID_NO_MATCH < ID_NO_VALUE);
    }
}
