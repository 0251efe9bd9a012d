//! Core vocabulary of the Hexic engine: the `Id` type, sentinel values,
//! column result typing, and process-wide constants.
//!
//! Every intermediate result in the engine is a dense matrix of `Id`s; how
//! an id is interpreted depends on the [`ResultType`] of its column. This
//! crate holds that shared vocabulary so the table, index and engine crates
//! agree on it without depending on each other.

pub mod constants;
pub mod id;
pub mod value;

pub use id::{decode_float, encode_float, Id, ID_NO_MATCH, ID_NO_VALUE};
pub use value::{compare_ids_as, ids_equal_as, partial_compare_ids_as, ResultType};
