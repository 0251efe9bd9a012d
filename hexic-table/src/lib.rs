//! Columnar tables of ids and the producer/consumer result handle.
//!
//! [`IdTableStatic`] is a dense row-major matrix of [`Id`]s whose column
//! count is either a compile-time constant (`COLS > 0`) or carried at
//! runtime (`COLS == 0`, aliased as [`IdTable`]). Both variants share one
//! interface, and a table can move between them without copying its data.
//!
//! [`ResultTable`] wraps a finished [`IdTable`] with per-column result
//! types, sort keys and a local vocabulary, and coordinates the single
//! producer with any number of blocked consumers.
//!
//! [`Id`]: hexic_core::Id

pub mod error;
pub mod id_table;
pub mod result_table;

pub use error::{Result, TableError};
pub use id_table::{IdTable, IdTableStatic, IdTableView};
pub use result_table::{ResultData, ResultTable, Status};
