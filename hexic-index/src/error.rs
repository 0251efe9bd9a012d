//! Error types for index file access.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("permutation {0} was not loaded")]
    MissingPermutation(&'static str),

    #[error(transparent)]
    Table(#[from] hexic_table::TableError),
}

pub type Result<T> = std::result::Result<T, IndexError>;
