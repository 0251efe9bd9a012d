//! The shared result of one operator: an id table plus its column typing,
//! sort order and local vocabulary, behind a producer/consumer gate.
//!
//! A `ResultTable` starts in `InProgress`. Exactly one producer computes
//! the payload and either [`publish`](ResultTable::publish)es it (state
//! `Finished`) or [`abort`](ResultTable::abort)s (state `Aborted`, no
//! payload). Consumers block in [`await_finished`](ResultTable::await_finished)
//! until the state leaves `InProgress`; both terminal states are absorbing.
//! After `Finished` the payload is immutable and read without locking.

use crate::id_table::IdTable;
use hexic_core::{Id, ResultType};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::OnceLock;

/// Lifecycle state of a [`ResultTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    InProgress,
    Finished,
    Aborted,
}

/// The immutable payload of a finished result.
#[derive(Debug)]
pub struct ResultData {
    /// The row data.
    pub table: IdTable,
    /// Per-column interpretation, parallel to the table's columns.
    pub result_types: Vec<ResultType>,
    /// Column indices the rows are sorted by, primary key first. Empty if
    /// unsorted.
    pub sorted_by: Vec<usize>,
    /// Strings synthesized during evaluation, indexed by id. Shared with
    /// subresults; append-only while producing, read-only afterwards.
    pub local_vocab: Arc<Vec<String>>,
}

impl ResultData {
    /// Payload with an empty local vocabulary.
    pub fn new(table: IdTable, result_types: Vec<ResultType>, sorted_by: Vec<usize>) -> Self {
        Self {
            table,
            result_types,
            sorted_by,
            local_vocab: Arc::new(Vec::new()),
        }
    }

    /// Payload sharing a subresult's local vocabulary.
    pub fn with_local_vocab(
        table: IdTable,
        result_types: Vec<ResultType>,
        sorted_by: Vec<usize>,
        local_vocab: Arc<Vec<String>>,
    ) -> Self {
        Self {
            table,
            result_types,
            sorted_by,
            local_vocab,
        }
    }

    /// Number of rows.
    #[inline]
    pub fn size(&self) -> usize {
        self.table.rows()
    }

    /// Number of columns.
    #[inline]
    pub fn cols(&self) -> usize {
        self.table.cols()
    }

    /// The type of column `col`; columns without a recorded type read as KB.
    pub fn result_type(&self, col: usize) -> ResultType {
        self.result_types.get(col).copied().unwrap_or(ResultType::Kb)
    }

    /// Resolve an id against the local vocabulary. Ids past the vocabulary
    /// (including `ID_NO_VALUE`) have no string.
    pub fn id_to_optional_string(&self, id: Id) -> Option<&str> {
        self.local_vocab.get(id as usize).map(String::as_str)
    }
}

/// Shared handle for one operator's result.
///
/// Not `Clone`: the table is shared through `Arc` and never copied or
/// moved once handed out.
#[derive(Debug)]
pub struct ResultTable {
    status: Mutex<Status>,
    cond: Condvar,
    data: OnceLock<ResultData>,
}

impl ResultTable {
    /// A fresh table in `InProgress`.
    pub fn new() -> Self {
        Self {
            status: Mutex::new(Status::InProgress),
            cond: Condvar::new(),
            data: OnceLock::new(),
        }
    }

    /// Current state without blocking.
    pub fn status(&self) -> Status {
        *self.status.lock()
    }

    /// Publish the payload and transition to `Finished`, waking all
    /// waiters. May only be called once, by the producer.
    pub fn publish(&self, data: ResultData) {
        let mut status = self.status.lock();
        debug_assert_eq!(*status, Status::InProgress, "publish on a terminal result");
        self.data
            .set(data)
            .expect("result payload published twice");
        *status = Status::Finished;
        self.cond.notify_all();
    }

    /// Transition to `Aborted`, waking all waiters. The payload stays
    /// empty; waiters surface a cancellation error. Idempotent on an
    /// already-aborted table.
    pub fn abort(&self) {
        let mut status = self.status.lock();
        if *status == Status::InProgress {
            *status = Status::Aborted;
            self.cond.notify_all();
        }
    }

    /// Block until the table leaves `InProgress`; returns the terminal
    /// state.
    pub fn await_finished(&self) -> Status {
        let mut status = self.status.lock();
        self.cond
            .wait_while(&mut status, |s| *s == Status::InProgress);
        *status
    }

    /// The payload, present exactly when the state is `Finished`.
    pub fn data(&self) -> Option<&ResultData> {
        self.data.get()
    }

    /// Row count of the payload; zero while unpublished.
    pub fn size(&self) -> usize {
        self.data.get().map_or(0, ResultData::size)
    }
}

impl Default for ResultTable {
    fn default() -> Self {
        Self::new()
    }
}
