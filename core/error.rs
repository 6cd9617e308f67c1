use thiserror::Error;

use crate::ids::{PageId, RowId};

/// Low-level disk-manager failures. Wrapped into [`StorageError`] at the
/// buffer-pool boundary, mirroring the teacher's `CompletionError` split.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskError {
    #[error("disk is full: no free page slot available")]
    DiskFull,
    #[error("page {0} is not allocated")]
    InvalidPage(PageId),
}

/// Low-level slotted-page failures, never surfaced to a host caller as-is.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageError {
    #[error("page has no room for {needed} more bytes ({available} available)")]
    NoSpace { needed: u16, available: u16 },
    #[error("slot {0} does not exist")]
    BadSlot(u16),
    #[error("slot {0} was deleted")]
    Tombstoned(u16),
}

/// The single error type returned by every `Engine`/table-manager operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    #[error("invalid row id: {0}")]
    InvalidRowId(String),
    #[error("invalid value for column {column}: {reason}")]
    InvalidValue { column: String, reason: String },
    #[error("schema mismatch: expected {expected} values, got {got}")]
    SchemaMismatch { expected: usize, got: usize },
    #[error(transparent)]
    Disk(#[from] DiskError),
    #[error("value for column {column} exceeds max length {max_len} ({actual} bytes)")]
    Overflow {
        column: String,
        max_len: u32,
        actual: usize,
    },
    #[error("buffer pool exhausted: every frame is pinned")]
    PoolExhausted,
    #[error("unknown table: {0}")]
    UnknownTable(String),
    #[error("table already exists: {0}")]
    AlreadyExists(String),
    #[error("page {0} is not a valid data page for this operation")]
    BadPage(PageId),
    #[error("row {0} does not have a slot in its page")]
    BadSlot(RowId),
    #[error("row {0} was deleted")]
    Tombstoned(RowId),
    #[error("truncated tuple bytes")]
    Truncated,
    #[error("invalid UTF-8 in VarChar column")]
    InvalidUtf8,
    #[error("frame holding page {0} is still pinned")]
    Pinned(PageId),
    #[error("corrupt engine state: {0}")]
    Corrupt(String),
}

impl StorageError {
    /// Lifts a page-local error into a row-addressed one now that the
    /// caller knows which page it was operating on.
    pub(crate) fn from_page_error(page_id: PageId, err: PageError) -> Self {
        match err {
            PageError::NoSpace { .. } => {
                StorageError::Corrupt(format!("unexpected NoSpace on page {page_id}"))
            }
            PageError::BadSlot(slot) => StorageError::BadSlot(RowId::new(page_id, slot)),
            PageError::Tombstoned(slot) => StorageError::Tombstoned(RowId::new(page_id, slot)),
        }
    }
}
