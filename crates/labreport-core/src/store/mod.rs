//! Record Store: the single source of truth for analysis history.
//!
//! Backends:
//! - [`SqliteRecordStore`]: durable, backed by [`Database`](crate::db::Database)
//! - [`MemoryRecordStore`]: process-local, for tests and previews

mod memory;
mod sqlite;

pub use memory::*;
pub use sqlite::*;

use async_trait::async_trait;
use thiserror::Error;

use crate::db::DbError;
use crate::models::AnalysisRecord;

/// Record Store failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageFault {
    /// A record with this id is already stored. Indicates a programming error.
    #[error("record {0} already exists")]
    DuplicateId(String),

    /// A record without files reached the store. Indicates a programming error.
    #[error("record {0} has no files")]
    EmptyRecord(String),

    /// Storage I/O failed (unavailable backend, corruption, quota).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageFault {
    /// Whether this fault is an invariant violation rather than an I/O failure.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::DuplicateId(_) | Self::EmptyRecord(_))
    }
}

impl From<DbError> for StorageFault {
    fn from(e: DbError) -> Self {
        match e {
            DbError::Duplicate(id) => StorageFault::DuplicateId(id),
            other => StorageFault::Backend(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StorageFault>;

/// Persistence for analysis records.
///
/// Records are only created and deleted, never updated. Implementations
/// perform no retries; callers own the retry policy.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new record. Fails with [`StorageFault::DuplicateId`] if the id
    /// is already present; an existing record is never overwritten.
    async fn save(&self, record: &AnalysisRecord) -> StoreResult<()>;

    /// Every stored record, in insertion order.
    async fn list_all(&self) -> StoreResult<Vec<AnalysisRecord>>;

    /// Remove a record. Deleting an absent id is not an error.
    async fn delete_by_id(&self, id: &str) -> StoreResult<()>;
}

/// Reject records that must never be persisted.
pub(crate) fn check_persistable(record: &AnalysisRecord) -> StoreResult<()> {
    if record.files().is_empty() {
        return Err(StorageFault::EmptyRecord(record.id().to_string()));
    }
    Ok(())
}
