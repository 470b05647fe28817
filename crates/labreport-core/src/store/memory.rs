//! In-memory record store.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{check_persistable, RecordStore, StorageFault, StoreResult};
use crate::models::AnalysisRecord;

/// [`RecordStore`] that keeps records in process memory.
///
/// Not durable: contents are lost when the process exits.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<Vec<AnalysisRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with existing records, keeping their order.
    pub fn with_records(records: Vec<AnalysisRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn save(&self, record: &AnalysisRecord) -> StoreResult<()> {
        check_persistable(record)?;
        let mut records = self.records.write().await;
        if records.iter().any(|r| r.id() == record.id()) {
            return Err(StorageFault::DuplicateId(record.id().to_string()));
        }
        records.push(record.clone());
        Ok(())
    }

    async fn list_all(&self) -> StoreResult<Vec<AnalysisRecord>> {
        Ok(self.records.read().await.clone())
    }

    async fn delete_by_id(&self, id: &str) -> StoreResult<()> {
        self.records.write().await.retain(|r| r.id() != id);
        Ok(())
    }
}
