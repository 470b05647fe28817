//! Durable record store on SQLite.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{check_persistable, RecordStore, StorageFault, StoreResult};
use crate::db::Database;
use crate::models::AnalysisRecord;

/// [`RecordStore`] backed by a SQLite database file.
///
/// Blocking SQLite work runs on tokio's blocking pool so callers on an async
/// runtime are never stalled by disk I/O.
#[derive(Clone)]
pub struct SqliteRecordStore {
    db: Arc<Mutex<Database>>,
}

impl SqliteRecordStore {
    /// Open or create a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Ok(Self::from_database(Database::open(path)?))
    }

    /// Create an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::from_database(Database::open_in_memory()?))
    }

    pub fn from_database(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Shared handle to the underlying database.
    pub fn database(&self) -> Arc<Mutex<Database>> {
        Arc::clone(&self.db)
    }

    async fn with_db<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> StoreResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let guard = db
                .lock()
                .map_err(|e| StorageFault::Backend(format!("Lock poisoned: {}", e)))?;
            op(&guard)
        })
        .await
        .map_err(|e| StorageFault::Backend(format!("storage task failed: {}", e)))?
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn save(&self, record: &AnalysisRecord) -> StoreResult<()> {
        check_persistable(record)?;
        let record = record.clone();
        let id = record.id().to_string();
        self.with_db(move |db| Ok(db.insert_record(&record)?)).await?;
        tracing::debug!(record_id = %id, "saved analysis record");
        Ok(())
    }

    async fn list_all(&self) -> StoreResult<Vec<AnalysisRecord>> {
        self.with_db(|db| Ok(db.list_records()?)).await
    }

    async fn delete_by_id(&self, id: &str) -> StoreResult<()> {
        let id = id.to_string();
        let removed = {
            let id = id.clone();
            self.with_db(move |db| Ok(db.delete_record(&id)?)).await?
        };
        tracing::debug!(record_id = %id, removed, "deleted analysis record");
        Ok(())
    }
}
