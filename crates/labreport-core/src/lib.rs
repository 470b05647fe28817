//! Lab Report Core Library
//!
//! Record lifecycle and comparison workflow for AI-interpreted lab reports.
//!
//! # Architecture
//!
//! ```text
//! File Capture → Analysis Engine → Summary Extractor → Record Store
//!                                                          │
//!                                              History (state machine)
//!                                                          │
//!                                             select two records
//!                                                          │
//!                                       Analysis Engine (comparison mode)
//!                                                          │
//!                                         ComparisonResult (not persisted)
//! ```
//!
//! # Core Principle
//!
//! **Records are immutable.** The store only creates and deletes whole
//! records; there is no update path.
//!
//! # Modules
//!
//! - [`models`]: Domain types (FilePayload, PatientInfo, AnalysisRecord, ComparisonSelection)
//! - [`summary`]: Summary extraction from analysis text
//! - [`db`]: SQLite database layer
//! - [`store`]: Asynchronous Record Store trait and backends
//! - [`history`]: Loaded history with display ordering and search
//! - [`engine`]: Analysis Engine interface
//! - [`capture`]: Reading report files into payloads
//! - [`app`]: Application state machine
//! - [`config`], [`logging`]: Host configuration and tracing setup
//! - [`testing`]: Scripted collaborators and store conformance checks

pub mod app;
pub mod capture;
pub mod config;
pub mod db;
pub mod engine;
pub mod history;
pub mod logging;
pub mod models;
pub mod store;
pub mod summary;
pub mod testing;

// Re-export commonly used types
pub use app::{AppError, AppResult, CaptureDraft, Destination, LabReportApp, SubmitOutcome, View};
pub use capture::{CaptureBatch, CaptureFault, FileCapture};
pub use config::CoreConfig;
pub use db::Database;
pub use engine::{AnalysisEngine, AnalysisFault, AnalysisResult};
pub use history::History;
pub use models::{
    AnalysisRecord, ComparisonResult, ComparisonSelection, FilePayload, PatientInfo,
    RecordError, RecordParts, SelectionChange,
};
pub use store::{MemoryRecordStore, RecordStore, SqliteRecordStore, StorageFault, StoreResult};
pub use summary::{extract_summary, FALLBACK_SUMMARY};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum LabReportError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Duplicate record: {0}")]
    DuplicateRecord(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<db::DbError> for LabReportError {
    fn from(e: db::DbError) -> Self {
        match e {
            db::DbError::Duplicate(id) => LabReportError::DuplicateRecord(id),
            other => LabReportError::DatabaseError(other.to_string()),
        }
    }
}

impl From<RecordError> for LabReportError {
    fn from(e: RecordError) -> Self {
        LabReportError::InvalidInput(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for LabReportError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        LabReportError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a record database at the given path.
#[uniffi::export]
pub fn open_record_database(path: String) -> Result<Arc<LabReportCore>, LabReportError> {
    let db = Database::open(&path)?;
    Ok(Arc::new(LabReportCore {
        db: Arc::new(Mutex::new(db)),
    }))
}

/// Create an in-memory record database (for testing).
#[uniffi::export]
pub fn open_record_database_in_memory() -> Result<Arc<LabReportCore>, LabReportError> {
    let db = Database::open_in_memory()?;
    Ok(Arc::new(LabReportCore {
        db: Arc::new(Mutex::new(db)),
    }))
}

/// Derive the list title for an analysis text.
#[uniffi::export]
pub fn summarize_analysis(analysis_text: String) -> String {
    extract_summary(&analysis_text)
}

/// Install the default tracing subscriber. Returns `false` if one was
/// already installed.
#[uniffi::export]
pub fn init_logging() -> bool {
    logging::init_tracing(logging::DEFAULT_LOG_FILTER)
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe record database for hosts that run the analysis themselves.
#[derive(uniffi::Object)]
pub struct LabReportCore {
    db: Arc<Mutex<Database>>,
}

#[uniffi::export]
impl LabReportCore {
    /// Build a record from a finished analysis and save it.
    pub fn record_analysis(
        &self,
        files: Vec<FfiFilePayload>,
        patient_info: Option<FfiPatientInfo>,
        analysis_result: String,
    ) -> Result<FfiAnalysisRecord, LabReportError> {
        let files = files.into_iter().map(Into::into).collect();
        let record =
            AnalysisRecord::create(files, patient_info.map(Into::into), analysis_result)?;
        let db = self.db.lock()?;
        db.insert_record(&record)?;
        Ok(record.into())
    }

    /// Get a record by ID.
    pub fn get_record(&self, id: String) -> Result<Option<FfiAnalysisRecord>, LabReportError> {
        let db = self.db.lock()?;
        let record = db.get_record(&id)?;
        Ok(record.map(|r| r.into()))
    }

    /// All records in insertion order.
    pub fn list_records(&self) -> Result<Vec<FfiAnalysisRecord>, LabReportError> {
        let db = self.db.lock()?;
        let records = db.list_records()?;
        Ok(records.into_iter().map(|r| r.into()).collect())
    }

    /// Search summaries and analysis text, newest first.
    pub fn search_records(
        &self,
        query: String,
        limit: u32,
    ) -> Result<Vec<FfiAnalysisRecord>, LabReportError> {
        let db = self.db.lock()?;
        let records = db.search_records(&query, limit as usize)?;
        Ok(records.into_iter().map(|r| r.into()).collect())
    }

    /// Delete a record. Returns whether it existed.
    pub fn delete_record(&self, id: String) -> Result<bool, LabReportError> {
        let db = self.db.lock()?;
        Ok(db.delete_record(&id)?)
    }

    /// Number of stored records.
    pub fn record_count(&self) -> Result<u64, LabReportError> {
        let db = self.db.lock()?;
        Ok(db.count_records()? as u64)
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe file payload.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiFilePayload {
    pub name: String,
    pub mime_type: String,
    pub data: String,
}

impl From<FfiFilePayload> for FilePayload {
    fn from(file: FfiFilePayload) -> Self {
        FilePayload::new(file.name, file.mime_type, file.data)
    }
}

impl From<FilePayload> for FfiFilePayload {
    fn from(file: FilePayload) -> Self {
        Self {
            name: file.name,
            mime_type: file.mime_type,
            data: file.data,
        }
    }
}

/// FFI-safe patient info.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientInfo {
    pub name: Option<String>,
    pub age: Option<String>,
    pub gender: Option<String>,
    pub diagnosis: Option<String>,
}

impl From<FfiPatientInfo> for PatientInfo {
    fn from(info: FfiPatientInfo) -> Self {
        PatientInfo::new(info.name, info.age, info.gender, info.diagnosis)
    }
}

impl From<PatientInfo> for FfiPatientInfo {
    fn from(info: PatientInfo) -> Self {
        Self {
            name: info.name,
            age: info.age,
            gender: info.gender,
            diagnosis: info.diagnosis,
        }
    }
}

/// FFI-safe analysis record.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAnalysisRecord {
    pub id: String,
    pub timestamp: i64,
    pub files: Vec<FfiFilePayload>,
    pub patient_info: Option<FfiPatientInfo>,
    pub analysis_result: String,
    pub summary: String,
}

impl From<AnalysisRecord> for FfiAnalysisRecord {
    fn from(record: AnalysisRecord) -> Self {
        let parts = record.into_parts();
        Self {
            id: parts.id,
            timestamp: parts.timestamp,
            files: parts.files.into_iter().map(Into::into).collect(),
            patient_info: parts.patient_info.map(Into::into),
            analysis_result: parts.analysis_result,
            summary: parts.summary,
        }
    }
}
