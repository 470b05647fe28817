//! Analysis Engine interface.
//!
//! The engine is an external collaborator: it turns report files into a
//! structured interpretation and produces comparison reports. Prompts, model
//! choice, transport and timeouts all live behind this trait.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{AnalysisRecord, FilePayload, PatientInfo};

/// Analysis engine failures. Never retried by the core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisFault {
    #[error("analysis engine is not configured: {0}")]
    NotConfigured(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("engine returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("analysis failed: {0}")]
    Failed(String),
}

pub type AnalysisResult<T> = Result<T, AnalysisFault>;

/// Produces interpretations and comparison reports.
#[async_trait]
pub trait AnalysisEngine: Send + Sync {
    /// Interpret a batch of report files, optionally with patient context.
    async fn analyze(
        &self,
        files: &[FilePayload],
        patient_info: Option<&PatientInfo>,
    ) -> AnalysisResult<String>;

    /// Compare two earlier interpretations. `older` predates `newer`.
    ///
    /// Implementations work from the records' analysis text; the records are
    /// passed whole so their dates can be quoted.
    async fn compare(&self, older: &AnalysisRecord, newer: &AnalysisRecord)
        -> AnalysisResult<String>;
}
