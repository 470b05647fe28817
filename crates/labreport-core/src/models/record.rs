//! Analysis records and the file payloads they own.

use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::patient::PatientInfo;
use crate::summary::extract_summary;

/// Record construction errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("analysis record {0} has no files")]
    NoFiles(String),
}

/// One uploaded lab report, captured in memory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FilePayload {
    /// Original file name
    pub name: String,
    /// MIME type (e.g. "image/jpeg", "application/pdf")
    pub mime_type: String,
    /// Self-describing encoded content: `data:<mime>;base64,<body>`
    pub data: String,
}

impl FilePayload {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Encode raw bytes as a data URI payload.
    pub fn from_bytes(name: impl Into<String>, mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        let mime_type = mime_type.into();
        let body = base64::engine::general_purpose::STANDARD.encode(bytes);
        let data = format!("data:{};base64,{}", mime_type, body);
        Self {
            name: name.into(),
            mime_type,
            data,
        }
    }

    /// The base64 body without the `data:...;base64,` prefix.
    ///
    /// Payloads that carry no prefix are returned as-is.
    pub fn base64_body(&self) -> &str {
        match self.data.split_once(',') {
            Some((prefix, body)) if prefix.starts_with("data:") => body,
            _ => &self.data,
        }
    }

    /// Decode the payload back into bytes.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        base64::engine::general_purpose::STANDARD.decode(self.base64_body())
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn is_pdf(&self) -> bool {
        self.mime_type == "application/pdf"
    }
}

/// Field-by-field description of a record, used to restore persisted records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordParts {
    pub id: String,
    pub timestamp: i64,
    pub files: Vec<FilePayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_info: Option<PatientInfo>,
    pub analysis_result: String,
    pub summary: String,
}

/// The persisted result of one interpretation of one batch of files.
///
/// Immutable once built: fields are only readable, and the only way to obtain
/// a record is [`AnalysisRecord::create`] or [`AnalysisRecord::restore`], both
/// of which reject a record without files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "RecordParts", into = "RecordParts")]
pub struct AnalysisRecord {
    id: String,
    timestamp: i64,
    files: Vec<FilePayload>,
    patient_info: Option<PatientInfo>,
    analysis_result: String,
    summary: String,
}

impl AnalysisRecord {
    /// Create a new record from a finished analysis.
    ///
    /// Generates a fresh id, stamps the current time and derives the summary
    /// once from the analysis text.
    pub fn create(
        files: Vec<FilePayload>,
        patient_info: Option<PatientInfo>,
        analysis_result: String,
    ) -> Result<Self, RecordError> {
        let id = uuid::Uuid::new_v4().to_string();
        if files.is_empty() {
            return Err(RecordError::NoFiles(id));
        }
        let summary = extract_summary(&analysis_result);
        Ok(Self {
            id,
            timestamp: Utc::now().timestamp_millis(),
            files,
            patient_info: patient_info.and_then(PatientInfo::into_non_empty),
            analysis_result,
            summary,
        })
    }

    /// Rebuild a record from stored parts. The stored summary is kept as-is.
    pub fn restore(parts: RecordParts) -> Result<Self, RecordError> {
        if parts.files.is_empty() {
            return Err(RecordError::NoFiles(parts.id));
        }
        Ok(Self {
            id: parts.id,
            timestamp: parts.timestamp,
            files: parts.files,
            patient_info: parts.patient_info,
            analysis_result: parts.analysis_result,
            summary: parts.summary,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Creation time in epoch milliseconds.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }

    pub fn files(&self) -> &[FilePayload] {
        &self.files
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn patient_info(&self) -> Option<&PatientInfo> {
        self.patient_info.as_ref()
    }

    pub fn analysis_result(&self) -> &str {
        &self.analysis_result
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Case-insensitive substring match on summary or analysis text.
    ///
    /// A blank term matches every record.
    pub fn matches(&self, term: &str) -> bool {
        let term = term.trim();
        if term.is_empty() {
            return true;
        }
        let needle = term.to_lowercase();
        self.summary.to_lowercase().contains(&needle)
            || self.analysis_result.to_lowercase().contains(&needle)
    }

    pub fn into_parts(self) -> RecordParts {
        RecordParts {
            id: self.id,
            timestamp: self.timestamp,
            files: self.files,
            patient_info: self.patient_info,
            analysis_result: self.analysis_result,
            summary: self.summary,
        }
    }
}

impl TryFrom<RecordParts> for AnalysisRecord {
    type Error = RecordError;

    fn try_from(parts: RecordParts) -> Result<Self, Self::Error> {
        Self::restore(parts)
    }
}

impl From<AnalysisRecord> for RecordParts {
    fn from(record: AnalysisRecord) -> Self {
        record.into_parts()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::FALLBACK_SUMMARY;

    fn payload(name: &str) -> FilePayload {
        FilePayload::from_bytes(name, "image/png", b"\x89PNG fake")
    }

    #[test]
    fn test_create_record() {
        let record = AnalysisRecord::create(
            vec![payload("a.png"), payload("b.png")],
            Some(PatientInfo::named("张三")),
            "**检测项目**: 肝功能\n其余内容".into(),
        )
        .unwrap();

        assert_eq!(record.id().len(), 36); // UUID format
        assert_eq!(record.summary(), "肝功能");
        assert_eq!(record.file_count(), 2);
        assert_eq!(record.patient_info().unwrap().name.as_deref(), Some("张三"));
        assert!(record.created_at().is_some());
    }

    #[test]
    fn test_create_rejects_empty_files() {
        let result = AnalysisRecord::create(vec![], None, "text".into());
        assert!(matches!(result, Err(RecordError::NoFiles(_))));
    }

    #[test]
    fn test_blank_patient_info_is_dropped() {
        let record =
            AnalysisRecord::create(vec![payload("a.png")], Some(PatientInfo::default()), String::new())
                .unwrap();
        assert!(record.patient_info().is_none());
        assert_eq!(record.summary(), FALLBACK_SUMMARY);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = AnalysisRecord::create(vec![payload("a.png")], None, "x".into()).unwrap();
        let b = AnalysisRecord::create(vec![payload("a.png")], None, "x".into()).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_restore_keeps_stored_summary() {
        let parts = RecordParts {
            id: "rec-1".into(),
            timestamp: 1_700_000_000_000,
            files: vec![payload("a.png")],
            patient_info: None,
            analysis_result: "**检测项目**: 血常规".into(),
            summary: "旧标题".into(),
        };
        let record = AnalysisRecord::restore(parts).unwrap();
        assert_eq!(record.summary(), "旧标题");
    }

    #[test]
    fn test_deserialize_rejects_empty_files() {
        let json = r#"{"id":"x","timestamp":1,"files":[],"analysisResult":"","summary":""}"#;
        assert!(serde_json::from_str::<AnalysisRecord>(json).is_err());
    }

    #[test]
    fn test_payload_body_and_decode() {
        let file = FilePayload::from_bytes("r.pdf", "application/pdf", b"%PDF-1.4");
        assert!(file.data.starts_with("data:application/pdf;base64,"));
        assert_eq!(file.base64_body(), "JVBERi0xLjQ=");
        assert_eq!(file.decode().unwrap(), b"%PDF-1.4");
        assert!(file.is_pdf());
        assert!(!file.is_image());

        let bare = FilePayload::new("r.png", "image/png", "aGk=");
        assert_eq!(bare.base64_body(), "aGk=");
    }

    #[test]
    fn test_matches_is_case_insensitive() {
        let record =
            AnalysisRecord::create(vec![payload("a.png")], None, "**检测项目**: HbA1c 糖化".into())
                .unwrap();
        assert!(record.matches("hba1c"));
        assert!(record.matches("糖化"));
        assert!(record.matches("   "));
        assert!(!record.matches("尿常规"));
    }
}
