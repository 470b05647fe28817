//! Capture draft: the files and patient info gathered before submission.

use crate::models::{FilePayload, PatientInfo};

/// User input waiting to be analyzed. Survives a failed analysis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureDraft {
    files: Vec<FilePayload>,
    patient_info: PatientInfo,
}

impl CaptureDraft {
    pub fn files(&self) -> &[FilePayload] {
        &self.files
    }

    pub fn patient_info(&self) -> &PatientInfo {
        &self.patient_info
    }

    /// Ready to submit: at least one file captured.
    pub fn is_ready(&self) -> bool {
        !self.files.is_empty()
    }

    pub(crate) fn add_files(&mut self, files: impl IntoIterator<Item = FilePayload>) {
        self.files.extend(files);
    }

    pub(crate) fn remove_file(&mut self, index: usize) -> Option<FilePayload> {
        (index < self.files.len()).then(|| self.files.remove(index))
    }

    pub(crate) fn set_patient_info(&mut self, info: PatientInfo) {
        self.patient_info = info.normalized();
    }

    pub(crate) fn clear(&mut self) {
        self.files.clear();
        self.patient_info = PatientInfo::default();
    }
}
