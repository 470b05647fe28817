//! Patient metadata attached to an analysis.

use serde::{Deserialize, Serialize};

/// Optional patient details entered alongside the uploaded reports.
///
/// Absent fields are `None`, never empty strings, so prompts and summaries
/// are not polluted with blank labels.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PatientInfo {
    /// Patient name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Age as entered (free text, e.g. "35")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    /// Gender as entered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    /// Clinical diagnosis or chief complaint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
}

impl PatientInfo {
    /// Build patient info from raw form input, trimming every field and
    /// dropping the blank ones.
    pub fn new(
        name: Option<String>,
        age: Option<String>,
        gender: Option<String>,
        diagnosis: Option<String>,
    ) -> Self {
        Self {
            name: clean(name),
            age: clean(age),
            gender: clean(gender),
            diagnosis: clean(diagnosis),
        }
    }

    /// Patient info with only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(Some(name.into()), None, None, None)
    }

    /// Re-apply the blank-field rule to a value built field by field.
    pub fn normalized(self) -> Self {
        Self::new(self.name, self.age, self.gender, self.diagnosis)
    }

    /// True when no field is present.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.age.is_none() && self.gender.is_none() && self.diagnosis.is_none()
    }

    /// Normalize and collapse to `None` when nothing was entered.
    pub fn into_non_empty(self) -> Option<Self> {
        let info = self.normalized();
        if info.is_empty() {
            None
        } else {
            Some(info)
        }
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
