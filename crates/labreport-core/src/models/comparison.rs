//! Comparison selection and results.

use serde::{Deserialize, Serialize};

use super::record::AnalysisRecord;

/// Maximum number of records that can be compared at once.
pub const MAX_SELECTION: usize = 2;

/// Outcome of toggling an id in the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionChange {
    Added,
    Removed,
    /// Selection was already full; nothing changed.
    Rejected,
}

/// Transient set of at most two record ids chosen for comparison.
///
/// Ids keep the order in which they were selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComparisonSelection {
    ids: Vec<String>,
}

impl ComparisonSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle an id.
    ///
    /// A selected id is always removed. An unselected id is added only while
    /// fewer than [`MAX_SELECTION`] ids are selected; otherwise the call is a
    /// no-op.
    pub fn toggle(&mut self, id: &str) -> SelectionChange {
        if let Some(pos) = self.ids.iter().position(|s| s == id) {
            self.ids.remove(pos);
            return SelectionChange::Removed;
        }
        if self.ids.len() >= MAX_SELECTION {
            return SelectionChange::Rejected;
        }
        self.ids.push(id.to_string());
        SelectionChange::Added
    }

    /// Drop an id if present. Returns whether it was selected.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.ids.len();
        self.ids.retain(|s| s != id);
        self.ids.len() != before
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|s| s == id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Exactly two ids are selected.
    pub fn is_complete(&self) -> bool {
        self.ids.len() == MAX_SELECTION
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

/// A comparison report between two records. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    /// The older of the two records
    pub record_a: AnalysisRecord,
    /// The newer of the two records
    pub record_b: AnalysisRecord,
    /// Report text returned by the analysis engine
    pub report_text: String,
}

impl ComparisonResult {
    /// Ids of both compared records, older first.
    pub fn record_ids(&self) -> (&str, &str) {
        (self.record_a.id(), self.record_b.id())
    }
}

/// Order two records oldest first. Equal timestamps keep the given order.
pub fn chronological(
    first: AnalysisRecord,
    second: AnalysisRecord,
) -> (AnalysisRecord, AnalysisRecord) {
    if second.timestamp() < first.timestamp() {
        (second, first)
    } else {
        (first, second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FilePayload, RecordParts};
    use proptest::prelude::*;

    fn record(id: &str, timestamp: i64) -> AnalysisRecord {
        AnalysisRecord::restore(RecordParts {
            id: id.into(),
            timestamp,
            files: vec![FilePayload::new("a.png", "image/png", "aGk=")],
            patient_info: None,
            analysis_result: String::new(),
            summary: "化验单解读".into(),
        })
        .unwrap()
    }

    #[test]
    fn test_toggle_adds_and_removes() {
        let mut sel = ComparisonSelection::new();
        assert_eq!(sel.toggle("a"), SelectionChange::Added);
        assert!(sel.contains("a"));
        assert_eq!(sel.toggle("a"), SelectionChange::Removed);
        assert!(sel.is_empty());
    }

    #[test]
    fn test_third_id_is_rejected() {
        let mut sel = ComparisonSelection::new();
        sel.toggle("a");
        sel.toggle("b");
        assert!(sel.is_complete());

        assert_eq!(sel.toggle("c"), SelectionChange::Rejected);
        assert_eq!(sel.ids(), &["a".to_string(), "b".to_string()]);

        // Deselect one, then the third fits
        assert_eq!(sel.toggle("a"), SelectionChange::Removed);
        assert_eq!(sel.toggle("c"), SelectionChange::Added);
        assert_eq!(sel.ids(), &["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_remove() {
        let mut sel = ComparisonSelection::new();
        sel.toggle("a");
        assert!(sel.remove("a"));
        assert!(!sel.remove("a"));
    }

    #[test]
    fn test_chronological_order() {
        let (a, b) = chronological(record("new", 200), record("old", 100));
        assert_eq!(a.id(), "old");
        assert_eq!(b.id(), "new");

        let (a, b) = chronological(record("x", 100), record("y", 100));
        assert_eq!(a.id(), "x");
        assert_eq!(b.id(), "y");
    }

    proptest! {
        #[test]
        fn prop_selection_never_exceeds_two(ops in prop::collection::vec(0u8..6, 0..64)) {
            let mut sel = ComparisonSelection::new();
            for op in ops {
                let id = format!("rec-{}", op);
                let before = sel.clone();
                let change = sel.toggle(&id);

                prop_assert!(sel.len() <= MAX_SELECTION);
                match change {
                    SelectionChange::Removed => prop_assert!(before.contains(&id) && !sel.contains(&id)),
                    SelectionChange::Added => prop_assert!(!before.contains(&id) && sel.contains(&id)),
                    SelectionChange::Rejected => {
                        prop_assert!(before.is_complete());
                        prop_assert_eq!(&before, &sel);
                    }
                }
            }
        }
    }
}
