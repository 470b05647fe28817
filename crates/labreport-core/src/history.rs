//! History aggregate: the loaded view of the Record Store.
//!
//! Only the state machine refreshes it, and only from the store. Views read
//! it but never edit a copy of their own.

use crate::models::AnalysisRecord;

/// Records loaded from the store, in store (insertion) order.
#[derive(Debug, Clone, Default)]
pub struct History {
    records: Vec<AnalysisRecord>,
}

impl History {
    pub fn new(records: Vec<AnalysisRecord>) -> Self {
        Self { records }
    }

    /// Replace the contents with a fresh listing from the store.
    pub(crate) fn replace(&mut self, records: Vec<AnalysisRecord>) {
        self.records = records;
    }

    pub fn records(&self) -> &[AnalysisRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&AnalysisRecord> {
        self.records.iter().find(|r| r.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Records sorted for display, newest first.
    pub fn newest_first(&self) -> Vec<AnalysisRecord> {
        let mut records = self.records.clone();
        records.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
        records
    }

    /// Records matching a search term, newest first. A blank term matches all.
    pub fn search(&self, term: &str) -> Vec<AnalysisRecord> {
        self.newest_first()
            .into_iter()
            .filter(|r| r.matches(term))
            .collect()
    }
}
