//! Views of the application state machine.

use crate::models::{AnalysisRecord, ComparisonResult};
use crate::store::StorageFault;

/// Current state of the application.
#[derive(Debug, Clone, PartialEq)]
pub enum View {
    /// Choosing files and entering patient info
    Capture,
    /// A primary analysis is in flight
    Analyzing,
    /// Showing one record
    Details(AnalysisRecord),
    /// Browsing history and selecting records to compare
    History,
    /// A comparison is in flight
    Comparing,
    /// Showing a comparison report
    ComparisonResult(ComparisonResult),
}

impl View {
    /// Short name for logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            View::Capture => "capture",
            View::Analyzing => "analyzing",
            View::Details(_) => "details",
            View::History => "history",
            View::Comparing => "comparing",
            View::ComparisonResult(_) => "comparison_result",
        }
    }

    /// True while an engine call is outstanding, for either flow.
    pub fn is_analyzing(&self) -> bool {
        matches!(self, View::Analyzing | View::Comparing)
    }
}

/// Navigation targets reachable from any idle view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Capture,
    History,
}

/// Result of a successful analysis.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The record was saved and history reloaded.
    Saved(AnalysisRecord),
    /// The record was saved but history could not be reloaded, so it does
    /// not list the new record yet.
    SavedHistoryStale {
        record: AnalysisRecord,
        fault: StorageFault,
    },
    /// The analysis succeeded but saving failed. The record is still shown.
    Unsaved {
        record: AnalysisRecord,
        fault: StorageFault,
    },
}

impl SubmitOutcome {
    pub fn record(&self) -> &AnalysisRecord {
        match self {
            SubmitOutcome::Saved(record) => record,
            SubmitOutcome::SavedHistoryStale { record, .. } => record,
            SubmitOutcome::Unsaved { record, .. } => record,
        }
    }

    pub fn is_saved(&self) -> bool {
        matches!(
            self,
            SubmitOutcome::Saved(_) | SubmitOutcome::SavedHistoryStale { .. }
        )
    }
}
