//! Application state machine.
//!
//! ```text
//! Capture ──submit──▶ Analyzing ──ok──▶ Details(record)
//!    ▲                    │
//!    └───────fault────────┘            (draft kept)
//!
//! History ──select──▶ Details(record)
//! History ──delete──▶ History          (Details of that record falls back)
//! History ──compare (2 selected)──▶ Comparing ──ok──▶ ComparisonResult
//!    ▲                                  │
//!    └──────────────fault───────────────┘   (selection kept)
//! ```
//!
//! Only one engine call is in flight at a time. The guard is the current
//! view: while it is `Analyzing` or `Comparing`, every state-changing request
//! is rejected with [`AppError::Busy`]. The internal mutex only protects the
//! session fields and is never held across an await.

mod draft;
mod view;

pub use draft::*;
pub use view::*;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::engine::{AnalysisEngine, AnalysisFault};
use crate::history::History;
use crate::models::{
    chronological, AnalysisRecord, ComparisonResult, ComparisonSelection, FilePayload,
    PatientInfo, RecordError, SelectionChange,
};
use crate::store::{RecordStore, StorageFault, StoreResult};

/// Errors surfaced at the state machine boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    #[error("an analysis is already in progress")]
    Busy,

    #[error("at least one file is required")]
    NoFiles,

    #[error("cannot {action} while in {from} view")]
    InvalidTransition {
        from: &'static str,
        action: &'static str,
    },

    #[error("record not found: {0}")]
    RecordNotFound(String),

    #[error("exactly two records must be selected, found {0}")]
    SelectionIncomplete(usize),

    #[error("analysis failed: {0}")]
    Analysis(AnalysisFault),

    #[error("comparison failed: {0}")]
    Comparison(AnalysisFault),

    #[error("storage failed: {0}")]
    Storage(#[from] StorageFault),

    #[error("invalid record: {0}")]
    Record(#[from] RecordError),
}

impl AppError {
    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Busy => "正在分析中，请稍候。",
            AppError::NoFiles => "请先上传化验单。",
            AppError::SelectionIncomplete(_) => "请选择两份记录进行对比。",
            AppError::RecordNotFound(_) => "记录不存在或已被删除。",
            AppError::Analysis(_) => "解读失败，请检查网络或重试。",
            AppError::Comparison(_) => "对比分析失败，请重试。",
            AppError::Storage(_) => "读写历史记录失败，请重试。",
            AppError::InvalidTransition { .. } | AppError::Record(_) => "当前无法执行该操作。",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

struct Session {
    view: View,
    draft: CaptureDraft,
    history: History,
    selection: ComparisonSelection,
    /// A store write issued outside the Analyzing view is in flight.
    write_pending: bool,
}

impl Session {
    fn is_busy(&self) -> bool {
        self.view.is_analyzing() || self.write_pending
    }

    /// Reject requests while an engine call or store write is outstanding.
    fn ensure_idle(&self) -> AppResult<()> {
        if self.is_busy() {
            Err(AppError::Busy)
        } else {
            Ok(())
        }
    }

    /// Require an idle session in one of the given views.
    fn ensure_in(&self, allowed: &[&'static str], action: &'static str) -> AppResult<()> {
        self.ensure_idle()?;
        if allowed.contains(&self.view.name()) {
            Ok(())
        } else {
            Err(AppError::InvalidTransition {
                from: self.view.name(),
                action,
            })
        }
    }

    /// Switch views. Leaving History discards the comparison selection.
    fn enter(&mut self, view: View) {
        if self.view == View::History && view != View::History {
            self.selection.clear();
        }
        tracing::debug!(from = self.view.name(), to = view.name(), "view transition");
        self.view = view;
    }
}

/// Orchestrates capture, analysis, history and comparison for one session.
pub struct LabReportApp {
    engine: Arc<dyn AnalysisEngine>,
    store: Arc<dyn RecordStore>,
    session: Mutex<Session>,
}

impl LabReportApp {
    /// Create an app in the Capture view with an empty history.
    pub fn new(engine: Arc<dyn AnalysisEngine>, store: Arc<dyn RecordStore>) -> Self {
        Self {
            engine,
            store,
            session: Mutex::new(Session {
                view: View::Capture,
                draft: CaptureDraft::default(),
                history: History::default(),
                selection: ComparisonSelection::new(),
                write_pending: false,
            }),
        }
    }

    /// Create an app and load history from the store.
    pub async fn open(
        engine: Arc<dyn AnalysisEngine>,
        store: Arc<dyn RecordStore>,
    ) -> AppResult<Self> {
        let app = Self::new(engine, store);
        app.refresh_history().await?;
        Ok(app)
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn refresh_history(&self) -> StoreResult<()> {
        let records = self.store.list_all().await?;
        tracing::debug!(count = records.len(), "history reloaded");
        self.session().history.replace(records);
        Ok(())
    }

    // =========================================================================
    // Read access
    // =========================================================================

    pub fn view(&self) -> View {
        self.session().view.clone()
    }

    pub fn is_analyzing(&self) -> bool {
        self.session().view.is_analyzing()
    }

    /// An engine call or store write is in flight; state changes are refused.
    pub fn is_busy(&self) -> bool {
        self.session().is_busy()
    }

    pub fn draft(&self) -> CaptureDraft {
        self.session().draft.clone()
    }

    pub fn history(&self) -> History {
        self.session().history.clone()
    }

    /// History for display, newest first, filtered by a search term.
    pub fn search_history(&self, term: &str) -> Vec<AnalysisRecord> {
        self.session().history.search(term)
    }

    pub fn selection(&self) -> ComparisonSelection {
        self.session().selection.clone()
    }

    /// The compare action is available: idle in History with two selected.
    pub fn can_compare(&self) -> bool {
        let session = self.session();
        session.view == View::History && !session.is_busy() && session.selection.is_complete()
    }

    /// Record shown in the Details view, if any.
    pub fn current_record(&self) -> Option<AnalysisRecord> {
        match &self.session().view {
            View::Details(record) => Some(record.clone()),
            _ => None,
        }
    }

    /// Comparison shown in the ComparisonResult view, if any.
    pub fn current_comparison(&self) -> Option<ComparisonResult> {
        match &self.session().view {
            View::ComparisonResult(result) => Some(result.clone()),
            _ => None,
        }
    }

    // =========================================================================
    // Capture
    // =========================================================================

    pub fn add_files(&self, files: Vec<FilePayload>) -> AppResult<()> {
        let mut session = self.session();
        session.ensure_idle()?;
        session.draft.add_files(files);
        Ok(())
    }

    pub fn remove_file(&self, index: usize) -> AppResult<Option<FilePayload>> {
        let mut session = self.session();
        session.ensure_idle()?;
        Ok(session.draft.remove_file(index))
    }

    pub fn set_patient_info(&self, info: PatientInfo) -> AppResult<()> {
        let mut session = self.session();
        session.ensure_idle()?;
        session.draft.set_patient_info(info);
        Ok(())
    }

    /// Analyze the capture draft and persist the result.
    ///
    /// On engine failure the view returns to Capture with the draft intact.
    /// On success the record is saved and history reloaded before the view
    /// moves to Details. A failed reload is reported as
    /// [`SubmitOutcome::SavedHistoryStale`]. If saving fails with an I/O
    /// fault the record is still shown and returned as
    /// [`SubmitOutcome::Unsaved`], keeping the draft for resubmission. A
    /// store invariant violation aborts the submit: the view returns to
    /// Capture and the fault is returned as [`AppError::Storage`].
    pub async fn submit(&self) -> AppResult<SubmitOutcome> {
        let (files, patient_info) = {
            let mut session = self.session();
            session.ensure_in(&["capture"], "submit")?;
            if !session.draft.is_ready() {
                return Err(AppError::NoFiles);
            }
            session.enter(View::Analyzing);
            (
                session.draft.files().to_vec(),
                session.draft.patient_info().clone().into_non_empty(),
            )
        };

        tracing::info!(files = files.len(), "starting analysis");
        let text = match self.engine.analyze(&files, patient_info.as_ref()).await {
            Ok(text) => text,
            Err(fault) => {
                tracing::warn!(error = %fault, "analysis failed");
                self.session().enter(View::Capture);
                return Err(AppError::Analysis(fault));
            }
        };

        let record = match AnalysisRecord::create(files, patient_info, text) {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(error = %e, "analysis produced an invalid record");
                self.session().enter(View::Capture);
                return Err(e.into());
            }
        };

        match self.store.save(&record).await {
            Ok(()) => {
                let reloaded = self.refresh_history().await;
                let mut session = self.session();
                session.draft.clear();
                session.enter(View::Details(record.clone()));
                tracing::info!(record_id = record.id(), summary = record.summary(), "analysis saved");
                match reloaded {
                    Ok(()) => Ok(SubmitOutcome::Saved(record)),
                    Err(fault) => {
                        tracing::warn!(error = %fault, "history reload failed after save");
                        Ok(SubmitOutcome::SavedHistoryStale { record, fault })
                    }
                }
            }
            Err(fault) if fault.is_invariant_violation() => {
                tracing::error!(record_id = record.id(), error = %fault, "record rejected by store");
                self.session().enter(View::Capture);
                Err(AppError::Storage(fault))
            }
            Err(fault) => {
                tracing::warn!(record_id = record.id(), error = %fault, "failed to save analysis");
                self.session().enter(View::Details(record.clone()));
                Ok(SubmitOutcome::Unsaved { record, fault })
            }
        }
    }

    // =========================================================================
    // History
    // =========================================================================

    /// Reload history from the store.
    pub async fn reload_history(&self) -> AppResult<()> {
        self.session().ensure_idle()?;
        Ok(self.refresh_history().await?)
    }

    /// Show one record from history.
    pub fn select_record(&self, id: &str) -> AppResult<AnalysisRecord> {
        let mut session = self.session();
        session.ensure_in(&["history"], "select a record")?;
        let record = session
            .history
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::RecordNotFound(id.to_string()))?;
        session.enter(View::Details(record.clone()));
        Ok(record)
    }

    /// Delete a record and reload history.
    ///
    /// The id is dropped from the comparison selection, and a Details view of
    /// the deleted record falls back to History.
    ///
    /// Other state changes are refused with [`AppError::Busy`] until the
    /// delete and the reload have finished.
    pub async fn delete_record(&self, id: &str) -> AppResult<()> {
        {
            let mut session = self.session();
            session.ensure_in(&["history", "details"], "delete a record")?;
            session.write_pending = true;
        }

        let deleted = match self.store.delete_by_id(id).await {
            Ok(()) => Ok(self.refresh_history().await),
            Err(fault) => Err(fault),
        };

        let mut session = self.session();
        session.write_pending = false;
        let reloaded = deleted?;
        session.selection.remove(id);
        let showing_deleted = matches!(&session.view, View::Details(r) if r.id() == id);
        if showing_deleted {
            session.enter(View::History);
        }
        tracing::info!(record_id = id, "record deleted");
        Ok(reloaded?)
    }

    /// Toggle a record in the comparison selection.
    ///
    /// Selected ids are always removed; a new id is only added while fewer
    /// than two are selected.
    pub fn toggle_selection(&self, id: &str) -> AppResult<SelectionChange> {
        let mut session = self.session();
        session.ensure_in(&["history"], "change the selection")?;
        if !session.selection.contains(id) && !session.history.contains(id) {
            return Err(AppError::RecordNotFound(id.to_string()));
        }
        Ok(session.selection.toggle(id))
    }

    /// Compare the two selected records.
    ///
    /// On success the selection is cleared and the view shows the result.
    /// On failure the view returns to History with the selection intact.
    pub async fn compare(&self) -> AppResult<ComparisonResult> {
        let (first, second) = {
            let mut session = self.session();
            session.ensure_in(&["history"], "compare")?;
            let (first_id, second_id) = match session.selection.ids() {
                [a, b] => (a.clone(), b.clone()),
                ids => return Err(AppError::SelectionIncomplete(ids.len())),
            };
            let lookup = |id: &str| {
                session
                    .history
                    .get(id)
                    .cloned()
                    .ok_or_else(|| AppError::RecordNotFound(id.to_string()))
            };
            let first = lookup(&first_id)?;
            let second = lookup(&second_id)?;
            // Stay in History's scope: the selection must survive a failure.
            session.view = View::Comparing;
            (first, second)
        };

        let (older, newer) = chronological(first, second);
        tracing::info!(older = older.id(), newer = newer.id(), "starting comparison");

        match self.engine.compare(&older, &newer).await {
            Ok(report_text) => {
                let result = ComparisonResult {
                    record_a: older,
                    record_b: newer,
                    report_text,
                };
                let mut session = self.session();
                session.selection.clear();
                session.enter(View::ComparisonResult(result.clone()));
                Ok(result)
            }
            Err(fault) => {
                tracing::warn!(error = %fault, "comparison failed");
                self.session().view = View::History;
                Err(AppError::Comparison(fault))
            }
        }
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Navigate to Capture or History from any idle view.
    ///
    /// Details and ComparisonResult payloads are discarded on exit.
    pub fn navigate(&self, destination: Destination) -> AppResult<View> {
        let mut session = self.session();
        session.ensure_idle()?;
        let target = match destination {
            Destination::Capture => View::Capture,
            Destination::History => View::History,
        };
        if session.view != target {
            session.enter(target);
        }
        Ok(session.view.clone())
    }
}
