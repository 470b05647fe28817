//! Test doubles and conformance checks for the core's collaborators.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::engine::{AnalysisEngine, AnalysisFault, AnalysisResult};
use crate::models::{AnalysisRecord, FilePayload, PatientInfo};
use crate::store::{RecordStore, StorageFault, StoreResult};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A call received by [`ScriptedEngine`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Analyze {
        file_names: Vec<String>,
        patient_info: Option<PatientInfo>,
    },
    Compare {
        older_id: String,
        newer_id: String,
    },
}

/// Analysis engine that replays queued outcomes.
///
/// An empty queue yields [`AnalysisFault::Failed`]. When built with
/// [`ScriptedEngine::held`], each call waits for [`ScriptedEngine::release`]
/// before answering, which keeps a call in flight for as long as a test needs.
#[derive(Default)]
pub struct ScriptedEngine {
    analyses: Mutex<VecDeque<AnalysisResult<String>>>,
    comparisons: Mutex<VecDeque<AnalysisResult<String>>>,
    calls: Mutex<Vec<EngineCall>>,
    gate: Option<Semaphore>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine whose calls block until released.
    pub fn held() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    pub fn push_analysis(&self, outcome: AnalysisResult<String>) {
        lock(&self.analyses).push_back(outcome);
    }

    pub fn push_comparison(&self, outcome: AnalysisResult<String>) {
        lock(&self.comparisons).push_back(outcome);
    }

    /// Let one held call proceed.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        lock(&self.calls).clone()
    }

    async fn wait_for_release(&self) {
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
    }
}

fn unscripted(kind: &str) -> AnalysisFault {
    AnalysisFault::Failed(format!("no scripted {} response", kind))
}

#[async_trait]
impl AnalysisEngine for ScriptedEngine {
    async fn analyze(
        &self,
        files: &[FilePayload],
        patient_info: Option<&PatientInfo>,
    ) -> AnalysisResult<String> {
        lock(&self.calls).push(EngineCall::Analyze {
            file_names: files.iter().map(|f| f.name.clone()).collect(),
            patient_info: patient_info.cloned(),
        });
        self.wait_for_release().await;
        let next = lock(&self.analyses).pop_front();
        next.unwrap_or_else(|| Err(unscripted("analysis")))
    }

    async fn compare(
        &self,
        older: &AnalysisRecord,
        newer: &AnalysisRecord,
    ) -> AnalysisResult<String> {
        lock(&self.calls).push(EngineCall::Compare {
            older_id: older.id().to_string(),
            newer_id: newer.id().to_string(),
        });
        self.wait_for_release().await;
        let next = lock(&self.comparisons).pop_front();
        next.unwrap_or_else(|| Err(unscripted("comparison")))
    }
}

/// Record store wrapper that can be told to fail.
///
/// When built with [`FlakyStore::holding_deletes`], each delete waits for
/// [`FlakyStore::release_delete`] before reaching the inner store.
pub struct FlakyStore {
    inner: Arc<dyn RecordStore>,
    save_fault: Mutex<Option<StorageFault>>,
    fail_lists: AtomicBool,
    delete_gate: Option<Semaphore>,
}

impl FlakyStore {
    pub fn new(inner: Arc<dyn RecordStore>) -> Self {
        Self {
            inner,
            save_fault: Mutex::new(None),
            fail_lists: AtomicBool::new(false),
            delete_gate: None,
        }
    }

    /// A store whose deletes block until released.
    pub fn holding_deletes(inner: Arc<dyn RecordStore>) -> Self {
        Self {
            delete_gate: Some(Semaphore::new(0)),
            ..Self::new(inner)
        }
    }

    /// Fail saves with a backend fault.
    pub fn fail_saves(&self, fail: bool) {
        let fault = fail.then(|| StorageFault::Backend("quota exceeded".into()));
        *lock(&self.save_fault) = fault;
    }

    /// Fail saves with the given fault.
    pub fn fail_saves_with(&self, fault: StorageFault) {
        *lock(&self.save_fault) = Some(fault);
    }

    pub fn fail_lists(&self, fail: bool) {
        self.fail_lists.store(fail, Ordering::SeqCst);
    }

    /// Let one held delete proceed.
    pub fn release_delete(&self) {
        if let Some(gate) = &self.delete_gate {
            gate.add_permits(1);
        }
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn save(&self, record: &AnalysisRecord) -> StoreResult<()> {
        let fault = lock(&self.save_fault).clone();
        if let Some(fault) = fault {
            return Err(fault);
        }
        self.inner.save(record).await
    }

    async fn list_all(&self) -> StoreResult<Vec<AnalysisRecord>> {
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(StorageFault::Backend("storage unavailable".into()));
        }
        self.inner.list_all().await
    }

    async fn delete_by_id(&self, id: &str) -> StoreResult<()> {
        if let Some(gate) = &self.delete_gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        self.inner.delete_by_id(id).await
    }
}

fn sample_record(label: &str) -> AnalysisRecord {
    let files = vec![
        FilePayload::from_bytes(format!("{}-1.jpg", label), "image/jpeg", b"jpeg-1"),
        FilePayload::from_bytes(format!("{}-2.pdf", label), "application/pdf", b"%PDF-1.4"),
    ];
    let text = format!("### 1. 基本信息摘要\n*   **检测项目**: {}\n", label);
    match AnalysisRecord::create(files, Some(PatientInfo::named("张三")), text) {
        Ok(record) => record,
        Err(e) => unreachable!("sample record has files: {}", e),
    }
}

/// Run the record store conformance suite against an empty store.
///
/// # Errors
///
/// Returns the first storage fault raised by the backend. Behavioural
/// mismatches panic with a descriptive assertion.
pub async fn run_store_conformance_tests(store: &dyn RecordStore) -> StoreResult<()> {
    assert!(store.list_all().await?.is_empty(), "store must start empty");

    // Round trip keeps every field
    let first = sample_record("血常规");
    store.save(&first).await?;
    let listed = store.list_all().await?;
    assert_eq!(listed, vec![first.clone()], "saved record must be listed unchanged");

    // Duplicate ids are rejected without overwriting
    let err = store.save(&first).await.expect_err("duplicate save must fail");
    assert_eq!(err, StorageFault::DuplicateId(first.id().to_string()));
    assert_eq!(store.list_all().await?.len(), 1);

    // Insertion order
    let second = sample_record("肝功能");
    let third = sample_record("尿常规");
    store.save(&second).await?;
    store.save(&third).await?;
    let ids: Vec<String> = store
        .list_all()
        .await?
        .iter()
        .map(|r| r.id().to_string())
        .collect();
    assert_eq!(
        ids,
        vec![first.id(), second.id(), third.id()],
        "list_all must return insertion order"
    );

    // Idempotent delete
    store.delete_by_id(second.id()).await?;
    let after_one = store.list_all().await?;
    store.delete_by_id(second.id()).await?;
    let after_two = store.list_all().await?;
    assert_eq!(after_one, after_two, "second delete must not change contents");
    assert!(after_two.iter().all(|r| r.id() != second.id()));
    assert_eq!(after_two.len(), 2);

    store.delete_by_id("never-existed").await?;
    assert_eq!(store.list_all().await?.len(), 2);

    Ok(())
}
