//! Run tracking storage.

use crate::error::{EvaluationError, Result};
use crate::report::EvaluationReport;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Processing,
    Completed,
    Failed,
}

/// Caller-visible progress of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunProgress {
    pub run_id: String,
    pub completed: usize,
    /// Entries never dispatched because the run was cancelled
    pub cancelled: usize,
    pub total: usize,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunProgress {
    /// Percentage of entries accounted for, processed or cancelled; 100 for
    /// an empty finished run.
    #[must_use]
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            if self.status == RunStatus::Processing {
                0.0
            } else {
                100.0
            }
        } else {
            (self.completed + self.cancelled) as f64 / self.total as f64 * 100.0
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunRecord {
    pub progress: RunProgress,
    pub report: Option<Arc<EvaluationReport>>,
}

impl RunRecord {
    pub fn started(run_id: impl Into<String>, total: usize) -> Self {
        Self {
            progress: RunProgress {
                run_id: run_id.into(),
                completed: 0,
                cancelled: 0,
                total,
                status: RunStatus::Processing,
                created_at: Utc::now(),
                error: None,
            },
            report: None,
        }
    }
}

/// Storage for evaluation runs.
///
/// Each run has a single writer (its driver task); writes are visible to
/// readers once the call returns.
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn create(&self, record: RunRecord) -> Result<()>;

    async fn progress(&self, run_id: &str) -> Result<RunProgress>;

    /// Count one more processed entry.
    async fn record_completed_item(&self, run_id: &str) -> Result<RunProgress>;

    /// Count entries dropped by cancellation before dispatch.
    async fn record_cancelled_items(&self, run_id: &str, count: usize) -> Result<RunProgress>;

    /// Attach the final report and mark the run completed.
    async fn complete(&self, run_id: &str, report: Arc<EvaluationReport>) -> Result<()>;

    async fn fail(&self, run_id: &str, error: String) -> Result<()>;

    async fn report(&self, run_id: &str) -> Result<Arc<EvaluationReport>>;

    /// All runs, newest first.
    async fn list(&self) -> Result<Vec<RunProgress>>;
}

/// Process-local [`RunStore`].
#[derive(Clone, Default)]
pub struct InMemoryRunStore {
    runs: Arc<RwLock<HashMap<String, RunRecord>>>,
}

impl InMemoryRunStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(run_id: &str) -> EvaluationError {
    EvaluationError::NotFound(run_id.to_string())
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn create(&self, record: RunRecord) -> Result<()> {
        let mut runs = self.runs.write().await;
        let run_id = record.progress.run_id.clone();
        if runs.contains_key(&run_id) {
            return Err(EvaluationError::Store(format!("run {run_id} already exists")));
        }
        runs.insert(run_id, record);
        Ok(())
    }

    async fn progress(&self, run_id: &str) -> Result<RunProgress> {
        self.runs
            .read()
            .await
            .get(run_id)
            .map(|r| r.progress.clone())
            .ok_or_else(|| not_found(run_id))
    }

    async fn record_completed_item(&self, run_id: &str) -> Result<RunProgress> {
        let mut runs = self.runs.write().await;
        let record = runs.get_mut(run_id).ok_or_else(|| not_found(run_id))?;
        record.progress.completed = (record.progress.completed + 1).min(record.progress.total);
        Ok(record.progress.clone())
    }

    async fn record_cancelled_items(&self, run_id: &str, count: usize) -> Result<RunProgress> {
        let mut runs = self.runs.write().await;
        let record = runs.get_mut(run_id).ok_or_else(|| not_found(run_id))?;
        let remaining = record.progress.total - record.progress.completed;
        record.progress.cancelled = (record.progress.cancelled + count).min(remaining);
        Ok(record.progress.clone())
    }

    async fn complete(&self, run_id: &str, report: Arc<EvaluationReport>) -> Result<()> {
        let mut runs = self.runs.write().await;
        let record = runs.get_mut(run_id).ok_or_else(|| not_found(run_id))?;
        record.progress.status = RunStatus::Completed;
        record.report = Some(report);
        Ok(())
    }

    async fn fail(&self, run_id: &str, error: String) -> Result<()> {
        let mut runs = self.runs.write().await;
        let record = runs.get_mut(run_id).ok_or_else(|| not_found(run_id))?;
        record.progress.status = RunStatus::Failed;
        record.progress.error = Some(error);
        Ok(())
    }

    async fn report(&self, run_id: &str) -> Result<Arc<EvaluationReport>> {
        let runs = self.runs.read().await;
        let record = runs.get(run_id).ok_or_else(|| not_found(run_id))?;
        match (&record.report, record.progress.status) {
            (Some(report), _) => Ok(Arc::clone(report)),
            (None, RunStatus::Processing) => Err(EvaluationError::NotReady(run_id.to_string())),
            (None, _) => Err(not_found(run_id)),
        }
    }

    async fn list(&self) -> Result<Vec<RunProgress>> {
        let mut runs: Vec<RunProgress> = self
            .runs
            .read()
            .await
            .values()
            .map(|r| r.progress.clone())
            .collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsCalculator;

    #[tokio::test]
    async fn test_run_lifecycle() {
        let store = InMemoryRunStore::new();
        store.create(RunRecord::started("r1", 2)).await.unwrap();

        assert!(matches!(
            store.report("r1").await,
            Err(EvaluationError::NotReady(_))
        ));

        store.record_completed_item("r1").await.unwrap();
        let progress = store.record_completed_item("r1").await.unwrap();
        assert_eq!(progress.completed, 2);
        assert_eq!(progress.percentage(), 100.0);
        assert_eq!(progress.status, RunStatus::Processing);

        let report = EvaluationReport::build("r1", Utc::now(), vec![], &MetricsCalculator::default(), false);
        store.complete("r1", Arc::new(report)).await.unwrap();

        assert_eq!(store.progress("r1").await.unwrap().status, RunStatus::Completed);
        assert_eq!(store.report("r1").await.unwrap().run_id, "r1");
    }

    #[tokio::test]
    async fn test_cancelled_entries_count_toward_percentage() {
        let store = InMemoryRunStore::new();
        store.create(RunRecord::started("r3", 5)).await.unwrap();
        store.record_completed_item("r3").await.unwrap();

        let progress = store.record_cancelled_items("r3", 4).await.unwrap();
        assert_eq!(progress.completed, 1);
        assert_eq!(progress.cancelled, 4);
        assert_eq!(progress.percentage(), 100.0);
    }

    #[tokio::test]
    async fn test_failed_run_has_no_report() {
        let store = InMemoryRunStore::new();
        store.create(RunRecord::started("r2", 1)).await.unwrap();
        store.fail("r2", "driver panicked".into()).await.unwrap();

        let progress = store.progress("r2").await.unwrap();
        assert_eq!(progress.status, RunStatus::Failed);
        assert_eq!(progress.error.as_deref(), Some("driver panicked"));
        assert!(matches!(store.report("r2").await, Err(EvaluationError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_unknown_run() {
        let store = InMemoryRunStore::new();
        assert!(matches!(
            store.progress("nope").await,
            Err(EvaluationError::NotFound(_))
        ));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&RunStatus::Completed).unwrap(),
            "\"completed\""
        );
    }
}
