//! Evaluation engine.
//!
//! Runs a batch of documents through the orchestrator with bounded
//! parallelism, grades each against its ground truth, and assembles the
//! report once every dispatched entry has finished.

use crate::config::EvaluationConfig;
use crate::error::{EvaluationError, Result};
use crate::item::{BatchEntry, EvaluationItem};
use crate::metrics::MetricsCalculator;
use crate::report::EvaluationReport;
use crate::store::{InMemoryRunStore, RunProgress, RunRecord, RunStatus, RunStore};
use crate::trends::{PerformanceTrend, RunScore};
use chrono::Utc;
use doc_classify_orchestrator::ClassificationOrchestrator;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

/// A run executing in the background.
pub struct RunHandle {
    run_id: String,
    handle: JoinHandle<Result<Arc<EvaluationReport>>>,
}

impl RunHandle {
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Wait for the run to finish and return its report.
    ///
    /// # Errors
    ///
    /// The run failed, or its store rejected the final update.
    pub async fn wait(self) -> Result<Arc<EvaluationReport>> {
        self.handle
            .await
            .map_err(|e| EvaluationError::Worker(e.to_string()))?
    }
}

/// State owned by one run's driver task.
struct Batch {
    run_id: String,
    orchestrator: Arc<ClassificationOrchestrator>,
    store: Arc<dyn RunStore>,
    max_workers: usize,
    review_threshold: f64,
    cancel: Arc<AtomicBool>,
}

impl Batch {
    /// Classify every entry, returning items in submission order and whether
    /// dispatch was cut short by cancellation.
    async fn execute(self, entries: Vec<BatchEntry>) -> (Vec<EvaluationItem>, bool) {
        let total = entries.len();
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        // Workers append; frozen once every handle has been joined.
        let items: Arc<Mutex<Vec<(usize, EvaluationItem)>>> =
            Arc::new(Mutex::new(Vec::with_capacity(total)));
        let mut handles = Vec::with_capacity(total);
        let mut cancelled = false;

        for (index, entry) in entries.iter().enumerate() {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            if self.cancel.load(Ordering::SeqCst) {
                info!(
                    "run_id={} cancelled, {} of {} entries dispatched",
                    self.run_id, index, total
                );
                cancelled = true;
                break;
            }

            let entry = entry.clone();
            let orchestrator = Arc::clone(&self.orchestrator);
            let store = Arc::clone(&self.store);
            let items = Arc::clone(&items);
            let run_id = self.run_id.clone();
            let review_threshold = self.review_threshold;

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let start = Instant::now();

                let item = match orchestrator
                    .classify_document(&entry.document, review_threshold)
                    .await
                {
                    Ok(result) => EvaluationItem::classified(&entry, &result, start.elapsed()),
                    Err(e) => {
                        warn!("run_id={} file={} failed: {}", run_id, entry.filename, e);
                        EvaluationItem::failed(&entry, &e, start.elapsed())
                    }
                };

                items.lock().await.push((index, item));
                if let Err(e) = store.record_completed_item(&run_id).await {
                    warn!("run_id={} progress update failed: {}", run_id, e);
                }
            }));
        }

        let dispatched = handles.len();
        for handle in handles {
            if let Err(e) = handle.await {
                error!("run_id={} worker aborted: {}", self.run_id, e);
            }
        }

        let mut recorded = std::mem::take(&mut *items.lock().await);
        let mut seen = vec![false; total];
        for (index, _) in &recorded {
            seen[*index] = true;
        }

        // Every entry gets exactly one row: lost workers become failures,
        // undispatched entries become cancellations.
        for (index, entry) in entries.iter().enumerate().filter(|(i, _)| !seen[*i]) {
            let item = if index < dispatched {
                if let Err(e) = self.store.record_completed_item(&self.run_id).await {
                    warn!("run_id={} progress update failed: {}", self.run_id, e);
                }
                EvaluationItem::failure(entry, "worker task aborted".to_string(), Duration::ZERO)
            } else {
                EvaluationItem::cancelled(entry)
            };
            recorded.push((index, item));
        }

        let undispatched = total - dispatched;
        if undispatched > 0 {
            if let Err(e) = self.store.record_cancelled_items(&self.run_id, undispatched).await {
                warn!("run_id={} progress update failed: {}", self.run_id, e);
            }
        }

        recorded.sort_by_key(|(index, _)| *index);
        (recorded.into_iter().map(|(_, item)| item).collect(), cancelled)
    }
}

/// Drives batch evaluations and keeps their reports.
///
/// Re-entrant: each run gets its own id, item list and report. The only
/// cross-run state is the run store and the per-run cancellation flags.
pub struct EvaluationEngine {
    orchestrator: Arc<ClassificationOrchestrator>,
    store: Arc<dyn RunStore>,
    config: EvaluationConfig,
    calculator: MetricsCalculator,
    cancellations: Arc<RwLock<HashMap<String, Arc<AtomicBool>>>>,
}

impl EvaluationEngine {
    pub fn new(orchestrator: Arc<ClassificationOrchestrator>, config: EvaluationConfig) -> Self {
        Self {
            orchestrator,
            store: Arc::new(InMemoryRunStore::new()),
            calculator: MetricsCalculator::new(config.sweep_thresholds.clone()),
            config,
            cancellations: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Use an external run store instead of the in-memory one.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn RunStore>) -> Self {
        self.store = store;
        self
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Run a batch to completion and return its report.
    ///
    /// # Errors
    ///
    /// Only if the run cannot be created or tracked; per-entry failures are
    /// recorded in the report.
    pub async fn run_batch(&self, entries: Vec<BatchEntry>) -> Result<Arc<EvaluationReport>> {
        self.start_batch(entries).await?.wait().await
    }

    /// Start a batch in the background. Poll [`Self::get_progress`] or await
    /// [`RunHandle::wait`].
    ///
    /// # Errors
    ///
    /// Invalid configuration or a store failure while registering the run.
    pub async fn start_batch(&self, entries: Vec<BatchEntry>) -> Result<RunHandle> {
        self.config.validate()?;

        let run_id = Uuid::new_v4().to_string();
        let total = entries.len();
        let created_at = Utc::now();
        self.store.create(RunRecord::started(&run_id, total)).await?;

        let cancel = Arc::new(AtomicBool::new(false));
        self.cancellations
            .write()
            .await
            .insert(run_id.clone(), Arc::clone(&cancel));

        info!(
            "=== Evaluation run_id={} started: {} entries, {} workers ===",
            run_id, total, self.config.max_workers
        );

        let batch = Batch {
            run_id: run_id.clone(),
            orchestrator: Arc::clone(&self.orchestrator),
            store: Arc::clone(&self.store),
            max_workers: self.config.max_workers,
            review_threshold: self.config.review_threshold,
            cancel,
        };
        let store = Arc::clone(&self.store);
        let calculator = self.calculator.clone();
        let cancellations = Arc::clone(&self.cancellations);
        let driver_run_id = run_id.clone();

        let handle = tokio::spawn(async move {
            let run_id = driver_run_id;
            let outcome = tokio::spawn(batch.execute(entries)).await;
            cancellations.write().await.remove(&run_id);

            match outcome {
                Ok((items, cancelled)) => {
                    let report = Arc::new(EvaluationReport::build(
                        &run_id, created_at, items, &calculator, cancelled,
                    ));
                    store.complete(&run_id, Arc::clone(&report)).await?;
                    info!(
                        "=== Evaluation run_id={} completed: accuracy={} graded={} failed={} ===",
                        run_id,
                        report
                            .overall_accuracy()
                            .map_or_else(|| "n/a".to_string(), |a| format!("{:.1}%", a * 100.0)),
                        report.summary.graded_items,
                        report.summary.failed_items
                    );
                    Ok(report)
                }
                Err(e) => {
                    error!("Evaluation run_id={} failed: {}", run_id, e);
                    store.fail(&run_id, e.to_string()).await?;
                    Err(EvaluationError::Worker(e.to_string()))
                }
            }
        });

        Ok(RunHandle { run_id, handle })
    }

    /// Build a report from predictions made elsewhere.
    ///
    /// # Errors
    ///
    /// Store failures while registering the run.
    pub async fn evaluate_predictions(&self, items: Vec<EvaluationItem>) -> Result<Arc<EvaluationReport>> {
        let run_id = Uuid::new_v4().to_string();
        let mut record = RunRecord::started(&run_id, items.len());
        record.progress.completed = items.len();
        let created_at = record.progress.created_at;
        self.store.create(record).await?;

        let report = Arc::new(EvaluationReport::build(
            &run_id,
            created_at,
            items,
            &self.calculator,
            false,
        ));
        self.store.complete(&run_id, Arc::clone(&report)).await?;
        info!("Evaluated {} precomputed predictions as run_id={}", report.summary.total_items, run_id);
        Ok(report)
    }

    /// # Errors
    ///
    /// [`EvaluationError::NotFound`] for unknown or failed runs,
    /// [`EvaluationError::NotReady`] while still processing.
    pub async fn get_report(&self, run_id: &str) -> Result<Arc<EvaluationReport>> {
        self.store.report(run_id).await
    }

    /// # Errors
    ///
    /// [`EvaluationError::NotFound`] for unknown runs.
    pub async fn get_progress(&self, run_id: &str) -> Result<RunProgress> {
        self.store.progress(run_id).await
    }

    /// # Errors
    ///
    /// Store failures.
    pub async fn list_runs(&self) -> Result<Vec<RunProgress>> {
        self.store.list().await
    }

    /// Stop dispatching new entries for a run. In-flight entries finish and
    /// are counted. Returns `false` if the run already finished.
    ///
    /// # Errors
    ///
    /// [`EvaluationError::NotFound`] for unknown runs.
    pub async fn cancel(&self, run_id: &str) -> Result<bool> {
        if let Some(flag) = self.cancellations.read().await.get(run_id) {
            flag.store(true, Ordering::SeqCst);
            info!("Cancellation requested for run_id={}", run_id);
            return Ok(true);
        }
        self.store.progress(run_id).await.map(|_| false)
    }

    /// Accuracy and macro-F1 trend over completed runs, oldest first.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn performance_trend(&self) -> Result<PerformanceTrend> {
        let mut runs: Vec<RunProgress> = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|r| r.status == RunStatus::Completed)
            .collect();
        runs.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        let mut history = Vec::with_capacity(runs.len());
        for run in runs {
            let report = self.store.report(&run.run_id).await?;
            if let Some(accuracy) = report.overall_accuracy() {
                history.push(RunScore::new(accuracy, report.evaluation.metrics.macro_avg.f1));
            }
        }
        Ok(PerformanceTrend::from_history(&history))
    }
}
