//! Per-document task tracking.
//!
//! State machine: `queued -> processing -> {completed | failed}`. Terminal
//! states have no outgoing transitions. Stores enforce the machine on every
//! update, so a record can never move backwards.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use doc_classify_common::ClassificationResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    #[must_use]
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Queued, TaskStatus::Processing)
                | (TaskStatus::Processing, TaskStatus::Completed | TaskStatus::Failed)
        )
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaskStoreError {
    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Task already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid task transition {} -> {}", .from.name(), .to.name())]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
}

pub type TaskResult<T> = std::result::Result<T, TaskStoreError>;

/// Tracking record for one submitted document.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub filename: String,
    pub status: TaskStatus,
    /// Human-readable progress message
    pub progress: String,
    /// Set once the task completes
    pub result: Option<ClassificationResult>,
    /// Set once the task fails
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    /// New `queued` record with a random id.
    pub fn queued(filename: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            task_id: Uuid::new_v4().to_string(),
            filename: filename.into(),
            status: TaskStatus::Queued,
            progress: "Queued for processing".to_string(),
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A state transition plus the data that comes with it.
#[derive(Debug, Clone)]
pub struct TaskUpdate {
    pub status: TaskStatus,
    pub progress: String,
    pub result: Option<ClassificationResult>,
    pub error: Option<String>,
}

impl TaskUpdate {
    pub fn status(status: TaskStatus, progress: impl Into<String>) -> Self {
        Self {
            status,
            progress: progress.into(),
            result: None,
            error: None,
        }
    }

    #[must_use]
    pub fn with_result(mut self, result: ClassificationResult) -> Self {
        self.result = Some(result);
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Storage for task records.
///
/// One writer per task id (the worker running it); updates are visible to
/// readers as soon as `update` returns.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create(&self, record: TaskRecord) -> TaskResult<()>;

    async fn get(&self, task_id: &str) -> TaskResult<TaskRecord>;

    /// Apply a transition, rejecting any the state machine forbids.
    async fn update(&self, task_id: &str, update: TaskUpdate) -> TaskResult<TaskRecord>;

    /// All tasks, newest first.
    async fn list(&self) -> TaskResult<Vec<TaskRecord>>;
}

/// Process-local [`TaskStore`].
#[derive(Clone, Default)]
pub struct InMemoryTaskStore {
    tasks: Arc<RwLock<HashMap<String, TaskRecord>>>,
}

impl InMemoryTaskStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(&self, record: TaskRecord) -> TaskResult<()> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&record.task_id) {
            return Err(TaskStoreError::AlreadyExists(record.task_id));
        }
        tasks.insert(record.task_id.clone(), record);
        Ok(())
    }

    async fn get(&self, task_id: &str) -> TaskResult<TaskRecord> {
        self.tasks
            .read()
            .await
            .get(task_id)
            .cloned()
            .ok_or_else(|| TaskStoreError::NotFound(task_id.to_string()))
    }

    async fn update(&self, task_id: &str, update: TaskUpdate) -> TaskResult<TaskRecord> {
        let mut tasks = self.tasks.write().await;
        let record = tasks
            .get_mut(task_id)
            .ok_or_else(|| TaskStoreError::NotFound(task_id.to_string()))?;

        if !record.status.can_transition_to(update.status) {
            return Err(TaskStoreError::InvalidTransition {
                from: record.status,
                to: update.status,
            });
        }

        record.status = update.status;
        record.progress = update.progress;
        if update.result.is_some() {
            record.result = update.result;
        }
        if update.error.is_some() {
            record.error = update.error;
        }
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn list(&self) -> TaskResult<Vec<TaskRecord>> {
        let mut records: Vec<TaskRecord> = self.tasks.read().await.values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}
