//! Batch evaluation of document classification.
//!
//! [`MetricsCalculator`] is a pure function over labelled predictions;
//! [`EvaluationEngine`] drives documents through the orchestrator, records one
//! [`EvaluationItem`] per entry and assembles an [`EvaluationReport`].

pub mod config;
pub mod engine;
pub mod error;
pub mod item;
pub mod metrics;
pub mod report;
pub mod store;
pub mod summary;
pub mod trends;

pub use config::EvaluationConfig;
pub use engine::{EvaluationEngine, RunHandle};
pub use error::{EvaluationError, Result};
pub use item::{BatchEntry, EvaluationItem, ItemOutcome};
pub use metrics::{
    AggregateMetrics, AverageMetrics, ClassMetrics, ConfidenceStats, ConfusionMatrix,
    EvaluationMetrics, LabeledPrediction, MetricsCalculator, ThresholdPoint,
    DEFAULT_SWEEP_THRESHOLDS,
};
pub use report::EvaluationReport;
pub use store::{InMemoryRunStore, RunProgress, RunRecord, RunStatus, RunStore};
pub use summary::EvaluationSummary;
pub use trends::{PerformanceTrend, RunScore, TrendDirection};
