//! Document Classification Orchestrator
//!
//! Sequences text extraction and type classification through ranked fallback
//! chains, gates the result on confidence, and drives per-document task state.
//!
//! ```text
//! bytes -> [extractor #0, extractor #1, ..] -> text
//!       -> [classifier #0, classifier #1, ..] -> Classification
//!       -> ConfidenceGate -> ClassificationResult
//! ```

pub mod fallback;
pub mod orchestrator;
pub mod task;

pub use fallback::{FallbackChain, Stage};
pub use orchestrator::{ClassificationOrchestrator, ClassifiedDocument, HealthReport, ServiceHealth};
pub use task::{InMemoryTaskStore, TaskRecord, TaskStatus, TaskStore, TaskStoreError, TaskUpdate};
