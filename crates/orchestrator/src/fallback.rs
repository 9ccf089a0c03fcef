//! Ranked fallback chains.
//!
//! Implementations are tried in order, each exactly once, until one succeeds.
//! Retrying the same implementation is left to the implementation itself.

use doc_classify_classification::TypeClassifier;
use doc_classify_common::{StageError, StageFailure, StageSource};
use doc_classify_extraction::TextExtractor;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Anything that can sit in a fallback chain.
pub trait Stage: Send + Sync {
    fn stage_name(&self) -> &str;
}

impl Stage for dyn TextExtractor {
    fn stage_name(&self) -> &str {
        self.name()
    }
}

impl Stage for dyn TypeClassifier {
    fn stage_name(&self) -> &str {
        self.name()
    }
}

/// Ordered list of interchangeable implementations for one pipeline stage.
pub struct FallbackChain<T: ?Sized + Stage> {
    stage: &'static str,
    implementations: Vec<Arc<T>>,
    attempt_timeout: Duration,
}

impl<T: ?Sized + Stage> FallbackChain<T> {
    pub fn new(stage: &'static str, implementations: Vec<Arc<T>>, attempt_timeout: Duration) -> Self {
        Self {
            stage,
            implementations,
            attempt_timeout,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.implementations.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.implementations.len()
    }

    pub fn implementations(&self) -> &[Arc<T>] {
        &self.implementations
    }

    #[must_use]
    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    /// Run `attempt` against each implementation in rank order.
    ///
    /// Returns the first success together with the implementation that
    /// produced it, or every failure in rank order. An attempt exceeding the
    /// per-attempt timeout counts as a failure.
    pub async fn run<R, E, F, Fut>(&self, mut attempt: F) -> Result<(R, StageSource), Vec<StageFailure>>
    where
        F: FnMut(Arc<T>) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: StageError,
    {
        let mut failures = Vec::with_capacity(self.implementations.len());

        for (rank, implementation) in self.implementations.iter().enumerate() {
            let name = implementation.stage_name().to_string();

            let error = match tokio::time::timeout(
                self.attempt_timeout,
                attempt(Arc::clone(implementation)),
            )
            .await
            {
                Ok(Ok(output)) => {
                    if rank > 0 {
                        info!("{} succeeded with fallback {} (rank {})", self.stage, name, rank);
                    }
                    return Ok((output, StageSource::new(name, rank)));
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => E::timed_out(self.attempt_timeout).to_string(),
            };

            warn!("{} implementation {} (rank {}) failed: {}", self.stage, name, rank, error);
            failures.push(StageFailure {
                implementation: name,
                rank,
                error,
            });
        }

        Err(failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use doc_classify_common::ExtractionError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        name: &'static str,
        output: Option<&'static str>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(name: &'static str, output: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                name,
                output,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TextExtractor for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn extract(&self, _document: &[u8]) -> doc_classify_extraction::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.output
                .map(str::to_string)
                .ok_or_else(|| ExtractionError::Service("down".into()))
        }
    }

    fn chain(items: Vec<Arc<Fixed>>) -> FallbackChain<dyn TextExtractor> {
        FallbackChain::new(
            "extraction",
            items.into_iter().map(|f| f as Arc<dyn TextExtractor>).collect(),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let primary = Fixed::new("a", Some("text"));
        let secondary = Fixed::new("b", Some("other"));
        let chain = chain(vec![primary.clone(), secondary.clone()]);

        let (text, source) = chain.run(|ex| async move { ex.extract(b"").await }).await.unwrap();
        assert_eq!(text, "text");
        assert_eq!(source, StageSource::new("a", 0));
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_each_implementation_tried_once() {
        let primary = Fixed::new("a", None);
        let secondary = Fixed::new("b", None);
        let third = Fixed::new("c", Some("late"));
        let chain = chain(vec![primary.clone(), secondary.clone(), third]);

        let (text, source) = chain.run(|ex| async move { ex.extract(b"").await }).await.unwrap();
        assert_eq!(text, "late");
        assert_eq!(source.rank, 2);
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_failures_reported_in_order() {
        let chain = chain(vec![Fixed::new("a", None), Fixed::new("b", None)]);
        let failures = chain
            .run(|ex| async move { ex.extract(b"").await })
            .await
            .unwrap_err();

        let names: Vec<_> = failures.iter().map(|f| f.implementation.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(failures[0].error.contains("down"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_triggers_fallback() {
        let slow = Arc::new(Fixed {
            name: "slow",
            output: Some("never"),
            delay: Duration::from_secs(30),
            calls: AtomicUsize::new(0),
        });
        let chain = chain(vec![slow, Fixed::new("fast", Some("ok"))])
            .with_attempt_timeout(Duration::from_secs(1));

        let (text, source) = chain.run(|ex| async move { ex.extract(b"").await }).await.unwrap();
        assert_eq!(text, "ok");
        assert_eq!(source.implementation, "fast");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reported_as_stage_error() {
        let slow = Arc::new(Fixed {
            name: "slow",
            output: Some("never"),
            delay: Duration::from_secs(30),
            calls: AtomicUsize::new(0),
        });
        let chain = chain(vec![slow]).with_attempt_timeout(Duration::from_millis(500));

        let failures = chain
            .run(|ex| async move { ex.extract(b"").await })
            .await
            .unwrap_err();
        assert_eq!(failures.len(), 1);
        assert_eq!(
            failures[0].error,
            ExtractionError::Timeout(Duration::from_millis(500)).to_string()
        );
        assert_eq!(failures[0].error, "Extraction timed out after 500ms");
    }

    #[tokio::test]
    async fn test_empty_chain_fails_without_attempts() {
        let chain = chain(vec![]);
        assert!(chain.is_empty());
        let failures = chain
            .run(|ex| async move { ex.extract(b"").await })
            .await
            .unwrap_err();
        assert!(failures.is_empty());
    }
}
