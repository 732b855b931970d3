//! Memoized variation results with single-flight computation per key.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;

use super::variation::{ProgressionVariation, VariationRequest};
use crate::error::PipelineError;
use crate::theory::Scale;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariationKey {
    chords: Vec<String>,
    scale: Scale,
    /// `f64::to_bits` of the amount.
    amount_bits: u64,
    seed: u64,
}

impl From<&VariationRequest> for VariationKey {
    fn from(req: &VariationRequest) -> Self {
        Self {
            chords: req.chords.clone(),
            scale: req.scale,
            amount_bits: req.amount.to_bits(),
            seed: req.seed,
        }
    }
}

type Cell = Arc<OnceCell<ProgressionVariation>>;

/// Concurrent identical requests share one computation; a failed
/// computation leaves the entry empty so the next caller retries.
#[derive(Default)]
pub struct VariationCache {
    cells: Mutex<HashMap<VariationKey, Cell>>,
    computations: AtomicUsize,
}

impl VariationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached value for `request`, or the result of `compute` if this call
    /// wins the race to fill it.
    pub async fn get_or_compute<F, Fut>(
        &self,
        request: &VariationRequest,
        compute: F,
    ) -> Result<ProgressionVariation, PipelineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ProgressionVariation, PipelineError>>,
    {
        let cell = {
            let mut cells = self
                .cells
                .lock()
                .map_err(|_| PipelineError::CacheComputationFailed("cache lock poisoned".into()))?;
            Arc::clone(cells.entry(VariationKey::from(request)).or_default())
        };
        let value = cell
            .get_or_try_init(|| async {
                self.computations.fetch_add(1, Ordering::SeqCst);
                compute().await
            })
            .await?;
        Ok(value.clone())
    }

    /// Number of times a computation actually ran.
    pub fn computations(&self) -> usize {
        self.computations.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.cells
            .lock()
            .map(|cells| cells.values().filter(|c| c.initialized()).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::variation::generate_variation;
    use std::time::Duration;

    fn request(seed: u64) -> VariationRequest {
        VariationRequest::new(
            vec!["C".into(), "G".into(), "Am".into(), "F".into()],
            Scale::Major,
            0.5,
            seed,
        )
    }

    fn compute(
        req: &VariationRequest,
        delay: Duration,
    ) -> impl Future<Output = Result<ProgressionVariation, PipelineError>> + use<> {
        let req = req.clone();
        async move {
            tokio::time::sleep(delay).await;
            generate_variation(&req)
        }
    }

    #[tokio::test]
    async fn test_second_lookup_is_cached() {
        let cache = VariationCache::new();
        let req = request(1);
        let a = cache.get_or_compute(&req, || compute(&req, Duration::ZERO)).await.unwrap();
        let b = cache.get_or_compute(&req, || compute(&req, Duration::ZERO)).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(cache.computations(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_seed_is_part_of_key() {
        let cache = VariationCache::new();
        for seed in [1, 2] {
            let req = request(seed);
            cache.get_or_compute(&req, || compute(&req, Duration::ZERO)).await.unwrap();
        }
        assert_eq!(cache.computations(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_identical_requests_compute_once() {
        let cache = VariationCache::new();
        let req = request(9);
        let delay = Duration::from_millis(20);
        let (a, b) = tokio::join!(
            cache.get_or_compute(&req, || compute(&req, delay)),
            cache.get_or_compute(&req, || compute(&req, delay)),
        );
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(cache.computations(), 1);
    }

    #[tokio::test]
    async fn test_failure_leaves_entry_empty() {
        let cache = VariationCache::new();
        let req = request(3);
        let err = cache
            .get_or_compute(&req, || async {
                Err(PipelineError::CacheComputationFailed("boom".into()))
            })
            .await;
        assert!(err.is_err());
        assert!(cache.is_empty());
        let ok = cache.get_or_compute(&req, || compute(&req, Duration::ZERO)).await;
        assert!(ok.is_ok());
        assert_eq!(cache.computations(), 2);
    }
}
