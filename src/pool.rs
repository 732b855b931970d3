//! Bounded worker pools, one per workload class.
//!
//! Each pool is a rayon thread pool with a semaphore in front of it. The
//! semaphore holds `threads + queue` permits; a job that cannot take one is
//! rejected with [`PipelineError::Saturated`] instead of queueing unboundedly.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::{Semaphore, oneshot};
use tokio_util::sync::CancellationToken;

use crate::config::{PoolConfig, PoolsConfig};
use crate::error::PipelineError;

pub struct WorkerPool {
    name: &'static str,
    pool: rayon::ThreadPool,
    permits: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(name: &'static str, config: PoolConfig) -> Result<Self, PipelineError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads.max(1))
            .thread_name(move |i| format!("{}-{}", name, i))
            .build()?;
        let capacity = config.threads.max(1) + config.queue;
        log::debug!(
            "Pool '{}': {} threads, {} permits",
            name,
            config.threads.max(1),
            capacity
        );
        Ok(Self {
            name,
            pool,
            permits: Arc::new(Semaphore::new(capacity)),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Permits currently free (running + queued jobs hold the rest).
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `job` on the pool and await its result.
    ///
    /// A job whose token is already cancelled when a worker picks it up is
    /// skipped. A panic inside the job becomes `AnalysisFailed { stage }`.
    pub async fn run<T, F>(
        &self,
        stage: &'static str,
        cancel: &CancellationToken,
        job: F,
    ) -> Result<T, PipelineError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
    {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let permit = Arc::clone(&self.permits)
            .try_acquire_owned()
            .map_err(|_| PipelineError::Saturated { pool: self.name })?;

        let (tx, rx) = oneshot::channel();
        let token = cancel.clone();
        self.pool.spawn(move || {
            let outcome = if token.is_cancelled() {
                log::debug!("Skipping stage '{}': cancelled", stage);
                Err(PipelineError::Cancelled)
            } else {
                panic::catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|payload| {
                    Err(PipelineError::stage(stage, panic_message(payload)))
                })
            };
            // Release before reporting so the caller sees the slot free again.
            drop(permit);
            let _ = tx.send(outcome);
        });

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PipelineError::Cancelled),
            result = rx => result.unwrap_or_else(|_| {
                Err(PipelineError::stage(stage, "worker dropped the result"))
            }),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

/// The three workload classes.
pub struct Pools {
    pub analysis: WorkerPool,
    pub generation: WorkerPool,
    pub helpers: WorkerPool,
}

impl Pools {
    pub fn new(config: &PoolsConfig) -> Result<Self, PipelineError> {
        Ok(Self {
            analysis: WorkerPool::new("analysis", config.analysis)?,
            generation: WorkerPool::new("generation", config.generation)?,
            helpers: WorkerPool::new("helpers", config.helpers)?,
        })
    }
}
