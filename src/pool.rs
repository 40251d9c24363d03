use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{Error, Result};
use crate::progress::{NoProgress, ProgressObserver};

/// Fixed-size worker pool shared by the parallel stages of a step.
///
/// Holds exactly `n_jobs` threads; callers block until the work they
/// submit through [`WorkerPool::install`] has finished.
pub struct WorkerPool {
    pool: ThreadPool,
    n_jobs: usize,
    observer: Arc<dyn ProgressObserver>,
}

impl WorkerPool {
    pub fn new(n_jobs: usize) -> Result<Self> {
        if n_jobs == 0 {
            return Err(Error::InvalidJobs);
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(n_jobs)
            .thread_name(|i| format!("similarity-worker-{i}"))
            .build()?;
        Ok(Self {
            pool,
            n_jobs,
            observer: Arc::new(NoProgress),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn n_jobs(&self) -> usize {
        self.n_jobs
    }

    pub fn observer(&self) -> &dyn ProgressObserver {
        self.observer.as_ref()
    }

    /// Run `op` inside the pool; parallel iterators in `op` use its threads.
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("n_jobs", &self.n_jobs)
            .finish_non_exhaustive()
    }
}
