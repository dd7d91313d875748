use crate::error::CompareError;
use crate::fingerprint::{Fingerprint, SimilarityPredicate};
use crate::DedupeError;
use rayon::prelude::*;
use std::panic::{self, AssertUnwindSafe};

/// Fixed-size pool that evaluates the similarity predicate in parallel.
/// Workers only ever see fingerprints; they never touch on-disk state.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Result<Self, DedupeError> {
        if size == 0 {
            return Err(DedupeError::InvalidConfig("worker pool size must be positive".to_string()));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(size)
            .thread_name(|i| format!("dedupe-worker-{}", i))
            .build()
            .map_err(|e| DedupeError::Other(format!("failed to start worker pool: {}", e)))?;
        Ok(Self { pool, size })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Compare every task and block until all are done. Result `i` belongs
    /// to task `i`; a failing or panicking task only affects its own slot.
    pub fn map(
        &self,
        tasks: &[(&Fingerprint, &Fingerprint)],
        predicate: SimilarityPredicate,
    ) -> Vec<Result<bool, CompareError>> {
        self.map_with(tasks, |a, b| predicate.is_duplicate(a, b))
    }

    /// [`WorkerPool::map`] with an arbitrary comparison.
    pub fn map_with<F>(
        &self,
        tasks: &[(&Fingerprint, &Fingerprint)],
        compare: F,
    ) -> Vec<Result<bool, CompareError>>
    where
        F: Fn(&Fingerprint, &Fingerprint) -> Result<bool, CompareError> + Sync,
    {
        self.pool.install(|| {
            tasks
                .par_iter()
                .map(|(a, b)| {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| compare(a, b)));
                    outcome.unwrap_or_else(|payload| {
                        Err(CompareError::Panicked(panic_message(payload.as_ref())))
                    })
                })
                .collect()
        })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
