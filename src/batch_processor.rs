use crate::checkpoint_manager::CheckpointManager;
use crate::config::Context;
use crate::fingerprint::{Fingerprint, SimilarityPredicate};
use crate::interrupt::Interrupts;
use crate::pairs::Pair;
use crate::worker_pool::WorkerPool;
use crate::DedupeError;
use tracing::{debug, warn};

/// Consecutive pairs starting at global offset `start`, with their
/// fingerprints resolved. Lives for one processing unit.
pub struct Batch<'t> {
    start: u64,
    capacity: usize,
    entries: Vec<(Pair, &'t Fingerprint, &'t Fingerprint)>,
}

impl<'t> Batch<'t> {
    pub fn new(start: u64, capacity: usize) -> Self {
        Self {
            start,
            capacity,
            entries: Vec::with_capacity(capacity.min(1 << 20)),
        }
    }

    pub fn push(&mut self, pair: Pair, a: &'t Fingerprint, b: &'t Fingerprint) {
        debug_assert!(self.entries.len() < self.capacity);
        self.entries.push((pair, a, b));
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    /// Offset the checkpoint moves to once this batch commits.
    pub fn end(&self) -> u64 {
        self.start + self.entries.len() as u64
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Empty the batch and start the next one at `start`.
    pub fn reset(&mut self, start: u64) {
        self.entries.clear();
        self.start = start;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub start: u64,
    pub next_offset: u64,
    pub duplicates: usize,
    pub failed: usize,
}

impl BatchOutcome {
    pub fn pairs(&self) -> u64 {
        self.next_offset - self.start
    }
}

/// Compares one batch on the worker pool and commits its result.
pub struct BatchProcessor<'c> {
    pool: &'c WorkerPool,
    checkpoints: &'c CheckpointManager,
    interrupts: &'c Interrupts,
    predicate: SimilarityPredicate,
}

impl<'c> BatchProcessor<'c> {
    pub fn new(context: &'c Context) -> Self {
        Self {
            pool: &context.pool,
            checkpoints: &context.checkpoints,
            interrupts: &context.interrupts,
            predicate: context.config.predicate(),
        }
    }

    /// Either both the duplicate file and the advanced checkpoint are durable
    /// on return, or neither counts: the checkpoint is only moved after the
    /// duplicate file is synced, and recovery rolls back an unfinished commit.
    pub fn process(&self, batch: &Batch<'_>) -> Result<BatchOutcome, DedupeError> {
        let tasks: Vec<(&Fingerprint, &Fingerprint)> =
            batch.entries.iter().map(|(_, a, b)| (*a, *b)).collect();
        let results = self.pool.map(&tasks, self.predicate);

        let mut duplicates = Vec::new();
        let mut failed = 0;
        let outcomes = batch.entries.iter().zip(results);
        for (offset, ((pair, _, _), result)) in (batch.start..).zip(outcomes) {
            match result {
                Ok(true) => duplicates.push(*pair),
                Ok(false) => {}
                Err(e) => {
                    failed += 1;
                    warn!(
                        "Comparison at offset {} ({}, {}) failed, treating as not duplicate: {}",
                        offset, pair.a, pair.b, e
                    );
                }
            }
        }

        let next_offset = batch.end();
        {
            let _section = self.interrupts.critical_section();
            let transaction = self.checkpoints.begin()?;
            transaction.write_duplicates(batch.start, &duplicates)?;
            transaction.commit(next_offset)?;
        }

        debug!(
            "Committed batch [{}, {}): {} duplicates, {} failed comparisons",
            batch.start,
            next_offset,
            duplicates.len(),
            failed
        );

        Ok(BatchOutcome {
            start: batch.start,
            next_offset,
            duplicates: duplicates.len(),
            failed,
        })
    }
}
