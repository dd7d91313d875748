use crate::checkpoint_manager::CheckpointManager;
use crate::fingerprint::{SimilarityPredicate, DEFAULT_THRESHOLD};
use crate::fingerprint_store::DEFAULT_SHARD_SIZE;
use crate::interrupt::Interrupts;
use crate::pairs::Partition;
use crate::worker_pool::WorkerPool;
use crate::DedupeError;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

/// Pairs per committed batch (not fingerprints per shard).
pub const DEFAULT_BATCH_SIZE: usize = 100_000;

/// Worker count when none is configured: the available hardware parallelism.
pub fn default_process_count() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

/// Settings for one instance of the verification job.
#[derive(Debug, Clone)]
pub struct DedupeConfig {
    pub working_dir: PathBuf,
    pub process_count: usize,
    pub instance_count: usize,
    pub instance_index: usize,
    pub document_count: u64,
    pub batch_size: usize,
    pub shard_size: u64,
    pub threshold: f64,
}

impl DedupeConfig {
    /// Single-instance defaults rooted at `working_dir`.
    pub fn new(working_dir: impl Into<PathBuf>, document_count: u64) -> Self {
        Self {
            working_dir: working_dir.into(),
            process_count: default_process_count(),
            instance_count: 1,
            instance_index: 0,
            document_count,
            batch_size: DEFAULT_BATCH_SIZE,
            shard_size: DEFAULT_SHARD_SIZE,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    pub fn validate(&self) -> Result<(), DedupeError> {
        if self.process_count == 0 {
            return Err(DedupeError::InvalidConfig("process count must be positive".to_string()));
        }
        if self.batch_size == 0 {
            return Err(DedupeError::InvalidConfig("batch size must be positive".to_string()));
        }
        if self.shard_size == 0 {
            return Err(DedupeError::InvalidConfig("shard size must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(DedupeError::InvalidConfig(format!(
                "threshold {} is outside [0, 1]",
                self.threshold
            )));
        }
        if self.instance_count == 0 || self.instance_index >= self.instance_count {
            return Err(DedupeError::InvalidPartition {
                instance_count: self.instance_count,
                instance_index: self.instance_index,
            });
        }
        if !self.working_dir.is_dir() {
            return Err(DedupeError::InvalidConfig(format!(
                "working directory {} does not exist",
                self.working_dir.display()
            )));
        }
        Ok(())
    }

    pub fn predicate(&self) -> SimilarityPredicate {
        SimilarityPredicate::new(self.threshold)
    }
}

/// Everything the driver and batch processor share, built once at startup
/// and passed down explicitly.
pub struct Context {
    pub config: DedupeConfig,
    pub partition: Partition,
    pub pool: WorkerPool,
    pub checkpoints: CheckpointManager,
    pub interrupts: Arc<Interrupts>,
}

impl Context {
    pub fn new(
        config: DedupeConfig,
        total_pairs: u64,
        interrupts: Arc<Interrupts>,
    ) -> Result<Self, DedupeError> {
        config.validate()?;
        let partition = Partition::new(total_pairs, config.instance_count, config.instance_index)?;
        let pool = WorkerPool::new(config.process_count)?;
        let checkpoints = CheckpointManager::new(&config.working_dir, partition);

        Ok(Self {
            config,
            partition,
            pool,
            checkpoints,
            interrupts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = DedupeConfig::new(temp_dir.path(), 10);
        config.validate().unwrap();
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.shard_size, DEFAULT_SHARD_SIZE);
        assert!(config.process_count >= 1);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let base = DedupeConfig::new(temp_dir.path(), 10);

        let mut config = base.clone();
        config.batch_size = 0;
        assert!(matches!(config.validate(), Err(DedupeError::InvalidConfig(_))));

        let mut config = base.clone();
        config.threshold = 1.5;
        assert!(matches!(config.validate(), Err(DedupeError::InvalidConfig(_))));

        let mut config = base.clone();
        config.instance_count = 2;
        config.instance_index = 2;
        assert!(matches!(config.validate(), Err(DedupeError::InvalidPartition { .. })));

        let mut config = base;
        config.working_dir = temp_dir.path().join("missing");
        assert!(matches!(config.validate(), Err(DedupeError::InvalidConfig(_))));
    }
}
