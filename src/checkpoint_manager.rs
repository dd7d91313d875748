use crate::codec::{self, RecordKind};
use crate::duplicates::{self, DuplicateRecord};
use crate::pairs::Partition;
use crate::DedupeError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What `recover_if_crashed` found on startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// No transaction lock; the previous run exited cleanly.
    NotNeeded,
    /// A staged checkpoint was discarded; the interrupted batch will rerun.
    DiscardedPending,
    /// The lock was left behind but nothing was staged, so no state changed.
    Completed,
}

/// Owns the resumable progress marker of one instance.
///
/// The marker rotates through three slots (`checkpoint`, `checkpoint_temp`,
/// `checkpoint_old`) guarded by a `.transaction_lock` file, so at least one
/// fully written checkpoint exists at every point of a commit. When several
/// instances run, each slot name carries an `_i<index>` suffix.
pub struct CheckpointManager {
    working_dir: PathBuf,
    partition: Partition,
    checkpoint: PathBuf,
    checkpoint_temp: PathBuf,
    checkpoint_old: PathBuf,
    lock: PathBuf,
}

impl CheckpointManager {
    pub fn new(working_dir: &Path, partition: Partition) -> Self {
        let suffix = if partition.instance_count > 1 {
            format!("_i{}", partition.instance_index)
        } else {
            String::new()
        };

        Self {
            working_dir: working_dir.to_path_buf(),
            partition,
            checkpoint: working_dir.join(format!("checkpoint{}", suffix)),
            checkpoint_temp: working_dir.join(format!("checkpoint_temp{}", suffix)),
            checkpoint_old: working_dir.join(format!("checkpoint_old{}", suffix)),
            lock: working_dir.join(format!(".transaction_lock{}", suffix)),
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn partition(&self) -> Partition {
        self.partition
    }

    pub fn checkpoint_path(&self) -> &Path {
        &self.checkpoint
    }

    pub fn temp_path(&self) -> &Path {
        &self.checkpoint_temp
    }

    pub fn old_path(&self) -> &Path {
        &self.checkpoint_old
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock
    }

    /// Repair the slots after a commit was interrupted. Must run before any
    /// other checkpoint operation; running it twice changes nothing.
    pub fn recover_if_crashed(&self) -> Result<Recovery, DedupeError> {
        if !self.lock.exists() {
            return Ok(Recovery::NotNeeded);
        }

        warn!("Previous run crashed during a transaction, repairing checkpoint files");

        let outcome = if self.checkpoint_temp.exists() {
            codec::remove_if_exists(&self.checkpoint_temp)?;
            warn!("Discarded staged checkpoint {}", self.checkpoint_temp.display());
            Recovery::DiscardedPending
        } else {
            Recovery::Completed
        };

        if self.checkpoint.exists() {
            codec::remove_if_exists(&self.checkpoint_old)?;
        } else if self.checkpoint_old.exists() {
            fs::rename(&self.checkpoint_old, &self.checkpoint)?;
            warn!("Restored previous checkpoint from {}", self.checkpoint_old.display());
        }
        codec::sync_dir(&self.working_dir)?;

        // Lock goes last so a crash during recovery simply repeats it.
        codec::remove_if_exists(&self.lock)?;
        codec::sync_dir(&self.working_dir)?;

        info!("Checkpoint recovery finished: {:?}", outcome);
        Ok(outcome)
    }

    /// Offset of the first pair that still needs processing.
    pub fn load(&self) -> Result<u64, DedupeError> {
        if self.lock.exists() {
            return Err(DedupeError::Other(format!(
                "transaction lock {} present, recovery has not run",
                self.lock.display()
            )));
        }

        match self.read_checkpoint()? {
            Some(offset) => {
                if offset < self.partition.start || offset > self.partition.end {
                    return Err(DedupeError::CheckpointOutOfRange {
                        offset,
                        start: self.partition.start,
                        end: self.partition.end,
                    });
                }
                info!("Checkpoint found, starting from offset {}", offset);
                Ok(offset)
            }
            None => {
                info!("No checkpoint found, starting from offset {}", self.partition.start);
                Ok(self.partition.start)
            }
        }
    }

    /// Move the checkpoint to `new_offset` with no duplicate payload.
    pub fn advance(&self, new_offset: u64) -> Result<(), DedupeError> {
        self.begin()?.commit(new_offset)
    }

    /// Open a transaction by creating the lock marker.
    pub fn begin(&self) -> Result<Transaction<'_>, DedupeError> {
        codec::touch(&self.lock)?;
        codec::sync_dir(&self.working_dir)?;
        Ok(Transaction { manager: self })
    }

    fn read_checkpoint(&self) -> Result<Option<u64>, DedupeError> {
        if !self.checkpoint.exists() {
            return Ok(None);
        }
        codec::read_record::<u64>(&self.checkpoint, RecordKind::Checkpoint)
            .map(Some)
            .map_err(|e| DedupeError::CorruptCheckpoint {
                path: self.checkpoint.clone(),
                reason: e.to_string(),
            })
    }
}

/// One in-flight commit. Each step is a method so the protocol order is
/// explicit; dropping a transaction before [`Transaction::finish`] leaves the
/// lock in place, which is exactly what a crash looks like on disk.
pub struct Transaction<'a> {
    manager: &'a CheckpointManager,
}

impl Transaction<'_> {
    /// Persist the batch output. Flushed and synced before returning.
    pub fn write_duplicates(
        &self,
        batch_start: u64,
        records: &[DuplicateRecord],
    ) -> Result<PathBuf, DedupeError> {
        duplicates::write_duplicates(&self.manager.working_dir, batch_start, records)
    }

    /// Write the candidate checkpoint value to the temp slot.
    pub fn stage(&self, new_offset: u64) -> Result<(), DedupeError> {
        let manager = self.manager;
        if new_offset > manager.partition.end {
            return Err(DedupeError::CheckpointOutOfRange {
                offset: new_offset,
                start: manager.partition.start,
                end: manager.partition.end,
            });
        }
        if let Some(current) = manager.read_checkpoint()? {
            if new_offset < current {
                return Err(DedupeError::CheckpointRegression {
                    current,
                    requested: new_offset,
                });
            }
        }
        codec::write_record(&manager.checkpoint_temp, RecordKind::Checkpoint, &new_offset)
    }

    /// Rename the current checkpoint to the old slot, if there is one.
    pub fn retire_current(&self) -> Result<(), DedupeError> {
        let manager = self.manager;
        if manager.checkpoint.exists() {
            fs::rename(&manager.checkpoint, &manager.checkpoint_old)?;
        }
        Ok(())
    }

    /// Rename the staged value into the checkpoint slot.
    pub fn promote(&self) -> Result<(), DedupeError> {
        let manager = self.manager;
        fs::rename(&manager.checkpoint_temp, &manager.checkpoint)?;
        codec::sync_dir(&manager.working_dir)
    }

    /// Drop the previous checkpoint and release the lock.
    pub fn finish(self) -> Result<(), DedupeError> {
        let manager = self.manager;
        codec::remove_if_exists(&manager.checkpoint_old)?;
        codec::remove_if_exists(&manager.lock)?;
        codec::sync_dir(&manager.working_dir)
    }

    pub fn commit(self, new_offset: u64) -> Result<(), DedupeError> {
        self.stage(new_offset)?;
        self.retire_current()?;
        self.promote()?;
        self.finish()?;
        debug!("Checkpoint advanced to {}", new_offset);
        Ok(())
    }
}
