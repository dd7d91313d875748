use crate::codec::{self, RecordKind};
use crate::DedupeError;
use bincode::{Decode, Encode};
use std::path::{Path, PathBuf};

pub const PAIRS_FILE: &str = "all_pairs";

/// Candidate pair of global document positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode)]
pub struct Pair {
    pub a: u64,
    pub b: u64,
}

impl Pair {
    pub fn new(a: u64, b: u64) -> Self {
        Self { a, b }
    }
}

impl From<(u64, u64)> for Pair {
    fn from((a, b): (u64, u64)) -> Self {
        Self { a, b }
    }
}

pub fn pairs_path(working_dir: &Path) -> PathBuf {
    working_dir.join(PAIRS_FILE)
}

pub fn write_pairs(path: &Path, pairs: &[Pair]) -> Result<(), DedupeError> {
    codec::write_record(path, RecordKind::Pairs, pairs)
}

/// Load the full candidate pair list. A missing file means the pair
/// generation stage has not run.
pub fn load_pairs(path: &Path) -> Result<Vec<Pair>, DedupeError> {
    if !path.exists() {
        return Err(DedupeError::MissingPairs(path.to_path_buf()));
    }
    codec::read_record(path, RecordKind::Pairs)
}

/// The contiguous slice `[start, end)` of the global pair list owned by one
/// instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub instance_index: usize,
    pub instance_count: usize,
    pub start: u64,
    pub end: u64,
}

impl Partition {
    /// Every instance gets `total / count` pairs; the last one also takes the
    /// remainder so the union covers `[0, total)` exactly.
    pub fn new(
        total_pairs: u64,
        instance_count: usize,
        instance_index: usize,
    ) -> Result<Self, DedupeError> {
        if instance_count == 0 || instance_index >= instance_count {
            return Err(DedupeError::InvalidPartition {
                instance_count,
                instance_index,
            });
        }

        let per_instance = total_pairs / instance_count as u64;
        let start = per_instance * instance_index as u64;
        let end = if instance_index + 1 == instance_count {
            total_pairs
        } else {
            start + per_instance
        };

        Ok(Self {
            instance_index,
            instance_count,
            start,
            end,
        })
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, offset: u64) -> bool {
        offset >= self.start && offset < self.end
    }
}
