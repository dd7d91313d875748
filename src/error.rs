use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum DedupeError {
    Io(std::io::Error),
    Serialization(Box<bincode::error::EncodeError>),
    Deserialization(Box<bincode::error::DecodeError>),
    Format { path: PathBuf, reason: String },
    MissingPairs(PathBuf),
    MissingShard { path: PathBuf, offset: u64 },
    ShardLength { offset: u64, expected: usize, found: usize },
    InvalidPartition { instance_count: usize, instance_index: usize },
    InvalidConfig(String),
    CorruptCheckpoint { path: PathBuf, reason: String },
    CheckpointOutOfRange { offset: u64, start: u64, end: u64 },
    CheckpointRegression { current: u64, requested: u64 },
    DocumentOutOfRange { offset: u64, index: u64, document_count: usize },
    Other(String),
}

impl fmt::Display for DedupeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DedupeError::Io(e) => write!(f, "IO error: {}", e),
            DedupeError::Serialization(e) => write!(f, "Serialization error: {}", e),
            DedupeError::Deserialization(e) => write!(f, "Deserialization error: {}", e),
            DedupeError::Format { path, reason } => {
                write!(f, "Invalid record file {}: {}", path.display(), reason)
            }
            DedupeError::MissingPairs(path) => write!(
                f,
                "Pair file {} not found, generate candidate pairs first",
                path.display()
            ),
            DedupeError::MissingShard { path, offset } => write!(
                f,
                "Fingerprint shard for offset {} missing at {}",
                offset,
                path.display()
            ),
            DedupeError::ShardLength { offset, expected, found } => write!(
                f,
                "Fingerprint shard at offset {} holds {} fingerprints, expected {}",
                offset, found, expected
            ),
            DedupeError::InvalidPartition { instance_count, instance_index } => write!(
                f,
                "Invalid partition: instance {} of {} instances",
                instance_index, instance_count
            ),
            DedupeError::InvalidConfig(e) => write!(f, "Invalid configuration: {}", e),
            DedupeError::CorruptCheckpoint { path, reason } => write!(
                f,
                "Checkpoint {} is unreadable ({}), manual intervention required",
                path.display(),
                reason
            ),
            DedupeError::CheckpointOutOfRange { offset, start, end } => write!(
                f,
                "Checkpoint offset {} lies outside this instance's range [{}, {})",
                offset, start, end
            ),
            DedupeError::CheckpointRegression { current, requested } => write!(
                f,
                "Refusing to move checkpoint backwards from {} to {}",
                current, requested
            ),
            DedupeError::DocumentOutOfRange { offset, index, document_count } => write!(
                f,
                "Pair at offset {} references document {} but only {} fingerprints are loaded",
                offset, index, document_count
            ),
            DedupeError::Other(e) => write!(f, "Error: {}", e),
        }
    }
}

impl std::error::Error for DedupeError {}

impl From<bincode::error::EncodeError> for DedupeError {
    fn from(err: bincode::error::EncodeError) -> Self {
        DedupeError::Serialization(Box::new(err))
    }
}

impl From<bincode::error::DecodeError> for DedupeError {
    fn from(err: bincode::error::DecodeError) -> Self {
        DedupeError::Deserialization(Box::new(err))
    }
}

impl From<std::io::Error> for DedupeError {
    fn from(err: std::io::Error) -> Self {
        DedupeError::Io(err)
    }
}

impl From<String> for DedupeError {
    fn from(err: String) -> Self {
        DedupeError::Other(err)
    }
}

impl From<&str> for DedupeError {
    fn from(err: &str) -> Self {
        DedupeError::Other(err.to_string())
    }
}

/// Failure of a single comparison task. Never aborts a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum CompareError {
    SeedMismatch { left: u64, right: u64 },
    LengthMismatch { left: usize, right: usize },
    EmptySignature,
    Panicked(String),
}

impl fmt::Display for CompareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareError::SeedMismatch { left, right } => {
                write!(f, "fingerprints built with different seeds ({} vs {})", left, right)
            }
            CompareError::LengthMismatch { left, right } => {
                write!(f, "fingerprint lengths differ ({} vs {})", left, right)
            }
            CompareError::EmptySignature => write!(f, "empty fingerprint"),
            CompareError::Panicked(msg) => write!(f, "comparison panicked: {}", msg),
        }
    }
}

impl std::error::Error for CompareError {}
