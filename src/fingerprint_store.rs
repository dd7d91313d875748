use crate::codec::{self, RecordKind};
use crate::fingerprint::Fingerprint;
use crate::progress::{ProgressObserver, Unit};
use crate::DedupeError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Number of documents per fingerprint shard.
///
/// Shared with the upstream fingerprinting stage that writes the shards.
/// Changing it without regenerating every shard makes the loader look for
/// files that do not exist or misalign fingerprints with documents.
pub const DEFAULT_SHARD_SIZE: u64 = 1000;

/// Fingerprints for every document, indexed by global document position.
#[derive(Debug, Clone, Default)]
pub struct FingerprintTable {
    fingerprints: Vec<Fingerprint>,
}

impl FingerprintTable {
    pub fn get(&self, index: u64) -> Option<&Fingerprint> {
        usize::try_from(index).ok().and_then(|i| self.fingerprints.get(i))
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }
}

impl From<Vec<Fingerprint>> for FingerprintTable {
    fn from(fingerprints: Vec<Fingerprint>) -> Self {
        Self { fingerprints }
    }
}

pub fn shard_path(working_dir: &Path, start: u64) -> PathBuf {
    working_dir.join(format!("fingerprints_{}", start))
}

/// Write one shard in the format [`load`] expects. Used by the upstream
/// fingerprinting stage and by tests.
pub fn write_shard(
    working_dir: &Path,
    start: u64,
    fingerprints: &[Fingerprint],
) -> Result<(), DedupeError> {
    let path = shard_path(working_dir, start);
    codec::write_record(&path, RecordKind::FingerprintShard, fingerprints)
}

/// Load the complete fingerprint table. Either every shard is present and
/// well-formed or an error is returned; a partial table is never produced.
pub fn load(
    working_dir: &Path,
    document_count: u64,
    shard_size: u64,
    progress: &dyn ProgressObserver,
) -> Result<FingerprintTable, DedupeError> {
    if shard_size == 0 {
        return Err(DedupeError::InvalidConfig("shard size must be positive".to_string()));
    }

    // Stat every shard up front so a missing one fails before any decoding.
    let mut shards = Vec::new();
    let mut total_bytes = 0u64;
    let mut start = 0u64;
    while start < document_count {
        let path = shard_path(working_dir, start);
        let bytes = match fs::metadata(&path) {
            Ok(metadata) => metadata.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DedupeError::MissingShard { path, offset: start });
            }
            Err(e) => return Err(DedupeError::Io(e)),
        };
        total_bytes += bytes;
        shards.push((start, path, bytes));
        start += shard_size;
    }

    info!(
        "Loading {} fingerprint shards ({} documents, {} bytes)",
        shards.len(),
        document_count,
        total_bytes
    );
    progress.begin("Loading fingerprints", total_bytes, Unit::Bytes);

    let mut fingerprints = Vec::with_capacity(usize::try_from(document_count).unwrap_or(0));
    for (start, path, bytes) in shards {
        let shard: Vec<Fingerprint> = codec::read_record(&path, RecordKind::FingerprintShard)?;
        let expected = shard_size.min(document_count - start) as usize;
        if shard.len() != expected {
            return Err(DedupeError::ShardLength {
                offset: start,
                expected,
                found: shard.len(),
            });
        }

        debug!("Loaded shard {} ({} fingerprints)", path.display(), shard.len());
        fingerprints.extend(shard);
        progress.advance(bytes);
    }
    progress.finish();

    info!("Fingerprint table ready: {} documents", fingerprints.len());
    Ok(FingerprintTable { fingerprints })
}
