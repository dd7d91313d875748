//! Versioned on-disk record format shared by every file the pipeline reads or
//! writes: a small header (magic, format version, record kind) followed by a
//! bincode payload in the standard configuration.

use crate::DedupeError;
use bincode::error::DecodeError;
use bincode::{Decode, Encode};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

const MAGIC: [u8; 4] = *b"DDUP";

/// Bumped whenever the payload layout of any record kind changes.
pub const FORMAT_VERSION: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum RecordKind {
    Pairs,
    FingerprintShard,
    Checkpoint,
    Duplicates,
}

#[derive(Debug, Encode, Decode)]
struct Header {
    magic: [u8; 4],
    version: u16,
    kind: RecordKind,
}

/// Worst-case ratio between the decoded size of a payload and its encoded
/// size. A varint `u64` can take one byte on disk and eight in memory, and a
/// `Fingerprint` can encode in two bytes but occupies 32.
const MAX_EXPANSION: usize = 16;

/// Write `value` to `path` and fsync it before returning.
pub fn write_record<T: Encode + ?Sized>(
    path: &Path,
    kind: RecordKind,
    value: &T,
) -> Result<(), DedupeError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    let config = bincode::config::standard();
    let header = Header {
        magic: MAGIC,
        version: FORMAT_VERSION,
        kind,
    };
    bincode::encode_into_std_write(&header, &mut writer, config)?;
    bincode::encode_into_std_write(value, &mut writer, config)?;

    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

/// Read a record written by [`write_record`], rejecting foreign, mismatched
/// or trailing-garbage files. Decoding never allocates more than a small
/// multiple of the file size, so a corrupt length prefix is a
/// [`DedupeError::Format`] rather than an allocation failure.
pub fn read_record<T: Decode<()>>(path: &Path, kind: RecordKind) -> Result<T, DedupeError> {
    let bytes = fs::read(path)?;
    let format_error = |reason: String| DedupeError::Format {
        path: path.to_path_buf(),
        reason,
    };

    let (header, header_len): (Header, usize) =
        bincode::decode_from_slice(&bytes, bincode::config::standard())
            .map_err(|e| format_error(format!("unreadable header: {}", e)))?;

    if header.magic != MAGIC {
        return Err(format_error("bad magic".to_string()));
    }
    if header.version != FORMAT_VERSION {
        return Err(format_error(format!(
            "format version {} is not supported (expected {})",
            header.version, FORMAT_VERSION
        )));
    }
    if header.kind != kind {
        return Err(format_error(format!(
            "expected {:?} record, found {:?}",
            kind, header.kind
        )));
    }

    let payload = &bytes[header_len..];
    let (value, consumed) = decode_bounded::<T>(payload)
        .map_err(|e| format_error(format!("unreadable payload: {}", e)))?;
    if consumed != payload.len() {
        return Err(format_error(format!(
            "{} trailing bytes after payload",
            payload.len() - consumed
        )));
    }
    Ok(value)
}

/// Decode with the smallest limit tier covering `MAX_EXPANSION` times the
/// payload size. bincode only takes its limit as a const parameter.
fn decode_bounded<T: Decode<()>>(payload: &[u8]) -> Result<(T, usize), DecodeError> {
    let budget = payload.len().saturating_mul(MAX_EXPANSION);
    match budget {
        b if b <= 1 << 20 => decode_limited::<T, { 1 << 20 }>(payload),
        b if b <= 1 << 24 => decode_limited::<T, { 1 << 24 }>(payload),
        b if b <= 1 << 28 => decode_limited::<T, { 1 << 28 }>(payload),
        #[cfg(target_pointer_width = "64")]
        b if b <= 1 << 32 => decode_limited::<T, { 1 << 32 }>(payload),
        #[cfg(target_pointer_width = "64")]
        b if b <= 1 << 36 => decode_limited::<T, { 1 << 36 }>(payload),
        #[cfg(target_pointer_width = "64")]
        _ => decode_limited::<T, { 1 << 40 }>(payload),
        #[cfg(not(target_pointer_width = "64"))]
        _ => decode_limited::<T, { usize::MAX }>(payload),
    }
}

fn decode_limited<T: Decode<()>, const LIMIT: usize>(
    payload: &[u8],
) -> Result<(T, usize), DecodeError> {
    bincode::decode_from_slice(payload, bincode::config::standard().with_limit::<LIMIT>())
}

/// Create an empty marker file and make it durable.
pub fn touch(path: &Path) -> Result<(), DedupeError> {
    let file = File::create(path)?;
    file.sync_all()?;
    Ok(())
}

/// Flush directory metadata so that renames and removals survive a crash.
pub fn sync_dir(dir: &Path) -> Result<(), DedupeError> {
    let handle = File::open(dir)?;
    handle.sync_all()?;
    Ok(())
}

/// Remove a file if present; returns whether it existed.
pub fn remove_if_exists(path: &Path) -> Result<bool, DedupeError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(DedupeError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::Fingerprint;
    use crate::pairs::Pair;

    #[test]
    fn test_read_rejects_wrong_kind() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("checkpoint");

        write_record(&path, RecordKind::Checkpoint, &42u64).unwrap();
        let result = read_record::<u64>(&path, RecordKind::Duplicates);

        match result {
            Err(DedupeError::Format { reason, .. }) => assert!(reason.contains("Checkpoint")),
            other => panic!("expected format error, got {:?}", other),
        }
    }

    #[test]
    fn test_read_rejects_foreign_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("junk");
        fs::write(&path, b"not a record at all").unwrap();

        let result = read_record::<u64>(&path, RecordKind::Checkpoint);
        assert!(matches!(result, Err(DedupeError::Format { .. })));
    }

    #[test]
    fn test_truncated_payload_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("pairs");
        write_record(&path, RecordKind::Pairs, &vec![1u64, 2, 3, 4, 5]).unwrap();

        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() - 2]).unwrap();

        assert!(read_record::<Vec<u64>>(&path, RecordKind::Pairs).is_err());
    }

    fn header_bytes(kind: RecordKind) -> Vec<u8> {
        let header = Header {
            magic: MAGIC,
            version: FORMAT_VERSION,
            kind,
        };
        bincode::encode_to_vec(&header, bincode::config::standard()).unwrap()
    }

    #[test]
    fn test_corrupt_length_prefix_is_a_format_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("fingerprints_0");

        // Varint marker for a full u64 followed by u64::MAX as the vec length.
        let mut bytes = header_bytes(RecordKind::FingerprintShard);
        bytes.push(0xFD);
        bytes.extend_from_slice(&u64::MAX.to_le_bytes());
        fs::write(&path, &bytes).unwrap();

        let result = read_record::<Vec<Fingerprint>>(&path, RecordKind::FingerprintShard);
        assert!(matches!(result, Err(DedupeError::Format { .. })));
    }

    #[test]
    fn test_allocatable_but_oversized_length_is_a_format_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("all_pairs");

        // Claims a billion pairs in a file of a dozen bytes.
        let mut bytes = header_bytes(RecordKind::Pairs);
        bytes.push(0xFC);
        bytes.extend_from_slice(&1_000_000_000u32.to_le_bytes());
        fs::write(&path, &bytes).unwrap();

        match read_record::<Vec<Pair>>(&path, RecordKind::Pairs) {
            Err(DedupeError::Format { reason, .. }) => assert!(reason.contains("payload")),
            other => panic!("expected format error, got {:?}", other),
        }
    }

    #[test]
    fn test_trailing_bytes_are_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("checkpoint");
        write_record(&path, RecordKind::Checkpoint, &7u64).unwrap();

        let mut bytes = fs::read(&path).unwrap();
        bytes.extend_from_slice(b"junk");
        fs::write(&path, &bytes).unwrap();

        match read_record::<u64>(&path, RecordKind::Checkpoint) {
            Err(DedupeError::Format { reason, .. }) => assert!(reason.contains("trailing")),
            other => panic!("expected format error, got {:?}", other),
        }
    }

    #[test]
    fn test_large_valid_record_still_decodes() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("all_pairs");
        let pairs: Vec<Pair> = (0..100_000u64).map(|i| Pair::new(i, i + 1)).collect();

        write_record(&path, RecordKind::Pairs, &pairs).unwrap();
        assert_eq!(read_record::<Vec<Pair>>(&path, RecordKind::Pairs).unwrap(), pairs);
    }

    #[test]
    fn test_remove_if_exists() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(".transaction_lock");

        assert!(!remove_if_exists(&path).unwrap());
        touch(&path).unwrap();
        assert!(path.exists());
        assert!(remove_if_exists(&path).unwrap());
        assert!(!path.exists());
    }
}
