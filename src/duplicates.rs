use crate::codec::{self, RecordKind};
use crate::pairs::Pair;
use crate::DedupeError;
use std::fs;
use std::path::{Path, PathBuf};

/// A pair whose estimated similarity exceeded the threshold.
pub type DuplicateRecord = Pair;

const PREFIX: &str = "duplicates_";

pub fn duplicates_path(working_dir: &Path, batch_start: u64) -> PathBuf {
    working_dir.join(format!("{}{}", PREFIX, batch_start))
}

/// Writes (or overwrites) the output of the batch starting at `batch_start`.
pub fn write_duplicates(
    working_dir: &Path,
    batch_start: u64,
    records: &[DuplicateRecord],
) -> Result<PathBuf, DedupeError> {
    let path = duplicates_path(working_dir, batch_start);
    codec::write_record(&path, RecordKind::Duplicates, records)?;
    Ok(path)
}

/// Every duplicate output file in `working_dir`, ordered by batch offset.
/// Each file is returned separately; nothing is merged.
pub fn read_duplicates(
    working_dir: &Path,
) -> Result<Vec<(u64, Vec<DuplicateRecord>)>, DedupeError> {
    let mut offsets = Vec::new();
    for entry in fs::read_dir(working_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        if let Some(offset) = name
            .to_str()
            .and_then(|n| n.strip_prefix(PREFIX))
            .and_then(|n| n.parse::<u64>().ok())
        {
            offsets.push(offset);
        }
    }
    offsets.sort_unstable();

    offsets
        .into_iter()
        .map(|offset| {
            let path = duplicates_path(working_dir, offset);
            let records = codec::read_record(&path, RecordKind::Duplicates)?;
            Ok((offset, records))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_duplicates_orders_by_offset_and_skips_other_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path();

        write_duplicates(dir, 200, &[Pair::new(5, 9)]).unwrap();
        write_duplicates(dir, 0, &[Pair::new(0, 1), Pair::new(2, 3)]).unwrap();
        write_duplicates(dir, 100, &[]).unwrap();
        fs::write(dir.join("checkpoint"), b"x").unwrap();
        fs::write(dir.join("duplicates_notanumber"), b"x").unwrap();

        let all = read_duplicates(dir).unwrap();
        let offsets: Vec<u64> = all.iter().map(|(o, _)| *o).collect();
        assert_eq!(offsets, vec![0, 100, 200]);
        assert_eq!(all[0].1, vec![Pair::new(0, 1), Pair::new(2, 3)]);
        assert!(all[1].1.is_empty());
    }

    #[test]
    fn test_rewrite_overwrites_instead_of_appending() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path();

        write_duplicates(dir, 0, &[Pair::new(0, 1)]).unwrap();
        write_duplicates(dir, 0, &[Pair::new(0, 1)]).unwrap();

        let all = read_duplicates(dir).unwrap();
        assert_eq!(all, vec![(0, vec![Pair::new(0, 1)])]);
    }
}
