#![allow(dead_code)]

use dedupe::config::{Context, DedupeConfig};
use dedupe::duplicates::read_duplicates;
use dedupe::fingerprint::Fingerprint;
use dedupe::fingerprint_store::write_shard;
use dedupe::interrupt::Interrupts;
use dedupe::pairs::{pairs_path, write_pairs, Pair};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

pub const SHARD_SIZE: u64 = 4;

/// Documents fall into five groups; members of a group share 12 of 16
/// hash values (similarity 0.75), documents from different groups share none.
pub fn corpus(document_count: u64) -> Vec<Fingerprint> {
    (0..document_count)
        .map(|i| {
            let group = i % 5;
            let values = (0..16u64)
                .map(|j| if j < 12 { group * 1000 + j } else { (i + 1) * 100_000 + j })
                .collect();
            Fingerprint::new(42, values)
        })
        .collect()
}

/// Every unordered pair of distinct documents.
pub fn all_pairs(document_count: u64) -> Vec<Pair> {
    let mut pairs = Vec::new();
    for a in 0..document_count {
        for b in (a + 1)..document_count {
            pairs.push(Pair::new(a, b));
        }
    }
    pairs
}

pub fn write_fixture(dir: &Path, fingerprints: &[Fingerprint], pairs: &[Pair]) {
    for (i, shard) in fingerprints.chunks(SHARD_SIZE as usize).enumerate() {
        write_shard(dir, i as u64 * SHARD_SIZE, shard).unwrap();
    }
    write_pairs(&pairs_path(dir), pairs).unwrap();
}

pub fn config(dir: &Path, document_count: u64, batch_size: usize) -> DedupeConfig {
    let mut config = DedupeConfig::new(dir, document_count);
    config.process_count = 3;
    config.batch_size = batch_size;
    config.shard_size = SHARD_SIZE;
    config
}

pub fn context(dir: &Path, total_pairs: u64, batch_size: usize) -> Context {
    Context::new(config(dir, 0, batch_size), total_pairs, silent_interrupts()).unwrap()
}

pub fn silent_interrupts() -> std::sync::Arc<Interrupts> {
    Interrupts::new(|signal| panic!("unexpected signal {}", signal))
}

/// All confirmed pairs across every duplicate file in `dir`.
pub fn duplicate_set(dir: &Path) -> BTreeSet<Pair> {
    read_duplicates(dir)
        .unwrap()
        .into_iter()
        .flat_map(|(_, records)| records)
        .collect()
}

/// Sorted names and contents of every file in `dir`.
pub fn snapshot(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let mut files: Vec<(String, Vec<u8>)> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| {
            let entry = entry.unwrap();
            (entry.file_name().to_string_lossy().to_string(), fs::read(entry.path()).unwrap())
        })
        .collect();
    files.sort();
    files
}
