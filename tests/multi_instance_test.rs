mod common;

use dedupe::driver::run_instance;
use dedupe::pairs::Partition;
use dedupe::progress::NoProgress;
use std::collections::BTreeSet;
use std::thread;

const DOCUMENTS: u64 = 15;

fn single_instance_duplicates() -> BTreeSet<dedupe::pairs::Pair> {
    let temp_dir = tempfile::tempdir().unwrap();
    let dir = temp_dir.path();
    common::write_fixture(dir, &common::corpus(DOCUMENTS), &common::all_pairs(DOCUMENTS));
    let config = common::config(dir, DOCUMENTS, 8);
    run_instance(config, common::silent_interrupts(), &NoProgress).unwrap();
    common::duplicate_set(dir)
}

#[test]
fn test_instances_sharing_a_directory_cover_every_pair_once() {
    let expected = single_instance_duplicates();
    // Every group of 3 documents yields 3 duplicate pairs.
    assert_eq!(expected.len(), 15);

    let temp_dir = tempfile::tempdir().unwrap();
    let dir = temp_dir.path().to_path_buf();
    let pairs = common::all_pairs(DOCUMENTS);
    common::write_fixture(&dir, &common::corpus(DOCUMENTS), &pairs);

    let reports: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..3)
            .map(|index| {
                let dir = dir.clone();
                scope.spawn(move || {
                    let mut config = common::config(&dir, DOCUMENTS, 8);
                    config.instance_count = 3;
                    config.instance_index = index;
                    run_instance(config, common::silent_interrupts(), &NoProgress).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let processed: u64 = reports.iter().map(|r| r.pairs_processed).sum();
    assert_eq!(processed, pairs.len() as u64);
    for (index, report) in reports.iter().enumerate() {
        assert_eq!(report.partition, Partition::new(pairs.len() as u64, 3, index).unwrap());
        assert!(dir.join(format!("checkpoint_i{}", index)).exists());
    }
    assert!(!dir.join("checkpoint").exists());

    assert_eq!(common::duplicate_set(&dir), expected);
}

#[test]
fn test_restarted_instance_leaves_siblings_untouched() {
    let temp_dir = tempfile::tempdir().unwrap();
    let dir = temp_dir.path();
    common::write_fixture(dir, &common::corpus(DOCUMENTS), &common::all_pairs(DOCUMENTS));

    let instance = |index: usize| {
        let mut config = common::config(dir, DOCUMENTS, 8);
        config.instance_count = 2;
        config.instance_index = index;
        config
    };

    run_instance(instance(0), common::silent_interrupts(), &NoProgress).unwrap();
    let sibling_checkpoint = std::fs::read(dir.join("checkpoint_i0")).unwrap();

    // Instance 1 crashes with its lock held; instance 0 has nothing to repair.
    std::fs::write(dir.join(".transaction_lock_i1"), b"").unwrap();
    let report = run_instance(instance(1), common::silent_interrupts(), &NoProgress).unwrap();
    assert_eq!(report.resumed_from, report.partition.start);

    let rerun = run_instance(instance(0), common::silent_interrupts(), &NoProgress).unwrap();
    assert_eq!(rerun.batches, 0);
    assert_eq!(std::fs::read(dir.join("checkpoint_i0")).unwrap(), sibling_checkpoint);
    assert!(!dir.join(".transaction_lock_i1").exists());
    assert_eq!(common::duplicate_set(dir), single_instance_duplicates());
}
