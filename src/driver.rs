use crate::batch_processor::{Batch, BatchOutcome, BatchProcessor};
use crate::config::{Context, DedupeConfig};
use crate::fingerprint::Fingerprint;
use crate::fingerprint_store::{self, FingerprintTable};
use crate::interrupt::Interrupts;
use crate::pairs::{self, Pair, Partition};
use crate::progress::{ProgressObserver, Unit};
use crate::DedupeError;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Offsets below the checkpoint: already committed, only counted.
    Skip,
    /// Accumulating pairs and committing full batches.
    Active,
    /// Range exhausted; commit whatever partial batch remains.
    Drain,
    Done,
}

/// Summary of one driver run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub partition: Partition,
    pub resumed_from: u64,
    pub batches: usize,
    pub pairs_processed: u64,
    pub duplicates: usize,
    pub failed_comparisons: usize,
}

impl RunReport {
    fn new(partition: Partition, resumed_from: u64) -> Self {
        Self {
            partition,
            resumed_from,
            batches: 0,
            pairs_processed: 0,
            duplicates: 0,
            failed_comparisons: 0,
        }
    }

    fn record(&mut self, outcome: &BatchOutcome) {
        self.batches += 1;
        self.pairs_processed += outcome.pairs();
        self.duplicates += outcome.duplicates;
        self.failed_comparisons += outcome.failed;
    }
}

/// Walks the instance's pair range in batch-sized steps, resuming after the
/// last committed batch.
pub struct Driver<'c> {
    context: &'c Context,
    progress: &'c dyn ProgressObserver,
}

impl<'c> Driver<'c> {
    pub fn new(context: &'c Context, progress: &'c dyn ProgressObserver) -> Self {
        Self { context, progress }
    }

    pub fn run(&self, pairs: &[Pair], table: &FingerprintTable) -> Result<RunReport, DedupeError> {
        let context = self.context;
        let partition = context.partition;
        if partition.end > pairs.len() as u64 {
            return Err(DedupeError::InvalidConfig(format!(
                "partition ends at {} but only {} pairs were loaded",
                partition.end,
                pairs.len()
            )));
        }

        context.checkpoints.recover_if_crashed()?;
        let resume = context.checkpoints.load()?;

        let processor = BatchProcessor::new(context);
        let mut report = RunReport::new(partition, resume);
        let mut batch = Batch::new(resume, context.config.batch_size);
        let mut offset = partition.start;
        let mut phase = if resume > partition.start {
            Phase::Skip
        } else {
            Phase::Active
        };

        self.progress.begin("Verifying pairs", partition.len(), Unit::Pairs);

        loop {
            match phase {
                Phase::Skip => {
                    self.progress.advance(resume - offset);
                    offset = resume;
                    phase = Phase::Active;
                }
                Phase::Active => {
                    if offset >= partition.end {
                        phase = Phase::Drain;
                        continue;
                    }

                    let pair = pairs[offset as usize];
                    let (a, b) = resolve(table, offset, pair)?;
                    batch.push(pair, a, b);
                    offset += 1;

                    if batch.is_full() {
                        self.commit(&processor, &batch, &mut report)?;
                        batch.reset(offset);
                    }
                }
                Phase::Drain => {
                    if !batch.is_empty() {
                        self.commit(&processor, &batch, &mut report)?;
                    }
                    phase = Phase::Done;
                }
                Phase::Done => break,
            }
        }

        self.progress.finish();
        info!(
            "Instance {} finished: {} batches, {} pairs, {} duplicates, {} failed comparisons",
            partition.instance_index,
            report.batches,
            report.pairs_processed,
            report.duplicates,
            report.failed_comparisons
        );
        Ok(report)
    }

    fn commit(
        &self,
        processor: &BatchProcessor<'_>,
        batch: &Batch<'_>,
        report: &mut RunReport,
    ) -> Result<(), DedupeError> {
        let outcome = processor.process(batch)?;
        report.record(&outcome);
        self.progress.advance(outcome.pairs());
        Ok(())
    }
}

fn resolve(
    table: &FingerprintTable,
    offset: u64,
    pair: Pair,
) -> Result<(&Fingerprint, &Fingerprint), DedupeError> {
    let lookup = |index: u64| {
        table.get(index).ok_or_else(|| DedupeError::DocumentOutOfRange {
            offset,
            index,
            document_count: table.len(),
        })
    };
    Ok((lookup(pair.a)?, lookup(pair.b)?))
}

/// Full startup sequence for one instance: pairs, partition, fingerprints,
/// then the driver loop.
pub fn run_instance(
    config: DedupeConfig,
    interrupts: Arc<Interrupts>,
    progress: &dyn ProgressObserver,
) -> Result<RunReport, DedupeError> {
    config.validate()?;

    let pairs_file = pairs::pairs_path(&config.working_dir);
    info!("Loading pairs file {}", pairs_file.display());
    let pairs = pairs::load_pairs(&pairs_file)?;

    let context = Context::new(config, pairs.len() as u64, interrupts)?;
    let partition = context.partition;
    info!("Total pairs: {}", pairs.len());
    info!("Number of instances: {}", partition.instance_count);
    info!("Currently running instance: {}", partition.instance_index);
    info!("Owned range: [{}, {}) ({} pairs)", partition.start, partition.end, partition.len());
    info!("Worker pool size: {}", context.pool.size());

    let table = fingerprint_store::load(
        &context.config.working_dir,
        context.config.document_count,
        context.config.shard_size,
        progress,
    )?;

    Driver::new(&context, progress).run(&pairs, &table)
}
