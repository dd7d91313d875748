use clap::Parser;
use dedupe::config::{default_process_count, DedupeConfig, DEFAULT_BATCH_SIZE};
use dedupe::driver::run_instance;
use dedupe::fingerprint::DEFAULT_THRESHOLD;
use dedupe::fingerprint_store::DEFAULT_SHARD_SIZE;
use dedupe::interrupt::Interrupts;
use dedupe::progress::{BarProgress, NoProgress, ProgressObserver};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "dedupe")]
#[command(
    about = "Distributed near-duplicate verification over MinHash fingerprints",
    long_about = None
)]
struct Cli {
    /// Directory holding the pair file, fingerprint shards, checkpoints and outputs
    #[arg(short = 'd', long, default_value = ".")]
    working_directory: PathBuf,

    /// Size of the comparison worker pool (defaults to available parallelism)
    #[arg(short = 'p', long)]
    process_count: Option<usize>,

    /// Total number of instances sharing the pair list
    #[arg(long, default_value_t = 1)]
    instance_count: usize,

    /// Zero-based index of this instance
    #[arg(long, default_value_t = 0)]
    instance: usize,

    /// Number of documents in the corpus
    #[arg(long)]
    document_count: u64,

    /// Pairs per committed batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Documents per fingerprint shard; must match the fingerprinting stage
    #[arg(long, default_value_t = DEFAULT_SHARD_SIZE)]
    shard_size: u64,

    /// Estimated similarity a pair must exceed to count as a duplicate
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: f64,

    /// Disable progress bars
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn config(&self) -> DedupeConfig {
        DedupeConfig {
            working_dir: self.working_directory.clone(),
            process_count: self.process_count.unwrap_or_else(default_process_count),
            instance_count: self.instance_count,
            instance_index: self.instance,
            document_count: self.document_count,
            batch_size: self.batch_size,
            shard_size: self.shard_size,
            threshold: self.threshold,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    dedupe::logging::init_tracing("dedupe");

    let interrupts = Interrupts::exiting();
    let _listener = match interrupts.register_signals() {
        Ok(listener) => Some(listener),
        Err(e) => {
            warn!(
                "Could not install signal handlers, commits are not shielded from interrupts: {}",
                e
            );
            None
        }
    };

    let progress: Box<dyn ProgressObserver> = if cli.quiet {
        Box::new(NoProgress)
    } else {
        Box::new(BarProgress::new())
    };

    match run_instance(cli.config(), interrupts.clone(), progress.as_ref()) {
        Ok(report) => {
            info!(
                "Done: range [{}, {}), resumed from {}, {} duplicates in {} pairs",
                report.partition.start,
                report.partition.end,
                report.resumed_from,
                report.duplicates,
                report.pairs_processed
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
