use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Bytes,
    Pairs,
}

/// Receives progress for long-running phases (table load, pair scan).
pub trait ProgressObserver: Send + Sync {
    fn begin(&self, label: &str, total: u64, unit: Unit);
    fn advance(&self, delta: u64);
    fn finish(&self);
}

/// Discards all progress; used by tests and `--quiet`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn begin(&self, _label: &str, _total: u64, _unit: Unit) {}
    fn advance(&self, _delta: u64) {}
    fn finish(&self) {}
}

/// Terminal progress bars on stderr.
#[derive(Default)]
pub struct BarProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl BarProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn style(unit: Unit) -> ProgressStyle {
        let template = match unit {
            Unit::Bytes => "{msg} [{bar:40}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
            Unit::Pairs => "{msg} [{bar:40}] {human_pos}/{human_len} pairs ({per_sec}, {eta})",
        };
        ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ")
    }
}

impl ProgressObserver for BarProgress {
    fn begin(&self, label: &str, total: u64, unit: Unit) {
        let bar = ProgressBar::new(total);
        bar.set_style(Self::style(unit));
        bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(4));
        bar.set_message(label.to_string());

        let mut slot = self.bar.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = slot.replace(bar) {
            previous.finish_and_clear();
        }
    }

    fn advance(&self, delta: u64) {
        let slot = self.bar.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(bar) = slot.as_ref() {
            bar.inc(delta);
        }
    }

    fn finish(&self) {
        let mut slot = self.bar.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(bar) = slot.take() {
            bar.finish();
        }
    }
}
