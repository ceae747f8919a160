//! Progress reporting and cancellation for the lag sweep.

use std::sync::atomic::{AtomicBool, Ordering};

/// Receives `(done, total)` updates from a long-running sweep.
pub trait SweepProgress {
    fn start(&mut self, total: usize);
    fn advance(&mut self, done: usize, total: usize);
    fn finish(&mut self);
}

/// Discards all updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl SweepProgress for NoProgress {
    fn start(&mut self, _total: usize) {}
    fn advance(&mut self, _done: usize, _total: usize) {}
    fn finish(&mut self) {}
}

/// Logs sweep progress at `info`, roughly every tenth of the way.
#[derive(Debug, Default)]
pub struct LogProgress {
    label: String,
    step: usize,
}

impl LogProgress {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            step: 1,
        }
    }
}

impl SweepProgress for LogProgress {
    fn start(&mut self, total: usize) {
        self.step = (total / 10).max(1);
        log::info!("{}: evaluating {total} lag(s)", self.label);
    }

    fn advance(&mut self, done: usize, total: usize) {
        if done % self.step == 0 || done == total {
            log::info!("{}: {done}/{total}", self.label);
        }
    }

    fn finish(&mut self) {
        log::debug!("{}: done", self.label);
    }
}

/// Progress sink plus an optional cancellation flag checked between lags.
pub struct SweepControl<'a> {
    progress: &'a mut dyn SweepProgress,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> SweepControl<'a> {
    pub fn new(progress: &'a mut dyn SweepProgress) -> Self {
        Self {
            progress,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: &'a AtomicBool) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Begin a run of `total` steps. `finish` fires when the guard drops,
    /// whether the sweep completed or bailed out with an error.
    pub(crate) fn start(&mut self, total: usize) -> ProgressGuard<'_, 'a> {
        self.progress.start(total);
        ProgressGuard { control: self }
    }
}

pub(crate) struct ProgressGuard<'c, 'a> {
    control: &'c mut SweepControl<'a>,
}

impl ProgressGuard<'_, '_> {
    pub(crate) fn is_cancelled(&self) -> bool {
        self.control
            .cancel
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    pub(crate) fn advance(&mut self, done: usize, total: usize) {
        self.control.progress.advance(done, total);
    }
}

impl Drop for ProgressGuard<'_, '_> {
    fn drop(&mut self) {
        self.control.progress.finish();
    }
}
