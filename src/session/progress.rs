use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Frames written so far against the expected total.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    /// Frames completed.
    pub done: u64,
    /// Expected frame count; `0` when unknown.
    pub total: u64,
}

impl Progress {
    /// Completion ratio in `[0, 1]`, `None` when the total is unknown.
    pub fn fraction(&self) -> Option<f64> {
        (self.total > 0).then(|| (self.done as f64 / self.total as f64).min(1.0))
    }
}

/// Receives progress updates from the encode supervisor.
pub trait ProgressObserver {
    /// Called whenever the done counter advances.
    fn on_progress(&mut self, progress: Progress);
}

impl<F: FnMut(Progress)> ProgressObserver for F {
    fn on_progress(&mut self, progress: Progress) {
        self(progress)
    }
}

/// Logs progress through `tracing` in 10% steps.
#[derive(Debug)]
pub struct TracingProgress {
    label: String,
    last_step: Option<u64>,
}

impl TracingProgress {
    /// Observer that tags its log lines with `label`.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            last_step: None,
        }
    }
}

impl ProgressObserver for TracingProgress {
    fn on_progress(&mut self, progress: Progress) {
        let Some(fraction) = progress.fraction() else {
            return;
        };
        let step = (fraction * 10.0).floor() as u64;
        if self.last_step.is_some_and(|last| step <= last) {
            return;
        }
        self.last_step = Some(step);
        tracing::info!(
            job = %self.label,
            done = progress.done,
            total = progress.total,
            percent = step * 10,
            "encode progress"
        );
    }
}

/// Shared cancellation flag checked at frame boundaries and poll ticks.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh, un-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Every clone observes it.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/progress.rs"]
mod tests;
