//! Progress reporting hooks.
//!
//! Long-running stages announce themselves through a [`ProgressObserver`].
//! Observers only watch; nothing they do feeds back into the computation.

/// Receives progress events from the experiment and its parallel stages.
///
/// All methods default to no-ops. Implementations must be callable from
/// worker threads.
pub trait ProgressObserver: Send + Sync {
    fn stage_started(&self, _stage: &str, _total: usize) {}

    fn item_completed(&self, _stage: &str, _done: usize, _total: usize) {}

    fn stage_finished(&self, _stage: &str) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {}

/// Observer that reports through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn stage_started(&self, stage: &str, total: usize) {
        log::info!("{stage}: started ({total} items)");
    }

    fn item_completed(&self, stage: &str, done: usize, total: usize) {
        log::debug!("{stage}: {done}/{total}");
    }

    fn stage_finished(&self, stage: &str) {
        log::info!("{stage}: done");
    }
}
