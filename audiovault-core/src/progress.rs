//! Progress reporting for long-running export and restore runs.

use serde::Serialize;

/// Liked-track and playlist counts during a restore.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreCounts {
    pub liked_done: usize,
    pub liked_total: usize,
    pub playlists_done: usize,
    pub playlists_total: usize,
}

impl RestoreCounts {
    /// Overall completion in `0..=100`, each liked track and playlist weighing one.
    pub fn percent(&self) -> u8 {
        let total = self.liked_total + self.playlists_total;
        if total == 0 {
            return 100;
        }
        let done = (self.liked_done + self.playlists_done).min(total);
        ((done * 100) / total) as u8
    }
}

/// Receives progress events. Called synchronously from the engine's single
/// control flow; every method defaults to doing nothing.
pub trait ProgressObserver: Send + Sync {
    fn status(&self, _message: &str) {}

    fn percent(&self, _percent: u8) {}

    fn counts(&self, _counts: RestoreCounts) {}
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentProgress;

impl ProgressObserver for SilentProgress {}

/// Forwards status messages to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn status(&self, message: &str) {
        tracing::info!("{}", message);
    }

    fn percent(&self, percent: u8) {
        tracing::debug!("{}% complete", percent);
    }
}
