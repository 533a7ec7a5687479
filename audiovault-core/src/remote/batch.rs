//! Sequential batch mutations.

use std::future::Future;

use crate::error::Result;

/// Liked-track saves per request.
pub const LIKED_TRACKS_BATCH: usize = 50;

/// Playlist membership additions per request.
pub const PLAYLIST_TRACKS_BATCH: usize = 100;

/// Artist follows per request.
pub const ARTIST_FOLLOW_BATCH: usize = 50;

/// Album saves per request.
pub const ALBUM_SAVE_BATCH: usize = 20;

/// Cumulative progress reported after each batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    /// Items sent so far, including the last batch.
    pub completed: usize,
    pub total: usize,
    pub last_batch: usize,
}

/// Split `items` into groups of `batch_size` and send them one after another.
///
/// `on_progress` runs after every successful group. The first failing group
/// stops the run; groups already sent stay applied.
pub async fn run_batches<'a, T, F, Fut>(
    items: &'a [T],
    batch_size: usize,
    mut send: F,
    mut on_progress: impl FnMut(BatchProgress),
) -> Result<()>
where
    F: FnMut(&'a [T]) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let total = items.len();
    let mut completed = 0;

    for chunk in items.chunks(batch_size.max(1)) {
        send(chunk).await?;
        completed += chunk.len();
        on_progress(BatchProgress {
            completed,
            total,
            last_batch: chunk.len(),
        });
    }

    Ok(())
}
