//! Replaying a backup payload into an account without creating duplicates.
//!
//! Playlists are matched by [`PlaylistSignature`]: trimmed, case-folded name
//! and description plus the exact visibility flag. Only playlists owned by the
//! signed-in account are eligible for reuse, and every playlist created during
//! a run joins the index so a later payload entry with the same signature
//! lands in it instead of creating a second copy.
//!
//! Restore is not transactional. An error stops the run and propagates; the
//! mutations already applied stay applied and no summary is returned.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::Result;
use crate::payload::{BackupPayload, PlaylistRecord};
use crate::progress::{ProgressObserver, RestoreCounts, SilentProgress};
use crate::remote::{BatchProgress, LibraryRemote, PlaylistDraft, RemotePlaylist};

/// Order-independent identity of a playlist for duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlaylistSignature {
    name: String,
    description: String,
    public: bool,
}

impl PlaylistSignature {
    pub fn new(name: &str, description: &str, public: bool) -> Self {
        Self {
            name: normalize(name),
            description: normalize(description),
            public,
        }
    }

    pub fn of_record(record: &PlaylistRecord) -> Self {
        Self::new(&record.name, &record.description, record.public)
    }

    pub fn of_remote(playlist: &RemotePlaylist) -> Self {
        Self::new(&playlist.name, playlist.description(), playlist.is_public())
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// How a restore run behaves.
#[derive(Clone, Copy)]
pub struct RestoreOptions<'a> {
    /// Reuse the account's own playlists whose signature matches.
    pub reuse_existing: bool,

    pub observer: &'a dyn ProgressObserver,
}

impl Default for RestoreOptions<'_> {
    fn default() -> Self {
        Self {
            reuse_existing: true,
            observer: &SilentProgress,
        }
    }
}

impl<'a> RestoreOptions<'a> {
    pub fn with_reuse_existing(mut self, reuse_existing: bool) -> Self {
        self.reuse_existing = reuse_existing;
        self
    }

    pub fn with_observer(mut self, observer: &'a dyn ProgressObserver) -> Self {
        self.observer = observer;
        self
    }
}

impl std::fmt::Debug for RestoreOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestoreOptions")
            .field("reuse_existing", &self.reuse_existing)
            .finish_non_exhaustive()
    }
}

/// Counters of a completed restore run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreSummary {
    pub liked_restored: usize,
    pub created_playlists: usize,
    pub reused_playlists: usize,
    pub tracks_added: usize,
    pub followed_artists_restored: usize,
    pub saved_albums_restored: usize,
}

/// Replays payloads through a [`LibraryRemote`].
pub struct Restorer<'r, R: ?Sized> {
    remote: &'r R,
}

impl<'r, R: LibraryRemote + ?Sized> Restorer<'r, R> {
    pub fn new(remote: &'r R) -> Self {
        Self { remote }
    }

    pub async fn restore(&self, payload: &BackupPayload, options: RestoreOptions<'_>) -> Result<RestoreSummary> {
        payload.validate()?;
        let observer = options.observer;

        let user = self.remote.current_user().await?;
        tracing::info!(
            "Restoring {} liked tracks and {} playlists into account {}",
            payload.liked_tracks.len(),
            payload.playlists.len(),
            user.id
        );

        let mut summary = RestoreSummary::default();
        let mut counts = RestoreCounts {
            liked_done: 0,
            liked_total: payload.liked_tracks.len(),
            playlists_done: 0,
            playlists_total: payload.playlists.len(),
        };
        report(observer, counts);

        observer.status("Restoring liked songs...");
        self.remote
            .save_liked_tracks(&payload.liked_tracks, &mut |progress: BatchProgress| {
                counts.liked_done = progress.completed;
                report(observer, counts);
            })
            .await?;
        summary.liked_restored = payload.liked_tracks.len();

        if !payload.followed_artists.is_empty() {
            observer.status("Restoring followed artists...");
            self.remote
                .follow_artists(&payload.followed_artists, &mut |_: BatchProgress| {})
                .await?;
            summary.followed_artists_restored = payload.followed_artists.len();
        }

        if !payload.saved_albums.is_empty() {
            observer.status("Restoring saved albums...");
            self.remote.save_albums(&payload.saved_albums, &mut |_: BatchProgress| {}).await?;
            summary.saved_albums_restored = payload.saved_albums.len();
        }

        let mut index = HashMap::new();
        if options.reuse_existing {
            observer.status("Checking existing playlists for duplicates...");
            index = self.own_playlists_by_signature(&user.id).await?;
        }

        for record in &payload.playlists {
            let signature = PlaylistSignature::of_record(record);

            let target_id = match index.get(&signature).filter(|_| options.reuse_existing) {
                Some(existing) => {
                    observer.status(&format!("Reusing playlist: {}", record.name));
                    tracing::debug!("Reusing playlist {} for {:?}", existing, record.name);
                    summary.reused_playlists += 1;
                    existing.clone()
                }
                None => {
                    observer.status(&format!("Creating playlist: {}", record.name));
                    let draft = PlaylistDraft {
                        name: record.name.clone(),
                        description: record.description.clone(),
                        public: record.public,
                    };
                    let created = self.remote.create_playlist(&user.id, &draft).await?;
                    summary.created_playlists += 1;
                    if options.reuse_existing {
                        index.insert(signature, created.id.clone());
                    }
                    created.id
                }
            };

            if !record.tracks.is_empty() {
                observer.status(&format!("Adding tracks: {}", record.name));
                self.remote
                    .add_tracks_to_playlist(&target_id, &record.tracks, &mut |progress: BatchProgress| {
                        observer.status(&format!(
                            "Adding tracks: {} ({}/{})",
                            record.name, progress.completed, progress.total
                        ));
                    })
                    .await?;
                summary.tracks_added += record.tracks.len();
            }

            counts.playlists_done += 1;
            report(observer, counts);
        }

        observer.status("Restore complete.");
        tracing::info!(
            "Restore complete: {} liked, {} created, {} reused, {} tracks added",
            summary.liked_restored,
            summary.created_playlists,
            summary.reused_playlists,
            summary.tracks_added
        );

        Ok(summary)
    }

    /// Index the account's own playlists. The first playlist listed for a
    /// signature wins.
    async fn own_playlists_by_signature(&self, user_id: &str) -> Result<HashMap<PlaylistSignature, String>> {
        let mut index = HashMap::new();
        for playlist in self.remote.playlists().await? {
            if playlist.owner_id() != Some(user_id) {
                continue;
            }
            index
                .entry(PlaylistSignature::of_remote(&playlist))
                .or_insert(playlist.id);
        }
        tracing::debug!("Indexed {} owned playlists for reuse", index.len());
        Ok(index)
    }
}

fn report(observer: &dyn ProgressObserver, counts: RestoreCounts) {
    observer.counts(counts);
    observer.percent(counts.percent());
}
