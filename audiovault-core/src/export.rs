//! Building a library snapshot from the remote account.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::Result;
use crate::payload::{AccountIdentity, BackupPayload, PAYLOAD_VERSION, PlaylistRecord};
use crate::progress::ProgressObserver;
use crate::remote::{LibraryRemote, PlaylistEntry, RemotePlaylist};

/// Value of the payload's `source` field.
pub const SNAPSHOT_SOURCE: &str = "spotify";

/// Reads the whole library, one request at a time, into a [`BackupPayload`].
pub struct LibraryExporter<'r, R: ?Sized> {
    remote: &'r R,
}

impl<'r, R: LibraryRemote + ?Sized> LibraryExporter<'r, R> {
    pub fn new(remote: &'r R) -> Self {
        Self { remote }
    }

    /// Fetch profile, liked tracks, playlists with their items, followed
    /// artists and saved albums, strictly in that order.
    ///
    /// A playlist whose items stay forbidden is kept with an empty track list
    /// and `tracksUnavailable` set. Any other failure aborts the snapshot.
    pub async fn snapshot(&self, observer: &dyn ProgressObserver) -> Result<BackupPayload> {
        observer.status("Reading profile...");
        observer.percent(0);
        let user = self.remote.current_user().await?;

        observer.status("Reading liked songs...");
        let liked_tracks = self.remote.liked_track_ids().await?;

        observer.status("Reading playlists...");
        let listed = self.remote.playlists().await?;
        let total = listed.len();

        let mut playlists = Vec::with_capacity(total);
        for (index, playlist) in listed.into_iter().enumerate() {
            observer.status(&format!(
                "Reading playlist {}/{}: {}",
                index + 1,
                total,
                playlist.name
            ));
            playlists.push(self.playlist_record(playlist).await?);
            observer.percent((((index + 1) * 100) / total) as u8);
        }
        playlists.sort_by_cached_key(|p| p.name.to_lowercase());

        observer.status("Reading followed artists...");
        let followed_artists = self.remote.followed_artist_ids().await?;

        observer.status("Reading saved albums...");
        let saved_albums = self.remote.saved_album_ids().await?;

        let mut payload = BackupPayload {
            version: PAYLOAD_VERSION,
            created_at: Some(Utc::now()),
            source: Some(SNAPSHOT_SOURCE.to_string()),
            account: Some(AccountIdentity {
                id: user.id,
                display_name: user.display_name.unwrap_or_default(),
                country: user.country.unwrap_or_default(),
            }),
            summary: None,
            liked_tracks,
            playlists,
            followed_artists,
            saved_albums,
        };
        let summary = payload.summarize();
        payload.summary = Some(summary);

        observer.status("Snapshot complete.");
        observer.percent(100);
        tracing::info!(
            "Snapshot: {} liked tracks, {} playlists ({} tracks), {} artists, {} albums",
            summary.liked_tracks,
            summary.playlists,
            summary.playlist_tracks,
            summary.followed_artists,
            summary.saved_albums
        );

        Ok(payload)
    }

    async fn playlist_record(&self, playlist: RemotePlaylist) -> Result<PlaylistRecord> {
        let entries = match self.remote.playlist_entries(&playlist.id).await {
            Ok(entries) => Some(entries),
            Err(e) if e.is_forbidden() => {
                tracing::warn!(
                    "Skipping items of playlist {:?} ({}): access forbidden",
                    playlist.name,
                    playlist.id
                );
                None
            }
            Err(e) => return Err(e),
        };

        let tracks_unavailable = entries.is_none();
        let entries = entries.unwrap_or_default();
        let tracks: Vec<String> = entries
            .iter()
            .filter_map(PlaylistEntry::track_id)
            .map(str::to_owned)
            .collect();
        let unavailable_tracks = entries.len() - tracks.len();

        Ok(PlaylistRecord {
            description: playlist.description().to_string(),
            public: playlist.is_public(),
            collaborative: playlist.collaborative,
            owner_id: playlist.owner_id().map(str::to_owned),
            id: Some(playlist.id),
            name: playlist.name,
            tracks,
            tracks_unavailable,
            unavailable_tracks,
        })
    }
}

/// Default file name for an export of `user_id`'s library taken at `at`.
pub fn export_file_name(user_id: &str, at: DateTime<Utc>) -> String {
    let safe_user: String = if user_id.is_empty() {
        "spotify-user".to_string()
    } else {
        user_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    };
    let stamp = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");

    format!("audio-vault-library-{}-{}.json", safe_user, stamp)
}
