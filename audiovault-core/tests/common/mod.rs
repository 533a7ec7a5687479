//! In-memory library double shared by the restore and export suites.

#![allow(dead_code)]

use std::collections::HashMap;

use async_trait::async_trait;
use audiovault_core::{
    BatchProgress, LibraryRemote, PlaylistDraft, PlaylistEntry, ProgressObserver, RemotePlaylist,
    RestoreCounts, Result, SyncError, UserProfile,
    remote::types::Owner,
};
use parking_lot::Mutex;

/// A remote account kept in memory. Every mutation is recorded.
#[derive(Default)]
pub struct FakeLibrary {
    pub user_id: String,
    pub liked: Mutex<Vec<String>>,
    pub playlists: Mutex<Vec<RemotePlaylist>>,
    pub items: Mutex<HashMap<String, Vec<PlaylistEntry>>>,
    pub forbidden: Mutex<Vec<String>>,
    pub artists: Mutex<Vec<String>>,
    pub albums: Mutex<Vec<String>>,
    pub created: Mutex<Vec<PlaylistDraft>>,
    pub liked_batches: Mutex<Vec<usize>>,
    pub fail_create: Mutex<Option<String>>,
}

impl FakeLibrary {
    pub fn for_user(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            ..Default::default()
        }
    }

    pub fn with_playlist(self, id: &str, name: &str, description: &str, public: bool, owner: &str) -> Self {
        self.playlists.lock().push(remote_playlist(id, name, description, public, owner));
        self
    }

    pub fn with_items(self, id: &str, entries: Vec<PlaylistEntry>) -> Self {
        self.items.lock().insert(id.to_string(), entries);
        self
    }

    pub fn with_forbidden(self, id: &str) -> Self {
        self.forbidden.lock().push(id.to_string());
        self
    }

    pub fn tracks_of(&self, playlist_id: &str) -> Vec<String> {
        self.items
            .lock()
            .get(playlist_id)
            .map(|entries| entries.iter().filter_map(|e| e.track_id().map(str::to_owned)).collect())
            .unwrap_or_default()
    }

    pub fn playlist_count(&self) -> usize {
        self.playlists.lock().len()
    }
}

pub fn remote_playlist(id: &str, name: &str, description: &str, public: bool, owner: &str) -> RemotePlaylist {
    RemotePlaylist {
        id: id.to_string(),
        name: name.to_string(),
        description: Some(description.to_string()),
        public: Some(public),
        collaborative: false,
        owner: Some(Owner { id: owner.to_string() }),
    }
}

fn report(progress: &mut (dyn FnMut(BatchProgress) + Send), size: usize, ids: &[String]) {
    let mut completed = 0;
    for chunk in ids.chunks(size) {
        completed += chunk.len();
        progress(BatchProgress {
            completed,
            total: ids.len(),
            last_batch: chunk.len(),
        });
    }
}

#[async_trait]
impl LibraryRemote for FakeLibrary {
    async fn current_user(&self) -> Result<UserProfile> {
        Ok(UserProfile {
            id: self.user_id.clone(),
            display_name: Some("Test User".to_string()),
            country: Some("SE".to_string()),
        })
    }

    async fn liked_track_ids(&self) -> Result<Vec<String>> {
        Ok(self.liked.lock().clone())
    }

    async fn playlists(&self) -> Result<Vec<RemotePlaylist>> {
        Ok(self.playlists.lock().clone())
    }

    async fn playlist_entries(&self, playlist_id: &str) -> Result<Vec<PlaylistEntry>> {
        if self.forbidden.lock().iter().any(|id| id == playlist_id) {
            return Err(SyncError::RemoteRequestFailed {
                status: 403,
                path: format!("/playlists/{}", playlist_id),
                body: String::new(),
            });
        }
        Ok(self.items.lock().get(playlist_id).cloned().unwrap_or_default())
    }

    async fn followed_artist_ids(&self) -> Result<Vec<String>> {
        Ok(self.artists.lock().clone())
    }

    async fn saved_album_ids(&self) -> Result<Vec<String>> {
        Ok(self.albums.lock().clone())
    }

    async fn save_liked_tracks(
        &self,
        track_ids: &[String],
        progress: &mut (dyn FnMut(BatchProgress) + Send),
    ) -> Result<()> {
        for chunk in track_ids.chunks(50) {
            self.liked.lock().extend(chunk.iter().cloned());
            self.liked_batches.lock().push(chunk.len());
        }
        report(progress, 50, track_ids);
        Ok(())
    }

    async fn create_playlist(&self, user_id: &str, draft: &PlaylistDraft) -> Result<RemotePlaylist> {
        if self.fail_create.lock().as_deref() == Some(draft.name.as_str()) {
            return Err(SyncError::RemoteRequestFailed {
                status: 400,
                path: format!("/users/{}/playlists", user_id),
                body: "rejected".to_string(),
            });
        }

        let id = format!("created-{}", self.created.lock().len() + 1);
        let playlist = remote_playlist(&id, &draft.name, &draft.description, draft.public, user_id);
        self.created.lock().push(draft.clone());
        self.playlists.lock().push(playlist.clone());
        Ok(playlist)
    }

    async fn add_tracks_to_playlist(
        &self,
        playlist_id: &str,
        track_ids: &[String],
        progress: &mut (dyn FnMut(BatchProgress) + Send),
    ) -> Result<()> {
        self.items
            .lock()
            .entry(playlist_id.to_string())
            .or_default()
            .extend(track_ids.iter().cloned().map(PlaylistEntry::Track));
        report(progress, 100, track_ids);
        Ok(())
    }

    async fn follow_artists(
        &self,
        artist_ids: &[String],
        progress: &mut (dyn FnMut(BatchProgress) + Send),
    ) -> Result<()> {
        self.artists.lock().extend(artist_ids.iter().cloned());
        report(progress, 50, artist_ids);
        Ok(())
    }

    async fn save_albums(
        &self,
        album_ids: &[String],
        progress: &mut (dyn FnMut(BatchProgress) + Send),
    ) -> Result<()> {
        self.albums.lock().extend(album_ids.iter().cloned());
        report(progress, 20, album_ids);
        Ok(())
    }
}

/// Records every progress event.
#[derive(Default)]
pub struct RecordingObserver {
    pub statuses: Mutex<Vec<String>>,
    pub percents: Mutex<Vec<u8>>,
    pub counts: Mutex<Vec<RestoreCounts>>,
}

impl ProgressObserver for RecordingObserver {
    fn status(&self, message: &str) {
        self.statuses.lock().push(message.to_string());
    }

    fn percent(&self, percent: u8) {
        self.percents.lock().push(percent);
    }

    fn counts(&self, counts: RestoreCounts) {
        self.counts.lock().push(counts);
    }
}
