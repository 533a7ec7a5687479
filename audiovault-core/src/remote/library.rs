//! Typed library operations over [`RemoteClient`].

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Map, Value, json};

use super::batch::{
    ALBUM_SAVE_BATCH, ARTIST_FOLLOW_BATCH, BatchProgress, LIKED_TRACKS_BATCH, PLAYLIST_TRACKS_BATCH,
    run_batches,
};
use super::paging::{CursorPage, Page, collect_cursor_pages, collect_offset_pages, decode_lenient, ids_at};
use super::types::{
    FollowedArtists, PagingObject, PlaylistDraft, PlaylistEntry, PlaylistWithItems, RemotePlaylist,
    UserProfile,
};
use super::RemoteClient;
use crate::error::{Result, SyncError};

const LIKED_PAGE: usize = 50;
const PLAYLISTS_PAGE: usize = 50;
const PLAYLIST_ITEMS_PAGE: usize = 100;
const ALBUMS_PAGE: usize = 50;
const ARTISTS_PAGE: usize = 50;

/// The library operations export and restore are written against.
///
/// Mutations report cumulative [`BatchProgress`] after every request.
#[async_trait]
pub trait LibraryRemote: Send + Sync {
    async fn current_user(&self) -> Result<UserProfile>;

    async fn liked_track_ids(&self) -> Result<Vec<String>>;

    /// Every playlist visible to the account, including ones it only follows.
    async fn playlists(&self) -> Result<Vec<RemotePlaylist>>;

    /// Ordered items of one playlist.
    ///
    /// Fails with a forbidden [`SyncError::RemoteRequestFailed`] only if the
    /// alternate fetch is forbidden too; callers decide whether to skip.
    async fn playlist_entries(&self, playlist_id: &str) -> Result<Vec<PlaylistEntry>>;

    async fn followed_artist_ids(&self) -> Result<Vec<String>>;

    async fn saved_album_ids(&self) -> Result<Vec<String>>;

    async fn save_liked_tracks(
        &self,
        track_ids: &[String],
        progress: &mut (dyn FnMut(BatchProgress) + Send),
    ) -> Result<()>;

    async fn create_playlist(&self, user_id: &str, draft: &PlaylistDraft) -> Result<RemotePlaylist>;

    async fn add_tracks_to_playlist(
        &self,
        playlist_id: &str,
        track_ids: &[String],
        progress: &mut (dyn FnMut(BatchProgress) + Send),
    ) -> Result<()>;

    async fn follow_artists(
        &self,
        artist_ids: &[String],
        progress: &mut (dyn FnMut(BatchProgress) + Send),
    ) -> Result<()>;

    async fn save_albums(
        &self,
        album_ids: &[String],
        progress: &mut (dyn FnMut(BatchProgress) + Send),
    ) -> Result<()>;
}

/// [`LibraryRemote`] backed by the Spotify Web API.
#[derive(Debug, Clone)]
pub struct SpotifyLibrary {
    client: RemoteClient,
}

impl SpotifyLibrary {
    pub fn new(client: RemoteClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &RemoteClient {
        &self.client
    }

    async fn page(&self, path: String) -> Result<PagingObject> {
        self.client.get_json(&path).await
    }

    async fn playlist_entries_paged(&self, playlist_id: &str) -> Result<Vec<PlaylistEntry>> {
        collect_offset_pages(PLAYLIST_ITEMS_PAGE, |offset| async move {
            let page = self
                .page(format!(
                    "/playlists/{}/tracks?fields=items(track(id)),next&limit={}&offset={}",
                    playlist_id, PLAYLIST_ITEMS_PAGE, offset
                ))
                .await?;
            Ok(Page {
                items: page.items.iter().map(PlaylistEntry::from_item).collect(),
                has_next: page.next.is_some(),
            })
        })
        .await
    }

    /// Read items embedded in the playlist object and follow its `next` links.
    ///
    /// The `next` links lead back to the items endpoint. If that is still
    /// forbidden, the entries read so far are returned.
    async fn playlist_entries_embedded(&self, playlist_id: &str) -> Result<Vec<PlaylistEntry>> {
        let playlist: PlaylistWithItems = self.client.get_json(&format!("/playlists/{}", playlist_id)).await?;

        let mut page = playlist.tracks.unwrap_or_default();
        let mut entries = Vec::new();
        loop {
            entries.extend(page.items.iter().map(PlaylistEntry::from_item));
            let Some(next) = page.next.take() else {
                break;
            };
            page = match self.page(next).await {
                Ok(page) => page,
                Err(e) if e.is_forbidden() => {
                    tracing::warn!(
                        "Further items of playlist {} are forbidden; keeping the first {}",
                        playlist_id,
                        entries.len()
                    );
                    break;
                }
                Err(e) => return Err(e),
            };
        }

        Ok(entries)
    }

    async fn send_ids(&self, path: &str, method: Method, key: &str, ids: &[String]) -> Result<()> {
        let mut body = Map::new();
        body.insert(key.to_string(), json!(ids));
        let body = Value::Object(body);
        self.client.call(path, method, Some(&body)).await?;
        Ok(())
    }
}

#[async_trait]
impl LibraryRemote for SpotifyLibrary {
    async fn current_user(&self) -> Result<UserProfile> {
        self.client.get_json("/me").await
    }

    async fn liked_track_ids(&self) -> Result<Vec<String>> {
        collect_offset_pages(LIKED_PAGE, |offset| async move {
            let page = self
                .page(format!("/me/tracks?limit={}&offset={}", LIKED_PAGE, offset))
                .await?;
            Ok(Page {
                items: ids_at(&page.items, "/track/id", "liked track"),
                has_next: page.next.is_some(),
            })
        })
        .await
    }

    async fn playlists(&self) -> Result<Vec<RemotePlaylist>> {
        collect_offset_pages(PLAYLISTS_PAGE, |offset| async move {
            let page = self
                .page(format!("/me/playlists?limit={}&offset={}", PLAYLISTS_PAGE, offset))
                .await?;
            Ok(Page {
                has_next: page.next.is_some(),
                items: decode_lenient(page.items, "playlist"),
            })
        })
        .await
    }

    async fn playlist_entries(&self, playlist_id: &str) -> Result<Vec<PlaylistEntry>> {
        match self.playlist_entries_paged(playlist_id).await {
            Err(e) if e.is_forbidden() => {
                tracing::warn!(
                    "Items of playlist {} are forbidden; reading them from the playlist object",
                    playlist_id
                );
                self.playlist_entries_embedded(playlist_id).await
            }
            other => other,
        }
    }

    async fn followed_artist_ids(&self) -> Result<Vec<String>> {
        collect_cursor_pages(|cursor: Option<String>| async move {
            let mut path = format!("/me/following?type=artist&limit={}", ARTISTS_PAGE);
            if let Some(after) = cursor {
                path.push_str("&after=");
                path.push_str(&after);
            }
            let response: FollowedArtists = self.client.get_json(&path).await?;
            Ok(CursorPage {
                next_cursor: response.artists.next_cursor(),
                items: ids_at(&response.artists.items, "/id", "followed artist"),
            })
        })
        .await
    }

    async fn saved_album_ids(&self) -> Result<Vec<String>> {
        collect_offset_pages(ALBUMS_PAGE, |offset| async move {
            let page = self
                .page(format!("/me/albums?limit={}&offset={}", ALBUMS_PAGE, offset))
                .await?;
            Ok(Page {
                items: ids_at(&page.items, "/album/id", "saved album"),
                has_next: page.next.is_some(),
            })
        })
        .await
    }

    async fn save_liked_tracks(
        &self,
        track_ids: &[String],
        progress: &mut (dyn FnMut(BatchProgress) + Send),
    ) -> Result<()> {
        run_batches(
            track_ids,
            LIKED_TRACKS_BATCH,
            |chunk| self.send_ids("/me/tracks", Method::PUT, "ids", chunk),
            progress,
        )
        .await
    }

    async fn create_playlist(&self, user_id: &str, draft: &PlaylistDraft) -> Result<RemotePlaylist> {
        let path = format!("/users/{}/playlists", user_id);
        let body = serde_json::to_value(draft).map_err(|e| SyncError::InvalidResponse {
            path: path.clone(),
            message: e.to_string(),
        })?;

        let created = self
            .client
            .call(&path, Method::POST, Some(&body))
            .await?
            .into_json()
            .ok_or_else(|| SyncError::InvalidResponse {
                path: path.clone(),
                message: "playlist creation returned no body".to_string(),
            })?;

        let playlist: RemotePlaylist = serde_json::from_value(created).map_err(|e| SyncError::InvalidResponse {
            path: path.clone(),
            message: e.to_string(),
        })?;

        tracing::info!("Created playlist {:?} ({})", playlist.name, playlist.id);
        Ok(playlist)
    }

    async fn add_tracks_to_playlist(
        &self,
        playlist_id: &str,
        track_ids: &[String],
        progress: &mut (dyn FnMut(BatchProgress) + Send),
    ) -> Result<()> {
        let uris: Vec<String> = track_ids.iter().map(|id| format!("spotify:track:{}", id)).collect();
        let path = format!("/playlists/{}/tracks", playlist_id);

        run_batches(
            &uris,
            PLAYLIST_TRACKS_BATCH,
            |chunk| self.send_ids(&path, Method::POST, "uris", chunk),
            progress,
        )
        .await
    }

    async fn follow_artists(
        &self,
        artist_ids: &[String],
        progress: &mut (dyn FnMut(BatchProgress) + Send),
    ) -> Result<()> {
        run_batches(
            artist_ids,
            ARTIST_FOLLOW_BATCH,
            |chunk| self.send_ids("/me/following?type=artist", Method::PUT, "ids", chunk),
            progress,
        )
        .await
    }

    async fn save_albums(
        &self,
        album_ids: &[String],
        progress: &mut (dyn FnMut(BatchProgress) + Send),
    ) -> Result<()> {
        run_batches(
            album_ids,
            ALBUM_SAVE_BATCH,
            |chunk| self.send_ids("/me/albums", Method::PUT, "ids", chunk),
            progress,
        )
        .await
    }
}
