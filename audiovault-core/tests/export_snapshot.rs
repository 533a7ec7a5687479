//! Integration tests for the snapshot builder, including a full
//! export, encrypt, decrypt and restore cycle between two accounts.

mod common;

use audiovault_core::{
    Artifact, LibraryExporter, PlaylistEntry, RestoreOptions, Restorer, SilentProgress, SyncError, Vault,
};
use common::{FakeLibrary, RecordingObserver};

fn source_account() -> FakeLibrary {
    let remote = FakeLibrary::for_user("jane")
        .with_playlist("p-zed", "zed mix", "", true, "jane")
        .with_playlist("p-alpha", "Alpha", "morning", false, "jane")
        .with_playlist("p-locked", "Locked", "", false, "bob")
        .with_items(
            "p-zed",
            vec![
                PlaylistEntry::Track("t1".to_string()),
                PlaylistEntry::Unavailable,
                PlaylistEntry::Track("t2".to_string()),
            ],
        )
        .with_items("p-alpha", vec![PlaylistEntry::Track("t3".to_string())])
        .with_forbidden("p-locked");
    *remote.liked.lock() = vec!["l1".into(), "l2".into()];
    *remote.artists.lock() = vec!["ar1".into()];
    *remote.albums.lock() = vec!["al1".into(), "al2".into()];
    remote
}

#[tokio::test]
async fn test_snapshot_contents() {
    let remote = source_account();
    let observer = RecordingObserver::default();

    let payload = LibraryExporter::new(&remote).snapshot(&observer).await.unwrap();

    assert_eq!(payload.account.as_ref().map(|a| a.id.as_str()), Some("jane"));
    assert_eq!(payload.source.as_deref(), Some("spotify"));
    assert!(payload.created_at.is_some());
    assert_eq!(payload.liked_tracks, vec!["l1", "l2"]);
    assert_eq!(payload.followed_artists, vec!["ar1"]);
    assert_eq!(payload.saved_albums, vec!["al1", "al2"]);

    let names: Vec<&str> = payload.playlists.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Alpha", "Locked", "zed mix"]);

    let zed = &payload.playlists[2];
    assert_eq!(zed.tracks, vec!["t1", "t2"]);
    assert_eq!(zed.unavailable_tracks, 1);
    assert!(zed.public);
    assert_eq!(zed.owner_id.as_deref(), Some("jane"));

    let locked = &payload.playlists[1];
    assert!(locked.tracks_unavailable);
    assert!(locked.tracks.is_empty());

    let summary = payload.summary.unwrap();
    assert_eq!(summary.playlists, 3);
    assert_eq!(summary.playlist_tracks, 3);
    assert_eq!(summary.liked_tracks, 2);

    assert_eq!(observer.percents.lock().last(), Some(&100));
    assert!(observer.statuses.lock().iter().any(|s| s == "Reading playlist 3/3: Locked"));
}

#[tokio::test]
async fn test_snapshot_aborts_on_non_forbidden_failure() {
    struct Broken(FakeLibrary);

    #[async_trait::async_trait]
    impl audiovault_core::LibraryRemote for Broken {
        async fn current_user(&self) -> audiovault_core::Result<audiovault_core::UserProfile> {
            self.0.current_user().await
        }
        async fn liked_track_ids(&self) -> audiovault_core::Result<Vec<String>> {
            Err(SyncError::ServerError {
                status: 500,
                path: "/me/tracks".to_string(),
            })
        }
        async fn playlists(&self) -> audiovault_core::Result<Vec<audiovault_core::RemotePlaylist>> {
            self.0.playlists().await
        }
        async fn playlist_entries(&self, id: &str) -> audiovault_core::Result<Vec<PlaylistEntry>> {
            self.0.playlist_entries(id).await
        }
        async fn followed_artist_ids(&self) -> audiovault_core::Result<Vec<String>> {
            self.0.followed_artist_ids().await
        }
        async fn saved_album_ids(&self) -> audiovault_core::Result<Vec<String>> {
            self.0.saved_album_ids().await
        }
        async fn save_liked_tracks(
            &self,
            ids: &[String],
            progress: &mut (dyn FnMut(audiovault_core::BatchProgress) + Send),
        ) -> audiovault_core::Result<()> {
            self.0.save_liked_tracks(ids, progress).await
        }
        async fn create_playlist(
            &self,
            user_id: &str,
            draft: &audiovault_core::PlaylistDraft,
        ) -> audiovault_core::Result<audiovault_core::RemotePlaylist> {
            self.0.create_playlist(user_id, draft).await
        }
        async fn add_tracks_to_playlist(
            &self,
            id: &str,
            ids: &[String],
            progress: &mut (dyn FnMut(audiovault_core::BatchProgress) + Send),
        ) -> audiovault_core::Result<()> {
            self.0.add_tracks_to_playlist(id, ids, progress).await
        }
        async fn follow_artists(
            &self,
            ids: &[String],
            progress: &mut (dyn FnMut(audiovault_core::BatchProgress) + Send),
        ) -> audiovault_core::Result<()> {
            self.0.follow_artists(ids, progress).await
        }
        async fn save_albums(
            &self,
            ids: &[String],
            progress: &mut (dyn FnMut(audiovault_core::BatchProgress) + Send),
        ) -> audiovault_core::Result<()> {
            self.0.save_albums(ids, progress).await
        }
    }

    let remote = Broken(source_account());
    let result = LibraryExporter::new(&remote).snapshot(&SilentProgress).await;
    assert!(matches!(result, Err(SyncError::ServerError { status: 500, .. })));
}

#[tokio::test]
async fn test_export_encrypt_restore_cycle() {
    let source = source_account();
    let payload = LibraryExporter::new(&source).snapshot(&SilentProgress).await.unwrap();

    let vault = Vault::with_iterations(1_000);
    let bundle = vault.encrypt(&payload, "a long passphrase").unwrap();
    let text = bundle.to_json_pretty().unwrap();

    let artifact = Artifact::parse(&text).unwrap();
    let restored_payload = artifact.into_payload(&vault, Some("a long passphrase")).unwrap();
    assert_eq!(restored_payload, payload);

    let target = FakeLibrary::for_user("sam");
    let summary = Restorer::new(&target)
        .restore(&restored_payload, RestoreOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.liked_restored, 2);
    assert_eq!(summary.created_playlists, 3);
    assert_eq!(summary.tracks_added, 3);
    assert_eq!(summary.followed_artists_restored, 1);
    assert_eq!(summary.saved_albums_restored, 2);
    assert_eq!(target.playlist_count(), 3);

    // A second run against the same account reuses everything.
    let again = Restorer::new(&target)
        .restore(&restored_payload, RestoreOptions::default())
        .await
        .unwrap();
    assert_eq!(again.created_playlists, 0);
    assert_eq!(again.reused_playlists, 3);
    assert_eq!(target.playlist_count(), 3);
}
