//! The backup payload schema.
//!
//! A [`BackupPayload`] is built once per export, serialized (plain or through
//! the vault) and later replayed by the restorer. Decoding is a typed step:
//! a missing `likedTracks` or `playlists` field, or a field of the wrong
//! shape, fails with [`SyncError::MalformedPayload`] before anything else runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Result, SyncError};

/// Schema version written by this build.
pub const PAYLOAD_VERSION: u32 = 1;

fn default_version() -> u32 {
    PAYLOAD_VERSION
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Treat an explicit `null` like an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// The account a snapshot was taken from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountIdentity {
    pub id: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub display_name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub country: String,
}

/// One playlist with its ordered track ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub public: bool,

    #[serde(default, deserialize_with = "null_as_default")]
    pub collaborative: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub tracks: Vec<String>,

    /// The items could not be read at export time, so `tracks` is empty.
    #[serde(default, skip_serializing_if = "is_false")]
    pub tracks_unavailable: bool,

    /// Placeholder items (local files, removed tracks) left out of `tracks`.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub unavailable_tracks: usize,
}

impl PlaylistRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: String::new(),
            public: false,
            collaborative: false,
            owner_id: None,
            tracks: Vec::new(),
            tracks_unavailable: false,
            unavailable_tracks: 0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }

    pub fn with_tracks<I, S>(mut self, tracks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tracks = tracks.into_iter().map(Into::into).collect();
        self
    }
}

/// Counts written alongside an exported snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadSummary {
    pub liked_tracks: usize,
    pub playlists: usize,
    pub playlist_tracks: usize,
    #[serde(default)]
    pub followed_artists: usize,
    #[serde(default)]
    pub saved_albums: usize,
}

/// A complete library snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupPayload {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<AccountIdentity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<PayloadSummary>,

    pub liked_tracks: Vec<String>,

    pub playlists: Vec<PlaylistRecord>,

    #[serde(default)]
    pub followed_artists: Vec<String>,

    #[serde(default)]
    pub saved_albums: Vec<String>,
}

impl BackupPayload {
    /// An empty payload of the current version.
    pub fn new() -> Self {
        Self {
            version: PAYLOAD_VERSION,
            created_at: None,
            source: None,
            account: None,
            summary: None,
            liked_tracks: Vec::new(),
            playlists: Vec::new(),
            followed_artists: Vec::new(),
            saved_albums: Vec::new(),
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let payload: Self = serde_json::from_str(text).map_err(|e| SyncError::malformed(e.to_string()))?;
        payload.validate()?;
        Ok(payload)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(SyncError::malformed("payload is not a JSON object"));
        }
        let payload: Self = serde_json::from_value(value).map_err(|e| SyncError::malformed(e.to_string()))?;
        payload.validate()?;
        Ok(payload)
    }

    /// Serialize for a plain export. Fails with `MalformedPayload` when
    /// [`validate`](Self::validate) would reject the result on load.
    pub fn to_json_pretty(&self) -> Result<String> {
        self.validate()?;
        serde_json::to_string_pretty(self).map_err(|e| SyncError::malformed(e.to_string()))
    }

    /// Checks beyond the structural decode.
    pub fn validate(&self) -> Result<()> {
        if self.version == 0 || self.version > PAYLOAD_VERSION {
            return Err(SyncError::malformed(format!(
                "unsupported payload version {}",
                self.version
            )));
        }

        if self.liked_tracks.iter().any(|id| id.trim().is_empty()) {
            return Err(SyncError::malformed("likedTracks contains an empty id"));
        }

        for (index, playlist) in self.playlists.iter().enumerate() {
            if playlist.tracks.iter().any(|id| id.trim().is_empty()) {
                return Err(SyncError::malformed(format!(
                    "playlist {} ({:?}) contains an empty track id",
                    index, playlist.name
                )));
            }
        }

        Ok(())
    }

    /// Counts over the current contents.
    pub fn summarize(&self) -> PayloadSummary {
        PayloadSummary {
            liked_tracks: self.liked_tracks.len(),
            playlists: self.playlists.len(),
            playlist_tracks: self.playlists.iter().map(|p| p.tracks.len()).sum(),
            followed_artists: self.followed_artists.len(),
            saved_albums: self.saved_albums.len(),
        }
    }
}

impl Default for BackupPayload {
    fn default() -> Self {
        Self::new()
    }
}
