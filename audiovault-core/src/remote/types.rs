//! Wire shapes of the library API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The signed-in account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,

    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: String,
}

/// A playlist as listed by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePlaylist {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub public: Option<bool>,

    #[serde(default)]
    pub collaborative: bool,

    #[serde(default)]
    pub owner: Option<Owner>,
}

impl RemotePlaylist {
    pub fn owner_id(&self) -> Option<&str> {
        self.owner.as_ref().map(|o| o.id.as_str())
    }

    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or_default()
    }

    /// Unknown visibility counts as private.
    pub fn is_public(&self) -> bool {
        self.public.unwrap_or(false)
    }
}

/// Metadata for a playlist to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaylistDraft {
    pub name: String,
    pub description: String,
    pub public: bool,
}

/// One position in a playlist.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PlaylistEntry {
    Track(String),

    /// Local file, removed track or malformed record. Kept as a placeholder
    /// so a single bad item never fails the listing.
    Unavailable,
}

impl PlaylistEntry {
    /// Read an entry from a raw playlist item (`{"track": {"id": ...}}`).
    pub fn from_item(item: &Value) -> Self {
        match item.pointer("/track/id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => PlaylistEntry::Track(id.to_string()),
            _ => PlaylistEntry::Unavailable,
        }
    }

    pub fn track_id(&self) -> Option<&str> {
        match self {
            PlaylistEntry::Track(id) => Some(id),
            PlaylistEntry::Unavailable => None,
        }
    }
}

/// An offset-paginated listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PagingObject {
    #[serde(default)]
    pub items: Vec<Value>,

    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Cursors {
    #[serde(default)]
    pub after: Option<String>,
}

/// A cursor-paginated listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CursorPagingObject {
    #[serde(default)]
    pub items: Vec<Value>,

    #[serde(default)]
    pub next: Option<String>,

    #[serde(default)]
    pub cursors: Option<Cursors>,
}

impl CursorPagingObject {
    /// The cursor for the next page, present only when the API links one.
    pub fn next_cursor(&self) -> Option<String> {
        self.next.as_ref()?;
        self.cursors.as_ref()?.after.clone()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FollowedArtists {
    #[serde(default)]
    pub artists: CursorPagingObject,
}

/// The single-playlist object, used when the items endpoint is forbidden.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaylistWithItems {
    #[serde(default)]
    pub tracks: Option<PagingObject>,
}
