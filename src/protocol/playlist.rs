use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::tracks::{Track, TrackSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistKind {
    Album,
    #[default]
    Playlist,
}

/// Descriptive fields of a playlist, everything except its tracks.
#[derive(Debug, Clone, Default)]
pub struct PlaylistInfo {
    pub id: Option<Uuid>,
    pub title: String,
    pub author: String,
    pub url: String,
    pub thumbnail: Option<String>,
    pub description: Option<String>,
    pub source: TrackSource,
    pub kind: PlaylistKind,
}

/// An ordered set of tracks. The playlist owns its tracks; each track only
/// keeps a weak link back.
#[derive(Debug)]
pub struct Playlist {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub url: String,
    pub thumbnail: Option<String>,
    pub description: Option<String>,
    pub source: TrackSource,
    pub kind: PlaylistKind,
    tracks: Vec<Arc<Track>>,
}

impl Playlist {
    pub fn new(info: PlaylistInfo, tracks: Vec<Track>) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            id: info.id.unwrap_or_else(Uuid::new_v4),
            title: info.title,
            author: info.author,
            url: info.url,
            thumbnail: info.thumbnail,
            description: info.description,
            source: info.source,
            kind: info.kind,
            tracks: tracks
                .into_iter()
                .map(|mut track| {
                    track.playlist = weak.clone();
                    Arc::new(track)
                })
                .collect(),
        })
    }

    pub fn tracks(&self) -> &[Arc<Track>] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Sum of every track's length.
    pub fn duration_ms(&self) -> u64 {
        self.tracks.iter().map(|t| t.duration_ms).sum()
    }

    pub fn info(&self) -> PlaylistInfo {
        PlaylistInfo {
            id: Some(self.id),
            title: self.title.clone(),
            author: self.author.clone(),
            url: self.url.clone(),
            thumbnail: self.thumbnail.clone(),
            description: self.description.clone(),
            source: self.source,
            kind: self.kind,
        }
    }
}
