//! Tagged JSON form of tracks and playlists for storage.
//!
//! Every serialized object carries a `"$type"` tag of `"track"` or
//! `"playlist"`; [`deserialize`] is the exact inverse of [`serialize_track`]
//! and [`serialize_playlist`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    playlist::{Playlist, PlaylistInfo, PlaylistKind},
    query::QueryType,
    tracks::{Track, TrackSource, format_duration},
};
use crate::common::{
    errors::{PlayerError, PlayerResult},
    types::UserId,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedTrack {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub url: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub views: u64,
    pub duration_ms: u64,
    /// Display form, informational only.
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub source: TrackSource,
    #[serde(default)]
    pub query_type: Option<QueryType>,
    #[serde(default)]
    pub requested_by: Option<UserId>,
    #[serde(default)]
    pub extractor: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedPlaylist {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub url: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub source: TrackSource,
    #[serde(rename = "type", default)]
    pub kind: PlaylistKind,
    pub tracks: Vec<SerializedTrack>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$type", rename_all = "lowercase")]
pub enum Serialized {
    Track(SerializedTrack),
    Playlist(SerializedPlaylist),
}

/// Result of [`deserialize`].
#[derive(Debug, Clone)]
pub enum Deserialized {
    Track(Arc<Track>),
    Playlist(Arc<Playlist>),
}

fn track_fields(track: &Track) -> SerializedTrack {
    SerializedTrack {
        id: track.id,
        title: track.title.clone(),
        author: track.author.clone(),
        url: track.url.clone(),
        thumbnail: track.thumbnail.clone(),
        description: track.description.clone(),
        views: track.views,
        duration_ms: track.duration_ms,
        duration: format_duration(track.duration_ms),
        source: track.source,
        query_type: track.query_type,
        requested_by: track.requested_by,
        extractor: track.extractor.clone(),
        metadata: track.metadata.clone(),
    }
}

fn track_from_fields(data: SerializedTrack) -> Track {
    Track {
        id: data.id,
        title: data.title,
        author: data.author,
        url: data.url,
        thumbnail: data.thumbnail,
        description: data.description,
        views: data.views,
        duration_ms: data.duration_ms,
        source: data.source,
        query_type: data.query_type,
        requested_by: data.requested_by,
        extractor: data.extractor,
        metadata: data.metadata,
        ..Default::default()
    }
}

pub fn serialize_track(track: &Track) -> Serialized {
    Serialized::Track(track_fields(track))
}

pub fn serialize_playlist(playlist: &Playlist) -> Serialized {
    Serialized::Playlist(SerializedPlaylist {
        id: playlist.id,
        title: playlist.title.clone(),
        author: playlist.author.clone(),
        url: playlist.url.clone(),
        thumbnail: playlist.thumbnail.clone(),
        description: playlist.description.clone(),
        source: playlist.source,
        kind: playlist.kind,
        tracks: playlist.tracks().iter().map(|t| track_fields(t)).collect(),
    })
}

pub fn deserialize(serialized: Serialized) -> Deserialized {
    match serialized {
        Serialized::Track(data) => Deserialized::Track(Arc::new(track_from_fields(data))),
        Serialized::Playlist(data) => {
            let info = PlaylistInfo {
                id: Some(data.id),
                title: data.title,
                author: data.author,
                url: data.url,
                thumbnail: data.thumbnail,
                description: data.description,
                source: data.source,
                kind: data.kind,
            };
            let tracks = data.tracks.into_iter().map(track_from_fields).collect();
            Deserialized::Playlist(Playlist::new(info, tracks))
        }
    }
}

/// Parses a tagged JSON value; anything without a known `"$type"` is an
/// argument error.
pub fn deserialize_value(value: serde_json::Value) -> PlayerResult<Deserialized> {
    let received = value
        .get("$type")
        .map(|t| t.to_string())
        .unwrap_or_else(|| "untagged value".to_string());
    let serialized: Serialized = serde_json::from_value(value)
        .map_err(|_| PlayerError::invalid_arg("serialized", "SerializedTrack | SerializedPlaylist", received))?;
    Ok(deserialize(serialized))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_track(title: &str, duration_ms: u64) -> Track {
        Track::new(title, format!("https://example.com/{}", title))
            .with_author("Artist")
            .with_duration_ms(duration_ms)
            .with_metadata(serde_json::json!({ "channel": 42 }))
    }

    #[test]
    fn test_track_roundtrip_through_json() {
        let track = sample_track("song", 212_000);
        let json = serde_json::to_value(serialize_track(&track)).unwrap();
        assert_eq!(json["$type"], "track");
        assert_eq!(json["duration"], "3:32");

        match deserialize_value(json).unwrap() {
            Deserialized::Track(restored) => {
                assert_eq!(restored.title, track.title);
                assert_eq!(restored.url, track.url);
                assert_eq!(restored.duration_ms, track.duration_ms);
                assert_eq!(restored.duration(), track.duration());
                assert_eq!(restored.metadata, track.metadata);
                assert_eq!(restored.id, track.id);
            }
            Deserialized::Playlist(_) => panic!("expected a track"),
        }
    }

    #[test]
    fn test_playlist_roundtrip_keeps_nested_tracks() {
        let playlist = Playlist::new(
            PlaylistInfo {
                title: "Album".into(),
                author: "Artist".into(),
                kind: PlaylistKind::Album,
                ..Default::default()
            },
            vec![sample_track("a", 1000), sample_track("b", 2000)],
        );

        let serialized = serialize_playlist(&playlist);
        let json = serde_json::to_value(&serialized).unwrap();
        assert_eq!(json["$type"], "playlist");
        assert_eq!(json["type"], "album");

        match deserialize_value(json).unwrap() {
            Deserialized::Playlist(restored) => {
                assert_eq!(restored.title, "Album");
                assert_eq!(restored.kind, PlaylistKind::Album);
                assert_eq!(restored.len(), 2);
                for (a, b) in restored.tracks().iter().zip(playlist.tracks()) {
                    assert_eq!(a.title, b.title);
                    assert_eq!(a.url, b.url);
                    assert_eq!(a.duration_ms, b.duration_ms);
                    assert_eq!(a.playlist().map(|p| p.id), Some(restored.id));
                }
                assert_eq!(serialize_playlist(&restored), serialized);
            }
            Deserialized::Track(_) => panic!("expected a playlist"),
        }
    }

    #[test]
    fn test_untagged_value_is_rejected() {
        let err = deserialize_value(serde_json::json!({ "title": "x" })).unwrap_err();
        assert_eq!(err.code(), "ERR_INVALID_ARG_TYPE");
    }
}
