use std::{
    fmt,
    io::{self, Cursor, Read, Write},
    sync::{Arc, Weak},
};

use base64::prelude::*;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{playlist::Playlist, query::QueryType};
use crate::common::types::UserId;

/// Where a track originally came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrackSource {
    Youtube,
    Soundcloud,
    Spotify,
    AppleMusic,
    #[default]
    Arbitrary,
}

impl TrackSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Youtube => "youtube",
            Self::Soundcloud => "soundcloud",
            Self::Spotify => "spotify",
            Self::AppleMusic => "apple_music",
            Self::Arbitrary => "arbitrary",
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "youtube" => Self::Youtube,
            "soundcloud" => Self::Soundcloud,
            "spotify" => Self::Spotify,
            "apple_music" | "applemusic" => Self::AppleMusic,
            _ => Self::Arbitrary,
        }
    }
}

impl fmt::Display for TrackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A playable track.
///
/// Tracks are shared as `Arc<Track>` once enqueued and never mutated after
/// that. Two tracks compare equal when they carry the same `id`.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub url: String,
    pub thumbnail: Option<String>,
    pub description: Option<String>,
    pub views: u64,
    /// Authoritative length in milliseconds. 0 for live streams.
    pub duration_ms: u64,
    pub source: TrackSource,
    pub query_type: Option<QueryType>,
    pub requested_by: Option<UserId>,
    /// Identifier of the extractor that produced this track.
    pub extractor: Option<String>,
    /// Opaque caller payload.
    pub metadata: serde_json::Value,
    pub(crate) playlist: Weak<Playlist>,
}

impl Default for Track {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            title: String::new(),
            author: String::new(),
            url: String::new(),
            thumbnail: None,
            description: None,
            views: 0,
            duration_ms: 0,
            source: TrackSource::Arbitrary,
            query_type: None,
            requested_by: None,
            extractor: None,
            metadata: serde_json::Value::Null,
            playlist: Weak::new(),
        }
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Track {}

impl Track {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_source(mut self, source: TrackSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_extractor(mut self, extractor: impl Into<String>) -> Self {
        self.extractor = Some(extractor.into());
        self
    }

    pub fn with_requested_by(mut self, user: UserId) -> Self {
        self.requested_by = Some(user);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// The playlist this track was loaded with, while that playlist is alive.
    pub fn playlist(&self) -> Option<Arc<Playlist>> {
        self.playlist.upgrade()
    }

    /// Display form of the duration, e.g. `3:32` or `1:02:09`.
    pub fn duration(&self) -> String {
        format_duration(self.duration_ms)
    }

    pub fn is_live(&self) -> bool {
        self.duration_ms == 0
    }

    /// Encodes the track into a compact base64 string.
    ///
    /// Layout (big endian):
    ///   [u32 header: payload_size | (flags << 30)], flags bit 0 = versioned
    ///   [u8  version = 1]
    ///   [utf id] [utf title] [utf author] [utf url]
    ///   [u64 duration ms] [u64 views]
    ///   [opt_utf thumbnail] [opt_utf description]
    ///   [utf source] [opt_utf extractor]
    ///   [u8 has_requester] [u64 requester]?
    pub fn encode(&self) -> io::Result<String> {
        let mut msg_buf = Vec::new();
        msg_buf.write_u8(ENCODING_VERSION)?;

        write_utf(&mut msg_buf, &self.id.to_string())?;
        write_utf(&mut msg_buf, &self.title)?;
        write_utf(&mut msg_buf, &self.author)?;
        write_utf(&mut msg_buf, &self.url)?;
        msg_buf.write_u64::<BigEndian>(self.duration_ms)?;
        msg_buf.write_u64::<BigEndian>(self.views)?;
        write_opt_utf(&mut msg_buf, self.thumbnail.as_deref())?;
        write_opt_utf(&mut msg_buf, self.description.as_deref())?;
        write_utf(&mut msg_buf, self.source.as_str())?;
        write_opt_utf(&mut msg_buf, self.extractor.as_deref())?;
        match self.requested_by {
            Some(user) => {
                msg_buf.write_u8(1)?;
                msg_buf.write_u64::<BigEndian>(user.0)?;
            }
            None => msg_buf.write_u8(0)?,
        }

        let mut final_buf = Vec::with_capacity(msg_buf.len() + 4);
        let header = (msg_buf.len() as u32) | (FLAG_VERSIONED << 30);
        final_buf.write_u32::<BigEndian>(header)?;
        final_buf.extend_from_slice(&msg_buf);

        Ok(BASE64_STANDARD.encode(&final_buf))
    }

    /// Decodes a track produced by [`Track::encode`]. Metadata, query type
    /// and playlist links are not part of the binary form.
    pub fn decode(encoded: &str) -> Option<Self> {
        let data = BASE64_STANDARD.decode(encoded).ok()?;
        if data.len() < 4 {
            return None;
        }

        let mut cursor = Cursor::new(data);
        let header = cursor.read_u32::<BigEndian>().ok()?;
        let flags = (header >> 30) & 0x03;
        if flags & FLAG_VERSIONED == 0 {
            return None;
        }

        let version = cursor.read_u8().ok()?;
        if version > ENCODING_VERSION {
            return None;
        }

        let id = Uuid::parse_str(&read_utf(&mut cursor)?).ok()?;
        let title = read_utf(&mut cursor)?;
        let author = read_utf(&mut cursor)?;
        let url = read_utf(&mut cursor)?;
        let duration_ms = cursor.read_u64::<BigEndian>().ok()?;
        let views = cursor.read_u64::<BigEndian>().ok()?;
        let thumbnail = read_opt_utf(&mut cursor)?;
        let description = read_opt_utf(&mut cursor)?;
        let source = TrackSource::from_name(&read_utf(&mut cursor)?);
        let extractor = read_opt_utf(&mut cursor)?;
        let requested_by = match cursor.read_u8().ok()? {
            0 => None,
            _ => Some(UserId(cursor.read_u64::<BigEndian>().ok()?)),
        };

        Some(Self {
            id,
            title,
            author,
            url,
            thumbnail,
            description,
            views,
            duration_ms,
            source,
            requested_by,
            extractor,
            ..Default::default()
        })
    }
}

const ENCODING_VERSION: u8 = 1;
const FLAG_VERSIONED: u32 = 1;

fn write_utf(w: &mut Vec<u8>, s: &str) -> io::Result<()> {
    let bytes = s.as_bytes();
    if bytes.len() > u16::MAX as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "string field longer than 65535 bytes",
        ));
    }
    w.write_u16::<BigEndian>(bytes.len() as u16)?;
    w.write_all(bytes)
}

fn write_opt_utf(w: &mut Vec<u8>, s: Option<&str>) -> io::Result<()> {
    match s {
        Some(s) => {
            w.write_u8(1)?;
            write_utf(w, s)
        }
        None => w.write_u8(0),
    }
}

fn read_utf<R: Read>(r: &mut R) -> Option<String> {
    let len = r.read_u16::<BigEndian>().ok()? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf).ok()?;
    String::from_utf8(buf).ok()
}

/// Outer `None` means the input was truncated.
fn read_opt_utf<R: Read>(r: &mut R) -> Option<Option<String>> {
    match r.read_u8().ok()? {
        0 => Some(None),
        _ => read_utf(r).map(Some),
    }
}

/// Formats milliseconds as `m:ss` or `h:mm:ss`.
pub fn format_duration(ms: u64) -> String {
    let total_secs = ms / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Parses `ss`, `m:ss` or `h:mm:ss` back into milliseconds.
pub fn parse_duration(s: &str) -> Option<u64> {
    let mut total: u64 = 0;
    let parts: Vec<&str> = s.trim().split(':').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }
    for part in parts {
        total = total * 60 + part.trim().parse::<u64>().ok()?;
    }
    Some(total * 1000)
}
