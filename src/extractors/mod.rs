pub mod http;
pub mod local;
pub mod manager;

pub use http::HttpExtractor;
pub use local::LocalFileExtractor;
pub use manager::ExtractorManager;

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    common::{errors::PlayerResult, types::UserId},
    protocol::{playlist::Playlist, query::QueryType, tracks::Track},
    transcoder::StreamSource,
};

/// What a search hands back to the extractor.
#[derive(Debug, Clone, Default)]
pub struct ExtractorSearchContext {
    pub query_type: QueryType,
    pub requested_by: Option<UserId>,
}

/// Tracks found by an extractor, plus the playlist they came from if any.
#[derive(Debug, Clone, Default)]
pub struct ExtractorInfo {
    pub playlist: Option<Arc<Playlist>>,
    pub tracks: Vec<Arc<Track>>,
}

impl ExtractorInfo {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_tracks(tracks: Vec<Arc<Track>>) -> Self {
        Self { playlist: None, tracks }
    }

    pub fn from_playlist(playlist: Arc<Playlist>) -> Self {
        Self {
            tracks: playlist.tracks().to_vec(),
            playlist: Some(playlist),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// A search/stream backend.
///
/// Extractors are consulted in registration order; the first whose
/// [`validate`](Extractor::validate) accepts a query and whose
/// [`handle`](Extractor::handle) yields tracks wins.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Stable identifier, also stamped on every track this extractor makes.
    fn identifier(&self) -> &str;

    async fn activate(&self) -> PlayerResult<()> {
        Ok(())
    }

    async fn deactivate(&self) -> PlayerResult<()> {
        Ok(())
    }

    async fn validate(&self, query: &str, query_type: QueryType) -> bool;

    async fn handle(&self, query: &str, context: &ExtractorSearchContext) -> PlayerResult<ExtractorInfo>;

    async fn stream(&self, track: &Track) -> PlayerResult<StreamSource>;

    async fn get_related_tracks(&self, _track: &Track) -> PlayerResult<ExtractorInfo> {
        Ok(ExtractorInfo::empty())
    }
}
