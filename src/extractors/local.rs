use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;

use super::{Extractor, ExtractorInfo, ExtractorSearchContext};
use crate::{
    common::errors::{PlayerError, PlayerResult},
    protocol::{
        query::QueryType,
        tracks::{Track, TrackSource},
    },
    transcoder::StreamSource,
};

/// Plays files from the local filesystem.
#[derive(Default)]
pub struct LocalFileExtractor;

impl LocalFileExtractor {
    pub const IDENTIFIER: &'static str = "local";

    pub fn new() -> Self {
        Self
    }

    fn to_path(query: &str) -> PathBuf {
        PathBuf::from(query.strip_prefix("file://").unwrap_or(query))
    }
}

#[async_trait]
impl Extractor for LocalFileExtractor {
    fn identifier(&self) -> &str {
        Self::IDENTIFIER
    }

    async fn validate(&self, query: &str, query_type: QueryType) -> bool {
        match query_type {
            QueryType::File => true,
            QueryType::Auto => tokio::fs::metadata(Self::to_path(query))
                .await
                .map(|m| m.is_file())
                .unwrap_or(false),
            _ => false,
        }
    }

    async fn handle(&self, query: &str, context: &ExtractorSearchContext) -> PlayerResult<ExtractorInfo> {
        let path = Self::to_path(query);
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| PlayerError::Extractor(format!("{}: {}", path.display(), e)))?;
        if !meta.is_file() {
            return Ok(ExtractorInfo::empty());
        }

        let title = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Unknown Title")
            .to_string();
        let mut track = Track::new(title, path.to_string_lossy())
            .with_author("Unknown Artist")
            .with_source(TrackSource::Arbitrary)
            .with_extractor(Self::IDENTIFIER);
        track.query_type = Some(QueryType::File);
        track.requested_by = context.requested_by;
        Ok(ExtractorInfo::from_tracks(vec![Arc::new(track)]))
    }

    async fn stream(&self, track: &Track) -> PlayerResult<StreamSource> {
        let file = tokio::fs::File::open(Self::to_path(&track.url))
            .await
            .map_err(|e| PlayerError::Extractor(format!("{}: {}", track.url, e)))?;
        Ok(StreamSource::Bytes(Box::new(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handles_existing_file() {
        let dir = std::env::temp_dir().join(format!("guildwave-local-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let file = dir.join("Morning Song.ogg");
        tokio::fs::write(&file, b"OggS").await.unwrap();
        let query = file.to_string_lossy().to_string();

        let ext = LocalFileExtractor::new();
        assert!(ext.validate(&query, QueryType::Auto).await);
        let info = ext.handle(&query, &ExtractorSearchContext::default()).await.unwrap();
        assert_eq!(info.tracks[0].title, "Morning Song");
        assert!(matches!(ext.stream(&info.tracks[0]).await, Ok(StreamSource::Bytes(_))));

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let ext = LocalFileExtractor::new();
        assert!(!ext.validate("/definitely/not/here.mp3", QueryType::Auto).await);
        assert!(ext.handle("/definitely/not/here.mp3", &ExtractorSearchContext::default()).await.is_err());
    }
}
