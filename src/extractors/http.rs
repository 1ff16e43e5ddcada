use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use regex::Regex;
use tokio_util::io::StreamReader;
use tracing::debug;

use super::{Extractor, ExtractorInfo, ExtractorSearchContext};
use crate::{
    common::errors::{PlayerError, PlayerResult},
    protocol::{
        query::QueryType,
        tracks::{Track, TrackSource},
    },
    transcoder::StreamSource,
};

/// Plays any http(s) media URL as-is.
pub struct HttpExtractor {
    client: reqwest::Client,
    url_regex: Regex,
}

impl Default for HttpExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpExtractor {
    pub const IDENTIFIER: &'static str = "http";

    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            url_regex: Regex::new(r"^https?://\S+$").unwrap(),
        }
    }

    /// Last path segment without the query string, or the host.
    fn title_from_url(url: &str) -> String {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        path.trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty() && !s.contains(':'))
            .unwrap_or(path)
            .to_string()
    }
}

#[async_trait]
impl Extractor for HttpExtractor {
    fn identifier(&self) -> &str {
        Self::IDENTIFIER
    }

    async fn validate(&self, query: &str, query_type: QueryType) -> bool {
        matches!(query_type, QueryType::Arbitrary | QueryType::Auto) && self.url_regex.is_match(query)
    }

    async fn handle(&self, query: &str, context: &ExtractorSearchContext) -> PlayerResult<ExtractorInfo> {
        let mut track = Track::new(Self::title_from_url(query), query)
            .with_author("Unknown Artist")
            .with_source(TrackSource::Arbitrary)
            .with_extractor(Self::IDENTIFIER);
        track.query_type = Some(QueryType::Arbitrary);
        track.requested_by = context.requested_by;
        Ok(ExtractorInfo::from_tracks(vec![Arc::new(track)]))
    }

    async fn stream(&self, track: &Track) -> PlayerResult<StreamSource> {
        debug!("Opening HTTP stream: {}", track.url);
        let response = self
            .client
            .get(&track.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PlayerError::Extractor(e.to_string()))?;

        let body = response
            .bytes_stream()
            .map_err(std::io::Error::other);
        Ok(StreamSource::Bytes(Box::new(StreamReader::new(Box::pin(body)))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_from_url() {
        assert_eq!(HttpExtractor::title_from_url("https://cdn.example/a/song.mp3?sig=1"), "song.mp3");
        assert_eq!(HttpExtractor::title_from_url("https://cdn.example/"), "cdn.example");
    }

    #[tokio::test]
    async fn test_validates_only_urls() {
        let ext = HttpExtractor::new();
        assert!(ext.validate("https://cdn.example/a.mp3", QueryType::Arbitrary).await);
        assert!(!ext.validate("never gonna give you up", QueryType::Auto).await);
        assert!(!ext.validate("https://youtu.be/dQw4w9WgXcQ", QueryType::YoutubeVideo).await);
    }

    #[tokio::test]
    async fn test_handle_builds_one_track() {
        let info = HttpExtractor::new()
            .handle("https://cdn.example/a.mp3", &ExtractorSearchContext::default())
            .await
            .unwrap();
        assert_eq!(info.tracks.len(), 1);
        assert_eq!(info.tracks[0].extractor.as_deref(), Some("http"));
        assert_eq!(info.tracks[0].title, "a.mp3");
    }
}
