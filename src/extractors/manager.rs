use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, trace, warn};

use super::{Extractor, ExtractorInfo, ExtractorSearchContext};
use crate::{
    common::errors::{PlayerError, PlayerResult},
    protocol::tracks::Track,
    transcoder::StreamSource,
};

/// Registered extractors, kept in registration order.
#[derive(Default)]
pub struct ExtractorManager {
    extractors: RwLock<Vec<Arc<dyn Extractor>>>,
}

impl ExtractorManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Activates and appends `extractor`, replacing one with the same
    /// identifier in place.
    pub async fn register(&self, extractor: Arc<dyn Extractor>) -> PlayerResult<()> {
        extractor.activate().await?;
        let id = extractor.identifier().to_string();
        let previous = {
            let mut list = self.extractors.write();
            match list.iter().position(|e| e.identifier() == id) {
                Some(idx) => Some(std::mem::replace(&mut list[idx], extractor)),
                None => {
                    list.push(extractor);
                    None
                }
            }
        };
        if let Some(previous) = previous {
            if let Err(e) = previous.deactivate().await {
                warn!("Failed to deactivate replaced extractor {}: {}", id, e);
            }
        }
        info!("Loaded extractor: {}", id);
        Ok(())
    }

    pub async fn unregister(&self, id: &str) -> bool {
        let removed = {
            let mut list = self.extractors.write();
            list.iter()
                .position(|e| e.identifier() == id)
                .map(|idx| list.remove(idx))
        };
        match removed {
            Some(extractor) => {
                if let Err(e) = extractor.deactivate().await {
                    warn!("Failed to deactivate extractor {}: {}", id, e);
                }
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Extractor>> {
        self.extractors
            .read()
            .iter()
            .find(|e| e.identifier() == id)
            .cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        self.extractors
            .read()
            .iter()
            .map(|e| e.identifier().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.extractors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.read().is_empty()
    }

    fn snapshot(&self, block: &[String]) -> Vec<Arc<dyn Extractor>> {
        self.extractors
            .read()
            .iter()
            .filter(|e| !block.iter().any(|b| b == e.identifier()))
            .cloned()
            .collect()
    }

    /// First non-empty result among the extractors accepting `query`.
    /// `only` restricts the search to one extractor.
    pub async fn search(
        &self,
        query: &str,
        context: &ExtractorSearchContext,
        block: &[String],
        only: Option<&str>,
    ) -> Option<(String, ExtractorInfo)> {
        for extractor in self.snapshot(block) {
            let id = extractor.identifier();
            if only.is_some_and(|o| o != id) {
                continue;
            }
            if !extractor.validate(query, context.query_type).await {
                continue;
            }
            trace!("Searching '{}' with extractor {}", query, id);
            match extractor.handle(query, context).await {
                Ok(info) if !info.is_empty() => return Some((id.to_string(), info)),
                Ok(_) => {}
                Err(e) => warn!("Extractor {} failed on '{}': {}", id, query, e),
            }
        }
        debug!("No extractor produced results for '{}'", query);
        None
    }

    /// Opens the raw stream for `track`, preferring the extractor that made it.
    pub async fn stream(&self, track: &Track, block: &[String]) -> PlayerResult<StreamSource> {
        let candidates = self.snapshot(block);
        if let Some(own) = track
            .extractor
            .as_deref()
            .and_then(|id| candidates.iter().find(|e| e.identifier() == id))
        {
            return own.stream(track).await;
        }

        let query_type = track.query_type.unwrap_or_default();
        let mut last_error = None;
        for extractor in candidates {
            if !extractor.validate(&track.url, query_type).await {
                continue;
            }
            match extractor.stream(track).await {
                Ok(source) => return Ok(source),
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.unwrap_or_else(|| PlayerError::NoResult(format!("no extractor can stream {}", track.url))))
    }

    /// Related tracks from the track's own extractor, then from every other
    /// extractor in registration order. The first non-empty list wins.
    pub async fn related(&self, track: &Track, block: &[String]) -> Option<(String, ExtractorInfo)> {
        let mut candidates = self.snapshot(block);
        if let Some(idx) = track
            .extractor
            .as_deref()
            .and_then(|id| candidates.iter().position(|e| e.identifier() == id))
        {
            let own = candidates.remove(idx);
            candidates.insert(0, own);
        }

        for extractor in candidates {
            match extractor.get_related_tracks(track).await {
                Ok(info) if !info.is_empty() => return Some((extractor.identifier().to_string(), info)),
                Ok(_) => {}
                Err(e) => warn!("Extractor {} failed to find related tracks: {}", extractor.identifier(), e),
            }
        }
        None
    }

    pub async fn deactivate_all(&self) {
        let all: Vec<_> = std::mem::take(&mut *self.extractors.write());
        for extractor in all {
            if let Err(e) = extractor.deactivate().await {
                warn!("Failed to deactivate extractor {}: {}", extractor.identifier(), e);
            }
        }
    }
}
