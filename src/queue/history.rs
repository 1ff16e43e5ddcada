use std::sync::Arc;

use super::{GuildQueue, PlayOptions, QueueStrategy, TrackQueue};
use crate::{
    common::errors::{PlayerError, PlayerResult},
    protocol::tracks::Track,
};

/// Previously played tracks, newest on top, optionally bounded.
#[derive(Debug, Default)]
pub(crate) struct HistoryList {
    tracks: TrackQueue<Arc<Track>>,
    max_size: Option<usize>,
}

impl HistoryList {
    pub(crate) fn new(max_size: Option<usize>) -> Self {
        Self {
            tracks: TrackQueue::new(QueueStrategy::Lifo),
            max_size,
        }
    }

    /// Adds `track` on top, dropping the oldest entries past the bound.
    pub(crate) fn push(&mut self, track: Arc<Track>) {
        self.tracks.add(track);
        if let Some(max) = self.max_size {
            while self.tracks.len() > max {
                self.tracks.remove_at(0);
            }
        }
    }

    pub(crate) fn pop(&mut self) -> Option<Arc<Track>> {
        self.tracks.dispatch()
    }

    pub(crate) fn latest(&self) -> Option<Arc<Track>> {
        self.tracks.peek().cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.tracks.len()
    }

    pub(crate) fn clear(&mut self) {
        self.tracks.clear();
    }

    /// Newest first.
    pub(crate) fn to_vec(&self) -> Vec<Arc<Track>> {
        let mut tracks = self.tracks.to_vec();
        tracks.reverse();
        tracks
    }
}

/// History view of a queue.
#[derive(Clone)]
pub struct GuildQueueHistory {
    queue: GuildQueue,
}

impl GuildQueueHistory {
    pub(crate) fn new(queue: GuildQueue) -> Self {
        Self { queue }
    }

    /// Played tracks, newest first.
    pub fn tracks(&self) -> Vec<Arc<Track>> {
        self.queue.inner.history.lock().to_vec()
    }

    pub fn size(&self) -> usize {
        self.queue.inner.history.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn current_track(&self) -> Option<Arc<Track>> {
        self.queue.current_track()
    }

    pub fn next_track(&self) -> Option<Arc<Track>> {
        self.queue.inner.tracks.lock().peek().cloned()
    }

    pub fn previous_track(&self) -> Option<Arc<Track>> {
        self.queue.inner.history.lock().latest()
    }

    pub fn push(&self, track: Arc<Track>) {
        self.queue.inner.history.lock().push(track);
    }

    pub fn clear(&self) {
        self.queue.inner.history.lock().clear();
    }

    /// Plays the most recent history entry. The current track goes back to
    /// the front of the queue. Both lists are left as they were when the
    /// previous track cannot be played.
    pub async fn back(&self) -> PlayerResult<()> {
        if self.queue.dispatcher().is_none() {
            return Err(PlayerError::NoVoiceConnection);
        }
        let previous = self
            .queue
            .inner
            .history
            .lock()
            .pop()
            .ok_or_else(|| PlayerError::NoResult("no previous track in history".into()))?;

        let current = self.queue.current_track();
        if let Some(current) = &current {
            self.queue.inner.tracks.lock().push_next(current.clone());
        }

        let result = self
            .queue
            .node()
            .play(Some(previous.clone()), PlayOptions::immediate())
            .await;
        if result.is_err() {
            if let Some(current) = &current {
                let mut tracks = self.queue.inner.tracks.lock();
                if tracks.peek().is_some_and(|t| Arc::ptr_eq(t, current)) {
                    tracks.dispatch();
                }
            }
            self.queue.inner.history.lock().push(previous);
        }
        result
    }

    /// Skips to the next queued track.
    pub async fn next(&self) -> PlayerResult<()> {
        if self.queue.inner.tracks.lock().is_empty() {
            return Err(PlayerError::NoResult("no next track in queue".into()));
        }
        self.queue.node().skip();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        common::types::{ChannelId, GuildId},
        queue::GuildQueueOptions,
        testkit::{EventRecorder, MemoryExtractor, TestPlayer, track},
    };

    fn titles(tracks: &[Arc<Track>]) -> Vec<String> {
        tracks.iter().map(|t| t.title.clone()).collect()
    }

    #[test]
    fn test_history_is_bounded_and_newest_first() {
        let mut history = HistoryList::new(Some(2));
        for title in ["a", "b", "c"] {
            history.push(Track::new(title, title).into_shared());
        }
        let titles: Vec<_> = history.to_vec().iter().map(|t| t.title.clone()).collect();
        assert_eq!(titles, vec!["c", "b"]);
        assert_eq!(history.latest().unwrap().title, "c");
        assert_eq!(history.pop().unwrap().title, "c");
        assert_eq!(history.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_then_back_returns_to_previous_track() {
        let env = TestPlayer::with_extractor(MemoryExtractor::new("mem", &["a", "b"]).with_frames(500).shared()).await;
        let recorder = EventRecorder::attach(&env.player);
        let queue = env.player.nodes().create(GuildId(1), GuildQueueOptions::default());
        queue.connect(ChannelId(10)).await.unwrap();
        queue
            .add_track(vec![env.search("a").await, env.search("b").await])
            .unwrap();
        queue.node().play(None, PlayOptions::immediate()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let history = queue.history();
        history.next().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(history.current_track().map(|t| t.title.clone()), Some("b".to_string()));
        assert_eq!(history.previous_track().map(|t| t.title.clone()), Some("a".to_string()));
        assert!(queue.is_empty());
        assert!(matches!(history.next().await, Err(PlayerError::NoResult(_))));

        history.back().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(history.current_track().map(|t| t.title.clone()), Some("a".to_string()));
        assert_eq!(titles(&queue.tracks()), vec!["b"]);
        assert!(history.is_empty());
        assert_eq!(recorder.started_titles(), vec!["a", "b", "a"]);
        queue.delete().unwrap();
    }

    #[tokio::test]
    async fn test_back_without_connection_keeps_lists() {
        let env = TestPlayer::new().await;
        let queue = env.player.nodes().create(GuildId(1), GuildQueueOptions::default());
        queue.add_track(track("queued")).unwrap();
        queue.history().push(track("old"));

        assert_eq!(queue.history().back().await, Err(PlayerError::NoVoiceConnection));
        assert_eq!(titles(&queue.history().tracks()), vec!["old"]);
        assert_eq!(titles(&queue.tracks()), vec!["queued"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_restores_lists_when_previous_cannot_stream() {
        let env = TestPlayer::with_extractor(MemoryExtractor::new("mem", &["a"]).with_frames(500).shared()).await;
        let queue = env.player.nodes().create(GuildId(1), GuildQueueOptions::default());
        queue.connect(ChannelId(10)).await.unwrap();
        queue.add_track(env.search("a").await).unwrap();
        queue.node().play(None, PlayOptions::immediate()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        queue.history().push(track("gone"));
        assert!(queue.history().back().await.is_err());
        assert_eq!(titles(&queue.history().tracks()), vec!["gone"]);
        assert!(queue.is_empty());
        assert_eq!(queue.current_track().map(|t| t.title.clone()), Some("a".to_string()));
        queue.delete().unwrap();
    }
}
