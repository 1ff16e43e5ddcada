use std::sync::{Arc, atomic::Ordering};

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{GuildQueue, GuildQueueOptions};
use crate::{
    audio::{
        constants::{MAX_VOLUME, SAMPLE_RATE},
        resource::CreateStreamOptions,
    },
    common::errors::{PlayerError, PlayerResult},
    events::{DoneSignal, EventKind, PlaybackConfig, QueueEvent, SkipReason},
    player::Player,
    protocol::tracks::{Track, format_duration},
    transcoder::{TranscodeOptions, TranscodedStream, TranscoderError},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayOptions {
    /// Add an explicit track to the queue instead of playing it now.
    pub queue: bool,
    pub seek_ms: u64,
    /// Replay of the current track for a filter change or seek.
    pub transition: bool,
}

impl PlayOptions {
    pub const fn immediate() -> Self {
        Self {
            queue: false,
            seek_ms: 0,
            transition: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimestampPart {
    pub label: String,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerTimestamp {
    pub current: TimestampPart,
    pub total: TimestampPart,
    /// 0..=100
    pub progress: u8,
}

#[derive(Debug, Clone)]
pub struct ProgressBarOptions {
    pub timecodes: bool,
    pub length: usize,
    pub left_char: String,
    pub right_char: String,
    pub indicator: String,
    pub separator: String,
}

impl Default for ProgressBarOptions {
    fn default() -> Self {
        Self {
            timecodes: true,
            length: 15,
            left_char: "▬".into(),
            right_char: "▬".into(),
            indicator: "🔘".into(),
            separator: "┃".into(),
        }
    }
}

/// Playback controls of a queue.
#[derive(Clone)]
pub struct GuildQueuePlayerNode {
    queue: GuildQueue,
}

impl GuildQueuePlayerNode {
    pub(crate) fn new(queue: GuildQueue) -> Self {
        Self { queue }
    }

    pub fn queue(&self) -> &GuildQueue {
        &self.queue
    }

    // State

    pub fn is_playing(&self) -> bool {
        self.queue.is_playing()
    }

    pub fn is_paused(&self) -> bool {
        self.queue.dispatcher().is_some_and(|d| d.paused())
    }

    /// Waiting for the first frame of a freshly created stream.
    pub fn is_buffering(&self) -> bool {
        self.queue.inner.buffering.load(Ordering::Acquire)
    }

    /// Nothing is loaded into the dispatcher.
    pub fn is_idle(&self) -> bool {
        self.queue.dispatcher().and_then(|d| d.resource()).is_none()
    }

    // Time

    /// Milliseconds into the current track, ignoring speed changes.
    pub fn playback_time(&self) -> u64 {
        let streamed = self.queue.dispatcher().map(|d| d.streaming_time()).unwrap_or(0);
        self.queue.inner.progress_ms.load(Ordering::Acquire) + streamed
    }

    /// Position in the track once speed-changing filters are accounted for.
    pub fn estimated_playback_time(&self) -> u64 {
        let streamed = self.queue.dispatcher().map(|d| d.streaming_time()).unwrap_or(0);
        let progress = self.queue.inner.progress_ms.load(Ordering::Acquire);
        progress + (streamed as f64 * self.playback_speed()).round() as u64
    }

    /// Combined speed of codec-level rate filters and the resampler.
    pub fn playback_speed(&self) -> f64 {
        let codec = self.queue.inner.ffmpeg.lock().rate_multiplier();
        let resampler = match self.queue.dispatcher().and_then(|d| d.resource()) {
            Some(resource) => resource.filters().lock().speed_ratio(),
            None => {
                let rate = self.queue.inner.filters.lock().sample_rate.max(1);
                if self.queue.options().switches.disable_resampler {
                    1.0
                } else {
                    SAMPLE_RATE as f64 / rate as f64
                }
            }
        };
        codec * resampler
    }

    /// Wall-clock length of the current track at the current speed.
    pub fn estimated_duration(&self) -> u64 {
        let Some(track) = self.queue.current_track() else {
            return 0;
        };
        (track.duration_ms as f64 / self.playback_speed()).round() as u64
    }

    /// Current track plus everything queued, at the current speed.
    pub fn total_duration(&self) -> u64 {
        let queued = (self.queue.estimated_duration() as f64 / self.playback_speed()).round() as u64;
        self.estimated_duration() + queued
    }

    pub fn get_timestamp(&self) -> Option<PlayerTimestamp> {
        let track = self.queue.current_track()?;
        let current = self.estimated_playback_time();
        let total = track.duration_ms;
        let progress = if total == 0 {
            0
        } else {
            ((current as f64 / total as f64) * 100.0).round().min(100.0) as u8
        };
        Some(PlayerTimestamp {
            current: TimestampPart {
                label: format_duration(current),
                value: current,
            },
            total: TimestampPart {
                label: if track.is_live() { "Live".into() } else { track.duration() },
                value: total,
            },
            progress,
        })
    }

    /// Renders `current ┃ ▬▬🔘▬▬ ┃ total`. `None` when nothing is playing.
    pub fn create_progress_bar(&self, options: &ProgressBarOptions) -> Option<String> {
        let timestamp = self.get_timestamp()?;
        Some(render_progress_bar(&timestamp, options))
    }

    // Controls

    pub fn pause(&self) -> bool {
        let Some(dispatcher) = self.queue.dispatcher() else {
            return false;
        };
        let paused = dispatcher.pause(true);
        if paused {
            self.queue.emit(QueueEvent::PlayerPause);
        }
        paused
    }

    pub fn resume(&self) -> bool {
        let Some(dispatcher) = self.queue.dispatcher() else {
            return false;
        };
        let resumed = dispatcher.resume();
        if resumed {
            self.queue.emit(QueueEvent::PlayerResume);
        }
        resumed
    }

    pub fn set_paused(&self, paused: bool) -> bool {
        if paused { self.pause() } else { self.resume() }
    }

    /// Ends the current track so the queue advances.
    pub fn skip(&self) -> bool {
        self.skip_with(SkipReason::Manual)
    }

    fn skip_with(&self, reason: SkipReason) -> bool {
        let Some(dispatcher) = self.queue.dispatcher() else {
            return false;
        };
        let Some(track) = dispatcher.resource().and_then(|r| r.metadata().cloned()) else {
            return false;
        };
        if dispatcher.paused() {
            dispatcher.resume();
        }
        self.queue.set_transitioning(false);
        self.queue.emit(QueueEvent::PlayerSkip { track, reason });
        dispatcher.end();
        true
    }

    /// Clears the queue and stops playback. `force` disconnects at once,
    /// otherwise `leave_on_stop` decides.
    pub fn stop(&self, force: bool) -> bool {
        self.queue.clear();
        self.queue.history().clear();
        let Some(dispatcher) = self.queue.dispatcher() else {
            return false;
        };
        self.queue.set_transitioning(false);
        dispatcher.end();

        if force {
            dispatcher.disconnect();
            return true;
        }

        let options = self.queue.options();
        if options.leave_on_stop {
            self.queue.schedule(
                format!("stop_{}", self.queue.guild_id()),
                options.leave_on_stop_cooldown,
                |queue| async move {
                    if queue.is_playing() || !queue.is_empty() {
                        return;
                    }
                    if let Some(dispatcher) = queue.dispatcher() {
                        debug!("[{}] Leaving voice after stop", queue.guild_id());
                        dispatcher.disconnect();
                    }
                },
            );
        }
        true
    }

    /// Replays the current track from `position_ms`.
    pub async fn seek(&self, position_ms: u64) -> PlayerResult<bool> {
        let Some(track) = self.queue.current_track() else {
            return Ok(false);
        };
        let position = if track.duration_ms > 0 {
            position_ms.min(track.duration_ms)
        } else {
            position_ms
        };
        self.queue.replay(position).await
    }

    pub fn volume(&self) -> u16 {
        self.queue.filters().volume()
    }

    pub fn set_volume(&self, volume: u16) -> PlayerResult<bool> {
        if volume > MAX_VOLUME {
            return Err(PlayerError::invalid_arg(
                "volume",
                format!("0..={}", MAX_VOLUME),
                volume,
            ));
        }
        Ok(self.queue.filters().set_volume(volume))
    }

    // Track list

    pub fn get_track_position(&self, track: &Track) -> Option<usize> {
        self.queue.inner.tracks.lock().position(|t| t.as_ref() == track)
    }

    fn emit_unless_quiet(&self, event: QueueEvent) {
        if !self.queue.options().no_emit_insert {
            self.queue.emit(event);
        }
    }

    pub fn insert(&self, track: Arc<Track>, index: usize) -> PlayerResult<()> {
        {
            let mut list = self.queue.inner.tracks.lock();
            self.queue.check_capacity(list.len(), 1)?;
            list.insert(track.clone(), index);
        }
        self.emit_unless_quiet(QueueEvent::AudioTrackAdd(track));
        Ok(())
    }

    pub fn remove(&self, index: usize) -> Option<Arc<Track>> {
        let removed = self.queue.inner.tracks.lock().remove_at(index)?;
        self.emit_unless_quiet(QueueEvent::AudioTrackRemove(removed.clone()));
        Some(removed)
    }

    pub fn remove_track(&self, track: &Track) -> Option<Arc<Track>> {
        let index = self.get_track_position(track)?;
        self.remove(index)
    }

    /// Moves the track at `from` to `to`.
    pub fn move_track(&self, from: usize, to: usize) -> PlayerResult<()> {
        let track = self
            .remove(from)
            .ok_or_else(|| PlayerError::NoResult(format!("no track at position {}", from)))?;
        self.insert(track, to)
    }

    /// Inserts a second copy of the track at `from` at `to`.
    pub fn copy(&self, from: usize, to: usize) -> PlayerResult<()> {
        let track = self
            .queue
            .inner
            .tracks
            .lock()
            .at(from)
            .cloned()
            .ok_or_else(|| PlayerError::NoResult(format!("no track at position {}", from)))?;
        self.insert(track, to)
    }

    pub fn swap(&self, a: usize, b: usize) -> bool {
        self.queue.inner.tracks.lock().swap(a, b)
    }

    /// Drops every track before `index` and skips to it.
    pub fn skip_to(&self, index: usize) -> bool {
        let dropped = {
            let mut list = self.queue.inner.tracks.lock();
            if index >= list.len() {
                return false;
            }
            let mut dropped = list.drain_front(index + 1);
            let Some(target) = dropped.pop() else {
                return false;
            };
            list.push_next(target);
            dropped
        };
        if !dropped.is_empty() {
            self.emit_unless_quiet(QueueEvent::AudioTracksRemove(dropped));
        }
        self.skip_with(SkipReason::SkipTo)
    }

    /// Moves the track at `index` up next and skips to it, keeping the rest.
    pub fn jump(&self, index: usize) -> bool {
        {
            let mut list = self.queue.inner.tracks.lock();
            let Some(target) = list.remove_at(index) else {
                return false;
            };
            list.push_next(target);
        }
        self.skip_with(SkipReason::Jump)
    }

    // Playback

    /// Plays `track`, or the next queued track when `None`.
    ///
    /// With `skip_on_no_stream`, tracks whose stream cannot be opened are
    /// skipped (emitting `playerSkip` and `playerError`) until one plays or
    /// the queue runs dry.
    pub async fn play(&self, track: Option<Arc<Track>>, options: PlayOptions) -> PlayerResult<()> {
        let dispatcher = self.queue.dispatcher().ok_or(PlayerError::NoVoiceConnection)?;
        if let Some(track) = &track {
            if options.queue {
                return self.queue.add_track(track.clone());
            }
        }
        let player = self.queue.player_handle()?;

        let mut explicit = track;
        loop {
            let queue_options = self.queue.options();
            let track = match explicit.take().or_else(|| self.queue.dispatch_next()) {
                Some(track) => track,
                None if queue_options.skip_on_no_stream => return Ok(()),
                None => return Err(PlayerError::NoResult("no track to play".into())),
            };

            let (transcoded, config) = match self.prepare(&player, &track, &options, &queue_options).await {
                Ok(prepared) => prepared,
                Err(error) if queue_options.skip_on_no_stream => {
                    warn!("[{}] Skipping {}: {}", self.queue.guild_id(), track.title, error);
                    self.queue.emit(QueueEvent::PlayerSkip {
                        track: track.clone(),
                        reason: SkipReason::NoStream,
                    });
                    self.queue.emit(QueueEvent::PlayerError {
                        error,
                        track: Some(track),
                    });
                    continue;
                }
                Err(error) => return Err(error),
            };

            self.forward_transcoder_errors(transcoded.errors, track.clone());

            if config.transition {
                tokio::time::sleep(queue_options.buffering_timeout).await;
            }
            if self.queue.is_deleted() {
                return Err(PlayerError::NoGuildQueue(self.queue.guild_id()));
            }

            let resource = dispatcher.create_stream(
                transcoded.stream,
                CreateStreamOptions {
                    metadata: Some(track.clone()),
                    filters: self.queue.filter_cache(),
                    switches: queue_options.switches,
                },
            );

            let inner = &self.queue.inner;
            inner.transitioning.store(config.transition, Ordering::Release);
            *inner.current_track.lock() = Some(track.clone());
            inner.progress_ms.store(config.seek_ms, Ordering::Release);
            inner.buffering.store(true, Ordering::Release);

            debug!(
                "[{}] Playing {} at {}ms (transition: {})",
                self.queue.guild_id(),
                track.title,
                config.seek_ms,
                config.transition
            );
            return dispatcher.play_stream(resource);
        }
    }

    /// Opens the raw stream, lets `willPlayTrack` listeners adjust the
    /// settings, then starts the transcoder.
    async fn prepare(
        &self,
        player: &Player,
        track: &Arc<Track>,
        options: &PlayOptions,
        queue_options: &GuildQueueOptions,
    ) -> PlayerResult<(TranscodedStream, PlaybackConfig)> {
        let hooked = match &queue_options.on_before_create_stream {
            Some(hook) => (hook.0)(track.clone(), self.queue.clone()).await?,
            None => None,
        };
        let source = match hooked {
            Some(source) => source,
            None => {
                player
                    .inner
                    .extractors
                    .stream(track, &player.inner.config.player.block_extractors)
                    .await?
            }
        };

        let config = Arc::new(Mutex::new(PlaybackConfig {
            seek_ms: options.seek_ms,
            ffmpeg_filters: self.queue.ffmpeg_filter_string(),
            transition: options.transition,
        }));
        if player.inner.events.has_listeners(EventKind::WillPlayTrack) {
            let (done, rx) = DoneSignal::new();
            self.queue.emit(QueueEvent::WillPlayTrack {
                track: track.clone(),
                config: config.clone(),
                done,
            });
            let _ = rx.await;
        }
        let config = config.lock().clone();

        let transcoded = player
            .inner
            .transcoder
            .transcode(
                source,
                &TranscodeOptions {
                    seek_ms: config.seek_ms,
                    filters: config.ffmpeg_filters.clone(),
                },
            )
            .await?;
        Ok((transcoded, config))
    }

    fn forward_transcoder_errors(&self, errors: flume::Receiver<TranscoderError>, track: Arc<Track>) {
        let queue = self.queue.clone();
        tokio::spawn(async move {
            while let Ok(error) = errors.recv_async().await {
                if error.is_benign() {
                    debug!("[{}] Ignoring transcoder error: {}", queue.guild_id(), error);
                    continue;
                }
                queue.emit(QueueEvent::PlayerError {
                    error: error.into(),
                    track: Some(track.clone()),
                });
            }
        });
    }
}

fn render_progress_bar(timestamp: &PlayerTimestamp, options: &ProgressBarOptions) -> String {
    let length = options.length.max(1);
    let ratio = if timestamp.total.value == 0 {
        0.0
    } else {
        timestamp.current.value as f64 / timestamp.total.value as f64
    };
    let index = ((ratio * length as f64).round() as usize).clamp(1, length);

    let bar = format!(
        "{}{}{}",
        options.left_char.repeat(index - 1),
        options.indicator,
        options.right_char.repeat(length - index)
    );
    if options.timecodes {
        format!(
            "{} {} {} {} {}",
            timestamp.current.label, options.separator, bar, options.separator, timestamp.total.label
        )
    } else {
        bar
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

    const GUILD: GuildId = GuildId(2);

    fn timestamp(current: u64, total: u64) -> PlayerTimestamp {
        PlayerTimestamp {
            current: TimestampPart {
                label: format_duration(current),
                value: current,
            },
            total: TimestampPart {
                label: format_duration(total),
                value: total,
            },
            progress: 0,
        }
    }

    #[test]
    fn test_progress_bar_clamps_indicator() {
        let opts = ProgressBarOptions {
            timecodes: false,
            length: 5,
            left_char: "=".into(),
            right_char: "-".into(),
            indicator: "o".into(),
            separator: "|".into(),
        };
        assert_eq!(render_progress_bar(&timestamp(0, 1000), &opts), "o----");
        assert_eq!(render_progress_bar(&timestamp(500, 1000), &opts), "==o--");
        assert_eq!(render_progress_bar(&timestamp(5000, 1000), &opts), "====o");
        assert_eq!(render_progress_bar(&timestamp(10, 0), &opts), "o----");
    }

    #[tokio::test]
    async fn test_play_without_connection_fails() {
        let env = TestPlayer::new().await;
        let queue = env.player.nodes().create(GUILD, GuildQueueOptions::default());
        let err = queue.node().play(None, PlayOptions::immediate()).await.unwrap_err();
        assert_eq!(err, PlayerError::NoVoiceConnection);
    }

    #[tokio::test]
    async fn test_play_with_empty_queue() {
        let env = TestPlayer::new().await;
        let queue = env.player.nodes().create(GUILD, GuildQueueOptions::default());
        queue.connect(ChannelId(10)).await.unwrap();
        let err = queue.node().play(None, PlayOptions::immediate()).await.unwrap_err();
        assert!(matches!(err, PlayerError::NoResult(_)));

        let quiet = env.player.nodes().create(
            GuildId(3),
            GuildQueueOptions {
                skip_on_no_stream: true,
                ..Default::default()
            },
        );
        quiet.connect(ChannelId(10)).await.unwrap();
        assert!(quiet.node().play(None, PlayOptions::immediate()).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unstreamable_tracks_are_skipped() {
        let env = TestPlayer::with_extractor(MemoryExtractor::new("mem", &["good"]).with_frames(50).shared()).await;
        let recorder = EventRecorder::attach(&env.player);
        let queue = env.player.nodes().create(
            GUILD,
            GuildQueueOptions {
                skip_on_no_stream: true,
                ..Default::default()
            },
        );
        queue.connect(ChannelId(10)).await.unwrap();
        queue
            .add_track(vec![track("missing"), env.search("good").await])
            .unwrap();

        queue.node().play(None, PlayOptions::immediate()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(recorder.count(EventKind::PlayerSkip), 1);
        assert_eq!(recorder.count(EventKind::PlayerError), 1);
        assert_eq!(recorder.started_titles(), vec!["good".to_string()]);
        queue.delete().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_failure_propagates_without_skip() {
        let env = TestPlayer::new().await;
        let queue = env.player.nodes().create(GUILD, GuildQueueOptions::default());
        queue.connect(ChannelId(10)).await.unwrap();
        queue.add_track(track("missing")).unwrap();
        assert!(queue.node().play(None, PlayOptions::immediate()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_is_idempotent() {
        let env = TestPlayer::with_extractor(MemoryExtractor::new("mem", &["long"]).with_frames(500).shared()).await;
        let recorder = EventRecorder::attach(&env.player);
        let queue = env.player.nodes().create(GUILD, GuildQueueOptions::default());
        queue.connect(ChannelId(10)).await.unwrap();
        queue.add_track(env.search("long").await).unwrap();
        queue.node().play(None, PlayOptions::immediate()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let node = queue.node();
        assert!(node.pause());
        assert!(!node.pause());
        assert!(node.is_paused());
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(recorder.count(EventKind::PlayerPause), 1);
        assert_eq!(recorder.count(EventKind::PlayerFinish), 0);

        assert!(node.resume());
        assert!(!node.resume());
        assert_eq!(recorder.count(EventKind::PlayerResume), 1);
        queue.delete().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_advances_to_next_track() {
        let env = TestPlayer::with_extractor(MemoryExtractor::new("mem", &["a", "b"]).with_frames(500).shared()).await;
        let recorder = EventRecorder::attach(&env.player);
        let queue = env.player.nodes().create(GUILD, GuildQueueOptions::default());
        queue.connect(ChannelId(10)).await.unwrap();
        queue
            .add_track(vec![env.search("a").await, env.search("b").await])
            .unwrap();
        queue.node().play(None, PlayOptions::immediate()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        queue.node().pause();
        assert!(queue.node().skip());
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(recorder.started_titles(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(recorder.count(EventKind::PlayerSkip), 1);
        assert_eq!(queue.history().previous_track().unwrap().title, "a");
        queue.delete().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_replays_with_filters_trigger() {
        let env = TestPlayer::with_extractor(MemoryExtractor::new("mem", &["long"]).with_frames(500).shared()).await;
        let recorder = EventRecorder::attach(&env.player);
        let queue = env.player.nodes().create(
            GUILD,
            GuildQueueOptions {
                buffering_timeout: Duration::from_millis(10),
                ..Default::default()
            },
        );
        queue.connect(ChannelId(10)).await.unwrap();
        queue.add_track(env.search("long").await).unwrap();
        queue.node().play(None, PlayOptions::immediate()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(queue.node().seek(2_000).await.unwrap());
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(recorder.count(EventKind::PlayerStart), 1);
        assert_eq!(recorder.count(EventKind::PlayerTrigger), 2);
        assert_eq!(recorder.count(EventKind::PlayerFinish), 0);
        assert!(!queue.is_transitioning());
        assert!(queue.node().playback_time() >= 2_000);
        queue.delete().unwrap();
    }

    #[tokio::test]
    async fn test_list_edits_respect_no_emit_insert() {
        let env = TestPlayer::new().await;
        let recorder = EventRecorder::attach(&env.player);
        let queue = env.player.nodes().create(GUILD, GuildQueueOptions::default());
        queue
            .add_track(vec![track("a"), track("b"), track("c")])
            .unwrap();
        let node = queue.node();

        node.move_track(0, 2).unwrap();
        assert_eq!(titles(&queue), vec!["b", "c", "a"]);
        node.copy(0, 0).unwrap();
        assert_eq!(titles(&queue), vec!["b", "b", "c", "a"]);
        assert!(node.swap(0, 3));
        assert_eq!(titles(&queue), vec!["a", "b", "c", "b"]);
        assert_eq!(node.remove(1).unwrap().title, "b");
        assert_eq!(recorder.count(EventKind::AudioTrackRemove), 2);
        assert_eq!(recorder.count(EventKind::AudioTrackAdd), 2);

        let quiet = env.player.nodes().create(
            GuildId(9),
            GuildQueueOptions {
                no_emit_insert: true,
                max_size: Some(1),
                ..Default::default()
            },
        );
        quiet.node().insert(track("x"), 0).unwrap();
        assert!(matches!(
            quiet.node().insert(track("y"), 0),
            Err(PlayerError::OutOfSpace { .. })
        ));
        assert_eq!(recorder.count(EventKind::AudioTrackAdd), 2);
    }

    #[tokio::test]
    async fn test_set_volume_range() {
        let env = TestPlayer::new().await;
        let recorder = EventRecorder::attach(&env.player);
        let queue = env.player.nodes().create(GUILD, GuildQueueOptions::default());
        let node = queue.node();
        assert!(node.set_volume(MAX_VOLUME + 1).is_err());
        assert!(node.set_volume(50).unwrap());
        assert!(!node.set_volume(50).unwrap());
        assert_eq!(node.volume(), 50);
        assert_eq!(recorder.count(EventKind::VolumeChange), 1);
    }

    fn titles(queue: &GuildQueue) -> Vec<String> {
        queue.tracks().iter().map(|t| t.title.clone()).collect()
    }
}
