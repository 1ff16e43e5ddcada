use std::{
    collections::HashMap,
    future::Future,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use parking_lot::{Mutex, RwLock};
use rand::Rng;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    GuildQueueFilters, GuildQueueHistory, GuildQueueOptions, GuildQueuePlayerNode, PlayOptions, RepeatMode,
    QueueStrategy, TrackQueue, history::HistoryList,
};
use crate::{
    audio::{
        filters::{FfmpegFilters, FilterSettings},
        resource::AudioResource,
    },
    common::{
        errors::{PlayerError, PlayerResult},
        types::{ChannelRef, GuildId, VoiceChannel},
    },
    events::{QueueEvent, TriggerReason},
    player::{Player, PlayerInner},
    protocol::{playlist::Playlist, tracks::Track, format_duration},
    voice::{ConnectionStatus, DispatcherEvent, ErrorSource, JoinConfig, StreamDispatcher},
};

/// What can be added to a queue in one call.
#[derive(Debug, Clone)]
pub enum TrackInput {
    Track(Arc<Track>),
    Tracks(Vec<Arc<Track>>),
    Playlist(Arc<Playlist>),
}

impl TrackInput {
    fn into_tracks(self) -> Vec<Arc<Track>> {
        match self {
            Self::Track(track) => vec![track],
            Self::Tracks(tracks) => tracks,
            Self::Playlist(playlist) => playlist.tracks().to_vec(),
        }
    }
}

impl From<Arc<Track>> for TrackInput {
    fn from(track: Arc<Track>) -> Self {
        Self::Track(track)
    }
}

impl From<Track> for TrackInput {
    fn from(track: Track) -> Self {
        Self::Track(track.into_shared())
    }
}

impl From<Vec<Arc<Track>>> for TrackInput {
    fn from(tracks: Vec<Arc<Track>>) -> Self {
        Self::Tracks(tracks)
    }
}

impl From<Arc<Playlist>> for TrackInput {
    fn from(playlist: Arc<Playlist>) -> Self {
        Self::Playlist(playlist)
    }
}

pub(crate) struct QueueInner {
    pub(crate) id: Uuid,
    pub(crate) guild_id: GuildId,
    pub(crate) player: Weak<PlayerInner>,
    pub(crate) options: RwLock<GuildQueueOptions>,
    pub(crate) tracks: Mutex<TrackQueue<Arc<Track>>>,
    pub(crate) history: Mutex<HistoryList>,
    pub(crate) dispatcher: RwLock<Option<Arc<StreamDispatcher>>>,
    pub(crate) channel: RwLock<Option<VoiceChannel>>,
    pub(crate) tasks_queue: super::AsyncQueue,
    pub(crate) timers: Mutex<HashMap<String, JoinHandle<()>>>,
    /// Last applied DSP parameters; every new resource starts from these.
    pub(crate) filters: Mutex<FilterSettings>,
    pub(crate) ffmpeg: Mutex<FfmpegFilters>,
    pub(crate) transitioning: AtomicBool,
    pub(crate) deleted: AtomicBool,
    pub(crate) buffering: AtomicBool,
    /// Set while playback is paused because the channel emptied.
    pub(crate) empty_paused: AtomicBool,
    pub(crate) shuffle: AtomicBool,
    pub(crate) current_track: Mutex<Option<Arc<Track>>>,
    /// Milliseconds already played before the current resource started.
    pub(crate) progress_ms: AtomicU64,
    pub(crate) metadata: RwLock<serde_json::Value>,
}

/// Playback state of one guild. Cheap to clone; every clone is the same
/// queue.
#[derive(Clone)]
pub struct GuildQueue {
    pub(crate) inner: Arc<QueueInner>,
}

impl std::fmt::Debug for GuildQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuildQueue")
            .field("id", &self.inner.id)
            .field("guild_id", &self.inner.guild_id)
            .field("size", &self.size())
            .field("deleted", &self.is_deleted())
            .finish()
    }
}

impl PartialEq for GuildQueue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl GuildQueue {
    pub(crate) fn new(player: Weak<PlayerInner>, guild_id: GuildId, options: GuildQueueOptions) -> Self {
        let inner = QueueInner {
            id: Uuid::new_v4(),
            guild_id,
            player,
            tracks: Mutex::new(TrackQueue::new(options.strategy)),
            history: Mutex::new(HistoryList::new(options.max_history_size)),
            dispatcher: RwLock::new(None),
            channel: RwLock::new(None),
            tasks_queue: super::AsyncQueue::new(),
            timers: Mutex::new(HashMap::new()),
            filters: Mutex::new(options.initial_filters()),
            ffmpeg: Mutex::new(FfmpegFilters::new(&options.ffmpeg_filters)),
            transitioning: AtomicBool::new(false),
            deleted: AtomicBool::new(false),
            buffering: AtomicBool::new(false),
            empty_paused: AtomicBool::new(false),
            shuffle: AtomicBool::new(false),
            current_track: Mutex::new(None),
            progress_ms: AtomicU64::new(0),
            metadata: RwLock::new(options.metadata.clone()),
            options: RwLock::new(options),
        };
        Self { inner: Arc::new(inner) }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn guild_id(&self) -> GuildId {
        self.inner.guild_id
    }

    /// The owning player, unless it has been dropped.
    pub fn player(&self) -> Option<Player> {
        self.inner.player.upgrade().map(Player::from_inner)
    }

    pub(crate) fn player_handle(&self) -> PlayerResult<Player> {
        self.player().ok_or(PlayerError::NoGuildQueue(self.guild_id()))
    }

    pub fn options(&self) -> GuildQueueOptions {
        self.inner.options.read().clone()
    }

    pub fn node(&self) -> GuildQueuePlayerNode {
        GuildQueuePlayerNode::new(self.clone())
    }

    pub fn history(&self) -> GuildQueueHistory {
        GuildQueueHistory::new(self.clone())
    }

    pub fn filters(&self) -> GuildQueueFilters {
        GuildQueueFilters::new(self.clone())
    }

    pub fn metadata(&self) -> serde_json::Value {
        self.inner.metadata.read().clone()
    }

    pub fn set_metadata(&self, metadata: serde_json::Value) {
        *self.inner.metadata.write() = metadata;
    }

    // Track list

    pub fn tracks(&self) -> Vec<Arc<Track>> {
        self.inner.tracks.lock().to_vec()
    }

    /// Number of queued tracks, history excluded.
    pub fn size(&self) -> usize {
        self.inner.tracks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn max_size(&self) -> Option<usize> {
        self.inner.options.read().max_size
    }

    pub fn is_full(&self) -> bool {
        self.get_capacity() == Some(0)
    }

    /// Free slots, or `None` when the queue is unbounded.
    pub fn get_capacity(&self) -> Option<usize> {
        self.max_size().map(|max| max.saturating_sub(self.size()))
    }

    /// Fails with [`PlayerError::OutOfSpace`] unless `incoming` more tracks
    /// fit next to the `current` ones.
    pub(crate) fn check_capacity(&self, current: usize, incoming: usize) -> PlayerResult<()> {
        let Some(max) = self.max_size() else {
            return Ok(());
        };
        let available = max.saturating_sub(current);
        if incoming > available {
            return Err(PlayerError::OutOfSpace {
                attempted: incoming,
                available,
            });
        }
        Ok(())
    }

    /// Appends tracks. Either everything fits and is added, or nothing is.
    pub fn add_track(&self, input: impl Into<TrackInput>) -> PlayerResult<()> {
        let tracks = input.into().into_tracks();
        if tracks.is_empty() {
            return Ok(());
        }
        {
            let mut list = self.inner.tracks.lock();
            self.check_capacity(list.len(), tracks.len())?;
            list.add_many(tracks.iter().cloned());
        }

        if tracks.len() == 1 {
            self.emit(QueueEvent::AudioTrackAdd(tracks[0].clone()));
        } else {
            self.emit(QueueEvent::AudioTracksAdd(tracks));
        }
        Ok(())
    }

    /// Drops every queued track. History is kept.
    pub fn clear(&self) {
        self.inner.tracks.lock().clear();
    }

    /// Shuffles the queued tracks in place.
    pub fn shuffle(&self) {
        self.inner.tracks.lock().shuffle();
    }

    /// Dynamic shuffle picks a random queued track on every advance instead
    /// of reordering the list.
    pub fn is_shuffling(&self) -> bool {
        self.inner.shuffle.load(Ordering::Acquire)
    }

    pub fn enable_shuffle(&self) {
        self.inner.shuffle.store(true, Ordering::Release);
    }

    pub fn disable_shuffle(&self) {
        self.inner.shuffle.store(false, Ordering::Release);
    }

    /// Flips dynamic shuffle and returns the new state.
    pub fn toggle_shuffle(&self) -> bool {
        !self.inner.shuffle.fetch_xor(true, Ordering::AcqRel)
    }

    /// Next track to play, honouring dynamic shuffle.
    pub(crate) fn dispatch_next(&self) -> Option<Arc<Track>> {
        let mut list = self.inner.tracks.lock();
        if self.is_shuffling() {
            list.dispatch_random()
        } else {
            list.dispatch()
        }
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.inner.options.read().repeat_mode
    }

    pub fn set_repeat_mode(&self, mode: RepeatMode) {
        self.inner.options.write().repeat_mode = mode;
    }

    pub fn strategy(&self) -> QueueStrategy {
        self.inner.tracks.lock().strategy()
    }

    pub fn set_strategy(&self, strategy: QueueStrategy) {
        self.inner.options.write().strategy = strategy;
        self.inner.tracks.lock().set_strategy(strategy);
    }

    /// Sum of the queued tracks' durations in milliseconds.
    pub fn estimated_duration(&self) -> u64 {
        self.inner.tracks.lock().iter().map(|t| t.duration_ms).sum()
    }

    pub fn duration_formatted(&self) -> String {
        format_duration(self.estimated_duration())
    }

    // Playback state

    pub fn dispatcher(&self) -> Option<Arc<StreamDispatcher>> {
        self.inner.dispatcher.read().clone()
    }

    pub fn channel(&self) -> Option<VoiceChannel> {
        self.inner.channel.read().clone()
    }

    pub fn connection_status(&self) -> Option<ConnectionStatus> {
        self.dispatcher().map(|d| d.status())
    }

    pub fn is_connected(&self) -> bool {
        self.dispatcher().is_some_and(|d| !d.is_destroyed())
    }

    pub fn is_playing(&self) -> bool {
        self.dispatcher().is_some_and(|d| d.is_playing())
    }

    /// The playing track: the dispatcher's resource first, then the pointer
    /// kept across transitions.
    pub fn current_track(&self) -> Option<Arc<Track>> {
        self.dispatcher()
            .and_then(|d| d.resource())
            .and_then(|r| r.metadata().cloned())
            .or_else(|| self.inner.current_track.lock().clone())
    }

    pub fn is_transitioning(&self) -> bool {
        self.inner.transitioning.load(Ordering::Acquire)
    }

    pub fn set_transitioning(&self, state: bool) {
        self.inner.transitioning.store(state, Ordering::Release);
    }

    pub fn is_deleted(&self) -> bool {
        self.inner.deleted.load(Ordering::Acquire)
    }

    pub(crate) fn filter_cache(&self) -> FilterSettings {
        self.inner.filters.lock().clone()
    }

    pub(crate) fn ffmpeg_filter_string(&self) -> String {
        self.inner.ffmpeg.lock().filter_string()
    }

    // Events

    /// Emits `event` to the player's listeners. A deleted queue emits
    /// nothing and returns `false`.
    pub fn emit(&self, event: QueueEvent) -> bool {
        if self.is_deleted() {
            return false;
        }
        match self.inner.player.upgrade() {
            Some(player) => player.events.emit(self, event),
            None => false,
        }
    }

    // Timers

    /// Runs `task` after `delay` unless cancelled first. A timer with the
    /// same name is replaced.
    pub(crate) fn schedule<F, Fut>(&self, name: String, delay: Duration, task: F)
    where
        F: FnOnce(GuildQueue) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let weak = Arc::downgrade(&self.inner);
        let key = name.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            inner.timers.lock().remove(&key);
            task(GuildQueue { inner }).await;
        });
        if let Some(previous) = self.inner.timers.lock().insert(name, handle) {
            previous.abort();
        }
    }

    pub(crate) fn cancel_timer(&self, name: &str) -> bool {
        match self.inner.timers.lock().remove(name) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn has_timer(&self, name: &str) -> bool {
        self.inner
            .timers
            .lock()
            .get(name)
            .is_some_and(|h| !h.is_finished())
    }

    fn cancel_all_timers(&self) {
        for (_, handle) in self.inner.timers.lock().drain() {
            handle.abort();
        }
    }

    // Connection

    /// Joins `channel`, replacing a dispatcher bound to another channel.
    pub async fn connect(&self, channel: impl Into<ChannelRef>) -> PlayerResult<()> {
        if self.is_deleted() {
            return Err(PlayerError::NoGuildQueue(self.guild_id()));
        }
        let player = self.player_handle()?;
        let channel_ref = channel.into();
        let channel = player
            .inner
            .voice
            .adapter()
            .resolve_channel(Some(self.guild_id()), &channel_ref)
            .await
            .map_err(|_| PlayerError::NoVoiceChannel(channel_ref.id().to_string()))?;

        if !channel.kind.is_voice_based() {
            return Err(PlayerError::InvalidChannelType {
                expected: "voice or stage channel".into(),
                received: format!("{:?}", channel.kind),
            });
        }
        if channel.guild_id != self.guild_id() {
            return Err(PlayerError::invalid_arg(
                "channel",
                format!("a channel of guild {}", self.guild_id()),
                format!("channel of guild {}", channel.guild_id),
            ));
        }

        if let Some(old) = self.dispatcher() {
            if old.channel().id != channel.id || old.is_destroyed() {
                debug!(
                    "[{}] Replacing dispatcher on {} with one on {}",
                    self.guild_id(),
                    old.channel().id,
                    channel.id
                );
                self.inner.dispatcher.write().take();
                old.unsubscribe();
                old.disconnect();
                player.inner.voice.evict(&old);
            }
        }

        let options = self.options();
        let join = JoinConfig {
            self_deaf: options.self_deaf,
            self_mute: false,
            timeout: options.connection_timeout,
        };
        let dispatcher = player.inner.voice.connect(&channel, &join).await?;

        let attached = self
            .dispatcher()
            .is_some_and(|current| Arc::ptr_eq(&current, &dispatcher));
        if !attached {
            self.attach(dispatcher);
        }
        *self.inner.channel.write() = Some(channel.clone());

        info!("[{}] Connected to voice channel {} ({})", self.guild_id(), channel.name, channel.id);
        self.emit(QueueEvent::Connection);
        Ok(())
    }

    fn attach(&self, dispatcher: Arc<StreamDispatcher>) {
        let rx = dispatcher.subscribe();
        *self.inner.dispatcher.write() = Some(dispatcher.clone());

        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            while let Ok(event) = rx.recv_async().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                GuildQueue { inner }.handle_dispatcher_event(&dispatcher, event).await;
            }
        });
    }

    async fn handle_dispatcher_event(&self, dispatcher: &Arc<StreamDispatcher>, event: DispatcherEvent) {
        match event {
            DispatcherEvent::Start(resource) => {
                self.inner.buffering.store(false, Ordering::Release);
                let Some(track) = resource.metadata().cloned() else {
                    return;
                };
                *self.inner.current_track.lock() = Some(track.clone());

                let reason = if self.inner.transitioning.swap(false, Ordering::AcqRel) {
                    TriggerReason::Filters
                } else {
                    TriggerReason::Normal
                };
                self.emit(QueueEvent::PlayerTrigger {
                    track: track.clone(),
                    reason,
                });
                if reason == TriggerReason::Normal {
                    self.emit(QueueEvent::PlayerStart(track));
                }
            }
            DispatcherEvent::Finish(resource) => self.handle_finish(resource).await,
            DispatcherEvent::Error { error, source } => {
                self.inner.buffering.store(false, Ordering::Release);
                match source {
                    ErrorSource::Connection => {
                        self.emit(QueueEvent::Error(error));
                    }
                    ErrorSource::AudioPlayer(resource) => {
                        self.emit(QueueEvent::PlayerError {
                            error,
                            track: resource.metadata().cloned(),
                        });
                    }
                }
            }
            DispatcherEvent::Debug(message) => {
                self.emit(QueueEvent::Debug(message));
            }
            DispatcherEvent::Destroyed => {
                {
                    let mut slot = self.inner.dispatcher.write();
                    if slot.as_ref().is_some_and(|d| Arc::ptr_eq(d, dispatcher)) {
                        slot.take();
                    }
                }
                self.emit(QueueEvent::ConnectionDestroyed);
            }
        }
    }

    async fn handle_finish(&self, resource: Arc<AudioResource>) {
        let track = resource
            .metadata()
            .cloned()
            .or_else(|| self.inner.current_track.lock().clone());

        if self.inner.transitioning.swap(false, Ordering::AcqRel) {
            debug!("[{}] Ignoring finish of a replaced stream", self.guild_id());
            return;
        }

        self.inner.current_track.lock().take();
        self.inner.progress_ms.store(0, Ordering::Release);
        if let Some(track) = &track {
            self.inner.history.lock().push(track.clone());
            self.emit(QueueEvent::PlayerFinish(track.clone()));
        }

        if self.is_deleted() {
            return;
        }

        let mode = self.repeat_mode();
        if self.is_empty() && mode == RepeatMode::Off {
            self.handle_queue_end();
            return;
        }
        let Some(finished) = track else {
            self.play_next(None).await;
            return;
        };

        match mode {
            RepeatMode::Track => {
                let replay = self.inner.history.lock().pop().unwrap_or(finished);
                self.play_next(Some(replay)).await;
            }
            RepeatMode::Queue => {
                self.inner.tracks.lock().add(finished);
                self.play_next(None).await;
            }
            RepeatMode::Autoplay if self.is_empty() => {
                if !self.autoplay(&finished).await {
                    self.handle_queue_end();
                }
            }
            _ => self.play_next(None).await,
        }
    }

    async fn play_next(&self, track: Option<Arc<Track>>) {
        if let Err(error) = self.node().play(track.clone(), PlayOptions::immediate()).await {
            warn!("[{}] Failed to advance the queue: {}", self.guild_id(), error);
            self.emit(QueueEvent::PlayerError { error, track });
        }
    }

    /// Plays one of the first five related tracks. `false` when nothing
    /// could be played.
    async fn autoplay(&self, finished: &Arc<Track>) -> bool {
        let Some(player) = self.player() else {
            return false;
        };
        let block = player.inner.config.player.block_extractors.clone();
        let Some((extractor, info)) = player.inner.extractors.related(finished, &block).await else {
            debug!("[{}] Autoplay found no related tracks", self.guild_id());
            return false;
        };

        let played: Vec<String> = self.inner.history.lock().to_vec().iter().map(|t| t.url.clone()).collect();
        let mut candidates: Vec<Arc<Track>> = info
            .tracks
            .iter()
            .filter(|t| !played.contains(&t.url))
            .cloned()
            .collect();
        if candidates.is_empty() {
            candidates = info.tracks;
        }
        candidates.truncate(5);
        if candidates.is_empty() {
            return false;
        }
        let pick = {
            let idx = rand::thread_rng().gen_range(0..candidates.len());
            candidates.swap_remove(idx)
        };

        debug!("[{}] Autoplaying {} from {}", self.guild_id(), pick.title, extractor);
        let options = PlayOptions {
            queue: false,
            seek_ms: 0,
            transition: false,
        };
        match self.node().play(Some(pick.clone()), options).await {
            Ok(()) => true,
            Err(error) => {
                self.emit(QueueEvent::PlayerError {
                    error,
                    track: Some(pick),
                });
                false
            }
        }
    }

    fn handle_queue_end(&self) {
        self.emit(QueueEvent::EmptyQueue);
        let options = self.options();
        if !options.leave_on_end {
            return;
        }
        self.schedule(
            format!("end_{}", self.guild_id()),
            options.leave_on_end_cooldown,
            |queue| async move {
                if queue.is_deleted() || queue.is_playing() || !queue.is_empty() {
                    return;
                }
                info!("[{}] Queue ended, leaving voice", queue.guild_id());
                let _ = queue.delete();
            },
        );
    }

    /// Restarts the current track at `seek_ms` so codec-level changes take
    /// effect. Serialized with other connect and play work on this queue.
    pub(crate) async fn replay(&self, seek_ms: u64) -> PlayerResult<bool> {
        if self.current_track().is_none() {
            return Ok(false);
        }
        let mut entry = self.inner.tasks_queue.acquire(None);
        entry.get_task().await?;

        let Some(track) = self.current_track() else {
            return Ok(false);
        };
        let was_paused = self.dispatcher().is_some_and(|d| d.paused());
        let options = PlayOptions {
            queue: false,
            seek_ms,
            transition: true,
        };
        let result = self.node().play(Some(track), options).await;
        if result.is_ok() && was_paused {
            if let Some(dispatcher) = self.dispatcher() {
                dispatcher.pause(true);
            }
        }
        entry.release();
        result.map(|_| true)
    }

    // Lifecycle

    /// Tears the queue down: releases the dispatcher, clears both lists,
    /// cancels timers and unregisters from the player.
    pub fn delete(&self) -> PlayerResult<()> {
        if self.is_deleted() {
            return Err(PlayerError::NoGuildQueue(self.guild_id()));
        }

        // Unregister first so `create` never hands out a queue being torn down.
        let player = self.inner.player.upgrade();
        if let Some(player) = &player {
            player.nodes.remove(self);
        }

        self.emit(QueueEvent::QueueDelete);
        let dispatcher = self.inner.dispatcher.write().take();
        if dispatcher.is_some() {
            self.emit(QueueEvent::Disconnect);
        }
        self.inner.deleted.store(true, Ordering::Release);

        self.inner.tasks_queue.clear();
        self.cancel_all_timers();
        self.inner.tracks.lock().clear();
        self.inner.history.lock().clear();
        self.inner.current_track.lock().take();
        self.inner.transitioning.store(false, Ordering::Release);
        self.inner.buffering.store(false, Ordering::Release);
        self.inner.empty_paused.store(false, Ordering::Release);
        self.inner.progress_ms.store(0, Ordering::Release);
        self.inner.channel.write().take();

        if let Some(dispatcher) = dispatcher {
            dispatcher.unsubscribe();
            dispatcher.disconnect();
            if let Some(player) = &player {
                player.voice.evict(&dispatcher);
            }
        }

        info!("[{}] Queue {} deleted", self.guild_id(), self.id());
        Ok(())
    }

    /// Brings a deleted queue back into the player's registry.
    pub fn revive(&self) -> PlayerResult<()> {
        if !self.is_deleted() {
            return Ok(());
        }
        let player = self.player_handle()?;
        player.inner.nodes.restore(self)?;

        self.inner.transitioning.store(false, Ordering::Release);
        self.inner.deleted.store(false, Ordering::Release);
        info!("[{}] Queue {} revived", self.guild_id(), self.id());
        self.emit(QueueEvent::QueueCreate);
        Ok(())
    }
}
