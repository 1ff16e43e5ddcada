//! In-memory collaborators for unit tests.

use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::{
    audio::{
        constants::FRAME_SIZE_BYTES,
        encoder::{FrameEncoder, RawFrameEncoder},
        resource::PcmStream,
    },
    common::{
        errors::{PlayerError, PlayerResult},
        types::{ChannelId, ChannelKind, ChannelRef, GuildId, UserId, VoiceChannel, VoiceMember},
    },
    configs::Config,
    events::{EventKind, QueueEvent},
    extractors::{Extractor, ExtractorInfo, ExtractorSearchContext},
    player::{Player, PlayerOptions, PlayerRegistry, SearchOptions},
    protocol::{query::QueryType, tracks::Track},
    transcoder::StreamSource,
    voice::{ConnectionStatus, JoinConfig, VoiceAdapter, VoiceConnection},
};

/// `frames` 20 ms frames of s16le stereo.
pub(crate) fn pcm_stream(frames: usize) -> PcmStream {
    let data: Vec<u8> = (0..frames * FRAME_SIZE_BYTES).map(|i| (i % 7) as u8).collect();
    Box::new(std::io::Cursor::new(data))
}

/// A one minute track that no extractor knows.
pub(crate) fn track(title: &str) -> Arc<Track> {
    Track::new(title, format!("mem://{title}"))
        .with_duration_ms(60_000)
        .into_shared()
}

pub(crate) struct MockConnection {
    guild: GuildId,
    channel: ChannelId,
    status: watch::Sender<ConnectionStatus>,
    rejoins: AtomicUsize,
    frames: AtomicUsize,
}

impl MockConnection {
    pub(crate) fn new(guild: GuildId, channel: ChannelId, status: ConnectionStatus) -> Arc<Self> {
        let (tx, _rx) = watch::channel(status);
        Arc::new(Self {
            guild,
            channel,
            status: tx,
            rejoins: AtomicUsize::new(0),
            frames: AtomicUsize::new(0),
        })
    }

    pub(crate) fn ready(guild: GuildId) -> Arc<Self> {
        Self::new(guild, ChannelId(10), ConnectionStatus::Ready)
    }

    pub(crate) fn connecting(guild: GuildId) -> Arc<Self> {
        Self::new(guild, ChannelId(10), ConnectionStatus::Connecting)
    }

    pub(crate) fn set_status(&self, status: ConnectionStatus) {
        self.status.send_replace(status);
    }

    pub(crate) fn rejoin_count(&self) -> usize {
        self.rejoins.load(Ordering::SeqCst)
    }

    pub(crate) fn frames_sent(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoiceConnection for MockConnection {
    fn guild_id(&self) -> GuildId {
        self.guild
    }

    fn channel_id(&self) -> ChannelId {
        self.channel
    }

    fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    async fn rejoin(&self) -> PlayerResult<()> {
        self.rejoins.fetch_add(1, Ordering::SeqCst);
        self.set_status(ConnectionStatus::Ready);
        Ok(())
    }

    fn set_speaking(&self, _speaking: bool) {}

    fn send_frame(&self, _packet: Bytes) -> PlayerResult<()> {
        self.frames.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn destroy(&self) {
        self.set_status(ConnectionStatus::Destroyed);
    }
}

/// Platform stand-in. Unknown channel ids resolve to voice channels of the
/// requested guild, or of guild 1.
pub(crate) struct MockAdapter {
    joins: AtomicUsize,
    connections: DashMap<GuildId, Arc<MockConnection>>,
    members: DashMap<ChannelId, Vec<VoiceMember>>,
    text_channels: Mutex<HashSet<ChannelId>>,
}

impl MockAdapter {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            joins: AtomicUsize::new(0),
            connections: DashMap::new(),
            members: DashMap::new(),
            text_channels: Mutex::new(HashSet::new()),
        })
    }

    pub(crate) fn join_count(&self) -> usize {
        self.joins.load(Ordering::SeqCst)
    }

    pub(crate) fn connection(&self, guild: GuildId) -> Option<Arc<MockConnection>> {
        self.connections.get(&guild).map(|c| c.clone())
    }

    pub(crate) fn set_members(&self, channel: ChannelId, members: Vec<VoiceMember>) {
        self.members.insert(channel, members);
    }

    pub(crate) fn add_text_channel(&self, channel: ChannelId) {
        self.text_channels.lock().insert(channel);
    }
}

#[async_trait]
impl VoiceAdapter for MockAdapter {
    fn name(&self) -> &str {
        "mock"
    }

    fn me(&self) -> UserId {
        UserId(999)
    }

    async fn resolve_channel(&self, guild: Option<GuildId>, channel: &ChannelRef) -> PlayerResult<VoiceChannel> {
        let id = match channel {
            ChannelRef::Resolved(channel) => return Ok(channel.clone()),
            ChannelRef::Id(id) => *id,
        };
        let kind = if self.text_channels.lock().contains(&id) {
            ChannelKind::Text
        } else {
            ChannelKind::Voice
        };
        Ok(VoiceChannel {
            id,
            guild_id: guild.unwrap_or(GuildId(1)),
            name: format!("vc-{id}"),
            kind,
        })
    }

    async fn join(&self, channel: &VoiceChannel, _config: &JoinConfig) -> PlayerResult<Arc<dyn VoiceConnection>> {
        self.joins.fetch_add(1, Ordering::SeqCst);
        let connection = MockConnection::new(channel.guild_id, channel.id, ConnectionStatus::Ready);
        self.connections.insert(channel.guild_id, connection.clone());
        Ok(connection)
    }

    fn get_connection(&self, guild: GuildId) -> Option<Arc<dyn VoiceConnection>> {
        self.connection(guild).map(|c| c as Arc<dyn VoiceConnection>)
    }

    fn channel_members(&self, channel: ChannelId) -> Vec<VoiceMember> {
        self.members.get(&channel).map(|m| m.clone()).unwrap_or_default()
    }
}

/// Serves fixed titles as PCM.
pub(crate) struct MemoryExtractor {
    id: String,
    titles: Vec<String>,
    related: Vec<String>,
    frames: usize,
}

impl MemoryExtractor {
    pub(crate) fn new(id: &str, titles: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            titles: titles.iter().map(|t| t.to_string()).collect(),
            related: Vec::new(),
            frames: 50,
        }
    }

    pub(crate) fn with_related(mut self, titles: &[&str]) -> Self {
        self.related = titles.iter().map(|t| t.to_string()).collect();
        self
    }

    pub(crate) fn with_frames(mut self, frames: usize) -> Self {
        self.frames = frames;
        self
    }

    pub(crate) fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn make(&self, title: &str) -> Arc<Track> {
        Track::new(title, format!("mem://{title}"))
            .with_duration_ms(60_000)
            .with_extractor(self.id.clone())
            .into_shared()
    }

    fn knows(&self, title: &str) -> bool {
        self.titles.iter().chain(&self.related).any(|t| t == title)
    }
}

#[async_trait]
impl Extractor for MemoryExtractor {
    fn identifier(&self) -> &str {
        &self.id
    }

    async fn validate(&self, query: &str, _query_type: QueryType) -> bool {
        self.titles
            .iter()
            .any(|t| t == query || format!("mem://{t}") == query)
    }

    async fn handle(&self, query: &str, _context: &ExtractorSearchContext) -> PlayerResult<ExtractorInfo> {
        let tracks = self
            .titles
            .iter()
            .filter(|t| *t == query || format!("mem://{t}") == query)
            .map(|t| self.make(t))
            .collect();
        Ok(ExtractorInfo::from_tracks(tracks))
    }

    async fn stream(&self, track: &Track) -> PlayerResult<StreamSource> {
        if !self.knows(&track.title) {
            return Err(PlayerError::NoResult(format!("{} is not in memory", track.title)));
        }
        Ok(StreamSource::Pcm(pcm_stream(self.frames)))
    }

    async fn get_related_tracks(&self, _track: &Track) -> PlayerResult<ExtractorInfo> {
        Ok(ExtractorInfo::from_tracks(
            self.related.iter().map(|t| self.make(t)).collect(),
        ))
    }
}

/// Counts every event a player emits.
pub(crate) struct EventRecorder {
    kinds: Arc<Mutex<Vec<EventKind>>>,
    started: Arc<Mutex<Vec<String>>>,
}

impl EventRecorder {
    pub(crate) fn attach(player: &Player) -> Self {
        let kinds = Arc::new(Mutex::new(Vec::new()));
        let started = Arc::new(Mutex::new(Vec::new()));
        for kind in EventKind::ALL {
            let kinds = kinds.clone();
            let started = started.clone();
            player.on(kind, move |_, event| {
                kinds.lock().push(event.kind());
                match event {
                    QueueEvent::PlayerStart(track) => started.lock().push(track.title.clone()),
                    QueueEvent::WillPlayTrack { done, .. } => done.done(),
                    _ => {}
                }
            });
        }
        Self { kinds, started }
    }

    pub(crate) fn count(&self, kind: EventKind) -> usize {
        self.kinds.lock().iter().filter(|k| **k == kind).count()
    }

    pub(crate) fn started_titles(&self) -> Vec<String> {
        self.started.lock().clone()
    }
}

/// A player wired to a [`MockAdapter`], a raw frame encoder and the
/// default transcoder.
pub(crate) struct TestPlayer {
    pub player: Player,
    pub adapter: Arc<MockAdapter>,
}

impl TestPlayer {
    pub(crate) async fn new() -> Self {
        Self::build(Config::default(), None, None).await
    }

    pub(crate) async fn with_extractor(extractor: Arc<MemoryExtractor>) -> Self {
        Self::build(Config::default(), Some(extractor), None).await
    }

    pub(crate) async fn with_config(config: Config) -> Self {
        Self::build(config, None, None).await
    }

    pub(crate) async fn with_registry(registry: Arc<PlayerRegistry>) -> Self {
        Self::build(Config::default(), None, Some(registry)).await
    }

    async fn build(
        config: Config,
        extractor: Option<Arc<MemoryExtractor>>,
        registry: Option<Arc<PlayerRegistry>>,
    ) -> Self {
        let adapter = MockAdapter::new();
        let client: Arc<dyn VoiceAdapter> = adapter.clone();
        let player = Player::new(
            &client,
            PlayerOptions {
                config,
                encoder_factory: Some(Arc::new(|| Ok(Box::new(RawFrameEncoder) as Box<dyn FrameEncoder>))),
                registry,
                ..Default::default()
            },
        )
        .unwrap();
        if let Some(extractor) = extractor {
            player.extractors().register(extractor).await.unwrap();
        }
        Self { player, adapter }
    }

    /// First search hit for `title`.
    pub(crate) async fn search(&self, title: &str) -> Arc<Track> {
        self.player
            .search(title, SearchOptions::default())
            .await
            .unwrap()
            .tracks
            .into_iter()
            .next()
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_extractor_streams_known_titles_only() {
        let extractor = MemoryExtractor::new("mem", &["a"]).with_related(&["b"]);
        assert!(extractor.validate("a", QueryType::Auto).await);
        assert!(extractor.validate("mem://a", QueryType::Auto).await);
        assert!(!extractor.validate("b", QueryType::Auto).await);
        assert!(extractor.stream(&track("b")).await.is_ok());
        assert!(extractor.stream(&track("c")).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_connection_counts_frames() {
        let conn = MockConnection::ready(GuildId(1));
        conn.send_frame(Bytes::from_static(&[1, 2])).unwrap();
        assert_eq!(conn.frames_sent(), 1);
        conn.destroy();
        assert!(conn.status().is_destroyed());
    }
}
