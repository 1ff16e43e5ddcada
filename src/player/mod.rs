pub mod manager;
pub mod registry;

pub use manager::GuildNodeManager;
pub use registry::PlayerRegistry;

use std::{any::Any, sync::Arc};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    common::{
        errors::{PlayerError, PlayerResult},
        types::{ChannelRef, UserId, VoiceStateSnapshot},
    },
    configs::Config,
    events::{EventEmitter, EventKind, ListenerId, QueueEvent},
    extractors::{ExtractorManager, ExtractorSearchContext, HttpExtractor, LocalFileExtractor},
    protocol::{
        playlist::Playlist,
        query::{QueryResolver, QueryType},
        tracks::Track,
    },
    queue::{GuildQueue, GuildQueueOptions, PlayOptions, TrackInput, voice_state},
    transcoder::{FfmpegTranscoder, Transcoder},
    voice::{AdapterRegistry, EncoderFactory, VoiceUtils},
};

pub(crate) struct PlayerInner {
    pub(crate) id: Uuid,
    pub(crate) config: Config,
    pub(crate) voice: VoiceUtils,
    pub(crate) extractors: ExtractorManager,
    pub(crate) events: EventEmitter,
    pub(crate) nodes: GuildNodeManager,
    pub(crate) transcoder: Arc<dyn Transcoder>,
    pub(crate) query_resolver: QueryResolver,
    pub(crate) registry: Option<Arc<PlayerRegistry>>,
}

/// How a [`Player`] is put together.
#[derive(Default)]
pub struct PlayerOptions {
    pub config: Config,
    pub adapters: AdapterRegistry,
    /// Defaults to an [`FfmpegTranscoder`] at `config.player.ffmpeg_path`.
    pub transcoder: Option<Arc<dyn Transcoder>>,
    /// Defaults to Opus.
    pub encoder_factory: Option<EncoderFactory>,
    pub registry: Option<Arc<PlayerRegistry>>,
}

/// Entry point of the crate: owns the extractors, the event listeners and
/// one queue per guild. Cheap to clone.
#[derive(Clone)]
pub struct Player {
    pub(crate) inner: Arc<PlayerInner>,
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("id", &self.inner.id)
            .field("queues", &self.inner.nodes.len())
            .finish()
    }
}

/// Where a search is sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SearchEngine {
    /// Classify the query and ask every extractor.
    #[default]
    Auto,
    /// Treat the query as the given type.
    Query(QueryType),
    /// Ask only the named extractor.
    Extractor(String),
}

impl SearchEngine {
    /// Parses `ext:<id>` into [`SearchEngine::Extractor`]; anything else is
    /// [`SearchEngine::Auto`].
    pub fn parse(value: &str) -> Self {
        match value.strip_prefix("ext:") {
            Some(id) if !id.is_empty() => Self::Extractor(id.to_string()),
            _ => Self::Auto,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub requested_by: Option<UserId>,
    pub search_engine: SearchEngine,
    /// Added to the configured block list for this search only.
    pub block_extractors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub query: String,
    pub query_type: QueryType,
    /// Identifier of the extractor that answered.
    pub extractor: Option<String>,
    pub playlist: Option<Arc<Playlist>>,
    pub tracks: Vec<Arc<Track>>,
    pub requested_by: Option<UserId>,
}

impl SearchResult {
    fn empty(query: &str, query_type: QueryType, requested_by: Option<UserId>) -> Self {
        Self {
            query: query.to_string(),
            query_type,
            extractor: None,
            playlist: None,
            tracks: Vec::new(),
            requested_by,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn has_playlist(&self) -> bool {
        self.playlist.is_some()
    }
}

/// Anything [`Player::play`] can start from.
#[derive(Debug, Clone)]
pub enum PlayQuery {
    Search(String),
    Track(Arc<Track>),
    Playlist(Arc<Playlist>),
    Result(SearchResult),
}

impl From<&str> for PlayQuery {
    fn from(query: &str) -> Self {
        Self::Search(query.to_string())
    }
}

impl From<String> for PlayQuery {
    fn from(query: String) -> Self {
        Self::Search(query)
    }
}

impl From<Arc<Track>> for PlayQuery {
    fn from(track: Arc<Track>) -> Self {
        Self::Track(track)
    }
}

impl From<Arc<Playlist>> for PlayQuery {
    fn from(playlist: Arc<Playlist>) -> Self {
        Self::Playlist(playlist)
    }
}

impl From<SearchResult> for PlayQuery {
    fn from(result: SearchResult) -> Self {
        Self::Result(result)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlayerPlayOptions {
    pub search: SearchOptions,
    /// Used only when the guild has no queue yet. Defaults to the
    /// configured queue settings.
    pub node_options: Option<GuildQueueOptions>,
    /// Cancels the wait for the guild's task gate.
    pub signal: Option<CancellationToken>,
}

#[derive(Debug, Clone)]
pub struct PlayResult {
    /// The first track that was added.
    pub track: Arc<Track>,
    pub extractor: Option<String>,
    pub search_result: SearchResult,
    pub queue: GuildQueue,
}

impl Player {
    /// Builds a player for `client`. The first adapter factory accepting the
    /// client is used for the player's whole life.
    pub fn new(client: &(dyn Any + Send + Sync), options: PlayerOptions) -> PlayerResult<Self> {
        let PlayerOptions {
            config,
            adapters,
            transcoder,
            encoder_factory,
            registry,
        } = options;

        let adapter = adapters.select(client)?;
        let mut voice = VoiceUtils::new(adapter, config.voice.clone());
        if let Some(factory) = encoder_factory {
            voice = voice.with_encoder_factory(factory);
        }
        let transcoder = transcoder
            .unwrap_or_else(|| Arc::new(FfmpegTranscoder::new(config.player.ffmpeg_path.clone())) as Arc<dyn Transcoder>);

        let inner = Arc::new_cyclic(|weak| PlayerInner {
            id: Uuid::new_v4(),
            config,
            voice,
            extractors: ExtractorManager::new(),
            events: EventEmitter::default(),
            nodes: GuildNodeManager::new(weak.clone()),
            transcoder,
            query_resolver: QueryResolver::new(),
            registry,
        });
        let player = Self { inner };
        if let Some(registry) = &player.inner.registry {
            registry.add(&player);
        }
        info!(
            "Player {} ready (adapter: {}, transcoder: {})",
            player.id(),
            player.inner.voice.adapter().name(),
            player.inner.transcoder.name()
        );
        Ok(player)
    }

    pub(crate) fn from_inner(inner: Arc<PlayerInner>) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn events(&self) -> &EventEmitter {
        &self.inner.events
    }

    /// Shorthand for `events().on(..)`.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&GuildQueue, &QueueEvent) + Send + Sync + 'static,
    {
        self.inner.events.on(kind, listener)
    }

    pub fn extractors(&self) -> &ExtractorManager {
        &self.inner.extractors
    }

    pub fn nodes(&self) -> &GuildNodeManager {
        &self.inner.nodes
    }

    pub fn voice(&self) -> &VoiceUtils {
        &self.inner.voice
    }

    pub fn query_resolver(&self) -> &QueryResolver {
        &self.inner.query_resolver
    }

    /// Registers the built-in http and local file extractors.
    pub async fn load_default_extractors(&self) -> PlayerResult<()> {
        self.inner.extractors.register(Arc::new(HttpExtractor::new())).await?;
        self.inner
            .extractors
            .register(Arc::new(LocalFileExtractor::new()))
            .await?;
        Ok(())
    }

    /// Resolves `query` to tracks. No match is an empty result, not an error.
    pub async fn search(&self, query: &str, options: SearchOptions) -> PlayerResult<SearchResult> {
        let query = query.trim();
        if query.is_empty() {
            return Err(PlayerError::invalid_arg("query", "a non-empty query", "empty string"));
        }

        let (query_type, only) = match &options.search_engine {
            SearchEngine::Auto => (self.inner.query_resolver.resolve(query), None),
            SearchEngine::Query(query_type) => (*query_type, None),
            SearchEngine::Extractor(id) => {
                if self.inner.extractors.get(id).is_none() {
                    return Err(PlayerError::NoResult(format!("extractor {} is not registered", id)));
                }
                (self.inner.query_resolver.resolve(query), Some(id.as_str()))
            }
        };

        let mut block = self.inner.config.player.block_extractors.clone();
        block.extend(options.block_extractors.iter().cloned());

        let context = ExtractorSearchContext {
            query_type,
            requested_by: options.requested_by,
        };
        debug!("Searching '{}' as {:?}", query, query_type);
        let Some((extractor, info)) = self.inner.extractors.search(query, &context, &block, only).await else {
            return Ok(SearchResult::empty(query, query_type, options.requested_by));
        };

        Ok(SearchResult {
            query: query.to_string(),
            query_type,
            extractor: Some(extractor),
            playlist: info.playlist,
            tracks: info.tracks,
            requested_by: options.requested_by,
        })
    }

    /// Searches, joins `channel` if needed, enqueues the result and starts
    /// playback when the queue was idle. Concurrent calls for one guild run
    /// one after the other.
    pub async fn play(
        &self,
        channel: impl Into<ChannelRef>,
        query: impl Into<PlayQuery>,
        options: PlayerPlayOptions,
    ) -> PlayerResult<PlayResult> {
        let channel_ref = channel.into();
        let channel = self
            .inner
            .voice
            .adapter()
            .resolve_channel(None, &channel_ref)
            .await
            .map_err(|_| PlayerError::NoVoiceChannel(channel_ref.id().to_string()))?;
        if !channel.kind.is_voice_based() {
            return Err(PlayerError::InvalidChannelType {
                expected: "voice or stage channel".into(),
                received: format!("{:?}", channel.kind),
            });
        }

        let result = match query.into() {
            PlayQuery::Search(query) => self.search(&query, options.search.clone()).await?,
            PlayQuery::Result(result) => result,
            PlayQuery::Track(track) => SearchResult {
                extractor: track.extractor.clone(),
                tracks: vec![track],
                ..SearchResult::empty("", QueryType::Auto, options.search.requested_by)
            },
            PlayQuery::Playlist(playlist) => SearchResult {
                tracks: playlist.tracks().to_vec(),
                playlist: Some(playlist),
                ..SearchResult::empty("", QueryType::Auto, options.search.requested_by)
            },
        };
        let Some(first) = result.tracks.first().cloned() else {
            return Err(PlayerError::NoResult(format!("no results found for '{}'", result.query)));
        };

        let node_options = options
            .node_options
            .unwrap_or_else(|| GuildQueueOptions::from_config(&self.inner.config));
        let queue = self.inner.nodes.create(channel.guild_id, node_options);

        let mut entry = queue.inner.tasks_queue.acquire(options.signal);
        entry.get_task().await?;

        let outcome: PlayerResult<()> = async {
            if !queue.is_connected() {
                queue.connect(&channel).await?;
            }
            let input = match &result.playlist {
                Some(playlist) => TrackInput::Playlist(playlist.clone()),
                None => TrackInput::Tracks(result.tracks.clone()),
            };
            queue.add_track(input)?;
            if queue.node().is_idle() {
                queue.node().play(None, PlayOptions::immediate()).await?;
            }
            Ok(())
        }
        .await;
        entry.release();

        if let Err(error) = outcome {
            warn!("[{}] Play request for '{}' failed: {}", queue.guild_id(), first.title, error);
            return Err(error);
        }
        Ok(PlayResult {
            track: first,
            extractor: result.extractor.clone(),
            search_result: result,
            queue,
        })
    }

    /// Feeds one voice state change from the platform into the guild's
    /// queue.
    pub fn handle_voice_state_update(&self, old: &VoiceStateSnapshot, new: &VoiceStateSnapshot) {
        let Some(queue) = self.inner.nodes.get(new.guild_id) else {
            return;
        };
        queue.emit(QueueEvent::VoiceStateUpdate {
            old: old.clone(),
            new: new.clone(),
        });
        if self.inner.config.player.lock_voice_state_handler
            && self.inner.events.has_listeners(EventKind::VoiceStateUpdate)
        {
            return;
        }
        voice_state::handle_voice_state(self, &queue, old, new);
    }

    /// Deletes every queue, deactivates the extractors and leaves the
    /// registry.
    pub async fn destroy(&self) {
        for queue in self.inner.nodes.all() {
            if let Err(e) = queue.delete() {
                debug!("[{}] Queue already gone during destroy: {}", queue.guild_id(), e);
            }
        }
        self.inner.extractors.deactivate_all().await;
        self.inner.events.remove_all();
        if let Some(registry) = &self.inner.registry {
            registry.remove(self.id());
        }
        info!("Player {} destroyed", self.id());
    }
}
