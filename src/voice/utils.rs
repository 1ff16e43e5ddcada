use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::{
    adapter::{JoinConfig, VoiceAdapter},
    connection::VoiceConnection,
    dispatcher::StreamDispatcher,
};
use crate::{
    audio::encoder::{FrameEncoder, OpusFrameEncoder},
    common::{
        errors::PlayerResult,
        types::{GuildId, VoiceChannel},
    },
    configs::VoiceConfig,
};

/// Builds a fresh encoder for every new dispatcher.
pub type EncoderFactory = Arc<dyn Fn() -> PlayerResult<Box<dyn FrameEncoder>> + Send + Sync>;

pub fn opus_encoder_factory() -> EncoderFactory {
    Arc::new(|| Ok(Box::new(OpusFrameEncoder::new()?) as Box<dyn FrameEncoder>))
}

/// Joins voice channels and caches one dispatcher per guild.
pub struct VoiceUtils {
    adapter: Arc<dyn VoiceAdapter>,
    cache: DashMap<GuildId, Arc<StreamDispatcher>>,
    encoder_factory: EncoderFactory,
    config: VoiceConfig,
}

impl VoiceUtils {
    pub fn new(adapter: Arc<dyn VoiceAdapter>, config: VoiceConfig) -> Self {
        Self {
            adapter,
            cache: DashMap::new(),
            encoder_factory: opus_encoder_factory(),
            config,
        }
    }

    pub fn with_encoder_factory(mut self, factory: EncoderFactory) -> Self {
        self.encoder_factory = factory;
        self
    }

    pub fn adapter(&self) -> &Arc<dyn VoiceAdapter> {
        &self.adapter
    }

    /// Returns a dispatcher for `channel`, reusing the cached one or an
    /// existing connection to the same channel before joining anew.
    pub async fn connect(&self, channel: &VoiceChannel, join: &JoinConfig) -> PlayerResult<Arc<StreamDispatcher>> {
        if let Some(existing) = self.get_connection(channel.guild_id) {
            if existing.channel().id == channel.id {
                debug!("[{}] Reusing dispatcher for channel {}", channel.guild_id, channel.id);
                return Ok(existing);
            }
        }
        self.cache.remove(&channel.guild_id);

        let connection = self.join(channel, join).await?;
        let encoder = (self.encoder_factory)()?;
        let dispatcher = StreamDispatcher::new(channel.clone(), connection, encoder, &self.config);
        self.cache.insert(channel.guild_id, dispatcher.clone());
        Ok(dispatcher)
    }

    /// Raw connection to `channel`, reusing one that is still alive.
    pub async fn join(&self, channel: &VoiceChannel, join: &JoinConfig) -> PlayerResult<Arc<dyn VoiceConnection>> {
        if let Some(conn) = self.adapter.get_connection(channel.guild_id) {
            if conn.channel_id() == channel.id && !conn.status().is_destroyed() {
                debug!("[{}] Reusing voice connection to {}", channel.guild_id, channel.id);
                return Ok(conn);
            }
        }
        debug!("[{}] Joining voice channel {} ({})", channel.guild_id, channel.name, channel.id);
        self.adapter.join(channel, join).await
    }

    /// The cached, still-usable dispatcher for `guild`.
    pub fn get_connection(&self, guild: GuildId) -> Option<Arc<StreamDispatcher>> {
        let dispatcher = self.cache.get(&guild)?.clone();
        if dispatcher.is_destroyed() {
            self.cache.remove(&guild);
            return None;
        }
        Some(dispatcher)
    }

    pub fn disconnect(&self, guild: GuildId) {
        if let Some((_, dispatcher)) = self.cache.remove(&guild) {
            dispatcher.disconnect();
        }
    }

    /// Forgets `dispatcher` if it is the one cached for its guild.
    pub fn evict(&self, dispatcher: &Arc<StreamDispatcher>) {
        self.cache
            .remove_if(&dispatcher.guild_id(), |_, cached| Arc::ptr_eq(cached, dispatcher));
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::encoder::RawFrameEncoder,
        common::types::{ChannelId, ChannelKind},
        testkit::MockAdapter,
    };

    fn utils(adapter: Arc<MockAdapter>) -> VoiceUtils {
        VoiceUtils::new(adapter, VoiceConfig::default())
            .with_encoder_factory(Arc::new(|| Ok(Box::new(RawFrameEncoder) as Box<dyn FrameEncoder>)))
    }

    fn channel(id: u64) -> VoiceChannel {
        VoiceChannel {
            id: ChannelId(id),
            guild_id: GuildId(1),
            name: format!("vc-{id}"),
            kind: ChannelKind::Voice,
        }
    }

    #[tokio::test]
    async fn test_same_channel_reuses_dispatcher() {
        let adapter = MockAdapter::new();
        let utils = utils(adapter.clone());
        let a = utils.connect(&channel(10), &JoinConfig::default()).await.unwrap();
        let b = utils.connect(&channel(10), &JoinConfig::default()).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(adapter.join_count(), 1);
    }

    #[tokio::test]
    async fn test_other_channel_gets_new_dispatcher() {
        let adapter = MockAdapter::new();
        let utils = utils(adapter.clone());
        let a = utils.connect(&channel(10), &JoinConfig::default()).await.unwrap();
        let b = utils.connect(&channel(11), &JoinConfig::default()).await.unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(b.channel().id, ChannelId(11));
        assert_eq!(adapter.join_count(), 2);
        assert_eq!(utils.len(), 1);
    }

    #[tokio::test]
    async fn test_destroyed_dispatcher_is_not_reused() {
        let adapter = MockAdapter::new();
        let utils = utils(adapter.clone());
        let a = utils.connect(&channel(10), &JoinConfig::default()).await.unwrap();
        a.disconnect();
        assert!(utils.get_connection(GuildId(1)).is_none());
        let b = utils.connect(&channel(10), &JoinConfig::default()).await.unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
