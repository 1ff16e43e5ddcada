use std::{any::Any, sync::Arc, time::Duration};

use async_trait::async_trait;

use super::connection::VoiceConnection;
use crate::common::{
    errors::{PlayerError, PlayerResult},
    types::{ChannelId, ChannelRef, GuildId, UserId, VoiceChannel, VoiceMember},
};

#[derive(Debug, Clone)]
pub struct JoinConfig {
    pub self_deaf: bool,
    pub self_mute: bool,
    pub timeout: Duration,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            self_deaf: true,
            self_mute: false,
            timeout: Duration::from_secs(20),
        }
    }
}

/// What the player needs from the chat platform: channel lookup, member
/// lists and the ability to join voice.
#[async_trait]
pub trait VoiceAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// The bot's own user id.
    fn me(&self) -> UserId;

    /// Looks a channel up. `guild` narrows the lookup when the caller
    /// already knows which guild the channel must belong to.
    async fn resolve_channel(&self, guild: Option<GuildId>, channel: &ChannelRef) -> PlayerResult<VoiceChannel>;

    async fn join(
        &self,
        channel: &VoiceChannel,
        config: &JoinConfig,
    ) -> PlayerResult<Arc<dyn VoiceConnection>>;

    /// The connection currently open for `guild`, if any.
    fn get_connection(&self, guild: GuildId) -> Option<Arc<dyn VoiceConnection>>;

    fn channel_members(&self, channel: ChannelId) -> Vec<VoiceMember>;
}

/// Builds an adapter from a host client handle, or declines with `None`.
pub type AdapterFactory = Box<dyn Fn(&(dyn Any + Send + Sync)) -> Option<Arc<dyn VoiceAdapter>> + Send + Sync>;

/// Ordered list of adapter factories. The first one that accepts the client
/// wins; selection happens once, when the player is built.
pub struct AdapterRegistry {
    factories: Vec<(String, AdapterFactory)>,
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        let mut registry = Self {
            factories: Vec::new(),
        };
        registry.register("direct", |client| {
            client.downcast_ref::<Arc<dyn VoiceAdapter>>().cloned()
        });
        registry
    }
}

impl AdapterRegistry {
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&(dyn Any + Send + Sync)) -> Option<Arc<dyn VoiceAdapter>> + Send + Sync + 'static,
    {
        self.factories.push((name.into(), Box::new(factory)));
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn select(&self, client: &(dyn Any + Send + Sync)) -> PlayerResult<Arc<dyn VoiceAdapter>> {
        for (name, factory) in &self.factories {
            if let Some(adapter) = factory(client) {
                tracing::debug!("Selected voice adapter {} ({})", name, adapter.name());
                return Ok(adapter);
            }
        }
        Err(PlayerError::invalid_arg(
            "client",
            format!("a client supported by one of [{}]", self.names().join(", ")),
            "unsupported client",
        ))
    }
}
