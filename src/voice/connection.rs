use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::watch;

use crate::common::{
    errors::PlayerResult,
    types::{ChannelId, GuildId},
};

/// Close code the voice websocket uses when the bot was kicked or moved.
pub const CLOSE_CODE_DISCONNECTED: u16 = 4014;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The connection was left on purpose.
    Manual,
    WebSocketClose(u16),
    AdapterUnavailable,
    EndpointRemoved,
}

/// Transport status as reported by the platform's voice implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Signalling,
    Connecting,
    Ready,
    Disconnected(DisconnectReason),
    Destroyed,
}

impl ConnectionStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    pub fn is_destroyed(&self) -> bool {
        matches!(self, Self::Destroyed)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Signalling | Self::Connecting)
    }
}

/// One live voice session. Implemented by the host's voice transport; the
/// handshake and encryption behind it are not this crate's concern.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    fn guild_id(&self) -> GuildId;

    fn channel_id(&self) -> ChannelId;

    fn status(&self) -> ConnectionStatus;

    /// Every status change is published here.
    fn subscribe(&self) -> watch::Receiver<ConnectionStatus>;

    /// Re-enters signalling after a non-manual disconnect.
    async fn rejoin(&self) -> PlayerResult<()>;

    fn set_speaking(&self, speaking: bool);

    /// Queues one encoded 20 ms packet for sending.
    fn send_frame(&self, packet: Bytes) -> PlayerResult<()>;

    /// Tears the session down. The status must end up `Destroyed`.
    fn destroy(&self);
}
