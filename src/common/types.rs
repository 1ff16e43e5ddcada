use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

/// A thread-safe, mutually exclusive shared component.
pub type Shared<T> = Arc<Mutex<T>>;

/// A thread-safe, read-write shared component.
pub type SharedRw<T> = Arc<RwLock<T>>;

/// A generic boxed error type.
pub type AnyError = Box<dyn std::error::Error + Send + Sync>;

/// A convenient Result alias returning `AnyError`.
pub type AnyResult<T> = std::result::Result<T, AnyError>;

macro_rules! snowflake_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl From<u64> for $name {
            fn from(u: u64) -> Self {
                Self(u)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

snowflake_id!(
    /// Identity of a guild; the key every queue is registered under.
    GuildId
);
snowflake_id!(ChannelId);
snowflake_id!(UserId);

/// Kind of a channel as reported by the platform adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChannelKind {
    Voice,
    Stage,
    Text,
    Other,
}

impl ChannelKind {
    pub fn is_voice_based(&self) -> bool {
        matches!(self, Self::Voice | Self::Stage)
    }
}

/// A resolved channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceChannel {
    pub id: ChannelId,
    pub guild_id: GuildId,
    pub name: String,
    pub kind: ChannelKind,
}

/// Something that identifies a channel: either the id alone or an already
/// resolved channel.
#[derive(Debug, Clone)]
pub enum ChannelRef {
    Id(ChannelId),
    Resolved(VoiceChannel),
}

impl From<ChannelId> for ChannelRef {
    fn from(id: ChannelId) -> Self {
        Self::Id(id)
    }
}

impl From<VoiceChannel> for ChannelRef {
    fn from(channel: VoiceChannel) -> Self {
        Self::Resolved(channel)
    }
}

impl From<&VoiceChannel> for ChannelRef {
    fn from(channel: &VoiceChannel) -> Self {
        Self::Resolved(channel.clone())
    }
}

impl ChannelRef {
    pub fn id(&self) -> ChannelId {
        match self {
            Self::Id(id) => *id,
            Self::Resolved(c) => c.id,
        }
    }
}

/// A member currently sitting in a voice channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceMember {
    pub id: UserId,
    pub bot: bool,
}

/// True when no human members remain in `members`.
pub fn is_voice_empty(members: &[VoiceMember]) -> bool {
    !members.iter().any(|m| !m.bot)
}

/// Snapshot of one member's voice state, fed in by the platform adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceStateSnapshot {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub channel_id: Option<ChannelId>,
    pub server_mute: Option<bool>,
    pub suppress: Option<bool>,
}

impl Default for GuildId {
    fn default() -> Self {
        Self(0)
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self(0)
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
