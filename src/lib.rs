//! Per-guild audio playback for voice bots: queues, stream dispatch, PCM
//! filtering and the event surface a host reacts to.

pub mod audio;
pub mod common;
pub mod configs;
pub mod events;
pub mod extractors;
pub mod player;
pub mod protocol;
pub mod queue;
pub mod transcoder;
pub mod voice;

#[cfg(test)]
mod testkit;

pub use common::errors::{PlayerError, PlayerResult};
pub use configs::Config;
pub use events::{EventKind, QueueEvent};
pub use player::{Player, PlayerOptions, PlayerPlayOptions, PlayerRegistry, SearchOptions};
pub use queue::{GuildQueue, GuildQueueOptions, QueueStrategy, RepeatMode};
