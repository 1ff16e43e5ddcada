pub mod emitter;

pub use emitter::{EventEmitter, ListenerId};

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::{
    audio::filters::{BiquadSettings, DspFilter, EqBand, FilterUpdate},
    common::{errors::PlayerError, types::VoiceStateSnapshot},
    protocol::tracks::Track,
};

/// Why a track was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Manual,
    NoStream,
    Jump,
    SkipTo,
}

/// Why a track started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    Normal,
    /// Replayed to apply a filter change or a seek.
    Filters,
}

/// Stream settings a `WillPlayTrack` listener may rewrite before playback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackConfig {
    pub seek_ms: u64,
    /// The `-af` expression handed to the transcoder.
    pub ffmpeg_filters: String,
    pub transition: bool,
}

/// Lets a `WillPlayTrack` listener hold playback back until it calls
/// [`DoneSignal::done`]. Dropping every copy releases it as well.
#[derive(Debug, Clone)]
pub struct DoneSignal {
    tx: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl DoneSignal {
    pub(crate) fn new() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    pub fn done(&self) {
        if let Some(tx) = self.tx.lock().take() {
            let _ = tx.send(());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    AudioTrackAdd,
    AudioTracksAdd,
    AudioTrackRemove,
    AudioTracksRemove,
    Connection,
    ConnectionDestroyed,
    Disconnect,
    Debug,
    Error,
    EmptyChannel,
    EmptyQueue,
    PlayerStart,
    PlayerError,
    PlayerFinish,
    PlayerSkip,
    PlayerTrigger,
    VoiceStateUpdate,
    VolumeChange,
    PlayerPause,
    PlayerResume,
    BiquadFiltersUpdate,
    EqualizerUpdate,
    DspUpdate,
    AudioFiltersUpdate,
    ResamplerUpdate,
    WillPlayTrack,
    ChannelPopulate,
    QueueCreate,
    QueueDelete,
}

impl EventKind {
    pub const ALL: [EventKind; 29] = [
        Self::AudioTrackAdd,
        Self::AudioTracksAdd,
        Self::AudioTrackRemove,
        Self::AudioTracksRemove,
        Self::Connection,
        Self::ConnectionDestroyed,
        Self::Disconnect,
        Self::Debug,
        Self::Error,
        Self::EmptyChannel,
        Self::EmptyQueue,
        Self::PlayerStart,
        Self::PlayerError,
        Self::PlayerFinish,
        Self::PlayerSkip,
        Self::PlayerTrigger,
        Self::VoiceStateUpdate,
        Self::VolumeChange,
        Self::PlayerPause,
        Self::PlayerResume,
        Self::BiquadFiltersUpdate,
        Self::EqualizerUpdate,
        Self::DspUpdate,
        Self::AudioFiltersUpdate,
        Self::ResamplerUpdate,
        Self::WillPlayTrack,
        Self::ChannelPopulate,
        Self::QueueCreate,
        Self::QueueDelete,
    ];

    /// Event name as hosts know it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AudioTrackAdd => "audioTrackAdd",
            Self::AudioTracksAdd => "audioTracksAdd",
            Self::AudioTrackRemove => "audioTrackRemove",
            Self::AudioTracksRemove => "audioTracksRemove",
            Self::Connection => "connection",
            Self::ConnectionDestroyed => "connectionDestroyed",
            Self::Disconnect => "disconnect",
            Self::Debug => "debug",
            Self::Error => "error",
            Self::EmptyChannel => "emptyChannel",
            Self::EmptyQueue => "emptyQueue",
            Self::PlayerStart => "playerStart",
            Self::PlayerError => "playerError",
            Self::PlayerFinish => "playerFinish",
            Self::PlayerSkip => "playerSkip",
            Self::PlayerTrigger => "playerTrigger",
            Self::VoiceStateUpdate => "voiceStateUpdate",
            Self::VolumeChange => "volumeChange",
            Self::PlayerPause => "playerPause",
            Self::PlayerResume => "playerResume",
            Self::BiquadFiltersUpdate => "biquadFiltersUpdate",
            Self::EqualizerUpdate => "equalizerUpdate",
            Self::DspUpdate => "dspUpdate",
            Self::AudioFiltersUpdate => "audioFiltersUpdate",
            Self::ResamplerUpdate => "resamplerUpdate",
            Self::WillPlayTrack => "willPlayTrack",
            Self::ChannelPopulate => "channelPopulate",
            Self::QueueCreate => "queueCreate",
            Self::QueueDelete => "queueDelete",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a queue reports. Listeners also receive the queue itself.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    AudioTrackAdd(Arc<Track>),
    AudioTracksAdd(Vec<Arc<Track>>),
    AudioTrackRemove(Arc<Track>),
    AudioTracksRemove(Vec<Arc<Track>>),
    Connection,
    ConnectionDestroyed,
    Disconnect,
    Debug(String),
    Error(PlayerError),
    EmptyChannel,
    EmptyQueue,
    PlayerStart(Arc<Track>),
    PlayerError {
        error: PlayerError,
        track: Option<Arc<Track>>,
    },
    PlayerFinish(Arc<Track>),
    PlayerSkip {
        track: Arc<Track>,
        reason: SkipReason,
    },
    PlayerTrigger {
        track: Arc<Track>,
        reason: TriggerReason,
    },
    VoiceStateUpdate {
        old: VoiceStateSnapshot,
        new: VoiceStateSnapshot,
    },
    VolumeChange(FilterUpdate<u16>),
    PlayerPause,
    PlayerResume,
    BiquadFiltersUpdate(FilterUpdate<Option<BiquadSettings>>),
    EqualizerUpdate(FilterUpdate<Vec<EqBand>>),
    DspUpdate(FilterUpdate<Vec<DspFilter>>),
    AudioFiltersUpdate(FilterUpdate<Vec<String>>),
    ResamplerUpdate(FilterUpdate<u32>),
    WillPlayTrack {
        track: Arc<Track>,
        config: Arc<Mutex<PlaybackConfig>>,
        done: DoneSignal,
    },
    ChannelPopulate,
    QueueCreate,
    QueueDelete,
}

impl QueueEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::AudioTrackAdd(_) => EventKind::AudioTrackAdd,
            Self::AudioTracksAdd(_) => EventKind::AudioTracksAdd,
            Self::AudioTrackRemove(_) => EventKind::AudioTrackRemove,
            Self::AudioTracksRemove(_) => EventKind::AudioTracksRemove,
            Self::Connection => EventKind::Connection,
            Self::ConnectionDestroyed => EventKind::ConnectionDestroyed,
            Self::Disconnect => EventKind::Disconnect,
            Self::Debug(_) => EventKind::Debug,
            Self::Error(_) => EventKind::Error,
            Self::EmptyChannel => EventKind::EmptyChannel,
            Self::EmptyQueue => EventKind::EmptyQueue,
            Self::PlayerStart(_) => EventKind::PlayerStart,
            Self::PlayerError { .. } => EventKind::PlayerError,
            Self::PlayerFinish(_) => EventKind::PlayerFinish,
            Self::PlayerSkip { .. } => EventKind::PlayerSkip,
            Self::PlayerTrigger { .. } => EventKind::PlayerTrigger,
            Self::VoiceStateUpdate { .. } => EventKind::VoiceStateUpdate,
            Self::VolumeChange(_) => EventKind::VolumeChange,
            Self::PlayerPause => EventKind::PlayerPause,
            Self::PlayerResume => EventKind::PlayerResume,
            Self::BiquadFiltersUpdate(_) => EventKind::BiquadFiltersUpdate,
            Self::EqualizerUpdate(_) => EventKind::EqualizerUpdate,
            Self::DspUpdate(_) => EventKind::DspUpdate,
            Self::AudioFiltersUpdate(_) => EventKind::AudioFiltersUpdate,
            Self::ResamplerUpdate(_) => EventKind::ResamplerUpdate,
            Self::WillPlayTrack { .. } => EventKind::WillPlayTrack,
            Self::ChannelPopulate => EventKind::ChannelPopulate,
            Self::QueueCreate => EventKind::QueueCreate,
            Self::QueueDelete => EventKind::QueueDelete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_unique() {
        let mut names: Vec<_> = EventKind::ALL.iter().map(|k| k.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), EventKind::ALL.len());
    }

    #[tokio::test]
    async fn test_done_signal_releases_on_done_or_drop() {
        let (signal, rx) = DoneSignal::new();
        let copy = signal.clone();
        copy.done();
        copy.done();
        assert!(rx.await.is_ok());

        let (signal2, rx2) = DoneSignal::new();
        drop(signal2);
        assert!(rx2.await.is_err());
        drop(signal);
    }
}
