pub mod async_queue;
pub mod filters;
pub mod guild_queue;
pub mod history;
pub mod node;
pub mod track_queue;
pub(crate) mod voice_state;

pub use async_queue::{AsyncQueue, AsyncQueueEntry};
pub use filters::{GuildQueueFilters, QueueFfmpegFilters};
pub use guild_queue::{GuildQueue, TrackInput};
pub use history::GuildQueueHistory;
pub use node::{GuildQueuePlayerNode, PlayOptions, PlayerTimestamp, ProgressBarOptions, TimestampPart};
pub use track_queue::TrackQueue;

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    audio::filters::{BiquadSettings, DspFilter, EqBand, EqualizerFilter, FilterSettings, StageSwitches},
    audio::constants::SAMPLE_RATE,
    common::errors::PlayerResult,
    configs::Config,
    protocol::tracks::Track,
    transcoder::StreamSource,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    Track,
    Queue,
    Autoplay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStrategy {
    #[default]
    Fifo,
    Lifo,
}

pub type StreamFuture = Pin<Box<dyn Future<Output = PlayerResult<Option<StreamSource>>> + Send>>;

/// Produces a stream for a track ahead of the extractors. Returning
/// `Ok(None)` falls through to the extractors.
#[derive(Clone)]
pub struct BeforeCreateStream(pub Arc<dyn Fn(Arc<Track>, GuildQueue) -> StreamFuture + Send + Sync>);

impl std::fmt::Debug for BeforeCreateStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BeforeCreateStream(..)")
    }
}

/// Per-queue settings. [`GuildQueueOptions::from_config`] fills them from
/// the global configuration.
#[derive(Debug, Clone)]
pub struct GuildQueueOptions {
    pub strategy: QueueStrategy,
    pub repeat_mode: RepeatMode,
    pub max_size: Option<usize>,
    pub max_history_size: Option<usize>,
    pub volume: u16,
    pub leave_on_empty: bool,
    pub leave_on_empty_cooldown: Duration,
    pub leave_on_end: bool,
    pub leave_on_end_cooldown: Duration,
    pub leave_on_stop: bool,
    pub leave_on_stop_cooldown: Duration,
    pub pause_on_empty: bool,
    pub skip_on_no_stream: bool,
    pub no_emit_insert: bool,
    pub buffering_timeout: Duration,
    pub connection_timeout: Duration,
    pub self_deaf: bool,
    pub metadata: serde_json::Value,
    pub switches: StageSwitches,
    pub equalizer: Vec<EqBand>,
    pub biquad: Option<BiquadSettings>,
    pub filterer: Vec<DspFilter>,
    pub ffmpeg_filters: Vec<String>,
    pub resampler: u32,
    pub on_before_create_stream: Option<BeforeCreateStream>,
}

impl Default for GuildQueueOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl GuildQueueOptions {
    pub fn from_config(config: &Config) -> Self {
        let q = &config.queue;
        let f = &config.filters;
        Self {
            strategy: q.strategy,
            repeat_mode: q.repeat_mode,
            max_size: q.max_size,
            max_history_size: q.max_history_size,
            volume: q.volume,
            leave_on_empty: q.leave_on_empty,
            leave_on_empty_cooldown: Duration::from_millis(q.leave_on_empty_cooldown_ms),
            leave_on_end: q.leave_on_end,
            leave_on_end_cooldown: Duration::from_millis(q.leave_on_end_cooldown_ms),
            leave_on_stop: q.leave_on_stop,
            leave_on_stop_cooldown: Duration::from_millis(q.leave_on_stop_cooldown_ms),
            pause_on_empty: q.pause_on_empty,
            skip_on_no_stream: q.skip_on_no_stream,
            no_emit_insert: q.no_emit_insert,
            buffering_timeout: q.buffering_timeout(),
            connection_timeout: config.voice.connection_timeout(),
            self_deaf: config.voice.self_deaf,
            metadata: serde_json::Value::Null,
            switches: StageSwitches {
                disable_equalizer: !f.equalizer,
                disable_biquad: !f.biquad,
                disable_filter: !f.dsp,
                disable_volume: !f.volume,
                disable_resampler: !f.resampler,
            },
            equalizer: Vec::new(),
            biquad: None,
            filterer: Vec::new(),
            ffmpeg_filters: Vec::new(),
            resampler: SAMPLE_RATE,
            on_before_create_stream: None,
        }
    }

    /// Filter parameters a fresh queue starts with. The equalizer is always
    /// reported with every band, as the live chain reports it.
    pub fn initial_filters(&self) -> FilterSettings {
        FilterSettings {
            biquad: self.biquad,
            equalizer: EqualizerFilter::new(&self.equalizer).bands(),
            filters: self.filterer.clone(),
            sample_rate: self.resampler,
            volume: self.volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_follow_config() {
        let mut config = Config::default();
        config.queue.max_size = Some(3);
        config.queue.leave_on_end_cooldown_ms = 1500;
        config.filters.resampler = false;

        let opts = GuildQueueOptions::from_config(&config);
        assert_eq!(opts.max_size, Some(3));
        assert_eq!(opts.leave_on_end_cooldown, Duration::from_millis(1500));
        assert!(opts.switches.disable_resampler);
        assert!(!opts.switches.disable_equalizer);
        assert_eq!(opts.initial_filters().volume, 100);
        assert_eq!(opts.initial_filters().sample_rate, 48_000);
    }

    #[test]
    fn test_modes_deserialize_lowercase() {
        let mode: RepeatMode = serde_json::from_str("\"autoplay\"").unwrap();
        assert_eq!(mode, RepeatMode::Autoplay);
        let strategy: QueueStrategy = serde_json::from_str("\"lifo\"").unwrap();
        assert_eq!(strategy, QueueStrategy::Lifo);
    }
}
