use crate::{
    audio::filters::{BiquadSettings, DspFilter, EqBand, FilterChange, FilterSettings, FilterUpdate, FiltersChain},
    common::errors::PlayerResult,
    events::QueueEvent,
};

use super::GuildQueue;

/// Filter controls of a queue.
///
/// Changes go to the live resource's chain when something is playing and to
/// the queue's cache either way, so the next stream starts with the same
/// sound. Each effective change emits its `*Update` event once.
#[derive(Clone)]
pub struct GuildQueueFilters {
    queue: GuildQueue,
}

impl GuildQueueFilters {
    pub(crate) fn new(queue: GuildQueue) -> Self {
        Self { queue }
    }

    /// Last applied parameters.
    pub fn settings(&self) -> FilterSettings {
        self.queue.filter_cache()
    }

    pub fn equalizer(&self) -> Vec<EqBand> {
        self.settings().equalizer
    }

    pub fn biquad(&self) -> Option<BiquadSettings> {
        self.settings().biquad
    }

    pub fn dsp(&self) -> Vec<DspFilter> {
        self.settings().filters
    }

    pub fn volume(&self) -> u16 {
        self.settings().volume
    }

    pub fn sample_rate(&self) -> u32 {
        self.settings().sample_rate
    }

    pub fn ffmpeg(&self) -> QueueFfmpegFilters {
        QueueFfmpegFilters {
            queue: self.queue.clone(),
        }
    }

    fn apply<R>(&self, f: impl FnOnce(&mut FiltersChain) -> R) -> R {
        match self.queue.dispatcher().and_then(|d| d.resource()) {
            Some(resource) => f(&mut resource.filters().lock()),
            None => {
                let switches = self.queue.options().switches;
                let mut chain = FiltersChain::new(&self.queue.filter_cache(), switches);
                f(&mut chain)
            }
        }
    }

    /// Records `change` in the cache and emits it. `false` when the cached
    /// value was already the same.
    fn commit(&self, change: FilterChange) -> bool {
        let event = {
            let mut cache = self.queue.inner.filters.lock();
            match change {
                FilterChange::Equalizer(update) => {
                    let update = FilterUpdate {
                        old: std::mem::replace(&mut cache.equalizer, update.new.clone()),
                        new: update.new,
                    };
                    update.changed().then(|| QueueEvent::EqualizerUpdate(update))
                }
                FilterChange::Biquad(update) => {
                    let update = FilterUpdate {
                        old: std::mem::replace(&mut cache.biquad, update.new),
                        new: update.new,
                    };
                    update.changed().then(|| QueueEvent::BiquadFiltersUpdate(update))
                }
                FilterChange::Dsp(update) => {
                    let update = FilterUpdate {
                        old: std::mem::replace(&mut cache.filters, update.new.clone()),
                        new: update.new,
                    };
                    update.changed().then(|| QueueEvent::DspUpdate(update))
                }
                FilterChange::Volume(update) => {
                    let update = FilterUpdate {
                        old: std::mem::replace(&mut cache.volume, update.new),
                        new: update.new,
                    };
                    update.changed().then(|| QueueEvent::VolumeChange(update))
                }
                FilterChange::Resampler(update) => {
                    let update = FilterUpdate {
                        old: std::mem::replace(&mut cache.sample_rate, update.new),
                        new: update.new,
                    };
                    update.changed().then(|| QueueEvent::ResamplerUpdate(update))
                }
            }
        };
        match event {
            Some(event) => {
                self.queue.emit(event);
                true
            }
            None => false,
        }
    }

    /// Replaces the equalizer bands. Gains are clamped to [-0.25, 1.0].
    pub fn set_eq(&self, bands: &[EqBand]) -> bool {
        let change = self.apply(|chain| chain.set_eq(bands));
        self.commit(change)
    }

    /// Sets one band; out-of-range band indices fail without any change.
    pub fn set_eq_gain(&self, band: usize, gain: f32) -> PlayerResult<bool> {
        let change = self.apply(|chain| chain.set_eq_gain(band, gain))?;
        Ok(self.commit(change))
    }

    pub fn reset_eq(&self) -> bool {
        let change = self.apply(|chain| chain.reset_eq());
        self.commit(change)
    }

    pub fn set_biquad(&self, settings: Option<BiquadSettings>) -> bool {
        let change = self.apply(|chain| chain.set_biquad(settings));
        self.commit(change)
    }

    pub fn set_dsp(&self, filters: &[DspFilter]) -> bool {
        let change = self.apply(|chain| chain.set_filters(filters));
        self.commit(change)
    }

    pub fn toggle_dsp(&self, filter: DspFilter) -> bool {
        let change = self.apply(|chain| chain.toggle_filter(filter));
        self.commit(change)
    }

    pub fn set_volume(&self, volume: u16) -> bool {
        let change = self.apply(|chain| chain.set_volume(volume));
        self.commit(change)
    }

    /// Retargets the resampler. The swap happens under the chain's lock, so
    /// the playout loop never sees a half-switched chain.
    pub fn set_sample_rate(&self, rate: u32) -> PlayerResult<bool> {
        let change = self.apply(|chain| chain.set_target_sample_rate(rate))?;
        Ok(self.commit(change))
    }
}

/// Codec-level presets run by the transcoder. Any change restarts the
/// current track at its position.
#[derive(Clone)]
pub struct QueueFfmpegFilters {
    queue: GuildQueue,
}

impl QueueFfmpegFilters {
    pub fn is_enabled(&self, name: &str) -> bool {
        self.queue.inner.ffmpeg.lock().is_enabled(name)
    }

    pub fn enabled_filters(&self) -> Vec<String> {
        self.queue.inner.ffmpeg.lock().enabled_filters().to_vec()
    }

    pub fn disabled_filters(&self) -> Vec<&'static str> {
        self.queue.inner.ffmpeg.lock().disabled_filters()
    }

    pub fn filter_string(&self) -> String {
        self.queue.ffmpeg_filter_string()
    }

    pub fn to_args(&self) -> Vec<String> {
        self.queue.inner.ffmpeg.lock().to_args()
    }

    /// Flips each named preset. Returns whether the track was replayed.
    pub async fn toggle<S: AsRef<str>>(&self, names: &[S]) -> PlayerResult<bool> {
        self.update(|filters| filters.toggle(names)).await
    }

    /// Replaces the enabled presets; an empty slice disables all of them.
    pub async fn set_filters<S: AsRef<str>>(&self, names: &[S]) -> PlayerResult<bool> {
        self.update(|filters| filters.set_filters(names)).await
    }

    async fn update(&self, f: impl FnOnce(&mut crate::audio::filters::FfmpegFilters)) -> PlayerResult<bool> {
        let update = {
            let mut filters = self.queue.inner.ffmpeg.lock();
            let old = filters.enabled_filters().to_vec();
            f(&mut filters);
            FilterUpdate {
                old,
                new: filters.enabled_filters().to_vec(),
            }
        };
        if !update.changed() {
            return Ok(false);
        }
        self.queue.emit(QueueEvent::AudioFiltersUpdate(update));

        let position = self.queue.node().playback_time();
        self.queue.replay(position).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        common::types::GuildId,
        events::EventKind,
        queue::GuildQueueOptions,
        testkit::{EventRecorder, TestPlayer},
    };

    #[tokio::test]
    async fn test_eq_gain_is_clamped_and_diffed() {
        let env = TestPlayer::new().await;
        let recorder = EventRecorder::attach(&env.player);
        let queue = env.player.nodes().create(GuildId(4), GuildQueueOptions::default());
        let filters = queue.filters();

        assert!(filters.set_eq(&[EqBand::new(0, 2.0), EqBand::new(1, 0.5)]));
        let bands = filters.equalizer();
        let gain = |band: u8| bands.iter().find(|b| b.band == band).map(|b| b.gain);
        assert_eq!(gain(0), Some(1.0));
        assert_eq!(gain(1), Some(0.5));

        assert!(!filters.set_eq(&[EqBand::new(0, 2.0), EqBand::new(1, 0.5)]));
        assert_eq!(recorder.count(EventKind::EqualizerUpdate), 1);

        assert!(filters.set_eq_gain(99, 0.1).is_err());
        assert_eq!(filters.equalizer(), bands);
    }

    #[tokio::test]
    async fn test_flat_eq_reset_emits_nothing() {
        let env = TestPlayer::new().await;
        let recorder = EventRecorder::attach(&env.player);
        let queue = env.player.nodes().create(GuildId(4), GuildQueueOptions::default());
        let filters = queue.filters();

        assert_eq!(filters.equalizer().len(), 15);
        assert!(!filters.reset_eq());
        assert_eq!(recorder.count(EventKind::EqualizerUpdate), 0);

        assert!(filters.set_eq_gain(2, 0.4).unwrap());
        assert!(filters.reset_eq());
        assert_eq!(recorder.count(EventKind::EqualizerUpdate), 2);
        assert!(filters.equalizer().iter().all(|b| b.gain == 0.0));
    }

    #[tokio::test]
    async fn test_sample_rate_and_dsp_updates() {
        let env = TestPlayer::new().await;
        let recorder = EventRecorder::attach(&env.player);
        let queue = env.player.nodes().create(GuildId(4), GuildQueueOptions::default());
        let filters = queue.filters();

        assert!(filters.set_sample_rate(40_000).unwrap());
        assert!(filters.set_sample_rate(0).is_err());
        assert_eq!(filters.sample_rate(), 40_000);
        assert!(queue.node().playback_speed() > 1.0);

        assert!(filters.toggle_dsp(DspFilter::Tremolo));
        assert_eq!(filters.dsp(), vec![DspFilter::Tremolo]);
        assert!(filters.toggle_dsp(DspFilter::Tremolo));
        assert!(filters.dsp().is_empty());

        assert_eq!(recorder.count(EventKind::ResamplerUpdate), 1);
        assert_eq!(recorder.count(EventKind::DspUpdate), 2);
    }

    #[tokio::test]
    async fn test_ffmpeg_toggle_without_playback() {
        let env = TestPlayer::new().await;
        let recorder = EventRecorder::attach(&env.player);
        let queue = env.player.nodes().create(GuildId(4), GuildQueueOptions::default());
        let ffmpeg = queue.filters().ffmpeg();

        assert!(!ffmpeg.toggle(&["nightcore"]).await.unwrap());
        assert!(ffmpeg.is_enabled("nightcore"));
        assert!(queue.node().playback_speed() > 1.0);
        assert!(!ffmpeg.set_filters(&["nightcore"]).await.unwrap());
        assert_eq!(recorder.count(EventKind::AudioFiltersUpdate), 1);

        ffmpeg.set_filters::<&str>(&[]).await.unwrap();
        assert!(ffmpeg.enabled_filters().is_empty());
        assert_eq!(recorder.count(EventKind::AudioFiltersUpdate), 2);
    }
}
