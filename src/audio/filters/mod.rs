pub mod biquad;
pub mod delay_line;
pub mod dsp;
pub mod equalizer;
pub mod ffmpeg;
pub mod lfo;
pub mod rotation;
pub mod tremolo;
pub mod vibrato;
pub mod volume;

pub use biquad::{BiquadFilter, BiquadFilterType, BiquadSettings};
pub use dsp::{DspFilter, DspStack};
pub use equalizer::{EqBand, EqualizerFilter};
pub use ffmpeg::FfmpegFilters;
pub use volume::VolumeFilter;

use crate::{
    audio::{
        constants::{CHANNELS, EQ_BAND_COUNT, SAMPLE_RATE},
        resample::SincResampler,
    },
    common::errors::{PlayerError, PlayerResult},
};

/// Trait for audio filters that process interleaved stereo i16 PCM samples.
/// Buffer layout: [L, R, L, R, ...], 960 frames × 2 channels = 1920 samples per 20ms.
pub trait AudioFilter: Send {
    /// Process samples in-place.
    fn process(&mut self, samples: &mut [i16]);
    /// Whether this filter currently changes the signal.
    fn is_enabled(&self) -> bool;
    /// Reset internal state (on seek or filter change).
    fn reset(&mut self);
}

/// Truncates toward zero and saturates to the i16 range.
#[inline]
pub(crate) fn saturate(v: f64) -> i16 {
    (v as i32).clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Last-applied filter parameters. A queue keeps one of these so a new stream
/// starts with the same sound as the previous one.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSettings {
    pub biquad: Option<BiquadSettings>,
    pub equalizer: Vec<EqBand>,
    pub filters: Vec<DspFilter>,
    pub sample_rate: u32,
    pub volume: u16,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            biquad: None,
            equalizer: EqualizerFilter::default().bands(),
            filters: Vec::new(),
            sample_rate: SAMPLE_RATE,
            volume: 100,
        }
    }
}

/// Stages a queue has switched off. A disabled stage passes audio through
/// untouched, though its parameters are still tracked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageSwitches {
    pub disable_equalizer: bool,
    pub disable_biquad: bool,
    pub disable_filter: bool,
    pub disable_volume: bool,
    pub disable_resampler: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterUpdate<T> {
    pub old: T,
    pub new: T,
}

impl<T: PartialEq> FilterUpdate<T> {
    pub fn changed(&self) -> bool {
        self.old != self.new
    }
}

/// A parameter change reported by the chain, to be diffed against the
/// queue's cache.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterChange {
    Equalizer(FilterUpdate<Vec<EqBand>>),
    Biquad(FilterUpdate<Option<BiquadSettings>>),
    Dsp(FilterUpdate<Vec<DspFilter>>),
    Volume(FilterUpdate<u16>),
    Resampler(FilterUpdate<u32>),
}

/// Live PCM transform: equalizer → DSP effects → biquad → resampler with
/// volume folded into the same pass.
///
/// Output length differs from input length whenever the target rate is not
/// 48 kHz, so processed audio is collected in a residual buffer and drained
/// in fixed frames with [`FiltersChain::fill_frame`].
pub struct FiltersChain {
    equalizer: EqualizerFilter,
    dsp: DspStack,
    biquad: BiquadFilter,
    volume: VolumeFilter,
    resampler: SincResampler,
    target_rate: u32,
    switches: StageSwitches,
    scratch: Vec<i16>,
    residual: Vec<i16>,
}

impl FiltersChain {
    pub fn new(settings: &FilterSettings, switches: StageSwitches) -> Self {
        let target_rate = settings.sample_rate.max(1);
        Self {
            equalizer: EqualizerFilter::new(&settings.equalizer),
            dsp: DspStack::new(&settings.filters),
            biquad: BiquadFilter::new(settings.biquad),
            volume: VolumeFilter::new(settings.volume),
            resampler: SincResampler::new(SAMPLE_RATE, target_rate, CHANNELS),
            target_rate,
            switches,
            scratch: Vec::new(),
            residual: Vec::new(),
        }
    }

    pub fn settings(&self) -> FilterSettings {
        FilterSettings {
            biquad: self.biquad.settings(),
            equalizer: self.equalizer.bands(),
            filters: self.dsp.filters(),
            sample_rate: self.target_rate,
            volume: self.volume.percent(),
        }
    }

    pub fn switches(&self) -> StageSwitches {
        self.switches
    }

    pub fn set_eq(&mut self, bands: &[EqBand]) -> FilterChange {
        let old = self.equalizer.bands();
        self.equalizer.set_bands(bands);
        FilterChange::Equalizer(FilterUpdate {
            old,
            new: self.equalizer.bands(),
        })
    }

    pub fn set_eq_gain(&mut self, band: usize, gain: f32) -> PlayerResult<FilterChange> {
        let old = self.equalizer.bands();
        if !self.equalizer.set_gain(band, gain) {
            return Err(PlayerError::invalid_arg(
                "band",
                format!("band index in 0..{}", EQ_BAND_COUNT),
                band,
            ));
        }
        Ok(FilterChange::Equalizer(FilterUpdate {
            old,
            new: self.equalizer.bands(),
        }))
    }

    pub fn reset_eq(&mut self) -> FilterChange {
        let old = self.equalizer.bands();
        self.equalizer.reset_gains();
        FilterChange::Equalizer(FilterUpdate {
            old,
            new: self.equalizer.bands(),
        })
    }

    pub fn set_biquad(&mut self, settings: Option<BiquadSettings>) -> FilterChange {
        let old = self.biquad.settings();
        self.biquad.set(settings);
        FilterChange::Biquad(FilterUpdate {
            old,
            new: self.biquad.settings(),
        })
    }

    pub fn set_filters(&mut self, filters: &[DspFilter]) -> FilterChange {
        let old = self.dsp.filters();
        self.dsp.set(filters);
        FilterChange::Dsp(FilterUpdate {
            old,
            new: self.dsp.filters(),
        })
    }

    pub fn toggle_filter(&mut self, filter: DspFilter) -> FilterChange {
        let old = self.dsp.filters();
        self.dsp.toggle(filter);
        FilterChange::Dsp(FilterUpdate {
            old,
            new: self.dsp.filters(),
        })
    }

    pub fn set_volume(&mut self, percent: u16) -> FilterChange {
        let old = self.volume.percent();
        self.volume.set_percent(percent);
        FilterChange::Volume(FilterUpdate {
            old,
            new: self.volume.percent(),
        })
    }

    /// Switches the resampler to a new target rate.
    ///
    /// The chain is only reachable through `&mut self`, so no frame can be in
    /// flight while the resampler is rebuilt: the transform is paused for the
    /// duration of the swap and resumes with the next `process` call. Audio
    /// already converted at the old rate stays queued in the residual buffer.
    pub fn set_target_sample_rate(&mut self, rate: u32) -> PlayerResult<FilterChange> {
        if rate == 0 {
            return Err(PlayerError::invalid_arg("sample_rate", "positive rate in Hz", rate));
        }
        let old = self.target_rate;
        if old != rate {
            self.resampler = SincResampler::new(SAMPLE_RATE, rate, CHANNELS);
            self.target_rate = rate;
        }
        Ok(FilterChange::Resampler(FilterUpdate { old, new: rate }))
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.target_rate
    }

    /// Speed factor introduced by the resampler. A lower target rate means
    /// fewer samples per input second, so playback runs faster.
    pub fn speed_ratio(&self) -> f64 {
        if self.switches.disable_resampler {
            return 1.0;
        }
        SAMPLE_RATE as f64 / self.target_rate as f64
    }

    /// Runs one input frame through every stage and queues the result.
    pub fn process(&mut self, input: &[i16]) {
        let mut work = std::mem::take(&mut self.scratch);
        work.clear();
        work.extend_from_slice(input);

        if !self.switches.disable_equalizer && self.equalizer.is_enabled() {
            self.equalizer.process(&mut work);
        }
        if !self.switches.disable_filter && self.dsp.is_enabled() {
            self.dsp.process(&mut work);
        }
        if !self.switches.disable_biquad && self.biquad.is_enabled() {
            self.biquad.process(&mut work);
        }

        let gain = if self.switches.disable_volume {
            1.0
        } else {
            self.volume.gain()
        };
        if self.switches.disable_resampler || self.resampler.is_passthrough() {
            volume::apply_gain(&mut work, gain);
            self.residual.extend_from_slice(&work);
        } else {
            self.resampler.process(&work, gain, &mut self.residual);
        }

        self.scratch = work;
    }

    /// Drains exactly `output.len()` processed samples. Returns `false` when
    /// not enough audio is buffered yet.
    pub fn fill_frame(&mut self, output: &mut [i16]) -> bool {
        if self.residual.len() < output.len() {
            return false;
        }
        output.copy_from_slice(&self.residual[..output.len()]);
        self.residual.drain(..output.len());
        true
    }

    /// Samples still waiting in the residual buffer.
    pub fn buffered(&self) -> usize {
        self.residual.len()
    }

    /// Reset all filter states (e.g. on seek).
    pub fn reset(&mut self) {
        self.equalizer.reset();
        self.dsp.reset();
        self.biquad.reset();
        self.resampler.reset();
        self.residual.clear();
    }
}
