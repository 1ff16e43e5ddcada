use serde::{Deserialize, Serialize};

use super::AudioFilter;
use crate::audio::constants::{EQ_BAND_COUNT, EQ_GAIN_MAX, EQ_GAIN_MIN, INT16_MAX_F, INT16_SCALE};

const DEFAULT_MAKEUP_GAIN: f32 = 4.0;

/// One equalizer band setting. `band` is 0..15, `gain` is clamped to
/// [-0.25, 1.0] when applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqBand {
    pub band: u8,
    pub gain: f32,
}

impl EqBand {
    pub fn new(band: u8, gain: f32) -> Self {
        Self { band, gain }
    }
}

/// Center frequencies of the 15 bands, in Hz.
pub const BAND_FREQUENCIES: [u32; EQ_BAND_COUNT] = [
    25, 40, 63, 100, 160, 250, 400, 630, 1000, 1600, 2500, 4000, 6300, 10000, 16000,
];

struct Coefficients {
    beta: f32,
    alpha: f32,
    gamma: f32,
}

// Band-pass coefficients for 48 kHz, ordered beta, alpha, gamma.
const COEFFICIENTS_48000: [Coefficients; EQ_BAND_COUNT] = [
    Coefficients { beta: 9.9847546664e-01, alpha: 7.6226668143e-04, gamma: 1.9984647656e+00 },
    Coefficients { beta: 9.9756184654e-01, alpha: 1.2190767289e-03, gamma: 1.9975344645e+00 },
    Coefficients { beta: 9.9616261379e-01, alpha: 1.9186931041e-03, gamma: 1.9960947369e+00 },
    Coefficients { beta: 9.9391578543e-01, alpha: 3.0421072865e-03, gamma: 1.9937449618e+00 },
    Coefficients { beta: 9.9028307215e-01, alpha: 4.8584639242e-03, gamma: 1.9898465702e+00 },
    Coefficients { beta: 9.8485897264e-01, alpha: 7.5705136795e-03, gamma: 1.9837962543e+00 },
    Coefficients { beta: 9.7588512657e-01, alpha: 1.2057436715e-02, gamma: 1.9731772447e+00 },
    Coefficients { beta: 9.6228521814e-01, alpha: 1.8857390928e-02, gamma: 1.9556164694e+00 },
    Coefficients { beta: 9.4080933132e-01, alpha: 2.9595334338e-02, gamma: 1.9242054384e+00 },
    Coefficients { beta: 9.0702059196e-01, alpha: 4.6489704022e-02, gamma: 1.8653476166e+00 },
    Coefficients { beta: 8.5868004289e-01, alpha: 7.0659978553e-02, gamma: 1.7600401337e+00 },
    Coefficients { beta: 7.8409610788e-01, alpha: 1.0795194606e-01, gamma: 1.5450725522e+00 },
    Coefficients { beta: 6.8332861002e-01, alpha: 1.5833569499e-01, gamma: 1.1426447155e+00 },
    Coefficients { beta: 5.5267518228e-01, alpha: 2.2366240886e-01, gamma: 4.0186190803e-01 },
    Coefficients { beta: 4.1811888447e-01, alpha: 2.9094055777e-01, gamma: -7.0905944223e-01 },
];

#[derive(Clone, Default)]
struct BandState {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl BandState {
    fn process(&mut self, sample: f32, coeffs: &Coefficients) -> f32 {
        let result = coeffs.alpha * (sample - self.x2) + coeffs.gamma * self.y1 - coeffs.beta * self.y2;

        self.x2 = self.x1;
        self.x1 = sample;
        self.y2 = self.y1;

        if !result.is_finite() {
            self.y1 = 0.0;
            return 0.0;
        }

        self.y1 = result;
        result
    }
}

/// 15-band parallel equalizer. Gains can be changed while the stream runs;
/// band histories are kept so a change does not click.
pub struct EqualizerFilter {
    gains: [f32; EQ_BAND_COUNT],
    states: [[BandState; 2]; EQ_BAND_COUNT],
    makeup_gain: f32,
}

impl Default for EqualizerFilter {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl EqualizerFilter {
    pub fn new(bands: &[EqBand]) -> Self {
        let mut filter = Self {
            gains: [0.0; EQ_BAND_COUNT],
            states: std::array::from_fn(|_| [BandState::default(), BandState::default()]),
            makeup_gain: DEFAULT_MAKEUP_GAIN,
        };
        filter.set_bands(bands);
        filter
    }

    /// Applies every in-range band; indices past the last band are ignored.
    pub fn set_bands(&mut self, bands: &[EqBand]) {
        let mut next = self.gains;
        for b in bands {
            if (b.band as usize) < EQ_BAND_COUNT {
                next[b.band as usize] = clamp_gain(b.gain);
            }
        }
        self.commit(next);
    }

    /// Sets one band. Returns `false` without touching any state when the band
    /// index is out of range.
    pub fn set_gain(&mut self, band: usize, gain: f32) -> bool {
        if band >= EQ_BAND_COUNT {
            return false;
        }
        let mut next = self.gains;
        next[band] = clamp_gain(gain);
        self.commit(next);
        true
    }

    pub fn gain(&self, band: usize) -> Option<f32> {
        self.gains.get(band).copied()
    }

    /// Every band with its committed gain.
    pub fn bands(&self) -> Vec<EqBand> {
        self.gains
            .iter()
            .enumerate()
            .map(|(i, g)| EqBand::new(i as u8, *g))
            .collect()
    }

    pub fn reset_gains(&mut self) {
        self.commit([0.0; EQ_BAND_COUNT]);
    }

    fn commit(&mut self, gains: [f32; EQ_BAND_COUNT]) {
        let positive_sum: f32 = gains.iter().filter(|g| **g > 0.0).sum();
        self.makeup_gain = if positive_sum > 1.0 {
            DEFAULT_MAKEUP_GAIN / (1.0 + (positive_sum - 1.0) * 0.5)
        } else {
            DEFAULT_MAKEUP_GAIN
        };
        self.gains = gains;
    }
}

fn clamp_gain(gain: f32) -> f32 {
    if gain.is_nan() {
        return 0.0;
    }
    gain.clamp(EQ_GAIN_MIN, EQ_GAIN_MAX)
}

impl AudioFilter for EqualizerFilter {
    fn process(&mut self, samples: &mut [i16]) {
        for frame in samples.chunks_exact_mut(2) {
            let left = frame[0] as f32 / INT16_SCALE;
            let right = frame[1] as f32 / INT16_SCALE;

            // Dry signal at a quarter, bands summed on top.
            let mut out_left = left * 0.25;
            let mut out_right = right * 0.25;

            for (b, coeffs) in COEFFICIENTS_48000.iter().enumerate() {
                let band_left = self.states[b][0].process(left, coeffs);
                let band_right = self.states[b][1].process(right, coeffs);
                let gain = self.gains[b];
                if gain.abs() > f32::EPSILON {
                    out_left += band_left * gain;
                    out_right += band_right * gain;
                }
            }

            frame[0] = ((out_left * self.makeup_gain).tanh() * INT16_MAX_F).round() as i16;
            frame[1] = ((out_right * self.makeup_gain).tanh() * INT16_MAX_F).round() as i16;
        }
    }

    fn is_enabled(&self) -> bool {
        self.gains.iter().any(|g| g.abs() > f32::EPSILON)
    }

    fn reset(&mut self) {
        for band in self.states.iter_mut() {
            for state in band.iter_mut() {
                *state = BandState::default();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_gain_is_clamped() {
        let mut eq = EqualizerFilter::new(&[EqBand::new(0, 0.3)]);
        eq.set_bands(&[EqBand::new(3, 2.0), EqBand::new(4, -1.0)]);

        assert_eq!(eq.gain(3), Some(1.0));
        assert_eq!(eq.gain(4), Some(-0.25));
        assert_eq!(eq.gain(0), Some(0.3));
    }

    #[test]
    fn test_invalid_band_is_rejected_without_mutation() {
        let mut eq = EqualizerFilter::new(&[EqBand::new(1, 0.5)]);
        let before = eq.bands();
        assert!(!eq.set_gain(15, 0.2));
        assert_eq!(eq.bands(), before);
        assert!(eq.set_gain(14, 0.2));
        assert_eq!(eq.gain(14), Some(0.2));
    }

    #[test]
    fn test_flat_equalizer_is_disabled() {
        let mut eq = EqualizerFilter::default();
        assert!(!eq.is_enabled());
        eq.set_gain(2, 0.1);
        assert!(eq.is_enabled());
        eq.reset_gains();
        assert!(!eq.is_enabled());
    }

    #[test]
    fn test_output_stays_in_range() {
        let mut eq = EqualizerFilter::new(&(0..15).map(|b| EqBand::new(b, 1.0)).collect::<Vec<_>>());
        let mut samples: Vec<i16> = (0..1920)
            .map(|i| if i % 4 < 2 { i16::MAX } else { i16::MIN })
            .collect();
        eq.process(&mut samples);
        assert!(samples.iter().all(|s| (*s as i32).abs() <= i16::MAX as i32));
    }
}
