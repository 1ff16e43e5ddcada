use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use super::AudioFilter;
use crate::audio::constants::SAMPLE_RATE_F64;

/// Shape of a biquad stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BiquadFilterType {
  SinglePoleLowPassApprox,
  SinglePoleLowPass,
  LowPass,
  HighPass,
  BandPass,
  Notch,
  PeakEq,
  LowShelf,
  HighShelf,
}

/// Parameters of the biquad stage as stored in the queue's filter cache.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiquadSettings {
  pub filter: BiquadFilterType,
  /// Cutoff / center frequency in Hz.
  pub cutoff: f64,
  pub q: f64,
  /// Gain in dB, used by the peak and shelf shapes.
  pub gain: f64,
}

impl BiquadSettings {
  pub fn new(filter: BiquadFilterType) -> Self {
    Self {
      filter,
      cutoff: 80.0,
      q: std::f64::consts::FRAC_1_SQRT_2,
      gain: 0.0,
    }
  }
}

/// Biquad filter coefficients (normalized by a0).
#[derive(Debug, Clone, PartialEq)]
pub struct BiquadCoeffs {
  pub b0: f64,
  pub b1: f64,
  pub b2: f64,
  pub a1: f64,
  pub a2: f64,
}

/// Per-channel biquad filter state (Direct Form I).
#[derive(Clone, Default)]
pub struct BiquadState {
  pub x1: f64,
  pub x2: f64,
  pub y1: f64,
  pub y2: f64,
}

impl BiquadCoeffs {
  pub fn passthrough() -> Self {
    Self {
      b0: 1.0,
      b1: 0.0,
      b2: 0.0,
      a1: 0.0,
      a2: 0.0,
    }
  }

  pub fn from_settings(settings: &BiquadSettings, sample_rate: f64) -> Self {
    let freq = settings.cutoff.clamp(1.0, sample_rate * 0.49);
    let q = settings.q.max(1e-4);
    match settings.filter {
      BiquadFilterType::SinglePoleLowPassApprox => {
        let alpha = (2.0 * PI * freq / sample_rate).min(1.0);
        Self {
          b0: alpha,
          b1: 0.0,
          b2: 0.0,
          a1: -(1.0 - alpha),
          a2: 0.0,
        }
      }
      BiquadFilterType::SinglePoleLowPass => {
        let omega = 2.0 * PI * freq / sample_rate;
        let alpha = omega / (omega + 1.0);
        Self {
          b0: alpha,
          b1: 0.0,
          b2: 0.0,
          a1: -(1.0 - alpha),
          a2: 0.0,
        }
      }
      BiquadFilterType::LowPass => Self::lowpass(freq, q, sample_rate),
      BiquadFilterType::HighPass => Self::highpass(freq, q, sample_rate),
      BiquadFilterType::BandPass => Self::bandpass(freq, q, sample_rate),
      BiquadFilterType::Notch => Self::notch(freq, q, sample_rate),
      BiquadFilterType::PeakEq => Self::peaking(freq, q, settings.gain, sample_rate),
      BiquadFilterType::LowShelf => Self::shelf(freq, q, settings.gain, sample_rate, false),
      BiquadFilterType::HighShelf => Self::shelf(freq, q, settings.gain, sample_rate, true),
    }
  }

  pub fn bandpass(freq: f64, q: f64, sample_rate: f64) -> Self {
    let omega0 = 2.0 * PI * freq / sample_rate;
    let alpha = omega0.sin() / (2.0 * q);

    let a0 = 1.0 + alpha;
    Self {
      b0: alpha / a0,
      b1: 0.0,
      b2: -alpha / a0,
      a1: -2.0 * omega0.cos() / a0,
      a2: (1.0 - alpha) / a0,
    }
  }

  pub fn lowpass(freq: f64, q: f64, sample_rate: f64) -> Self {
    let omega0 = 2.0 * PI * freq / sample_rate;
    let cos_omega0 = omega0.cos();
    let alpha = omega0.sin() / (2.0 * q);

    let inv_a0 = 1.0 / (1.0 + alpha);
    Self {
      b0: (1.0 - cos_omega0) * 0.5 * inv_a0,
      b1: (1.0 - cos_omega0) * inv_a0,
      b2: (1.0 - cos_omega0) * 0.5 * inv_a0,
      a1: -2.0 * cos_omega0 * inv_a0,
      a2: (1.0 - alpha) * inv_a0,
    }
  }

  pub fn highpass(freq: f64, q: f64, sample_rate: f64) -> Self {
    let omega0 = 2.0 * PI * freq / sample_rate;
    let cos_omega0 = omega0.cos();
    let alpha = omega0.sin() / (2.0 * q);

    let inv_a0 = 1.0 / (1.0 + alpha);
    Self {
      b0: (1.0 + cos_omega0) * 0.5 * inv_a0,
      b1: -(1.0 + cos_omega0) * inv_a0,
      b2: (1.0 + cos_omega0) * 0.5 * inv_a0,
      a1: -2.0 * cos_omega0 * inv_a0,
      a2: (1.0 - alpha) * inv_a0,
    }
  }

  pub fn notch(freq: f64, q: f64, sample_rate: f64) -> Self {
    let omega0 = 2.0 * PI * freq / sample_rate;
    let cos_omega0 = omega0.cos();
    let alpha = omega0.sin() / (2.0 * q);

    let inv_a0 = 1.0 / (1.0 + alpha);
    Self {
      b0: inv_a0,
      b1: -2.0 * cos_omega0 * inv_a0,
      b2: inv_a0,
      a1: -2.0 * cos_omega0 * inv_a0,
      a2: (1.0 - alpha) * inv_a0,
    }
  }

  pub fn peaking(freq: f64, q: f64, gain_db: f64, sample_rate: f64) -> Self {
    let a = 10f64.powf(gain_db / 40.0);
    let omega0 = 2.0 * PI * freq / sample_rate;
    let cos_omega0 = omega0.cos();
    let alpha = omega0.sin() / (2.0 * q);

    let inv_a0 = 1.0 / (1.0 + alpha / a);
    Self {
      b0: (1.0 + alpha * a) * inv_a0,
      b1: -2.0 * cos_omega0 * inv_a0,
      b2: (1.0 - alpha * a) * inv_a0,
      a1: -2.0 * cos_omega0 * inv_a0,
      a2: (1.0 - alpha / a) * inv_a0,
    }
  }

  pub fn shelf(freq: f64, q: f64, gain_db: f64, sample_rate: f64, high: bool) -> Self {
    let a = 10f64.powf(gain_db / 40.0);
    let omega0 = 2.0 * PI * freq / sample_rate;
    let cos_omega0 = omega0.cos();
    let alpha = omega0.sin() / (2.0 * q);
    let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
    // High shelf mirrors the low shelf by flipping the sign of cos(w0).
    let c = if high { -cos_omega0 } else { cos_omega0 };

    let a0 = (a + 1.0) + (a - 1.0) * c + two_sqrt_a_alpha;
    let inv_a0 = 1.0 / a0;
    let sign = if high { -1.0 } else { 1.0 };
    Self {
      b0: a * ((a + 1.0) - (a - 1.0) * c + two_sqrt_a_alpha) * inv_a0,
      b1: sign * 2.0 * a * ((a - 1.0) - (a + 1.0) * c) * inv_a0,
      b2: a * ((a + 1.0) - (a - 1.0) * c - two_sqrt_a_alpha) * inv_a0,
      a1: -sign * 2.0 * ((a - 1.0) + (a + 1.0) * c) * inv_a0,
      a2: ((a + 1.0) + (a - 1.0) * c - two_sqrt_a_alpha) * inv_a0,
    }
  }
}

impl BiquadState {
  /// Process one sample through the biquad filter.
  pub fn process(&mut self, input: f64, coeffs: &BiquadCoeffs) -> f64 {
    let output = coeffs.b0 * input + coeffs.b1 * self.x1 + coeffs.b2 * self.x2
      - coeffs.a1 * self.y1
      - coeffs.a2 * self.y2;

    if !output.is_finite() {
      self.reset();
      return 0.0;
    }

    self.x2 = self.x1;
    self.x1 = input;
    self.y2 = self.y1;
    self.y1 = output;
    output
  }

  pub fn reset(&mut self) {
    *self = Self::default();
  }
}

/// Stereo biquad stage. Parameters can be swapped live; channel histories
/// survive the swap.
pub struct BiquadFilter {
  settings: Option<BiquadSettings>,
  coeffs: BiquadCoeffs,
  states: [BiquadState; 2],
}

impl BiquadFilter {
  pub fn new(settings: Option<BiquadSettings>) -> Self {
    let mut filter = Self {
      settings: None,
      coeffs: BiquadCoeffs::passthrough(),
      states: [BiquadState::default(), BiquadState::default()],
    };
    filter.set(settings);
    filter
  }

  pub fn settings(&self) -> Option<BiquadSettings> {
    self.settings
  }

  pub fn set(&mut self, settings: Option<BiquadSettings>) {
    self.coeffs = match &settings {
      Some(s) => BiquadCoeffs::from_settings(s, SAMPLE_RATE_F64),
      None => BiquadCoeffs::passthrough(),
    };
    self.settings = settings;
  }
}

impl AudioFilter for BiquadFilter {
  fn process(&mut self, samples: &mut [i16]) {
    for frame in samples.chunks_exact_mut(2) {
      for (ch, sample) in frame.iter_mut().enumerate() {
        let out = self.states[ch].process(*sample as f64, &self.coeffs);
        *sample = out.clamp(i16::MIN as f64, i16::MAX as f64) as i16;
      }
    }
  }

  fn is_enabled(&self) -> bool {
    self.settings.is_some()
  }

  fn reset(&mut self) {
    for state in self.states.iter_mut() {
      state.reset();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_zero_gain_peak_is_identity() {
    let c = BiquadCoeffs::peaking(1000.0, 1.0, 0.0, SAMPLE_RATE_F64);
    assert!((c.b0 - 1.0).abs() < 1e-9);
    assert!((c.b1 - c.a1).abs() < 1e-9);
    assert!((c.b2 - c.a2).abs() < 1e-9);
  }

  #[test]
  fn test_lowpass_attenuates_nyquist() {
    let mut filter = BiquadFilter::new(Some(BiquadSettings {
      cutoff: 200.0,
      ..BiquadSettings::new(BiquadFilterType::LowPass)
    }));
    let mut samples: Vec<i16> = (0..1920)
      .map(|i| if (i / 2) % 2 == 0 { 20_000 } else { -20_000 })
      .collect();
    filter.process(&mut samples);
    let tail_peak = samples[1800..].iter().map(|s| (*s as i32).abs()).max().unwrap_or(0);
    assert!(tail_peak < 1000, "peak was {}", tail_peak);
  }

  #[test]
  fn test_clearing_settings_disables_stage() {
    let mut filter = BiquadFilter::new(Some(BiquadSettings::new(BiquadFilterType::Notch)));
    assert!(filter.is_enabled());
    filter.set(None);
    assert!(!filter.is_enabled());
    assert_eq!(filter.coeffs, BiquadCoeffs::passthrough());
  }
}
