use super::AudioFilter;
use crate::audio::constants::MAX_VOLUME;

/// Scales samples by a linear factor with saturation.
pub fn apply_gain(samples: &mut [i16], gain: f32) {
  if (gain - 1.0).abs() <= f32::EPSILON {
    return;
  }
  for sample in samples.iter_mut() {
    let s = (*sample as f32 * gain) as i32;
    *sample = s.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
  }
}

/// Volume expressed in percent, 100 being unity.
pub struct VolumeFilter {
  percent: u16,
}

impl VolumeFilter {
  pub fn new(percent: u16) -> Self {
    Self {
      percent: percent.min(MAX_VOLUME),
    }
  }

  pub fn percent(&self) -> u16 {
    self.percent
  }

  pub fn set_percent(&mut self, percent: u16) {
    self.percent = percent.min(MAX_VOLUME);
  }

  pub fn gain(&self) -> f32 {
    self.percent as f32 / 100.0
  }
}

impl AudioFilter for VolumeFilter {
  fn process(&mut self, samples: &mut [i16]) {
    apply_gain(samples, self.gain());
  }

  fn is_enabled(&self) -> bool {
    self.percent != 100
  }

  fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_gain_saturates_instead_of_wrapping() {
    let mut samples = [20_000i16, -20_000, 100, 0];
    VolumeFilter::new(200).process(&mut samples);
    assert_eq!(samples, [i16::MAX, i16::MIN, 200, 0]);
  }

  #[test]
  fn test_volume_is_capped() {
    let f = VolumeFilter::new(5000);
    assert_eq!(f.percent(), MAX_VOLUME);
  }
}
