use std::f64::consts::PI;

use crate::audio::constants::SAMPLE_RATE_F64;

const TWO_PI: f64 = 2.0 * PI;

/// Sine low-frequency oscillator shared by the modulation filters.
pub struct Lfo {
    phase: f64,
    pub frequency: f64,
    pub depth: f64,
}

impl Lfo {
    pub fn new(frequency: f64, depth: f64) -> Self {
        Self {
            phase: 0.0,
            frequency,
            depth,
        }
    }

    pub fn is_active(&self) -> bool {
        self.frequency > 0.0 && self.depth > 0.0
    }

    /// Raw sine value in [-1, 1]; advances the phase by one sample.
    pub fn next_value(&mut self) -> f64 {
        if self.frequency == 0.0 {
            return 0.0;
        }
        let value = self.phase.sin();
        self.phase += TWO_PI * self.frequency / SAMPLE_RATE_F64;
        if self.phase > TWO_PI {
            self.phase -= TWO_PI;
        }
        value
    }

    /// Amplitude multiplier `1 - depth * (sin + 1) / 2`.
    pub fn next_gain(&mut self) -> f64 {
        if !self.is_active() {
            return 1.0;
        }
        let normalized = (self.next_value() + 1.0) / 2.0;
        1.0 - self.depth * normalized
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gain_stays_within_depth() {
        let mut lfo = Lfo::new(5.0, 0.4);
        for _ in 0..48_000 {
            let g = lfo.next_gain();
            assert!((0.6 - 1e-9..=1.0 + 1e-9).contains(&g));
        }
    }

    #[test]
    fn test_silent_lfo_is_unity() {
        let mut lfo = Lfo::new(0.0, 1.0);
        assert_eq!(lfo.next_gain(), 1.0);
        assert_eq!(lfo.next_value(), 0.0);
    }
}
