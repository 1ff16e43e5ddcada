use super::{AudioFilter, saturate};
use super::lfo::Lfo;

/// Amplitude modulation driven by an LFO.
pub struct TremoloFilter {
    lfo: Lfo,
}

impl TremoloFilter {
    pub fn new(frequency: f32, depth: f32) -> Self {
        Self {
            lfo: Lfo::new(frequency as f64, depth.clamp(0.0, 1.0) as f64),
        }
    }
}

impl AudioFilter for TremoloFilter {
    fn process(&mut self, samples: &mut [i16]) {
        if !self.lfo.is_active() {
            return;
        }

        // Both channels of a frame share one multiplier.
        for frame in samples.chunks_exact_mut(2) {
            let gain = self.lfo.next_gain();
            for sample in frame.iter_mut() {
                *sample = saturate(*sample as f64 * gain);
            }
        }
    }

    fn is_enabled(&self) -> bool {
        self.lfo.is_active()
    }

    fn reset(&mut self) {
        self.lfo.reset();
    }
}
