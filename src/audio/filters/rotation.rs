use super::{AudioFilter, saturate};
use super::lfo::Lfo;

/// "8D" auto-panner: sweeps the signal around the stereo field.
pub struct RotationFilter {
    lfo: Lfo,
}

impl RotationFilter {
    pub fn new(rotation_hz: f64) -> Self {
        Self {
            lfo: Lfo::new(rotation_hz, 1.0),
        }
    }
}

impl AudioFilter for RotationFilter {
    fn process(&mut self, samples: &mut [i16]) {
        if self.lfo.frequency == 0.0 {
            return;
        }

        for frame in samples.chunks_exact_mut(2) {
            let pan = self.lfo.next_value();
            let [l, r] = [frame[0] as f64, frame[1] as f64];
            frame[0] = saturate(l * (1.0 - pan) * 0.5);
            frame[1] = saturate(r * (1.0 + pan) * 0.5);
        }
    }

    fn is_enabled(&self) -> bool {
        self.lfo.frequency != 0.0
    }

    fn reset(&mut self) {
        self.lfo.reset();
    }
}
