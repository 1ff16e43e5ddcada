use super::{AudioFilter, saturate};
use super::delay_line::DelayLine;
use super::lfo::Lfo;
use crate::audio::constants::SAMPLE_RATE_F64;

const MAX_DELAY_MS: f64 = 20.0;

/// Pitch wobble produced by modulating a short delay.
pub struct VibratoFilter {
    lfo: Lfo,
    delays: [DelayLine; 2],
}

impl VibratoFilter {
    pub fn new(frequency: f32, depth: f32) -> Self {
        let buffer_size = ((SAMPLE_RATE_F64 * MAX_DELAY_MS) / 1000.0).ceil() as usize;
        Self {
            lfo: Lfo::new(frequency as f64, depth.clamp(0.0, 1.0) as f64),
            delays: [DelayLine::new(buffer_size), DelayLine::new(buffer_size)],
        }
    }
}

impl AudioFilter for VibratoFilter {
    fn process(&mut self, samples: &mut [i16]) {
        if !self.lfo.is_active() {
            return;
        }

        let width = self.lfo.depth * SAMPLE_RATE_F64 * 0.005;
        for frame in samples.chunks_exact_mut(2) {
            let delay = width + self.lfo.next_value() * width;
            for (ch, sample) in frame.iter_mut().enumerate() {
                self.delays[ch].write(*sample as f32);
                let delayed = self.delays[ch].read(delay);
                *sample = saturate(delayed as f64);
            }
        }
    }

    fn is_enabled(&self) -> bool {
        self.lfo.is_active()
    }

    fn reset(&mut self) {
        self.lfo.reset();
        for line in self.delays.iter_mut() {
            line.clear();
        }
    }
}
