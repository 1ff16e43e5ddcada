//! Blackman-windowed sinc resampler.
//!
//! Volume is folded into the convolution so a frame is traversed once for
//! both rate conversion and gain.

const TAPS: usize = 32;

pub struct SincResampler {
    ratio: f32,
    index: f32,
    channels: usize,
    /// Per-channel ring of the last `TAPS` input samples.
    history: Vec<[f32; TAPS]>,
    head: usize,
    window: [f32; TAPS],
}

impl SincResampler {
    pub fn new(source_rate: u32, target_rate: u32, channels: usize) -> Self {
        let window = std::array::from_fn(|i| Self::blackman(i as f32, TAPS as f32 - 1.0));
        Self {
            ratio: source_rate as f32 / target_rate.max(1) as f32,
            index: 0.0,
            channels,
            history: vec![[0.0; TAPS]; channels],
            head: 0,
            window,
        }
    }

    fn sinc(x: f32) -> f32 {
        if x.abs() < 1e-6 {
            return 1.0;
        }
        let pi_x = std::f32::consts::PI * x;
        pi_x.sin() / pi_x
    }

    fn blackman(n: f32, m: f32) -> f32 {
        let phase = 2.0 * std::f32::consts::PI * n / m;
        0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos()
    }

    pub fn is_passthrough(&self) -> bool {
        (self.ratio - 1.0).abs() < f32::EPSILON
    }

    /// Resamples `input`, scales by `gain` and appends to `output`.
    /// Output length is about `input.len() / ratio`.
    pub fn process(&mut self, input: &[i16], gain: f32, output: &mut Vec<i16>) {
        if self.is_passthrough() {
            output.extend(input.iter().map(|s| scale(*s as f32, gain)));
            return;
        }

        let half_taps = (TAPS / 2) as f32;
        for frame in input.chunks_exact(self.channels) {
            for (ch, sample) in frame.iter().enumerate() {
                self.history[ch][self.head] = *sample as f32;
            }
            self.head = (self.head + 1) % TAPS;

            while self.index < 1.0 {
                for ch in 0..self.channels {
                    let mut sum = 0.0;
                    for i in 0..TAPS {
                        // `head` now points at the oldest sample.
                        let s = self.history[ch][(self.head + i) % TAPS];
                        let offset = (i as f32 - half_taps) - self.index;
                        sum += s * Self::sinc(offset) * self.window[i];
                    }
                    output.push(scale(sum, gain));
                }
                self.index += self.ratio;
            }
            self.index -= 1.0;
        }
    }

    pub fn reset(&mut self) {
        self.index = 0.0;
        self.head = 0;
        for ch in self.history.iter_mut() {
            ch.fill(0.0);
        }
    }
}

fn scale(sample: f32, gain: f32) -> i16 {
    (sample * gain).clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_only_applies_gain() {
        let mut r = SincResampler::new(48_000, 48_000, 2);
        let mut out = Vec::new();
        r.process(&[1000, -1000, 30_000, -30_000], 2.0, &mut out);
        assert_eq!(out, vec![2000, -2000, i16::MAX, i16::MIN]);
    }

    #[test]
    fn test_output_length_tracks_rate_ratio() {
        let input = vec![0i16; 1920];

        let mut down = SincResampler::new(48_000, 24_000, 2);
        let mut out = Vec::new();
        down.process(&input, 1.0, &mut out);
        assert_eq!(out.len(), 960);

        let mut up = SincResampler::new(48_000, 60_000, 2);
        let mut out = Vec::new();
        up.process(&input, 1.0, &mut out);
        let expected = 1920.0 * 60_000.0 / 48_000.0;
        assert!((out.len() as f32 - expected).abs() <= 4.0, "got {}", out.len());
    }
}
