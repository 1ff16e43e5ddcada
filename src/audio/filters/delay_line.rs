/// Fixed-size circular delay buffer with fractional reads.
pub struct DelayLine {
  buffer: Vec<f32>,
  write_index: usize,
}

impl DelayLine {
  pub fn new(size: usize) -> Self {
    Self {
      buffer: vec![0.0; size.max(2)],
      write_index: 0,
    }
  }

  fn size(&self) -> usize {
    self.buffer.len()
  }

  pub fn write(&mut self, sample: f32) {
    self.buffer[self.write_index] = sample;
    self.write_index = (self.write_index + 1) % self.size();
  }

  /// Reads `delay` samples behind the write head, interpolating linearly.
  pub fn read(&self, delay: f64) -> f32 {
    let size = self.size();
    let delay = delay.clamp(0.0, (size - 2) as f64);
    let whole = delay as usize;
    let frac = delay - whole as f64;

    let newest = (self.write_index + size - 1) % size;
    let i0 = (newest + size - whole) % size;
    let i1 = (i0 + size - 1) % size;

    let s0 = self.buffer[i0] as f64;
    let s1 = self.buffer[i1] as f64;
    (s0 * (1.0 - frac) + s1 * frac) as f32
  }

  pub fn clear(&mut self) {
    self.buffer.fill(0.0);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_integer_delay_returns_past_sample() {
    let mut line = DelayLine::new(8);
    for s in [1.0, 2.0, 3.0, 4.0] {
      line.write(s);
    }
    assert_eq!(line.read(0.0), 4.0);
    assert_eq!(line.read(2.0), 2.0);
    assert_eq!(line.read(0.5), 3.5);
  }
}
