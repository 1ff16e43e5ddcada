use std::time::Duration;

/// Exponential reconnect delay: base, 2×base, 4×base, then 8×base for every
/// further attempt, until the attempt budget runs out.
pub(crate) struct Backoff {
    attempt: u32,
    base_ms: u64,
    max_attempts: u32,
}

impl Backoff {
    pub(crate) fn new(base_ms: u64, max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            base_ms,
            max_attempts,
        }
    }

    pub(crate) fn next(&mut self) -> Duration {
        self.attempt += 1;
        let delay = self.base_ms * 2u64.pow((self.attempt - 1).min(3));
        Duration::from_millis(delay)
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.attempt
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    pub(crate) fn reset(&mut self) {
        self.attempt = 0;
    }
}
