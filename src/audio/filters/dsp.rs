use std::fmt;

use serde::{Deserialize, Serialize};

use super::{AudioFilter, rotation::RotationFilter, tremolo::TremoloFilter, vibrato::VibratoFilter};

/// Named PCM effects that can be stacked in the DSP stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DspFilter {
    #[serde(rename = "8D")]
    EightD,
    Tremolo,
    Vibrato,
}

impl DspFilter {
    pub const ALL: [DspFilter; 3] = [Self::EightD, Self::Tremolo, Self::Vibrato];

    pub fn name(&self) -> &'static str {
        match self {
            Self::EightD => "8D",
            Self::Tremolo => "Tremolo",
            Self::Vibrato => "Vibrato",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(name))
    }

    pub(crate) fn build(&self) -> Box<dyn AudioFilter> {
        match self {
            Self::EightD => Box::new(RotationFilter::new(0.2)),
            Self::Tremolo => Box::new(TremoloFilter::new(4.0, 0.6)),
            Self::Vibrato => Box::new(VibratoFilter::new(5.0, 0.5)),
        }
    }
}

impl fmt::Display for DspFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered list of active effects, each with its own state.
#[derive(Default)]
pub struct DspStack {
    active: Vec<(DspFilter, Box<dyn AudioFilter>)>,
}

impl DspStack {
    pub fn new(filters: &[DspFilter]) -> Self {
        let mut stack = Self::default();
        stack.set(filters);
        stack
    }

    pub fn filters(&self) -> Vec<DspFilter> {
        self.active.iter().map(|(f, _)| *f).collect()
    }

    /// Replaces the active set. Effects that stay enabled keep their state.
    pub fn set(&mut self, filters: &[DspFilter]) {
        let mut previous = std::mem::take(&mut self.active);
        for filter in filters {
            if self.active.iter().any(|(f, _)| f == filter) {
                continue;
            }
            let instance = match previous.iter().position(|(f, _)| f == filter) {
                Some(idx) => previous.swap_remove(idx).1,
                None => filter.build(),
            };
            self.active.push((*filter, instance));
        }
    }

    pub fn toggle(&mut self, filter: DspFilter) {
        let mut next = self.filters();
        match next.iter().position(|f| *f == filter) {
            Some(idx) => {
                next.remove(idx);
            }
            None => next.push(filter),
        }
        self.set(&next);
    }
}

impl AudioFilter for DspStack {
    fn process(&mut self, samples: &mut [i16]) {
        for (_, filter) in self.active.iter_mut() {
            filter.process(samples);
        }
    }

    fn is_enabled(&self) -> bool {
        self.active.iter().any(|(_, f)| f.is_enabled())
    }

    fn reset(&mut self) {
        for (_, filter) in self.active.iter_mut() {
            filter.reset();
        }
    }
}
