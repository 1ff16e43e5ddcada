use serde::{Deserialize, Serialize};

/// Global switches for the PCM filter stages. A stage disabled here cannot be
/// turned on by a queue.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FiltersConfig {
    #[serde(default = "default_true")]
    pub equalizer: bool,
    #[serde(default = "default_true")]
    pub biquad: bool,
    #[serde(default = "default_true")]
    pub dsp: bool,
    #[serde(default = "default_true")]
    pub volume: bool,
    #[serde(default = "default_true")]
    pub resampler: bool,
    #[serde(default = "default_volume")]
    pub default_volume: u16,
}

fn default_true() -> bool {
    true
}

fn default_volume() -> u16 {
    100
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            equalizer: true,
            biquad: true,
            dsp: true,
            volume: true,
            resampler: true,
            default_volume: default_volume(),
        }
    }
}

impl FiltersConfig {
    pub fn is_enabled(&self, name: &str) -> bool {
        match name {
            "equalizer" | "eq" => self.equalizer,
            "biquad" => self.biquad,
            "dsp" | "filters" => self.dsp,
            "volume" => self.volume,
            "resampler" => self.resampler,
            _ => true,
        }
    }
}
