//! Codec-level filter presets applied by the transcoder through `-af`.
//!
//! These cannot change live: toggling any of them replays the current track
//! at its current position with the new filter string.

use std::sync::LazyLock;

use regex::Regex;

static ASETRATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"asetrate=(\d+(?:\.\d+)?)(?:\*(\d+(?:\.\d+)?))?").unwrap()
});
static ATEMPO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"atempo=(\d+(?:\.\d+)?)").unwrap());

/// Preset name → ffmpeg filter expression.
pub const FFMPEG_PRESETS: &[(&str, &str)] = &[
    ("bassboost_low", "bass=g=15:f=110:w=0.3"),
    ("bassboost", "bass=g=20:f=110:w=0.3"),
    ("bassboost_high", "bass=g=30:f=110:w=0.3"),
    ("8D", "apulsator=hz=0.09"),
    ("vaporwave", "aresample=48000,asetrate=48000*0.8"),
    ("nightcore", "aresample=48000,asetrate=48000*1.25"),
    ("lofi", "aresample=48000,asetrate=48000*0.9,extrastereo=m=2.5:c=disabled"),
    ("phaser", "aphaser=in_gain=0.4"),
    ("tremolo", "tremolo"),
    ("vibrato", "vibrato=f=6.5"),
    ("reverse", "areverse"),
    ("treble", "treble=g=5"),
    ("normalizer", "dynaudnorm=g=101"),
    ("normalizer2", "acompressor"),
    ("surrounding", "surround"),
    ("pulsator", "apulsator=hz=1"),
    ("subboost", "asubboost"),
    ("karaoke", "stereotools=mlev=0.03"),
    ("flanger", "flanger"),
    ("gate", "agate"),
    ("haas", "haas"),
    ("mcompand", "mcompand"),
    ("mono", "pan=mono|c0=.5*c0+.5*c1"),
    ("mstlr", "stereotools=mode=ms>lr"),
    ("mstrr", "stereotools=mode=ms>rr"),
    ("compressor", "compand=points=-80/-105|-62/-80|-15.4/-15.4|0/-12|20/-7.7"),
    (
        "expander",
        "compand=attacks=0:points=-80/-169|-54/-80|-49.5/-64.6|-41.1/-41.1|-25.8/-15|-10.8/-4.5|0/0|20/8.3",
    ),
    ("softlimiter", "compand=attacks=0:points=-80/-80|-12.4/-12.4|-6/-8|0/-6.8|20/-2.8"),
    ("chorus", "chorus=0.7:0.9:55:0.4:0.25:2"),
    ("chorus2d", "chorus=0.6:0.9:50|60:0.4|0.32:0.25|0.4:2|1.3"),
    ("chorus3d", "chorus=0.5:0.9:50|60|40:0.4|0.32|0.3:0.25|0.4|0.3:2|2.3|1.3"),
    ("fadein", "afade=t=in:ss=0:d=10"),
    (
        "dim",
        "afftfilt=\"'real=re * (1-clip((b/nb)*b,0,1))':imag='im * (1-clip((b/nb)*b,0,1))'\"",
    ),
    ("earrape", "channelsplit,sidechaingate=level_in=64"),
    ("silenceremove", "silenceremove=1:0:-50dB"),
];

pub fn preset(name: &str) -> Option<&'static str> {
    FFMPEG_PRESETS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, expr)| *expr)
}

/// Ordered set of enabled presets for one queue.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FfmpegFilters {
    enabled: Vec<String>,
}

impl FfmpegFilters {
    /// Unknown names are dropped.
    pub fn new<S: AsRef<str>>(names: &[S]) -> Self {
        let mut filters = Self::default();
        filters.set_filters(names);
        filters
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.iter().any(|n| n == name)
    }

    pub fn enabled_filters(&self) -> &[String] {
        &self.enabled
    }

    pub fn disabled_filters(&self) -> Vec<&'static str> {
        FFMPEG_PRESETS
            .iter()
            .map(|(n, _)| *n)
            .filter(|n| !self.is_enabled(n))
            .collect()
    }

    /// Replaces the enabled set. An empty slice clears everything.
    pub fn set_filters<S: AsRef<str>>(&mut self, names: &[S]) {
        self.enabled.clear();
        for name in names {
            let name = name.as_ref();
            if preset(name).is_some() && !self.is_enabled(name) {
                self.enabled.push(name.to_string());
            }
        }
    }

    /// Flips every listed preset.
    pub fn toggle<S: AsRef<str>>(&mut self, names: &[S]) {
        for name in names {
            let name = name.as_ref();
            if preset(name).is_none() {
                continue;
            }
            match self.enabled.iter().position(|n| n == name) {
                Some(idx) => {
                    self.enabled.remove(idx);
                }
                None => self.enabled.push(name.to_string()),
            }
        }
    }

    /// The comma-joined `-af` expression, empty when nothing is enabled.
    pub fn filter_string(&self) -> String {
        self.enabled
            .iter()
            .filter_map(|n| preset(n))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn to_args(&self) -> Vec<String> {
        let filters = self.filter_string();
        if filters.is_empty() {
            Vec::new()
        } else {
            vec!["-af".to_string(), filters]
        }
    }

    /// Speed factor the enabled presets impose on playback.
    pub fn rate_multiplier(&self) -> f64 {
        parse_rate_multiplier(&self.filter_string())
    }
}

/// Multiplies every `asetrate=<rate>*<factor>` and `atempo=<factor>` term in
/// an ffmpeg filter string.
pub fn parse_rate_multiplier(filters: &str) -> f64 {
    let mut multiplier = 1.0;
    for caps in ASETRATE.captures_iter(filters) {
        let rate: f64 = caps[1].parse().unwrap_or(48_000.0);
        let factor: f64 = caps
            .get(2)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(1.0);
        multiplier *= rate * factor / 48_000.0;
    }
    for caps in ATEMPO.captures_iter(filters) {
        if let Ok(tempo) = caps[1].parse::<f64>() {
            multiplier *= tempo;
        }
    }
    if multiplier.is_finite() && multiplier > 0.0 {
        multiplier
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_and_filter_string() {
        let mut f = FfmpegFilters::default();
        f.toggle(&["bassboost", "nightcore"]);
        assert_eq!(
            f.filter_string(),
            "bass=g=20:f=110:w=0.3,aresample=48000,asetrate=48000*1.25"
        );
        assert_eq!(f.to_args()[0], "-af");

        f.toggle(&["bassboost"]);
        assert_eq!(f.enabled_filters(), &["nightcore".to_string()]);
        assert!(!f.disabled_filters().contains(&"nightcore"));
    }

    #[test]
    fn test_unknown_presets_are_ignored() {
        let f = FfmpegFilters::new(&["not-a-filter", "mono"]);
        assert_eq!(f.enabled_filters(), &["mono".to_string()]);
        assert!(FfmpegFilters::default().to_args().is_empty());
    }

    #[test]
    fn test_rate_multiplier() {
        assert!((FfmpegFilters::new(&["nightcore"]).rate_multiplier() - 1.25).abs() < 1e-9);
        assert!((FfmpegFilters::new(&["vaporwave"]).rate_multiplier() - 0.8).abs() < 1e-9);
        assert!((parse_rate_multiplier("atempo=1.5,asetrate=44100") - 1.5 * 44_100.0 / 48_000.0).abs() < 1e-9);
        assert_eq!(parse_rate_multiplier("bass=g=20"), 1.0);
    }
}
