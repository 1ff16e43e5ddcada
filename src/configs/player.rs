use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PlayerConfig {
    /// Extractor identifiers that are never consulted.
    #[serde(default)]
    pub block_extractors: Vec<String>,
    /// Skip the built-in voice state reaction when the host listens for
    /// `voiceStateUpdate` itself.
    #[serde(default)]
    pub lock_voice_state_handler: bool,
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            block_extractors: Vec::new(),
            lock_voice_state_handler: false,
            ffmpeg_path: default_ffmpeg_path(),
        }
    }
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}
