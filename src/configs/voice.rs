use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VoiceConfig {
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_reconnect_backoff_base_ms")]
    pub reconnect_backoff_base_ms: u64,
    #[serde(default = "default_true")]
    pub self_deaf: bool,
}

impl VoiceConfig {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            connection_timeout_ms: default_connection_timeout_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_backoff_base_ms: default_reconnect_backoff_base_ms(),
            self_deaf: true,
        }
    }
}

fn default_connection_timeout_ms() -> u64 {
    20_000
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_backoff_base_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}
