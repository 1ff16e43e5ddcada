use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::queue::{QueueStrategy, RepeatMode};

/// Defaults every new guild queue starts from. Per-queue overrides go through
/// `GuildQueueOptions`.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct QueueConfig {
    #[serde(default)]
    pub strategy: QueueStrategy,
    #[serde(default)]
    pub repeat_mode: RepeatMode,
    /// `None` means unbounded.
    #[serde(default)]
    pub max_size: Option<usize>,
    #[serde(default)]
    pub max_history_size: Option<usize>,
    #[serde(default = "default_volume")]
    pub volume: u16,
    #[serde(default = "default_true")]
    pub leave_on_empty: bool,
    #[serde(default)]
    pub leave_on_empty_cooldown_ms: u64,
    #[serde(default = "default_true")]
    pub leave_on_end: bool,
    #[serde(default)]
    pub leave_on_end_cooldown_ms: u64,
    #[serde(default = "default_true")]
    pub leave_on_stop: bool,
    #[serde(default)]
    pub leave_on_stop_cooldown_ms: u64,
    #[serde(default = "default_true")]
    pub pause_on_empty: bool,
    #[serde(default)]
    pub skip_on_no_stream: bool,
    #[serde(default)]
    pub no_emit_insert: bool,
    #[serde(default = "default_buffering_timeout_ms")]
    pub buffering_timeout_ms: u64,
}

impl QueueConfig {
    pub fn buffering_timeout(&self) -> Duration {
        Duration::from_millis(self.buffering_timeout_ms)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            strategy: QueueStrategy::default(),
            repeat_mode: RepeatMode::default(),
            max_size: None,
            max_history_size: None,
            volume: default_volume(),
            leave_on_empty: true,
            leave_on_empty_cooldown_ms: 0,
            leave_on_end: true,
            leave_on_end_cooldown_ms: 0,
            leave_on_stop: true,
            leave_on_stop_cooldown_ms: 0,
            pause_on_empty: true,
            skip_on_no_stream: false,
            no_emit_insert: false,
            buffering_timeout_ms: default_buffering_timeout_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_volume() -> u16 {
    100
}

fn default_buffering_timeout_ms() -> u64 {
    1000
}
