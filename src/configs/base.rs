use serde::{Deserialize, Serialize};

use crate::{common::types::AnyResult, configs::*};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
  #[serde(default)]
  pub player: PlayerConfig,
  #[serde(default)]
  pub queue: QueueConfig,
  #[serde(default)]
  pub voice: VoiceConfig,
  #[serde(default)]
  pub filters: FiltersConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
}

impl Config {
  pub fn load() -> AnyResult<Self> {
    let config_path = if std::path::Path::new("config.toml").exists() {
      "config.toml"
    } else if std::path::Path::new("config.default.toml").exists() {
      "config.default.toml"
    } else {
      return Err("config.toml or config.default.toml not found".into());
    };

    crate::log_println!("Loading configuration from: {}", config_path);

    let config_str = std::fs::read_to_string(config_path)?;
    if config_str.is_empty() {
      return Err(format!("{} is empty", config_path).into());
    }

    Self::from_toml_str(&config_str)
  }

  pub fn from_toml_str(s: &str) -> AnyResult<Self> {
    let config: Config = toml::from_str(s)?;
    Ok(config)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::queue::{QueueStrategy, RepeatMode};

  #[test]
  fn test_empty_document_uses_defaults() {
    let config = Config::from_toml_str("").unwrap();
    assert_eq!(config.queue.volume, 100);
    assert!(config.queue.leave_on_end);
    assert_eq!(config.queue.buffering_timeout_ms, 1000);
    assert_eq!(config.voice.connection_timeout_ms, 20_000);
    assert_eq!(config.voice.max_reconnect_attempts, 5);
    assert!(config.filters.equalizer);
  }

  #[test]
  fn test_partial_sections_merge_with_defaults() {
    let config = Config::from_toml_str(
      r#"
      [queue]
      max_size = 3
      strategy = "lifo"
      repeat_mode = "autoplay"

      [player]
      block_extractors = ["http"]

      [logging]
      level = "debug"
      "#,
    )
    .unwrap();

    assert_eq!(config.queue.max_size, Some(3));
    assert_eq!(config.queue.strategy, QueueStrategy::Lifo);
    assert_eq!(config.queue.repeat_mode, RepeatMode::Autoplay);
    assert!(config.queue.pause_on_empty);
    assert_eq!(config.player.block_extractors, vec!["http".to_string()]);
    assert_eq!(config.player.ffmpeg_path, "ffmpeg");
    assert_eq!(config.logging.level.as_deref(), Some("debug"));
  }

  #[test]
  fn test_invalid_document_is_rejected() {
    assert!(Config::from_toml_str("[queue]\nvolume = \"loud\"").is_err());
  }
}
