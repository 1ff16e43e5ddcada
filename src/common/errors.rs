use std::time::Duration;

use thiserror::Error;

use super::types::GuildId;

/// Every failure the playback core can surface.
///
/// Errors are `Clone` so they can ride inside emitted events alongside the
/// queue and track they belong to.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlayerError {
    /// An action needed a connected dispatcher and none exists.
    #[error("no voice connection is available for this queue")]
    NoVoiceConnection,

    #[error("channel {0} could not be resolved to a voice channel")]
    NoVoiceChannel(String),

    #[error("invalid channel type: expected {expected}, received {received}")]
    InvalidChannelType { expected: String, received: String },

    #[error("no guild queue exists for guild {0}")]
    NoGuildQueue(GuildId),

    #[error("no result: {0}")]
    NoResult(String),

    #[error("out of space: cannot add {attempted} track(s), only {available} slot(s) available")]
    OutOfSpace { attempted: usize, available: usize },

    #[error("the voice connection has been destroyed")]
    VoiceConnectionDestroyed,

    #[error("invalid argument {name}: expected {expected}, received {received}")]
    InvalidArgType {
        name: String,
        expected: String,
        received: String,
    },

    #[error("the operation was cancelled")]
    Cancelled,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("extractor error: {0}")]
    Extractor(String),

    #[error("transcoder error: {0}")]
    Transcoder(String),

    #[error("voice connection error: {0}")]
    Connection(String),

    #[error("audio player error: {0}")]
    AudioPlayer(String),

    #[error("encoder error: {0}")]
    Encoder(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl PlayerError {
    pub fn invalid_arg(
        name: impl Into<String>,
        expected: impl Into<String>,
        received: impl std::fmt::Display,
    ) -> Self {
        Self::InvalidArgType {
            name: name.into(),
            expected: expected.into(),
            received: received.to_string(),
        }
    }

    /// Short machine-readable code, handy for hosts mapping errors to replies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoVoiceConnection => "ERR_NO_VOICE_CONNECTION",
            Self::NoVoiceChannel(_) => "ERR_NO_VOICE_CHANNEL",
            Self::InvalidChannelType { .. } => "ERR_INVALID_CHANNEL_TYPE",
            Self::NoGuildQueue(_) => "ERR_NO_GUILD_QUEUE",
            Self::NoResult(_) => "ERR_NO_RESULT",
            Self::OutOfSpace { .. } => "ERR_OUT_OF_SPACE",
            Self::VoiceConnectionDestroyed => "ERR_VOICE_CONNECTION_DESTROYED",
            Self::InvalidArgType { .. } => "ERR_INVALID_ARG_TYPE",
            Self::Cancelled => "ERR_CANCELLED",
            Self::Timeout(_) => "ERR_TIMEOUT",
            Self::Extractor(_) => "ERR_EXTRACTOR",
            Self::Transcoder(_) => "ERR_TRANSCODER",
            Self::Connection(_) => "ERR_CONNECTION",
            Self::AudioPlayer(_) => "ERR_AUDIO_PLAYER",
            Self::Encoder(_) => "ERR_ENCODER",
            Self::Config(_) => "ERR_CONFIG",
        }
    }
}

pub type PlayerResult<T> = std::result::Result<T, PlayerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_space_message_names_both_counts() {
        let err = PlayerError::OutOfSpace {
            attempted: 2,
            available: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains('2'));
        assert!(msg.contains('1'));
        assert_eq!(err.code(), "ERR_OUT_OF_SPACE");
    }

    #[test]
    fn test_invalid_arg_helper() {
        let err = PlayerError::invalid_arg("length", "positive integer", -1);
        assert_eq!(
            err,
            PlayerError::InvalidArgType {
                name: "length".into(),
                expected: "positive integer".into(),
                received: "-1".into(),
            }
        );
    }
}
