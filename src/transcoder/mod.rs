pub mod ffmpeg;

pub use ffmpeg::FfmpegTranscoder;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{
    audio::{constants::FRAME_SIZE_BYTES, constants::FRAME_DURATION_MS, resource::PcmStream},
    common::errors::PlayerError,
};

/// Raw audio as an extractor or hook hands it over.
pub enum StreamSource {
    /// Anything the transcoder can open by itself.
    Url(String),
    /// Encoded bytes of any container.
    Bytes(Box<dyn AsyncRead + Send + Unpin>),
    /// Already s16le / 48 kHz / stereo; skips the transcoder.
    Pcm(PcmStream),
}

impl std::fmt::Debug for StreamSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Url(url) => f.debug_tuple("Url").field(url).finish(),
            Self::Bytes(_) => f.write_str("Bytes(..)"),
            Self::Pcm(_) => f.write_str("Pcm(..)"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscodeOptions {
    pub seek_ms: u64,
    /// Comma-joined `-af` expression; empty means none.
    pub filters: String,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TranscoderError {
    #[error("Premature close")]
    PrematureClose,
    #[error("Broken pipe while feeding the transcoder")]
    BrokenPipe,
    #[error("Failed to spawn transcoder: {0}")]
    Spawn(String),
    #[error("Transcoder exited with {0}")]
    Exit(String),
    #[error("Transcoder I/O error: {0}")]
    Io(String),
}

impl TranscoderError {
    /// Errors that only mean the consumer stopped reading early.
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::PrematureClose | Self::BrokenPipe)
    }

    pub(crate) fn from_io(err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::BrokenPipe => Self::BrokenPipe,
            std::io::ErrorKind::UnexpectedEof | std::io::ErrorKind::ConnectionReset => Self::PrematureClose,
            _ => Self::Io(err.to_string()),
        }
    }
}

impl From<TranscoderError> for PlayerError {
    fn from(err: TranscoderError) -> Self {
        PlayerError::Transcoder(err.to_string())
    }
}

/// PCM output plus the errors the transcoder reports while running.
pub struct TranscodedStream {
    pub stream: PcmStream,
    pub errors: flume::Receiver<TranscoderError>,
}

impl TranscodedStream {
    /// Wraps a stream that reports nothing.
    pub fn quiet(stream: PcmStream) -> Self {
        let (_tx, errors) = flume::unbounded();
        Self { stream, errors }
    }
}

#[async_trait]
pub trait Transcoder: Send + Sync {
    fn name(&self) -> &str;

    async fn transcode(
        &self,
        source: StreamSource,
        options: &TranscodeOptions,
    ) -> Result<TranscodedStream, TranscoderError>;
}

/// Bytes of s16le stereo PCM covering `ms` milliseconds.
pub fn pcm_offset_bytes(ms: u64) -> u64 {
    ms / FRAME_DURATION_MS * FRAME_SIZE_BYTES as u64
}

/// Drops the first `ms` of an s16le stream.
pub async fn skip_pcm(stream: &mut PcmStream, ms: u64) -> Result<(), TranscoderError> {
    let bytes = pcm_offset_bytes(ms);
    if bytes == 0 {
        return Ok(());
    }
    let mut limited = stream.take(bytes);
    tokio::io::copy(&mut limited, &mut tokio::io::sink())
        .await
        .map_err(|e| TranscoderError::from_io(&e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_benign_errors() {
        assert!(TranscoderError::PrematureClose.is_benign());
        assert!(TranscoderError::BrokenPipe.is_benign());
        assert!(!TranscoderError::Exit("code 1".into()).is_benign());

        let pipe = std::io::Error::from(std::io::ErrorKind::BrokenPipe);
        assert!(TranscoderError::from_io(&pipe).is_benign());
    }

    #[tokio::test]
    async fn test_skip_pcm_drops_whole_frames() {
        let data: Vec<u8> = (0..FRAME_SIZE_BYTES * 3).map(|i| (i / FRAME_SIZE_BYTES) as u8).collect();
        let mut stream: PcmStream = Box::new(std::io::Cursor::new(data));
        skip_pcm(&mut stream, 40).await.unwrap();

        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest.len(), FRAME_SIZE_BYTES);
        assert!(rest.iter().all(|b| *b == 2));
    }
}
