use audiopus::{Application, Bitrate, Channels, SampleRate, coder::Encoder as OpusEncoder};
use bytes::Bytes;

use super::constants::{FRAME_SIZE_SAMPLES, MAX_OPUS_PACKET};
use crate::common::errors::{PlayerError, PlayerResult};

/// Turns one 20 ms interleaved stereo PCM frame into a transport packet.
pub trait FrameEncoder: Send {
    fn encode(&mut self, pcm: &[i16]) -> PlayerResult<Bytes>;
}

/// PCM i16 → Opus encoder for 960-sample (20 ms) stereo frames at 48 kHz.
pub struct OpusFrameEncoder {
    encoder: OpusEncoder,
    packet: Vec<u8>,
}

impl OpusFrameEncoder {
    pub fn new() -> PlayerResult<Self> {
        let mut encoder = OpusEncoder::new(SampleRate::Hz48000, Channels::Stereo, Application::Audio)
            .map_err(|e| PlayerError::Encoder(e.to_string()))?;
        encoder
            .set_bitrate(Bitrate::Auto)
            .map_err(|e| PlayerError::Encoder(e.to_string()))?;
        Ok(Self {
            encoder,
            packet: vec![0u8; MAX_OPUS_PACKET],
        })
    }
}

impl FrameEncoder for OpusFrameEncoder {
    fn encode(&mut self, pcm: &[i16]) -> PlayerResult<Bytes> {
        if pcm.len() != FRAME_SIZE_SAMPLES {
            return Err(PlayerError::Encoder(format!(
                "expected {} samples per frame, got {}",
                FRAME_SIZE_SAMPLES,
                pcm.len()
            )));
        }
        let size = self
            .encoder
            .encode(pcm, &mut self.packet)
            .map_err(|e| PlayerError::Encoder(e.to_string()))?;
        Ok(Bytes::copy_from_slice(&self.packet[..size]))
    }
}

/// Emits the frame as raw s16le bytes, for transports that do their own
/// encoding.
#[derive(Default)]
pub struct RawFrameEncoder;

impl FrameEncoder for RawFrameEncoder {
    fn encode(&mut self, pcm: &[i16]) -> PlayerResult<Bytes> {
        let mut out = Vec::with_capacity(pcm.len() * 2);
        for s in pcm {
            out.extend_from_slice(&s.to_le_bytes());
        }
        Ok(Bytes::from(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_encoder_is_little_endian() {
        let mut enc = RawFrameEncoder;
        let out = enc.encode(&[1, -2]).unwrap();
        assert_eq!(&out[..], &[1, 0, 0xFE, 0xFF]);
    }

    #[test]
    fn test_opus_encoder_rejects_short_frames() {
        let mut enc = OpusFrameEncoder::new().unwrap();
        assert!(enc.encode(&[0i16; 10]).is_err());
        let packet = enc.encode(&[0i16; FRAME_SIZE_SAMPLES]).unwrap();
        assert!(!packet.is_empty());
    }
}
