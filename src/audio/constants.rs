//! Central constants for the audio pipeline.
//!
//! Everything under `src/audio/**` and the voice playout loop reads its frame
//! geometry from here.

// ── Sample / PCM ─────────────────────────────────────────────────────────────

/// Sample rate of the PCM produced by the transcoder and sent to the encoder (Hz).
pub const SAMPLE_RATE: u32 = 48_000;

pub const SAMPLE_RATE_F64: f64 = 48_000.0;

pub const CHANNELS: usize = 2;

/// Frames per channel in one 20 ms packet at 48 kHz.
pub const FRAME_SAMPLES_PER_CHANNEL: usize = 960;

/// Interleaved samples in one 20 ms stereo frame (960 frames × 2 channels).
pub const FRAME_SIZE_SAMPLES: usize = FRAME_SAMPLES_PER_CHANNEL * CHANNELS;

/// Bytes in one 20 ms s16le stereo frame.
pub const FRAME_SIZE_BYTES: usize = FRAME_SIZE_SAMPLES * 2;

/// Wall-clock length of one frame.
pub const FRAME_DURATION_MS: u64 = 20;

// ── i16 PCM clip boundaries ──────────────────────────────────────────────────

pub const INT16_MAX_F: f32 = 32_767.0;
pub const INT16_MIN_F: f32 = -32_768.0;
pub const INT16_SCALE: f32 = 32_768.0;

// ── Codec ─────────────────────────────────────────────────────────────────────

/// Largest Opus packet we ever ask the encoder to write.
pub const MAX_OPUS_PACKET: usize = 4_000;

/// Canonical Opus silence frame, sent a few times after playback stops so
/// the receiving side does not interpolate noise.
pub const SILENCE_FRAME: [u8; 3] = [0xF8, 0xFF, 0xFE];

/// Silence frames sent when a stream stops or pauses.
pub const SILENCE_FRAME_COUNT: usize = 5;

// ── Filters ───────────────────────────────────────────────────────────────────

pub const EQ_BAND_COUNT: usize = 15;
pub const EQ_GAIN_MIN: f32 = -0.25;
pub const EQ_GAIN_MAX: f32 = 1.0;

/// Upper bound for the volume filter, in percent.
pub const MAX_VOLUME: u16 = 1000;
