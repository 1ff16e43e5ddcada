use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::{
    constants::FRAME_DURATION_MS,
    filters::{FilterSettings, FiltersChain, StageSwitches},
};
use crate::protocol::tracks::Track;

/// A readable s16le / 48 kHz / stereo PCM byte stream.
pub type PcmStream = Box<dyn AsyncRead + Send + Unpin>;

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Default)]
pub struct CreateStreamOptions {
    /// Track the resource plays; lets the current track be recovered from the
    /// dispatcher alone.
    pub metadata: Option<Arc<Track>>,
    pub filters: FilterSettings,
    pub switches: StageSwitches,
}

/// A playable stream plus the filter chain it runs through. Created by the
/// dispatcher, consumed by exactly one audio player run.
pub struct AudioResource {
    id: u64,
    metadata: Option<Arc<Track>>,
    source: Mutex<Option<PcmStream>>,
    filters: Arc<Mutex<FiltersChain>>,
    played_frames: AtomicU64,
    started: AtomicBool,
    ended: AtomicBool,
}

impl std::fmt::Debug for AudioResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioResource")
            .field("id", &self.id)
            .field("track", &self.metadata.as_ref().map(|t| &t.title))
            .field("played_ms", &self.playback_duration_ms())
            .field("ended", &self.ended())
            .finish()
    }
}

impl AudioResource {
    pub fn new(source: PcmStream, options: CreateStreamOptions) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed),
            metadata: options.metadata,
            source: Mutex::new(Some(source)),
            filters: Arc::new(Mutex::new(FiltersChain::new(&options.filters, options.switches))),
            played_frames: AtomicU64::new(0),
            started: AtomicBool::new(false),
            ended: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn metadata(&self) -> Option<&Arc<Track>> {
        self.metadata.as_ref()
    }

    pub fn filters(&self) -> &Arc<Mutex<FiltersChain>> {
        &self.filters
    }

    /// Milliseconds of audio sent so far.
    pub fn playback_duration_ms(&self) -> u64 {
        self.played_frames.load(Ordering::Acquire) * FRAME_DURATION_MS
    }

    pub fn started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }

    /// Hands the stream to the player. Only the first call gets it.
    pub(crate) fn take_source(&self) -> Option<PcmStream> {
        self.source.lock().take()
    }

    pub(crate) fn record_frame(&self) {
        self.played_frames.fetch_add(1, Ordering::AcqRel);
    }

    /// Returns `true` the first time only.
    pub(crate) fn mark_started(&self) -> bool {
        !self.started.swap(true, Ordering::AcqRel)
    }

    /// Returns `true` the first time only.
    pub(crate) fn mark_ended(&self) -> bool {
        self.source.lock().take();
        !self.ended.swap(true, Ordering::AcqRel)
    }
}

/// Reads one frame worth of bytes, stopping short only at end of stream.
/// Returns the number of bytes read; 0 means the stream is exhausted.
pub async fn read_pcm_frame<R: AsyncRead + Unpin + ?Sized>(
    reader: &mut R,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
