use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::{
    connection::VoiceConnection,
    dispatcher::{DispatcherEvent, ErrorSource},
};
use crate::{
    audio::{
        constants::{FRAME_DURATION_MS, FRAME_SIZE_BYTES, FRAME_SIZE_SAMPLES, SILENCE_FRAME, SILENCE_FRAME_COUNT},
        encoder::FrameEncoder,
        resource::{AudioResource, PcmStream, read_pcm_frame},
    },
    common::{errors::PlayerError, types::GuildId},
};

/// Receives everything the player reports.
pub type EventSink = Arc<dyn Fn(DispatcherEvent) + Send + Sync>;

#[derive(Default)]
struct PlayState {
    resource: Option<Arc<AudioResource>>,
    run: Option<CancellationToken>,
}

struct PlayerInner {
    guild_id: GuildId,
    connection: Arc<dyn VoiceConnection>,
    encoder: Mutex<Box<dyn FrameEncoder>>,
    sink: EventSink,
    paused: AtomicBool,
    interpolate_silence: AtomicBool,
    state: Mutex<PlayState>,
}

/// Paces one resource at a time onto the connection, one encoded frame every
/// 20 ms.
pub struct AudioPlayer {
    inner: Arc<PlayerInner>,
}

impl AudioPlayer {
    pub fn new(
        guild_id: GuildId,
        connection: Arc<dyn VoiceConnection>,
        encoder: Box<dyn FrameEncoder>,
        sink: EventSink,
    ) -> Self {
        Self {
            inner: Arc::new(PlayerInner {
                guild_id,
                connection,
                encoder: Mutex::new(encoder),
                sink,
                paused: AtomicBool::new(false),
                interpolate_silence: AtomicBool::new(false),
                state: Mutex::new(PlayState::default()),
            }),
        }
    }

    /// Starts `resource`, silently ending whatever was playing before.
    pub fn play(&self, resource: Arc<AudioResource>) {
        let token = CancellationToken::new();
        {
            let mut state = self.inner.state.lock();
            if let Some(run) = state.run.take() {
                run.cancel();
            }
            if let Some(old) = state.resource.take() {
                old.mark_ended();
            }
            state.resource = Some(resource.clone());
            state.run = Some(token.clone());
        }
        self.inner.paused.store(false, Ordering::Release);
        self.inner.interpolate_silence.store(false, Ordering::Release);

        debug!("[{}] Playing resource {}", self.inner.guild_id, resource.id());
        tokio::spawn(run(self.inner.clone(), resource, token));
    }

    /// Returns `false` when there is nothing to pause or already paused.
    pub fn pause(&self, interpolate_silence: bool) -> bool {
        if self.inner.state.lock().resource.is_none() {
            return false;
        }
        self.inner
            .interpolate_silence
            .store(interpolate_silence, Ordering::Release);
        !self.inner.paused.swap(true, Ordering::AcqRel)
    }

    pub fn resume(&self) -> bool {
        if self.inner.state.lock().resource.is_none() {
            return false;
        }
        self.inner.paused.swap(false, Ordering::AcqRel)
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::Acquire)
    }

    pub fn current(&self) -> Option<Arc<AudioResource>> {
        self.inner.state.lock().resource.clone()
    }

    /// Force-stops the current resource. Emits `Finish` unless paused.
    pub fn stop(&self) -> bool {
        let (resource, run) = {
            let mut state = self.inner.state.lock();
            (state.resource.take(), state.run.take())
        };
        if let Some(run) = run {
            run.cancel();
        }
        let Some(resource) = resource else {
            return false;
        };
        let was_paused = self.inner.paused.swap(false, Ordering::AcqRel);
        if resource.mark_ended() && !was_paused {
            (self.inner.sink)(DispatcherEvent::Finish(resource));
        }
        self.inner.connection.set_speaking(false);
        true
    }

    /// Ends playback without reporting anything. Used on teardown.
    pub fn shutdown(&self) {
        let mut state = self.inner.state.lock();
        if let Some(run) = state.run.take() {
            run.cancel();
        }
        if let Some(resource) = state.resource.take() {
            resource.mark_ended();
        }
    }
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn decode_pcm(bytes: &[u8], out: &mut [i16]) {
    out.fill(0);
    for (sample, chunk) in out.iter_mut().zip(bytes.chunks_exact(2)) {
        *sample = i16::from_le_bytes([chunk[0], chunk[1]]);
    }
}

async fn run(inner: Arc<PlayerInner>, resource: Arc<AudioResource>, token: CancellationToken) {
    let Some(mut source) = resource.take_source() else {
        warn!("[{}] Resource {} has no source left", inner.guild_id, resource.id());
        return;
    };

    let mut interval = tokio::time::interval(tokio::time::Duration::from_millis(FRAME_DURATION_MS));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut read_buf = vec![0u8; FRAME_SIZE_BYTES];
    let mut pcm_buf = vec![0i16; FRAME_SIZE_SAMPLES];
    let mut frame = vec![0i16; FRAME_SIZE_SAMPLES];
    let mut silence_left = 0usize;
    let mut speaking = false;
    let mut eof = false;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            _ = interval.tick() => {}
        }

        // Auto-pause: frames are held back until the transport is usable.
        if !inner.connection.status().is_ready() {
            continue;
        }

        if inner.paused.load(Ordering::Acquire) {
            let interpolate = inner.interpolate_silence.load(Ordering::Acquire);
            if interpolate || silence_left > 0 {
                let _ = inner.connection.send_frame(Bytes::from_static(&SILENCE_FRAME));
                silence_left = silence_left.saturating_sub(1);
            }
            if silence_left == 0 && speaking && !interpolate {
                inner.connection.set_speaking(false);
                speaking = false;
            }
            continue;
        }
        silence_left = SILENCE_FRAME_COUNT;

        if !eof {
            let filled = tokio::select! {
                biased;
                _ = token.cancelled() => return,
                filled = fill_chain(&resource, &mut source, &mut read_buf, &mut pcm_buf, &mut eof) => filled,
            };
            if let Err(e) = filled {
                warn!("[{}] PCM read failed: {}", inner.guild_id, e);
                (inner.sink)(DispatcherEvent::Error {
                    error: PlayerError::AudioPlayer(e.to_string()),
                    source: ErrorSource::AudioPlayer(resource.clone()),
                });
                eof = true;
            }
        }

        let has_frame = resource.filters().lock().fill_frame(&mut frame);
        if !has_frame {
            if eof {
                break;
            }
            continue;
        }

        let packet = match inner.encoder.lock().encode(&frame) {
            Ok(packet) => packet,
            Err(e) => {
                (inner.sink)(DispatcherEvent::Error {
                    error: e,
                    source: ErrorSource::AudioPlayer(resource.clone()),
                });
                continue;
            }
        };

        // A replaced or stopped run must not leak frames into the next one.
        if token.is_cancelled() {
            return;
        }
        if !speaking {
            inner.connection.set_speaking(true);
            speaking = true;
        }
        if let Err(e) = inner.connection.send_frame(packet) {
            trace!("[{}] Frame dropped: {}", inner.guild_id, e);
        }
        resource.record_frame();
        if resource.mark_started() {
            (inner.sink)(DispatcherEvent::Start(resource.clone()));
        }
    }

    for _ in 0..SILENCE_FRAME_COUNT {
        let _ = inner.connection.send_frame(Bytes::from_static(&SILENCE_FRAME));
    }
    inner.connection.set_speaking(false);

    let finished = {
        let mut state = inner.state.lock();
        if state.resource.as_ref().is_some_and(|r| r.id() == resource.id()) {
            state.resource = None;
            state.run = None;
        }
        resource.mark_ended()
    };
    if finished {
        debug!(
            "[{}] Resource {} finished after {}ms",
            inner.guild_id,
            resource.id(),
            resource.playback_duration_ms()
        );
        (inner.sink)(DispatcherEvent::Finish(resource));
    }
}

/// Reads and processes input until one output frame is buffered or the
/// stream ends.
async fn fill_chain(
    resource: &AudioResource,
    source: &mut PcmStream,
    read_buf: &mut [u8],
    pcm_buf: &mut [i16],
    eof: &mut bool,
) -> std::io::Result<()> {
    while resource.filters().lock().buffered() < FRAME_SIZE_SAMPLES {
        let n = read_pcm_frame(source, read_buf).await?;
        if n == 0 {
            *eof = true;
            break;
        }
        decode_pcm(&read_buf[..n], pcm_buf);
        resource.filters().lock().process(pcm_buf);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        audio::{encoder::RawFrameEncoder, resource::CreateStreamOptions},
        testkit::{MockConnection, pcm_stream},
    };

    fn recorder() -> (EventSink, Arc<Mutex<Vec<DispatcherEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink_events = events.clone();
        let sink: EventSink = Arc::new(move |ev| sink_events.lock().push(ev));
        (sink, events)
    }

    #[test]
    fn test_decode_pcm_zero_pads() {
        let mut out = [9i16; 4];
        decode_pcm(&[1, 0, 0xFF, 0xFF], &mut out);
        assert_eq!(out, [1, -1, 0, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_plays_to_end_and_finishes_once() {
        let conn = MockConnection::ready(GuildId(1));
        let (sink, events) = recorder();
        let player = AudioPlayer::new(GuildId(1), conn.clone(), Box::new(RawFrameEncoder), sink);

        let resource = AudioResource::new(pcm_stream(3), CreateStreamOptions::default());
        player.play(resource.clone());
        tokio::time::sleep(Duration::from_millis(200)).await;

        let events = events.lock();
        assert!(matches!(events.first(), Some(DispatcherEvent::Start(_))));
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, DispatcherEvent::Finish(_)))
                .count(),
            1
        );
        assert!(resource.ended());
        assert_eq!(resource.playback_duration_ms(), 60);
        assert!(player.current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replacing_resource_does_not_finish_old_one() {
        let conn = MockConnection::ready(GuildId(1));
        let (sink, events) = recorder();
        let player = AudioPlayer::new(GuildId(1), conn, Box::new(RawFrameEncoder), sink);

        let first = AudioResource::new(pcm_stream(100), CreateStreamOptions::default());
        player.play(first.clone());
        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = AudioResource::new(pcm_stream(100), CreateStreamOptions::default());
        player.play(second.clone());
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(first.ended());
        assert!(!second.ended());
        assert!(
            !events
                .lock()
                .iter()
                .any(|e| matches!(e, DispatcherEvent::Finish(r) if r.id() == first.id()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_is_idempotent_and_stop_while_paused_is_silent() {
        let conn = MockConnection::ready(GuildId(1));
        let (sink, events) = recorder();
        let player = AudioPlayer::new(GuildId(1), conn, Box::new(RawFrameEncoder), sink);

        assert!(!player.pause(false));
        player.play(AudioResource::new(pcm_stream(100), CreateStreamOptions::default()));
        assert!(player.pause(false));
        assert!(!player.pause(false));
        assert!(player.is_paused());

        assert!(player.stop());
        assert!(
            !events
                .lock()
                .iter()
                .any(|e| matches!(e, DispatcherEvent::Finish(_)))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_run_sends_nothing_after_blocked_read() {
        use tokio::io::AsyncWriteExt;

        let conn = MockConnection::ready(GuildId(1));
        let (sink, events) = recorder();
        let player = AudioPlayer::new(GuildId(1), conn.clone(), Box::new(RawFrameEncoder), sink);

        let (mut feed, source) = tokio::io::duplex(64 * 1024);
        let resource = AudioResource::new(Box::new(source), CreateStreamOptions::default());
        player.play(resource.clone());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(conn.frames_sent(), 0);

        assert!(player.stop());
        feed.write_all(&vec![1u8; FRAME_SIZE_BYTES * 2]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(conn.frames_sent(), 0);
        assert!(resource.ended());
        assert!(
            !events
                .lock()
                .iter()
                .any(|e| matches!(e, DispatcherEvent::Start(_)))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_holds_frames_until_ready() {
        let conn = MockConnection::connecting(GuildId(1));
        let (sink, _events) = recorder();
        let player = AudioPlayer::new(GuildId(1), conn.clone(), Box::new(RawFrameEncoder), sink);

        let resource = AudioResource::new(pcm_stream(10), CreateStreamOptions::default());
        player.play(resource.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(resource.playback_duration_ms(), 0);

        conn.set_status(crate::voice::ConnectionStatus::Ready);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(resource.playback_duration_ms() > 0);
    }
}
