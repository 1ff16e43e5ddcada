use std::{
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    audio_player::{AudioPlayer, EventSink},
    backoff::Backoff,
    connection::{CLOSE_CODE_DISCONNECTED, ConnectionStatus, DisconnectReason, VoiceConnection},
};
use crate::{
    audio::{
        encoder::FrameEncoder,
        resource::{AudioResource, CreateStreamOptions, PcmStream},
    },
    common::{
        errors::{PlayerError, PlayerResult},
        types::{GuildId, VoiceChannel},
    },
    configs::VoiceConfig,
};

/// Where an error reported by the dispatcher came from.
#[derive(Debug, Clone)]
pub enum ErrorSource {
    Connection,
    AudioPlayer(Arc<AudioResource>),
}

#[derive(Debug, Clone)]
pub enum DispatcherEvent {
    Start(Arc<AudioResource>),
    Finish(Arc<AudioResource>),
    Error {
        error: PlayerError,
        source: ErrorSource,
    },
    Debug(String),
    /// The dispatcher is gone for good; no event follows this one.
    Destroyed,
}

type Listener = Arc<Mutex<Option<flume::Sender<DispatcherEvent>>>>;

/// One voice connection plus the audio player feeding it.
pub struct StreamDispatcher {
    guild_id: GuildId,
    channel: VoiceChannel,
    connection: Arc<dyn VoiceConnection>,
    player: AudioPlayer,
    listener: Listener,
    connection_timeout: Duration,
    destroyed: AtomicBool,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for StreamDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDispatcher")
            .field("guild_id", &self.guild_id)
            .field("channel", &self.channel.id)
            .field("status", &self.connection.status())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

impl StreamDispatcher {
    pub fn new(
        channel: VoiceChannel,
        connection: Arc<dyn VoiceConnection>,
        encoder: Box<dyn FrameEncoder>,
        config: &VoiceConfig,
    ) -> Arc<Self> {
        let guild_id = channel.guild_id;
        let listener: Listener = Arc::new(Mutex::new(None));
        let sink_listener = listener.clone();
        let sink: EventSink = Arc::new(move |event| {
            if let Some(tx) = sink_listener.lock().as_ref() {
                let _ = tx.send(event);
            }
        });

        let dispatcher = Arc::new(Self {
            guild_id,
            channel,
            player: AudioPlayer::new(guild_id, connection.clone(), encoder, sink),
            connection,
            listener,
            connection_timeout: config.connection_timeout(),
            destroyed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        });

        let backoff = Backoff::new(config.reconnect_backoff_base_ms, config.max_reconnect_attempts);
        tokio::spawn(watch_connection(
            Arc::downgrade(&dispatcher),
            dispatcher.connection.subscribe(),
            dispatcher.shutdown.clone(),
            dispatcher.connection_timeout,
            backoff,
        ));

        dispatcher
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn channel(&self) -> &VoiceChannel {
        &self.channel
    }

    pub fn connection(&self) -> &Arc<dyn VoiceConnection> {
        &self.connection
    }

    pub fn status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Routes all further events to a new receiver. The previous receiver,
    /// if any, is detached and sees its channel close.
    pub fn subscribe(&self) -> flume::Receiver<DispatcherEvent> {
        let (tx, rx) = flume::unbounded();
        *self.listener.lock() = Some(tx);
        rx
    }

    /// Detaches the current receiver without replacing it.
    pub fn unsubscribe(&self) {
        self.listener.lock().take();
    }

    fn emit(&self, event: DispatcherEvent) {
        if let DispatcherEvent::Debug(msg) = &event {
            debug!("[{}] {}", self.guild_id, msg);
        }
        if let Some(tx) = self.listener.lock().as_ref() {
            let _ = tx.send(event);
        }
    }

    /// Wraps a PCM stream into a resource. Does not start playback.
    pub fn create_stream(&self, source: PcmStream, options: CreateStreamOptions) -> Arc<AudioResource> {
        let resource = AudioResource::new(source, options);
        self.emit(DispatcherEvent::Debug(format!(
            "Created audio resource {} for {}",
            resource.id(),
            resource
                .metadata()
                .map(|t| t.title.as_str())
                .unwrap_or("<unknown>")
        )));
        resource
    }

    /// Hands `resource` to the player once the connection is ready. A
    /// connection that never gets ready is reported through an `Error` event.
    pub fn play_stream(self: &Arc<Self>, resource: Arc<AudioResource>) -> PlayerResult<()> {
        if self.is_destroyed() {
            return Err(PlayerError::VoiceConnectionDestroyed);
        }
        if resource.ended() {
            return Err(PlayerError::invalid_arg(
                "resource",
                "an AudioResource that has not ended",
                "ended AudioResource",
            ));
        }

        if self.status().is_ready() {
            self.player.play(resource);
            return Ok(());
        }

        self.emit(DispatcherEvent::Debug(format!(
            "Connection is {:?}, waiting up to {:?} before playing",
            self.status(),
            self.connection_timeout
        )));
        let weak = Arc::downgrade(self);
        let mut rx = self.connection.subscribe();
        let timeout = self.connection_timeout;
        tokio::spawn(async move {
            let ready = wait_for_status(&mut rx, timeout, |s| s.is_ready() || s.is_destroyed()).await;
            let Some(dispatcher) = weak.upgrade() else {
                return;
            };
            match ready {
                Some(status) if status.is_ready() && !dispatcher.is_destroyed() => {
                    dispatcher.player.play(resource);
                }
                Some(_) => {
                    dispatcher.emit(DispatcherEvent::Error {
                        error: PlayerError::VoiceConnectionDestroyed,
                        source: ErrorSource::Connection,
                    });
                }
                None => {
                    warn!("[{}] Voice connection not ready after {:?}", dispatcher.guild_id, timeout);
                    dispatcher.emit(DispatcherEvent::Error {
                        error: PlayerError::Timeout(timeout),
                        source: ErrorSource::Connection,
                    });
                }
            }
        });
        Ok(())
    }

    pub fn pause(&self, interpolate_silence: bool) -> bool {
        let paused = self.player.pause(interpolate_silence);
        if paused {
            self.emit(DispatcherEvent::Debug("Playback paused".into()));
        }
        paused
    }

    pub fn resume(&self) -> bool {
        let resumed = self.player.resume();
        if resumed {
            self.emit(DispatcherEvent::Debug("Playback resumed".into()));
        }
        resumed
    }

    pub fn paused(&self) -> bool {
        self.player.is_paused()
    }

    /// The resource currently held by the player.
    pub fn resource(&self) -> Option<Arc<AudioResource>> {
        self.player.current()
    }

    pub fn is_playing(&self) -> bool {
        self.resource().is_some() && !self.paused()
    }

    /// Milliseconds the current resource has played.
    pub fn streaming_time(&self) -> u64 {
        self.resource().map(|r| r.playback_duration_ms()).unwrap_or(0)
    }

    /// Stops the current resource, reporting `Finish` unless paused.
    pub fn end(&self) {
        self.player.stop();
    }

    /// Stops playback and destroys the connection. Safe to call repeatedly.
    pub fn disconnect(&self) {
        self.teardown();
    }

    fn teardown(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shutdown.cancel();
        self.player.shutdown();
        if !self.connection.status().is_destroyed() {
            self.connection.destroy();
        }
        info!("[{}] Stream dispatcher destroyed", self.guild_id);
        self.emit(DispatcherEvent::Destroyed);
        self.unsubscribe();
    }
}

impl Drop for StreamDispatcher {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Waits for a status matching `pred`. `None` on timeout or when the
/// connection went away.
async fn wait_for_status(
    rx: &mut watch::Receiver<ConnectionStatus>,
    timeout: Duration,
    pred: impl FnMut(&ConnectionStatus) -> bool,
) -> Option<ConnectionStatus> {
    match tokio::time::timeout(timeout, rx.wait_for(pred)).await {
        Ok(Ok(status)) => Some(*status),
        _ => None,
    }
}

/// Mirrors connection status into dispatcher behavior: bounded rejoin on
/// unexpected disconnects, teardown on manual ones.
async fn watch_connection(
    dispatcher: Weak<StreamDispatcher>,
    mut rx: watch::Receiver<ConnectionStatus>,
    shutdown: CancellationToken,
    timeout: Duration,
    mut backoff: Backoff,
) {
    loop {
        let changed = tokio::select! {
            _ = shutdown.cancelled() => return,
            changed = rx.changed() => changed,
        };
        let Some(d) = dispatcher.upgrade() else {
            return;
        };
        if changed.is_err() {
            d.teardown();
            return;
        }
        let status = *rx.borrow_and_update();

        match status {
            ConnectionStatus::Ready => backoff.reset(),
            ConnectionStatus::Destroyed => {
                d.teardown();
                return;
            }
            ConnectionStatus::Disconnected(DisconnectReason::Manual) => {
                d.emit(DispatcherEvent::Debug("Connection closed manually".into()));
                d.teardown();
                return;
            }
            ConnectionStatus::Disconnected(DisconnectReason::WebSocketClose(CLOSE_CODE_DISCONNECTED)) => {
                // Possibly a channel move; the transport reconnects on its own if so.
                let next = wait_for_status(&mut rx, timeout, |s| {
                    !matches!(s, ConnectionStatus::Disconnected(_))
                })
                .await;
                match next {
                    Some(s) if !s.is_destroyed() => {
                        if s.is_ready() {
                            backoff.reset();
                        }
                    }
                    _ => {
                        d.teardown();
                        return;
                    }
                }
            }
            ConnectionStatus::Disconnected(reason) => {
                if backoff.is_exhausted() {
                    warn!(
                        "[{}] Giving up on voice connection after {} attempts",
                        d.guild_id,
                        backoff.attempts()
                    );
                    d.teardown();
                    return;
                }
                let delay = backoff.next();
                d.emit(DispatcherEvent::Debug(format!(
                    "Disconnected ({:?}), rejoin attempt {} in {:?}",
                    reason,
                    backoff.attempts(),
                    delay
                )));
                drop(d);
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
                let Some(d) = dispatcher.upgrade() else {
                    return;
                };
                if let Err(e) = d.connection.rejoin().await {
                    d.emit(DispatcherEvent::Error {
                        error: e,
                        source: ErrorSource::Connection,
                    });
                }
            }
            ConnectionStatus::Signalling | ConnectionStatus::Connecting => {
                let next = wait_for_status(&mut rx, timeout, |s| !s.is_connecting()).await;
                match next {
                    Some(s) if s.is_ready() => backoff.reset(),
                    Some(_) => {
                        // Left connecting some other way; handled on the next pass.
                        rx.mark_changed();
                    }
                    _ => {
                        d.emit(DispatcherEvent::Debug("Connection never became ready".into()));
                        d.teardown();
                        return;
                    }
                }
            }
        }
    }
}
