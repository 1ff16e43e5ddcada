pub mod adapter;
pub mod audio_player;
pub(crate) mod backoff;
pub mod connection;
pub mod dispatcher;
pub mod utils;

pub use adapter::{AdapterFactory, AdapterRegistry, JoinConfig, VoiceAdapter};
pub use audio_player::AudioPlayer;
pub use connection::{CLOSE_CODE_DISCONNECTED, ConnectionStatus, DisconnectReason, VoiceConnection};
pub use dispatcher::{DispatcherEvent, ErrorSource, StreamDispatcher};
pub use utils::{EncoderFactory, VoiceUtils, opus_encoder_factory};
